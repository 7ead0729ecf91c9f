//! `Literal` (a closed set of constant values) and `ConstCarrier` (the
//! `ClassVar`/`Final` analogue: a type paired with a single pinned value not
//! carried in the type itself).

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::config::HandleConfig;
use crate::constraints::Constraints;
use crate::error::ProtocolError;
use crate::handler::{short_circuit, Handler, HandlerOutput};
use crate::issue::{Issue, IssueKind};
use crate::pointer::Pointer;
use crate::registry::{HandlerFactory, TypeRegistry};
use crate::types::TypeExpr;

/// `Value` has no `Hash` impl (floats), so membership is keyed by each
/// literal's canonical JSON text rather than the `Value` itself — cheap to
/// precompute once at `build()` since the member set is fixed at declaration
/// time.
pub struct LiteralHandler {
    members: Vec<Value>,
    by_json_text: HashSet<String>,
}

impl LiteralHandler {
    pub fn new(members: Vec<Value>) -> LiteralHandler {
        let by_json_text = members.iter().map(|m| m.to_string()).collect();
        LiteralHandler { members, by_json_text }
    }
}

impl Handler for LiteralHandler {
    fn build(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn handle(
        &self,
        value: &Value,
        pointer: &Pointer,
        included: bool,
        excluded: bool,
        _config: &HandleConfig,
    ) -> (HandlerOutput, Vec<Issue>) {
        if let Some(result) = short_circuit(included, excluded) {
            return result;
        }
        if self.by_json_text.contains(&value.to_string()) {
            return (HandlerOutput::Value(value.clone()), Vec::new());
        }
        (
            HandlerOutput::Empty,
            vec![Issue::new(
                pointer.clone(),
                IssueKind::EnumOption { options: self.members.iter().map(|m| m.to_string()).collect() },
            )],
        )
    }
}

pub struct LiteralFactory;

impl HandlerFactory for LiteralFactory {
    fn build_handler(
        &self,
        type_expr: &TypeExpr,
        _constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        let TypeExpr::Literal(members) = type_expr.root() else {
            return Err(ProtocolError::HandlerMissing { type_name: format!("{type_expr:?}") });
        };
        Ok(Arc::new(LiteralHandler::new(members.clone())))
    }
}

/// A `ClassVar`/`Final` carrier: the constant is supplied out-of-band as
/// `type_hint_value` (the registry's `pinned` slot), since unlike `Literal`
/// the hint itself doesn't embed it.
pub struct ConstCarrierHandler {
    pinned: Value,
}

impl ConstCarrierHandler {
    pub fn new(pinned: Value) -> ConstCarrierHandler {
        ConstCarrierHandler { pinned }
    }
}

impl Handler for ConstCarrierHandler {
    fn build(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn handle(
        &self,
        value: &Value,
        pointer: &Pointer,
        included: bool,
        excluded: bool,
        _config: &HandleConfig,
    ) -> (HandlerOutput, Vec<Issue>) {
        if let Some(result) = short_circuit(included, excluded) {
            return result;
        }
        if value == &self.pinned {
            return (HandlerOutput::Value(value.clone()), Vec::new());
        }
        (
            HandlerOutput::Empty,
            vec![Issue::new(pointer.clone(), IssueKind::Constant { expected: self.pinned.to_string() })],
        )
    }
}

pub struct ConstCarrierFactory;

impl HandlerFactory for ConstCarrierFactory {
    fn build_handler(
        &self,
        _type_expr: &TypeExpr,
        _constraints: &Constraints,
        pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        let pinned = pinned.cloned().ok_or(ProtocolError::MissingPinnedValue)?;
        Ok(Arc::new(ConstCarrierHandler::new(pinned)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Shape;
    use crate::registry::TypeRegistry;

    fn config() -> HandleConfig {
        HandleConfig::new(Shape::Json, Shape::Json, Arc::new(TypeRegistry::builder().build()))
    }

    #[test]
    fn literal_accepts_declared_values() {
        let handler = LiteralHandler::new(vec![Value::from("a"), Value::from(1)]);
        let config = config();
        let (out, issues) = handler.handle(&Value::from(1), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        assert_eq!(out, HandlerOutput::Value(Value::from(1)));
        let (_, issues) = handler.handle(&Value::from(2), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn const_carrier_enforces_pinned_equality() {
        let handler = ConstCarrierHandler::new(Value::from("frozen"));
        let config = config();
        let (_, issues) = handler.handle(&Value::from("frozen"), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        let (_, issues) = handler.handle(&Value::from("other"), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
    }
}
