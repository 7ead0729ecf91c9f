//! Enum handler: a base representation type (`int` or `str`) plus a closed set
//! of member values, pre-computed as JSON-form and structured-form sets at
//! `build()` so membership checks are O(1) at runtime.

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
use crate::resolve::LazyHandler;
use crate::types::TypeExpr;

/// `Value` doesn't implement `Hash`/`Eq`, so membership is checked by linear
/// scan over a small `Vec` rather than a `HashSet<Value>`; enum member counts
/// are small enough in practice (this is a closed, declaration-time set) that
/// this doesn't need to be a hash lookup.
pub struct EnumHandler {
    base: LazyHandler,
    members: Vec<Value>,
}

impl EnumHandler {
    pub fn new(base: TypeExpr, members: Vec<Value>) -> EnumHandler {
        EnumHandler { base: LazyHandler::new(base, Constraints::empty()), members }
    }

    fn is_member(&self, value: &Value) -> bool {
        self.members.iter().any(|m| m == value)
    }
}

impl Handler for EnumHandler {
    fn build(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn handle(
        &self,
        value: &Value,
        pointer: &Pointer,
        included: bool,
        excluded: bool,
        config: &HandleConfig,
    ) -> (HandlerOutput, Vec<Issue>) {
        if let Some(result) = short_circuit(included, excluded) {
            return result;
        }
        let base = match self.base.get(&config.registry) {
            Ok(h) => h,
            Err(e) => {
                return (
                    HandlerOutput::Empty,
                    vec![Issue::new(pointer.clone(), IssueKind::Deserialize { message: e.to_string() })],
                );
            }
        };
        let (result, issues) = base.handle(value, pointer, true, false, config);
        if !issues.is_empty() {
            return (HandlerOutput::Empty, issues);
        }
        let Some(converted) = result.into_value() else {
            return (HandlerOutput::Empty, Vec::new());
        };
        if !self.is_member(&converted) {
            return (
                HandlerOutput::Empty,
                vec![Issue::new(
                    pointer.clone(),
                    IssueKind::EnumOption { options: self.members.iter().map(|m| m.to_string()).collect() },
                )],
            );
        }
        (HandlerOutput::Value(converted), Vec::new())
    }
}

pub struct EnumFactory;

impl HandlerFactory for EnumFactory {
    fn build_handler(
        &self,
        type_expr: &TypeExpr,
        _constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        let TypeExpr::Enum { base, members } = type_expr.root() else {
            return Err(ProtocolError::HandlerMissing { type_name: format!("{type_expr:?}") });
        };
        Ok(Arc::new(EnumHandler::new((**base).clone(), members.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Shape;
    use crate::handlers::string::StringFactory;
    use crate::registry::TypeKey;

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(TypeRegistry::builder().register(TypeKey::String, Arc::new(StringFactory)).build())
    }

    #[test]
    fn accepts_declared_member() {
        let handler = EnumHandler::new(TypeExpr::String, vec![Value::from("red"), Value::from("blue")]);
        let config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        let (out, issues) = handler.handle(&Value::from("red"), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        assert_eq!(out, HandlerOutput::Value(Value::from("red")));
    }

    #[test]
    fn rejects_undeclared_member() {
        let handler = EnumHandler::new(TypeExpr::String, vec![Value::from("red"), Value::from("blue")]);
        let config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        let (_, issues) = handler.handle(&Value::from("green"), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
    }
}
