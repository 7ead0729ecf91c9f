//! Sequence and tuple handler: generic over one inner type (cycled per
//! element) or, for tuples, a positional list of per-slot types.

use std::sync::Arc;

use serde_json::Value;

use crate::config::HandleConfig;
use crate::constraints::{Constraints, DataType};
use crate::error::ProtocolError;
use crate::handler::{short_circuit, Handler, HandlerOutput};
use crate::handlers::length::{self, LengthBounds};
use crate::handlers::scalar::json_data_type;
use crate::issue::{Issue, IssueKind};
use crate::patch::{PatchMode, PatchStage};
use crate::pointer::Pointer;
use crate::registry::{HandlerFactory, TypeRegistry};
use crate::resolve::LazyHandler;
use crate::types::TypeExpr;

enum Items {
    /// `Seq(T)`: the same lazy handler is consulted for every position.
    Single(LazyHandler),
    /// `Tuple([T0, T1, ...])`: one lazy handler per slot, and an implicit
    /// `length_eq` equal to the arity.
    Positional(Vec<LazyHandler>),
}

pub struct SequenceHandler {
    items: Items,
    length: LengthBounds,
}

impl SequenceHandler {
    pub fn new_seq(item: TypeExpr, constraints: Constraints) -> SequenceHandler {
        SequenceHandler {
            items: Items::Single(LazyHandler::new(item, Constraints::empty())),
            length: length::consolidate(&constraints),
        }
    }

    pub fn new_tuple(items: Vec<TypeExpr>, constraints: Constraints) -> SequenceHandler {
        let arity = items.len();
        let lazies = items.into_iter().map(|t| LazyHandler::new(t, Constraints::empty())).collect();
        let mut length = length::consolidate(&constraints);
        if length.lower.is_none() && length.upper.is_none() {
            length = LengthBounds {
                lower: Some((crate::constraints::Comparator::Ge, arity)),
                upper: Some((crate::constraints::Comparator::Le, arity)),
            };
        }
        SequenceHandler { items: Items::Positional(lazies), length }
    }
}

impl Handler for SequenceHandler {
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
        let Value::Array(elements) = value else {
            return (
                HandlerOutput::Empty,
                vec![Issue::new(
                    pointer.clone(),
                    IssueKind::JsonType { expected: DataType::Array, actual: json_data_type(value) },
                )],
            );
        };

        // Length checked up front (not while coercing, where zip semantics below can
        // legitimately shorten the output) so a plain length mismatch is reported
        // precisely rather than masked by a truncated zip.
        if !config.coerce {
            let issues = length::check(&self.length, elements.len(), pointer);
            if !issues.is_empty() {
                return (HandlerOutput::Empty, issues);
            }
        }

        let registry = &config.registry;

        let mut out = Vec::new();
        let mut issues = Vec::new();
        let count = match &self.items {
            Items::Single(_) => elements.len(),
            Items::Positional(slots) => elements.len().min(slots.len()),
        };
        for (index, element) in elements.iter().enumerate().take(count) {
            let child_pointer = pointer.join(index);

            let child_included = config.include.matches(&child_pointer);
            let child_excluded = config.exclude.matches(&child_pointer);
            if child_excluded || !child_included {
                continue;
            }

            let handler = match &self.items {
                Items::Single(lazy) => lazy.get(&registry),
                Items::Positional(slots) => slots[index].get(&registry),
            };
            let handler = match handler {
                Ok(h) => h,
                Err(_) => continue,
            };
            let source_value = config.patches.apply(PatchStage::Source, PatchMode::Value, &child_pointer, element.clone());
            let (result, mut child_issues) =
                handler.handle(&source_value, &child_pointer, true, false, config);
            issues.append(&mut child_issues);
            if let HandlerOutput::Value(v) = result {
                let target_value = config.patches.apply(PatchStage::Target, PatchMode::Value, &child_pointer, v);
                out.push(target_value);
            }
        }

        if !issues.is_empty() {
            return (HandlerOutput::Empty, issues);
        }
        (HandlerOutput::Value(Value::Array(out)), Vec::new())
    }
}

pub struct SeqFactory;

impl HandlerFactory for SeqFactory {
    fn build_handler(
        &self,
        type_expr: &TypeExpr,
        constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        let TypeExpr::Seq(item) = type_expr.root() else {
            return Err(ProtocolError::HandlerMissing { type_name: format!("{type_expr:?}") });
        };
        Ok(Arc::new(SequenceHandler::new_seq((**item).clone(), constraints.clone())))
    }
}

pub struct TupleFactory;

impl HandlerFactory for TupleFactory {
    fn build_handler(
        &self,
        type_expr: &TypeExpr,
        constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        let TypeExpr::Tuple(items) = type_expr.root() else {
            return Err(ProtocolError::HandlerMissing { type_name: format!("{type_expr:?}") });
        };
        Ok(Arc::new(SequenceHandler::new_tuple(items.clone(), constraints.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Shape;
    use crate::handlers::number::{NumberFactory, NumberKind};
    use crate::registry::TypeKey;

    fn registry_with_int() -> Arc<TypeRegistry> {
        Arc::new(TypeRegistry::builder().register(TypeKey::Int, Arc::new(NumberFactory(NumberKind::Int))).build())
    }

    #[test]
    fn seq_validates_every_element() {
        let registry = registry_with_int();
        let handler = SequenceHandler::new_seq(TypeExpr::Int, Constraints::empty());
        let mut config = HandleConfig::new(Shape::Json, Shape::Json, registry);
        config.validate = true;
        let (out, issues) = handler.handle(
            &Value::Array(vec![Value::from(1), Value::from(2), Value::from(3)]),
            &Pointer::root(),
            true,
            false,
            &config,
        );
        assert!(issues.is_empty());
        assert_eq!(out, HandlerOutput::Value(Value::Array(vec![Value::from(1), Value::from(2), Value::from(3)])));
    }

    #[test]
    fn seq_collects_issues_from_bad_elements() {
        let registry = registry_with_int();
        let handler = SequenceHandler::new_seq(TypeExpr::Int, Constraints::empty());
        let config = HandleConfig::new(Shape::Json, Shape::Json, registry);
        let (_, issues) = handler.handle(
            &Value::Array(vec![Value::from(1), Value::from("x")]),
            &Pointer::root(),
            true,
            false,
            &config,
        );
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn tuple_implicit_length_eq_arity() {
        let registry = registry_with_int();
        let handler = SequenceHandler::new_tuple(vec![TypeExpr::Int, TypeExpr::Int], Constraints::empty());
        let config = HandleConfig::new(Shape::Json, Shape::Json, registry);
        let (_, issues) = handler.handle(
            &Value::Array(vec![Value::from(1), Value::from(2), Value::from(3)]),
            &Pointer::root(),
            true,
            false,
            &config,
        );
        assert_eq!(issues.len(), 1);
    }
}
