//! Handlers for the two handler-free scalars: booleans and null.

use std::sync::Arc;

use serde_json::Value;

use crate::config::HandleConfig;
use crate::constraints::{Constraints, DataType};
use crate::error::ProtocolError;
use crate::handler::{short_circuit, Handler, HandlerOutput};
use crate::issue::{Issue, IssueKind};
use crate::pointer::Pointer;
use crate::registry::{HandlerFactory, TypeRegistry};
use crate::types::TypeExpr;

pub struct BoolHandler;

impl Handler for BoolHandler {
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
        match value {
            Value::Bool(_) => (HandlerOutput::Value(value.clone()), Vec::new()),
            other => (
                HandlerOutput::Empty,
                vec![Issue::new(
                    pointer.clone(),
                    IssueKind::JsonType {
                        expected: DataType::Boolean,
                        actual: json_data_type(other),
                    },
                )],
            ),
        }
    }
}

pub struct NullHandler;

impl Handler for NullHandler {
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
        match value {
            Value::Null => (HandlerOutput::Value(Value::Null), Vec::new()),
            other => (
                HandlerOutput::Empty,
                vec![Issue::new(
                    pointer.clone(),
                    IssueKind::JsonType {
                        expected: DataType::Null,
                        actual: json_data_type(other),
                    },
                )],
            ),
        }
    }
}

pub fn json_data_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Bool(_) => DataType::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => DataType::Integer,
        Value::Number(_) => DataType::Number,
        Value::String(_) => DataType::String,
        Value::Array(_) => DataType::Array,
        Value::Object(_) => DataType::Object,
    }
}

pub struct BoolFactory;

impl HandlerFactory for BoolFactory {
    fn build_handler(
        &self,
        _type_expr: &TypeExpr,
        _constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        Ok(Arc::new(BoolHandler))
    }
}

pub struct NullFactory;

impl HandlerFactory for NullFactory {
    fn build_handler(
        &self,
        _type_expr: &TypeExpr,
        _constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        Ok(Arc::new(NullHandler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Shape;

    #[test]
    fn bool_accepts_booleans_only() {
        let handler = BoolHandler;
        let config = HandleConfig::for_test(Shape::Json, Shape::Json);
        let (out, issues) = handler.handle(&Value::Bool(true), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        assert_eq!(out, HandlerOutput::Value(Value::Bool(true)));

        let (_, issues) = handler.handle(&Value::from(1), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
    }
}
