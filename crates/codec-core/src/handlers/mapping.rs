//! Mapping handler: generic over a key type and a value type. Every pair is
//! independently patched, recursed into, and filtered.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::HandleConfig;
use crate::constraints::{Constraints, DataType};
use crate::error::ProtocolError;
use crate::handler::{short_circuit, Handler, HandlerOutput};
use crate::handlers::scalar::json_data_type;
use crate::issue::{Issue, IssueKind};
use crate::patch::{PatchMode, PatchStage};
use crate::pointer::Pointer;
use crate::registry::{HandlerFactory, TypeRegistry};
use crate::resolve::LazyHandler;
use crate::types::TypeExpr;

pub struct MappingHandler {
    key: LazyHandler,
    value: LazyHandler,
}

impl MappingHandler {
    pub fn new(key: TypeExpr, value: TypeExpr) -> MappingHandler {
        MappingHandler {
            key: LazyHandler::new(key, Constraints::empty()),
            value: LazyHandler::new(value, Constraints::empty()),
        }
    }
}

impl Handler for MappingHandler {
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
        let Value::Object(entries) = value else {
            return (
                HandlerOutput::Empty,
                vec![Issue::new(
                    pointer.clone(),
                    IssueKind::JsonType { expected: DataType::Object, actual: json_data_type(value) },
                )],
            );
        };

        let registry = &config.registry;
        let key_handler = match self.key.get(registry) {
            Ok(h) => h,
            Err(e) => return (HandlerOutput::Empty, protocol_issue(pointer, e)),
        };
        let value_handler = match self.value.get(registry) {
            Ok(h) => h,
            Err(e) => return (HandlerOutput::Empty, protocol_issue(pointer, e)),
        };

        let mut out = Map::new();
        let mut issues = Vec::new();
        for (key, entry) in entries {
            let child_pointer = pointer.join(key.clone());

            let child_included = config.include.matches(&child_pointer);
            let child_excluded = config.exclude.matches(&child_pointer);
            if child_excluded || !child_included {
                continue;
            }

            let source_key =
                config.patches.apply(PatchStage::Source, PatchMode::Key, &child_pointer, Value::String(key.clone()));
            let source_value = config.patches.apply(PatchStage::Source, PatchMode::Value, &child_pointer, entry.clone());

            let (key_result, mut key_issues) =
                key_handler.handle(&source_key, &child_pointer, true, false, config);
            issues.append(&mut key_issues);

            let (value_result, mut value_issues) =
                value_handler.handle(&source_value, &child_pointer, true, false, config);
            issues.append(&mut value_issues);

            if config.exclude_none && value_result == HandlerOutput::Value(Value::Null) {
                continue;
            }

            if let (HandlerOutput::Value(final_key), HandlerOutput::Value(final_value)) = (key_result, value_result) {
                let target_key = config
                    .patches
                    .apply(PatchStage::Target, PatchMode::Key, &child_pointer, final_key)
                    .as_str()
                    .unwrap_or(key.as_str())
                    .to_string();
                let target_value =
                    config.patches.apply(PatchStage::Target, PatchMode::Value, &child_pointer, final_value);
                out.insert(target_key, target_value);
            }
        }

        if !issues.is_empty() {
            return (HandlerOutput::Empty, issues);
        }
        (HandlerOutput::Value(Value::Object(out)), Vec::new())
    }
}

fn protocol_issue(pointer: &Pointer, error: ProtocolError) -> Vec<Issue> {
    vec![Issue::new(pointer.clone(), IssueKind::Deserialize { message: error.to_string() })]
}

pub struct MapFactory;

impl HandlerFactory for MapFactory {
    fn build_handler(
        &self,
        type_expr: &TypeExpr,
        _constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        let TypeExpr::Map(key, value) = type_expr.root() else {
            return Err(ProtocolError::HandlerMissing { type_name: format!("{type_expr:?}") });
        };
        Ok(Arc::new(MappingHandler::new((**key).clone(), (**value).clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Shape;
    use crate::handlers::number::{NumberFactory, NumberKind};
    use crate::handlers::string::StringFactory;
    use crate::registry::TypeKey;

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(
            TypeRegistry::builder()
                .register(TypeKey::String, Arc::new(StringFactory))
                .register(TypeKey::Int, Arc::new(NumberFactory(NumberKind::Int)))
                .build(),
        )
    }

    #[test]
    fn validates_keys_and_values() {
        let handler = MappingHandler::new(TypeExpr::String, TypeExpr::Int);
        let config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        let mut map = Map::new();
        map.insert("a".to_string(), Value::from(1));
        map.insert("b".to_string(), Value::from(2));
        let (out, issues) = handler.handle(&Value::Object(map), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        let Some(out) = out.into_value() else { panic!("expected value") };
        assert_eq!(out["a"], Value::from(1));
    }

    #[test]
    fn rejects_non_object() {
        let handler = MappingHandler::new(TypeExpr::String, TypeExpr::Int);
        let config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        let (_, issues) = handler.handle(&Value::from(1), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
    }
}
