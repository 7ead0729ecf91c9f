//! Union dispatch.
//!
//! The design doc lists three strategies (discriminated, optional-fast-path,
//! left-to-right). The optional-fast-path strategy is folded into the
//! dedicated [`TypeExpr::Opt`] canonical type instead of living here: compile-
//! time resolution (see `crate::types`) already produces `Opt(T)` for every
//! `Option<T>` field, so a bare `Union` in this rendition only ever has two or
//! more non-null arms and needs only the remaining two strategies.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::{HandleConfig, Shape};
use crate::constraints::{Constraint, ConstraintId, Constraints};
use crate::error::ProtocolError;
use crate::handler::{short_circuit, BuildOnce, Handler, HandlerOutput};
use crate::issue::{Issue, IssueKind};
use crate::pointer::Pointer;
use crate::registry::{HandlerFactory, TypeRegistry};
use crate::resolve::LazyHandler;
use crate::types::TypeExpr;

/// `Option<T>`: null passes straight through, everything else delegates to
/// the single non-null arm's handler.
pub struct OptHandler {
    inner: LazyHandler,
}

impl OptHandler {
    pub fn new(inner: TypeExpr) -> OptHandler {
        OptHandler { inner: LazyHandler::new(inner, Constraints::empty()) }
    }
}

impl Handler for OptHandler {
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
        if value.is_null() {
            return (HandlerOutput::Value(Value::Null), Vec::new());
        }
        let inner = match self.inner.get(&config.registry) {
            Ok(h) => h,
            Err(e) => {
                return (
                    HandlerOutput::Empty,
                    vec![Issue::new(pointer.clone(), IssueKind::Deserialize { message: e.to_string() })],
                );
            }
        };
        inner.handle(value, pointer, true, false, config)
    }
}

pub struct OptFactory;

impl HandlerFactory for OptFactory {
    fn build_handler(
        &self,
        type_expr: &TypeExpr,
        _constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        let TypeExpr::Opt(inner) = type_expr.root() else {
            return Err(ProtocolError::HandlerMissing { type_name: format!("{type_expr:?}") });
        };
        Ok(Arc::new(OptHandler::new((**inner).clone())))
    }
}

struct DiscriminatedArm {
    constant_json_text: String,
    handler: LazyHandler,
    field_name: String,
    field_alias: String,
}

enum Strategy {
    Discriminated { field_name: String, arms: Vec<DiscriminatedArm> },
    LeftToRight(Vec<LazyHandler>),
}

pub struct UnionHandler {
    arms: Vec<TypeExpr>,
    discriminator: Option<String>,
    strategy: BuildOnce<Strategy>,
}

impl UnionHandler {
    pub fn new(arms: Vec<TypeExpr>, constraints: Constraints) -> UnionHandler {
        let discriminator = match constraints.get(ConstraintId::Discriminator) {
            Some(Constraint::Discriminator(name)) => Some(name.clone()),
            _ => None,
        };
        UnionHandler { arms, discriminator, strategy: BuildOnce::new() }
    }

    fn build_inner(&self) -> Result<Strategy, ProtocolError> {
        let Some(field_name) = &self.discriminator else {
            return Ok(Strategy::LeftToRight(
                self.arms.iter().map(|a| LazyHandler::new(a.clone(), Constraints::empty())).collect(),
            ));
        };
        let mut arms = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();
        for arm in &self.arms {
            let TypeExpr::Record(schema) = arm.root() else {
                return Err(ProtocolError::DiscriminatorFieldMissing {
                    name: field_name.clone(),
                    arm: format!("{arm:?}"),
                });
            };
            let field = schema.field_by_name(field_name).ok_or_else(|| ProtocolError::DiscriminatorFieldMissing {
                name: field_name.clone(),
                arm: schema.name.to_string(),
            })?;
            let constant = field.default.clone().ok_or_else(|| ProtocolError::DiscriminatorFieldMissing {
                name: field_name.clone(),
                arm: schema.name.to_string(),
            })?;
            let constant_json_text = constant.to_string();
            if let Some(first) = seen.insert(constant_json_text.clone(), schema.name.to_string()) {
                return Err(ProtocolError::DuplicateDiscriminator {
                    value: constant_json_text,
                    first,
                    second: schema.name.to_string(),
                });
            }
            arms.push(DiscriminatedArm {
                constant_json_text,
                handler: LazyHandler::new(arm.clone(), Constraints::empty()),
                field_name: field_name.clone(),
                field_alias: field.alias.clone(),
            });
        }
        Ok(Strategy::Discriminated { field_name: field_name.clone(), arms })
    }
}

impl Handler for UnionHandler {
    fn build(&self) -> Result<(), ProtocolError> {
        self.strategy.get_or_try_init(|| self.build_inner())?;
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
        let strategy = match self.strategy.get_or_try_init(|| self.build_inner()) {
            Ok(s) => s,
            Err(_) => unreachable!("build() must run before handle()"),
        };
        match strategy {
            Strategy::Discriminated { field_name, arms } => {
                let Some(object) = value.as_object() else {
                    return (
                        HandlerOutput::Empty,
                        vec![Issue::new(pointer.clone(), IssueKind::MissingDiscriminator { name: field_name.clone() })],
                    );
                };
                let lookup_by_alias = config.source == Shape::Json;
                let discriminator_value = arms
                    .first()
                    .and_then(|arm| {
                        let key = if lookup_by_alias { &arm.field_alias } else { &arm.field_name };
                        object.get(key)
                    })
                    .or_else(|| object.get(field_name));
                let Some(discriminator_value) = discriminator_value else {
                    return (
                        HandlerOutput::Empty,
                        vec![Issue::new(pointer.clone(), IssueKind::MissingDiscriminator { name: field_name.clone() })],
                    );
                };
                let discriminator_text = discriminator_value.to_string();
                let Some(arm) = arms.iter().find(|a| a.constant_json_text == discriminator_text) else {
                    return (
                        HandlerOutput::Empty,
                        vec![Issue::new(pointer.clone(), IssueKind::InvalidDiscriminator { name: field_name.clone() })],
                    );
                };
                let handler = match arm.handler.get(&config.registry) {
                    Ok(h) => h,
                    Err(e) => {
                        return (
                            HandlerOutput::Empty,
                            vec![Issue::new(pointer.clone(), IssueKind::Deserialize { message: e.to_string() })],
                        );
                    }
                };
                handler.handle(value, pointer, true, false, config)
            }
            Strategy::LeftToRight(arms) => {
                for lazy in arms {
                    let handler = match lazy.get(&config.registry) {
                        Ok(h) => h,
                        Err(_) => continue,
                    };
                    let (result, issues) = handler.handle(value, pointer, true, false, config);
                    if issues.is_empty() {
                        return (result, issues);
                    }
                }
                (
                    HandlerOutput::Empty,
                    vec![Issue::new(
                        pointer.clone(),
                        IssueKind::JsonType {
                            expected: crate::constraints::DataType::Object,
                            actual: crate::handlers::scalar::json_data_type(value),
                        },
                    )],
                )
            }
        }
    }
}

pub struct UnionFactory;

impl HandlerFactory for UnionFactory {
    fn build_handler(
        &self,
        type_expr: &TypeExpr,
        constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        let TypeExpr::Union(arms) = type_expr.root() else {
            return Err(ProtocolError::HandlerMissing { type_name: format!("{type_expr:?}") });
        };
        let handler = UnionHandler::new(arms.clone(), constraints.clone());
        handler.build()?;
        Ok(Arc::new(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn opt_passes_null_through() {
        let handler = OptHandler::new(TypeExpr::Int);
        let config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        let (out, issues) = handler.handle(&Value::Null, &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        assert_eq!(out, HandlerOutput::Value(Value::Null));
    }

    #[test]
    fn opt_coerces_digit_string_via_inner_handler() {
        let handler = OptHandler::new(TypeExpr::Int);
        let mut config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        config.coerce = true;
        let (out, issues) = handler.handle(&Value::from("7"), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        assert_eq!(out, HandlerOutput::Value(Value::from(7)));
    }

    #[test]
    fn left_to_right_tries_arms_in_order() {
        let handler = UnionHandler::new(vec![TypeExpr::Int, TypeExpr::String], Constraints::empty());
        handler.build().unwrap();
        let config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        let (out, issues) = handler.handle(&Value::from("hi"), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        assert_eq!(out, HandlerOutput::Value(Value::from("hi")));
    }
}
