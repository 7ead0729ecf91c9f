//! Record handler: the heaviest handler in the engine. Field discovery,
//! aliasing, required/dependent/disjoint rules, and extras policy all live
//! here; discriminated dispatch between record shapes lives one level up, in
//! [`crate::handlers::union`].
//!
//! This handler only ever produces a `Value::Object`, regardless of target
//! shape. For `target = Struct` the object is keyed by declared field name
//! (not alias) so that it deserializes directly into the concrete record type
//! via `serde`; actually materializing that concrete type — calling the
//! generated constructor, attaching extras, writing computed-field caches —
//! is the codec driver's job at the very top of a call, not this handler's,
//! since `Handler` is type-erased and a nested record field has no way to
//! name its own Rust type. See `DESIGN.md` for the reasoning.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::{ExtrasMode, HandleConfig, Shape};
use crate::constraints::{ConstraintId, Constraints, DataType};
use crate::error::ProtocolError;
use crate::handler::{short_circuit, BuildOnce, Handler, HandlerOutput};
use crate::handlers::scalar::json_data_type;
use crate::issue::{Issue, IssueKind};
use crate::patch::{PatchMode, PatchStage};
use crate::pointer::Pointer;
use crate::record::RecordSchema;
use crate::registry::{HandlerFactory, TypeRegistry};
use crate::resolve::LazyHandler;
use crate::types::TypeExpr;

struct FieldBuild {
    name: &'static str,
    alias: String,
    lazy: LazyHandler,
    default: Option<Value>,
}

struct Built {
    fields: Vec<FieldBuild>,
    required_names: Vec<String>,
    required_aliases: Vec<String>,
    dependent_groups_names: Vec<Vec<String>>,
    disjoint_groups_names: Vec<Vec<String>>,
    dependent_groups_aliases: Vec<Vec<String>>,
    disjoint_groups_aliases: Vec<Vec<String>>,
}

pub struct RecordHandler {
    schema: Arc<RecordSchema>,
    built: BuildOnce<Built>,
}

impl RecordHandler {
    pub fn new(schema: Arc<RecordSchema>) -> RecordHandler {
        RecordHandler { schema, built: BuildOnce::new() }
    }

    fn build_inner(&self) -> Result<Built, ProtocolError> {
        self.schema.check_group_conflicts()?;

        let mut fields = Vec::new();
        for field in &self.schema.fields {
            if field.is_computed {
                // Computed fields are `#[serde(skip)]` on the generated type and never
                // appear in the decoded tree; nothing for this handler to validate.
                continue;
            }
            if field.constraints.get(ConstraintId::Dependent).is_some()
                || field.constraints.get(ConstraintId::Disjoint).is_some()
            {
                return Err(ProtocolError::FieldLevelGroupConstraint { field: field.name.to_string() });
            }
            let mut merged = field.constraints.clone();
            merged.extend_front(&self.schema.constraints);
            let lazy = LazyHandler::new_with_pinned(field.type_expr.clone(), merged, field.default.clone());
            fields.push(FieldBuild { name: field.name, alias: field.alias.clone(), lazy, default: field.default.clone() });
        }

        let alias_of = |name: &str| -> String {
            self.schema.field_by_name(name).map(|f| f.alias.clone()).unwrap_or_else(|| name.to_string())
        };
        let dependent_groups_aliases =
            self.schema.dependent_groups.iter().map(|group| group.iter().map(|n| alias_of(n)).collect()).collect();
        let disjoint_groups_aliases =
            self.schema.disjoint_groups.iter().map(|group| group.iter().map(|n| alias_of(n)).collect()).collect();

        Ok(Built {
            fields,
            required_names: self.schema.required_names().into_iter().map(str::to_string).collect(),
            required_aliases: self.schema.required_aliases().into_iter().map(str::to_string).collect(),
            dependent_groups_names: self.schema.dependent_groups.clone(),
            disjoint_groups_names: self.schema.disjoint_groups.clone(),
            dependent_groups_aliases,
            disjoint_groups_aliases,
        })
    }
}

/// Json/Unstruct sources look a key up by alias first, falling back to the declared
/// name; Struct sources do the reverse, since a struct's own keys are always names.
fn find_field<'a>(built: &'a Built, key: &str, source: Shape) -> Option<&'a FieldBuild> {
    if source == Shape::Json {
        built.fields.iter().find(|f| f.alias == key).or_else(|| built.fields.iter().find(|f| f.name == key))
    } else {
        built.fields.iter().find(|f| f.name == key).or_else(|| built.fields.iter().find(|f| f.alias == key))
    }
}

impl Handler for RecordHandler {
    fn build(&self) -> Result<(), ProtocolError> {
        self.built.get_or_try_init(|| self.build_inner())?;
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
        let built = match self.built.get_or_try_init(|| self.build_inner()) {
            Ok(b) => b,
            Err(_) => unreachable!("build() must run before handle()"),
        };

        let object = match value {
            Value::Object(map) => map.clone(),
            Value::Array(items) if config.coerce => match pairs_to_object(items) {
                Some(map) => map,
                None => {
                    return (
                        HandlerOutput::Empty,
                        vec![Issue::new(
                            pointer.clone(),
                            IssueKind::JsonType { expected: DataType::Object, actual: json_data_type(value) },
                        )],
                    );
                }
            },
            other => {
                return (
                    HandlerOutput::Empty,
                    vec![Issue::new(
                        pointer.clone(),
                        IssueKind::JsonType { expected: DataType::Object, actual: json_data_type(other) },
                    )],
                );
            }
        };

        // Struct sources iterate in declared field order; json/unstruct sources keep
        // the decoded map's own insertion order (`serde_json`'s `preserve_order`).
        let ordered_entries: Vec<(String, Value)> = if config.source == Shape::Struct {
            built.fields.iter().filter_map(|f| object.get(f.name).map(|v| (f.name.to_string(), v.clone()))).collect()
        } else {
            object.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let registry = &config.registry;
        let mut out = Map::new();
        let mut extras = Map::new();
        let mut issues = Vec::new();
        let mut seen_names: HashSet<String> = HashSet::new();
        let mut seen_aliases: HashSet<String> = HashSet::new();

        for (raw_key, raw_value) in ordered_entries {
            let child_pointer = pointer.join(raw_key.clone());

            let child_included = config.include.matches(&child_pointer);
            let child_excluded = config.exclude.matches(&child_pointer);
            if child_excluded || !child_included {
                continue;
            }

            let patched_key = config
                .patches
                .apply(PatchStage::Source, PatchMode::Key, &child_pointer, Value::String(raw_key.clone()))
                .as_str()
                .unwrap_or(raw_key.as_str())
                .to_string();
            let patched_value = config.patches.apply(PatchStage::Source, PatchMode::Value, &child_pointer, raw_value);

            let Some(field) = find_field(built, &patched_key, config.source) else {
                match config.extras_mode {
                    ExtrasMode::Drop => {}
                    ExtrasMode::Forbid => {
                        issues.push(Issue::new(child_pointer.clone(), IssueKind::ExtraField { name: patched_key.clone() }))
                    }
                    ExtrasMode::Roundtrip => {
                        extras.insert(patched_key.clone(), patched_value.clone());
                    }
                }
                continue;
            };

            seen_names.insert(field.name.to_string());
            seen_aliases.insert(field.alias.clone());

            if config.exclude_none && patched_value == Value::Null {
                continue;
            }

            if config.exclude_unset {
                if let Some(setted) = &config.setted {
                    if !setted.contains(field.name) {
                        continue;
                    }
                }
            }

            let handler = match field.lazy.get(registry) {
                Ok(h) => h,
                Err(e) => {
                    issues.push(Issue::new(child_pointer.clone(), IssueKind::Deserialize { message: e.to_string() }));
                    continue;
                }
            };

            let (result, mut field_issues) = handler.handle(&patched_value, &child_pointer, true, false, config);
            issues.append(&mut field_issues);

            let Some(final_value) = result.into_value() else { continue };

            if config.exclude_default {
                if let Some(default) = &field.default {
                    if default == &final_value {
                        continue;
                    }
                }
            }

            let final_value = config.patches.apply(PatchStage::Target, PatchMode::Value, &child_pointer, final_value);

            let out_key = match config.target {
                Shape::Json => field.alias.clone(),
                Shape::Unstruct | Shape::Struct => field.name.to_string(),
            };
            out.insert(out_key, final_value);
        }

        if config.validate {
            let use_aliases = config.source == Shape::Json;
            let required = if use_aliases { &built.required_aliases } else { &built.required_names };
            let seen = if use_aliases { &seen_aliases } else { &seen_names };
            for name in required {
                if !seen.contains(name) {
                    issues.push(Issue::new(pointer.clone(), IssueKind::MissingField));
                }
            }

            let dependent_groups = if use_aliases { &built.dependent_groups_aliases } else { &built.dependent_groups_names };
            let disjoint_groups = if use_aliases { &built.disjoint_groups_aliases } else { &built.disjoint_groups_names };

            for group in dependent_groups {
                let given: Vec<String> = group.iter().filter(|n| seen.contains(*n)).cloned().collect();
                if !given.is_empty() && given.len() < group.len() {
                    let missing: Vec<String> = group.iter().filter(|n| !seen.contains(*n)).cloned().collect();
                    issues.push(Issue::new(pointer.clone(), IssueKind::Dependent { group: group.clone(), given, missing }));
                }
            }
            for group in disjoint_groups {
                let given: Vec<String> = group.iter().filter(|n| seen.contains(*n)).cloned().collect();
                if given.len() > 1 {
                    issues.push(Issue::new(pointer.clone(), IssueKind::Disjoint { group: group.clone(), given }));
                }
            }
        }

        if config.extras_mode == ExtrasMode::Roundtrip {
            for (key, value) in extras {
                out.entry(key).or_insert(value);
            }
        }

        if !issues.is_empty() {
            return (HandlerOutput::Empty, issues);
        }
        (HandlerOutput::Value(Value::Object(out)), Vec::new())
    }
}

fn pairs_to_object(items: &[Value]) -> Option<Map<String, Value>> {
    let mut map = Map::new();
    for item in items {
        let Value::Array(pair) = item else { return None };
        if pair.len() != 2 {
            return None;
        }
        let key = pair[0].as_str()?;
        map.insert(key.to_string(), pair[1].clone());
    }
    Some(map)
}

pub struct RecordFactory;

impl HandlerFactory for RecordFactory {
    fn build_handler(
        &self,
        type_expr: &TypeExpr,
        _constraints: &Constraints,
        _pinned: Option<&Value>,
        _registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        let TypeExpr::Record(schema) = type_expr.root() else {
            return Err(ProtocolError::HandlerMissing { type_name: format!("{type_expr:?}") });
        };
        let handler = RecordHandler::new(schema.clone());
        handler.build()?;
        Ok(Arc::new(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::Constraint;
    use crate::handlers::number::{NumberFactory, NumberKind};
    use crate::handlers::string::StringFactory;
    use crate::record::FieldDescriptor;
    use crate::registry::TypeKey;

    fn schema() -> Arc<RecordSchema> {
        let name_field = FieldDescriptor {
            name: "name",
            alias: "name".to_string(),
            type_expr: TypeExpr::String,
            constraints: Constraints::empty(),
            default: None,
            has_default_factory: false,
            is_computed: false,
            is_cached: false,
            kw_only: false,
        };
        let age_field = FieldDescriptor {
            name: "age",
            alias: "age".to_string(),
            type_expr: TypeExpr::Int,
            constraints: Constraints::empty(),
            default: Some(Value::from(0)),
            has_default_factory: false,
            is_computed: false,
            is_cached: false,
            kw_only: false,
        };
        Arc::new(RecordSchema {
            name: "Person",
            fields: vec![name_field, age_field],
            constraints: Constraints::empty(),
            dependent_groups: Vec::new(),
            disjoint_groups: Vec::new(),
            allow_extras: false,
        })
    }

    fn registry() -> Arc<TypeRegistry> {
        Arc::new(
            TypeRegistry::builder()
                .register(TypeKey::String, Arc::new(StringFactory))
                .register(TypeKey::Int, Arc::new(NumberFactory(NumberKind::Int)))
                .build(),
        )
    }

    #[test]
    fn validates_present_fields_and_reports_missing_required() {
        let handler = RecordHandler::new(schema());
        handler.build().unwrap();
        let mut config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        config.validate = true;
        let mut input = Map::new();
        input.insert("age".to_string(), Value::from(5));
        let (_, issues) = handler.handle(&Value::Object(input), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::MissingField);
    }

    #[test]
    fn forbidden_extras_report_issue() {
        let handler = RecordHandler::new(schema());
        handler.build().unwrap();
        let config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        let mut input = Map::new();
        input.insert("name".to_string(), Value::from("Ada"));
        input.insert("mystery".to_string(), Value::from(1));
        let (_, issues) = handler.handle(&Value::Object(input), &Pointer::root(), true, false, &config);
        assert_eq!(issues.len(), 1);
        assert!(matches!(issues[0].kind, IssueKind::ExtraField { .. }));
    }

    #[test]
    fn roundtrip_extras_carry_through() {
        let handler = RecordHandler::new(schema());
        handler.build().unwrap();
        let mut config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        config.extras_mode = ExtrasMode::Roundtrip;
        let mut input = Map::new();
        input.insert("name".to_string(), Value::from("Ada"));
        input.insert("mystery".to_string(), Value::from(1));
        let (out, issues) = handler.handle(&Value::Object(input), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        let out = out.into_value().unwrap();
        assert_eq!(out["mystery"], Value::from(1));
    }

    #[test]
    fn dependent_group_partial_satisfaction_reports_issue() {
        let mut schema = (*schema()).clone();
        schema.dependent_groups = vec![vec!["name".to_string(), "age".to_string()]];
        let handler = RecordHandler::new(Arc::new(schema));
        handler.build().unwrap();
        let mut config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        config.validate = true;
        let mut input = Map::new();
        input.insert("name".to_string(), Value::from("Ada"));
        let (_, issues) = handler.handle(&Value::Object(input), &Pointer::root(), true, false, &config);
        assert!(issues.iter().any(|i| matches!(i.kind, IssueKind::Dependent { .. })));
    }

    #[test]
    fn exclude_default_drops_field_equal_to_default() {
        let handler = RecordHandler::new(schema());
        handler.build().unwrap();
        let mut config = HandleConfig::new(Shape::Json, Shape::Json, registry());
        config.exclude_default = true;
        let mut input = Map::new();
        input.insert("name".to_string(), Value::from("Ada"));
        input.insert("age".to_string(), Value::from(0));
        let (out, issues) = handler.handle(&Value::Object(input), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        let out = out.into_value().unwrap();
        assert!(out.get("age").is_none());
        assert_eq!(out["name"], Value::from("Ada"));
    }

    #[test]
    fn field_level_dependent_constraint_is_rejected() {
        let mut field = FieldDescriptor {
            name: "name",
            alias: "name".to_string(),
            type_expr: TypeExpr::String,
            constraints: Constraints::empty(),
            default: None,
            has_default_factory: false,
            is_computed: false,
            is_cached: false,
            kw_only: false,
        };
        field.constraints.insert(Constraint::Dependent(Arc::from(vec!["name".to_string()])));
        let schema = Arc::new(RecordSchema {
            name: "Bad",
            fields: vec![field],
            constraints: Constraints::empty(),
            dependent_groups: Vec::new(),
            disjoint_groups: Vec::new(),
            allow_extras: false,
        });
        let handler = RecordHandler::new(schema);
        assert!(handler.build().is_err());
    }
}
