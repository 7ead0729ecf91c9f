//! The record-type runtime: the schema a `#[derive(Record)]` type exposes, and the
//! trait the record handler (`handlers::record`) drives construction/inspection
//! through.

use std::collections::{HashMap, HashSet};

use crate::constraints::Constraints;
use crate::error::ProtocolError;
use crate::types::TypeExpr;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub alias: String,
    pub type_expr: TypeExpr,
    pub constraints: Constraints,
    pub default: Option<serde_json::Value>,
    pub has_default_factory: bool,
    pub is_computed: bool,
    pub is_cached: bool,
    pub kw_only: bool,
}

impl FieldDescriptor {
    pub fn has_fallback(&self) -> bool {
        self.default.is_some() || self.has_default_factory
    }

    /// A field counts as required unless it has a fallback value, is computed, or was
    /// explicitly forced required via the `Required` constraint.
    pub fn is_required(&self) -> bool {
        if self.is_computed {
            return false;
        }
        if let Some(crate::constraints::Constraint::Required(required)) =
            self.constraints.get(crate::constraints::ConstraintId::Required)
        {
            return *required;
        }
        !self.has_fallback()
    }
}

/// The compiled schema for one record type, computed once and cached behind a
/// `OnceLock` by the generated `Record::record_schema()` implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: &'static str,
    pub fields: Vec<FieldDescriptor>,
    pub constraints: Constraints,
    /// Dependent groups, already transitively merged (see [`merge_dependent_groups`]).
    pub dependent_groups: Vec<Vec<String>>,
    pub disjoint_groups: Vec<Vec<String>>,
    pub allow_extras: bool,
}

impl RecordSchema {
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_alias(&self, alias: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.alias == alias)
    }

    pub fn required_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| f.name)
            .collect()
    }

    pub fn required_aliases(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| f.alias.as_str())
            .collect()
    }

    /// Validate that no dependent group and disjoint group overlap by more than one
    /// field; called once at schema-build time.
    pub fn check_group_conflicts(&self) -> Result<(), ProtocolError> {
        for dependent in &self.dependent_groups {
            let dependent_set: HashSet<&str> = dependent.iter().map(String::as_str).collect();
            for disjoint in &self.disjoint_groups {
                let overlap = disjoint
                    .iter()
                    .filter(|name| dependent_set.contains(name.as_str()))
                    .count();
                if overlap > 1 {
                    return Err(ProtocolError::DependentDisjointConflict {
                        dependent: dependent.clone(),
                        disjoint: disjoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Transitively merge overlapping field-name groups: `{a,b}` and `{b,c}` become
/// `{a,b,c}`.
pub fn merge_dependent_groups(groups: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut merged: Vec<HashSet<String>> = Vec::new();
    for group in groups {
        let group_set: HashSet<String> = group.iter().cloned().collect();
        let mut combined = group_set;
        let mut i = 0;
        while i < merged.len() {
            if !merged[i].is_disjoint(&combined) {
                combined.extend(merged.remove(i));
            } else {
                i += 1;
            }
        }
        merged.push(combined);
    }
    merged
        .into_iter()
        .map(|set| {
            let mut v: Vec<String> = set.into_iter().collect();
            v.sort();
            v
        })
        .collect()
}

/// Implemented by every `#[derive(Record)]` type. The record handler drives
/// construction/inspection entirely through this trait, never through direct field
/// access, so it works uniformly across user record types.
///
/// Only [`Record::record_schema`] must be generated per type; the rest have default
/// implementations riding on `Serialize`/`DeserializeOwned` (which `#[derive(Record)]`
/// also derives via `serde`), so the macro's own generated surface stays small. A type
/// that wants a roundtrip-extras bag declares a `#[serde(flatten)] extras: HashMap<String,
/// Value>` field and overrides [`Record::extras`]/[`Record::record_schema`] accordingly;
/// the derive macro detects that convention (see `codec-derive`).
pub trait Record: Sized + serde::Serialize + serde::de::DeserializeOwned {
    fn record_schema() -> std::sync::Arc<RecordSchema>;

    /// Extra, undeclared fields carried through under `extras_mode = roundtrip`.
    fn extras(&self) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }

    /// The set of field names considered "set" on this instance. A `json`/`unstruct`
    /// source already omits unset fields from its decoded map, so `exclude_unset` has
    /// nothing further to do there; it's a `struct` source, whose serialized form always
    /// carries every declared field (populated from defaults where absent), where the
    /// record handler consults this method (via `HandleConfig::setted`) to tell "present
    /// because set" apart from "present because defaulted". A type that wants precise
    /// tracking overrides this to return only the fields it was actually constructed or
    /// assigned with; the default reports every declared field as set, which makes
    /// `exclude_unset` a no-op for that type.
    fn setted_names(&self) -> HashSet<String> {
        Self::record_schema()
            .fields
            .iter()
            .map(|f| f.name.to_string())
            .collect()
    }

    /// Read one field's current value, rendered as JSON, by declared name.
    fn field_as_json(&self, name: &str) -> Option<serde_json::Value> {
        let value = serde_json::to_value(self).ok()?;
        let object = value.as_object()?;
        if let Some(found) = object.get(name) {
            return Some(found.clone());
        }
        let schema = Self::record_schema();
        let alias = &schema.field_by_name(name)?.alias;
        object.get(alias).cloned()
    }

    /// Construct an instance from a name-keyed field map and an extras map. The caller
    /// (the record handler) has already checked required fields and must not call this
    /// when any are missing; this is a second, defensive check returning the missing
    /// names instead of constructing.
    fn from_field_map(
        fields: HashMap<String, serde_json::Value>,
        extras: HashMap<String, serde_json::Value>,
    ) -> Result<Self, Vec<String>> {
        let schema = Self::record_schema();
        let missing: Vec<String> = schema
            .required_names()
            .into_iter()
            .filter(|name| !fields.contains_key(*name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(missing);
        }
        let mut object = serde_json::Map::new();
        for (key, value) in fields {
            object.insert(key, value);
        }
        for (key, value) in extras {
            object.entry(key).or_insert(value);
        }
        serde_json::from_value(serde_json::Value::Object(object)).map_err(|_| Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_overlapping_groups_transitively() {
        let groups = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["b".to_string(), "c".to_string()],
            vec!["z".to_string()],
        ];
        let mut merged = merge_dependent_groups(&groups);
        merged.sort();
        assert_eq!(
            merged,
            vec![
                vec!["a".to_string(), "b".to_string(), "c".to_string()],
                vec!["z".to_string()],
            ]
        );
    }
}
