//! The constraint catalog: a closed set of named constraint kinds attached to a type
//! expression or to a record field, consulted by handlers during `build()`.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

/// Ordering/equality comparator used by both value and length constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Lt => "lt",
            Comparator::Le => "le",
            Comparator::Gt => "gt",
            Comparator::Ge => "ge",
            Comparator::Eq => "eq",
        }
    }
}

/// A named string/byte/number format specialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    DateTime,
    Date,
    Time,
    Duration,
    Ipv4,
    Ipv6,
    Uuid,
    Email,
    Url,
    Regex,
    Path,
    Int32,
    Int64,
}

/// A byte<->text encoding applied to bytes-like or encoded-string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Base16,
    Base32,
    Base32Hex,
    Base64,
}

/// The JSON data-type names used by [`crate::issue::Issue::JsonType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Null => "null",
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Number => "number",
            DataType::String => "string",
            DataType::Array => "array",
            DataType::Object => "object",
        }
    }
}

/// One entry of the constraint catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Value { comparator: Comparator, limit: Value },
    Length { comparator: Comparator, limit: usize },
    Alias(String),
    Title(String),
    Summary(String),
    Description(String),
    Pattern(String),
    Discriminator(String),
    Encoding(Encoding),
    Format(Format),
    Deprecated,
    Example(Value),
    Status(String),
    Default(Value),
    DefaultFactory,
    MediaType(String),
    DataType(DataType),
    Contact(String),
    Server(String),
    Interface(String),
    Disjoint(Arc<[String]>),
    Dependent(Arc<[String]>),
    Required(bool),
}

/// The bucket a constraint occupies in a [`Constraints`] bag. Every kind except
/// `Example` keeps at most one live entry per id; later `Value`/`Length` entries with a
/// *different* comparator coexist (handlers consolidate them at `build()` time), but a
/// second entry with the *same* comparator replaces the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintId {
    Value(Comparator),
    Length(Comparator),
    Alias,
    Title,
    Summary,
    Description,
    Pattern,
    Discriminator,
    Encoding,
    Format,
    Deprecated,
    Example,
    Status,
    Default,
    DefaultFactory,
    MediaType,
    DataType,
    Contact,
    Server,
    Interface,
    Disjoint,
    Dependent,
    Required,
}

impl Constraint {
    pub fn id(&self) -> ConstraintId {
        match self {
            Constraint::Value { comparator, .. } => ConstraintId::Value(*comparator),
            Constraint::Length { comparator, .. } => ConstraintId::Length(*comparator),
            Constraint::Alias(_) => ConstraintId::Alias,
            Constraint::Title(_) => ConstraintId::Title,
            Constraint::Summary(_) => ConstraintId::Summary,
            Constraint::Description(_) => ConstraintId::Description,
            Constraint::Pattern(_) => ConstraintId::Pattern,
            Constraint::Discriminator(_) => ConstraintId::Discriminator,
            Constraint::Encoding(_) => ConstraintId::Encoding,
            Constraint::Format(_) => ConstraintId::Format,
            Constraint::Deprecated => ConstraintId::Deprecated,
            Constraint::Example(_) => ConstraintId::Example,
            Constraint::Status(_) => ConstraintId::Status,
            Constraint::Default(_) => ConstraintId::Default,
            Constraint::DefaultFactory => ConstraintId::DefaultFactory,
            Constraint::MediaType(_) => ConstraintId::MediaType,
            Constraint::DataType(_) => ConstraintId::DataType,
            Constraint::Contact(_) => ConstraintId::Contact,
            Constraint::Server(_) => ConstraintId::Server,
            Constraint::Interface(_) => ConstraintId::Interface,
            Constraint::Disjoint(_) => ConstraintId::Disjoint,
            Constraint::Dependent(_) => ConstraintId::Dependent,
            Constraint::Required(_) => ConstraintId::Required,
        }
    }
}

/// An ordered, deduplicated bag of constraints.
///
/// Assigning `Default` drops any existing `DefaultFactory` and vice versa (the two are
/// mutually exclusive ways of supplying a fallback value).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    entries: Vec<Constraint>,
}

impl Constraints {
    pub fn empty() -> Constraints {
        Constraints::default()
    }

    pub fn new(constraints: impl IntoIterator<Item = Constraint>) -> Constraints {
        let mut bag = Constraints::empty();
        for constraint in constraints {
            bag.insert(constraint);
        }
        bag
    }

    /// Insert a constraint, replacing any existing entry with the same id (and, for
    /// `Default`/`DefaultFactory`, removing the other side of that pair).
    pub fn insert(&mut self, constraint: Constraint) {
        let id = constraint.id();
        if id != ConstraintId::Example {
            self.entries.retain(|existing| existing.id() != id);
        }
        match &constraint {
            Constraint::Default(_) => {
                self.entries
                    .retain(|existing| existing.id() != ConstraintId::DefaultFactory);
            }
            Constraint::DefaultFactory => {
                self.entries
                    .retain(|existing| existing.id() != ConstraintId::Default);
            }
            _ => {}
        }
        self.entries.push(constraint);
    }

    /// Merge `front` ahead of `self`, with entries already present in `self` winning on
    /// id collision (record-level constraints extended in ahead of field-level ones
    /// without overriding a field-level constraint of the same id).
    pub fn extend_front(&mut self, front: &Constraints) {
        let existing_ids: HashSet<ConstraintId> = self.entries.iter().map(Constraint::id).collect();
        let mut merged: Vec<Constraint> = front
            .entries
            .iter()
            .filter(|c| !existing_ids.contains(&c.id()))
            .cloned()
            .collect();
        merged.extend(self.entries.iter().cloned());
        self.entries = merged;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.entries.iter()
    }

    pub fn get(&self, id: ConstraintId) -> Option<&Constraint> {
        self.entries.iter().find(|c| c.id() == id)
    }

    pub fn all(&self, id: ConstraintId) -> Vec<&Constraint> {
        self.entries.iter().filter(|c| c.id() == id).collect()
    }

    pub fn alias(&self) -> Option<&str> {
        match self.get(ConstraintId::Alias) {
            Some(Constraint::Alias(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_deprecated(&self) -> bool {
        self.get(ConstraintId::Deprecated).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_comparator_replaces_prior_entry() {
        let mut bag = Constraints::empty();
        bag.insert(Constraint::Length { comparator: Comparator::Ge, limit: 3 });
        bag.insert(Constraint::Length { comparator: Comparator::Ge, limit: 5 });
        let matches: Vec<_> = bag.all(ConstraintId::Length(Comparator::Ge));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0], &Constraint::Length { comparator: Comparator::Ge, limit: 5 });
    }

    #[test]
    fn distinct_comparators_coexist() {
        let mut bag = Constraints::empty();
        bag.insert(Constraint::Length { comparator: Comparator::Ge, limit: 3 });
        bag.insert(Constraint::Length { comparator: Comparator::Le, limit: 8 });
        assert_eq!(bag.iter().count(), 2);
    }

    #[test]
    fn default_and_default_factory_are_mutually_exclusive() {
        let mut bag = Constraints::empty();
        bag.insert(Constraint::Default(Value::from(1)));
        bag.insert(Constraint::DefaultFactory);
        assert!(bag.get(ConstraintId::Default).is_none());
        assert!(bag.get(ConstraintId::DefaultFactory).is_some());
    }

    #[test]
    fn extend_front_keeps_field_level_entries_on_collision() {
        let mut field = Constraints::empty();
        field.insert(Constraint::Title("field title".into()));
        let mut record_level = Constraints::empty();
        record_level.insert(Constraint::Title("record title".into()));
        record_level.insert(Constraint::Deprecated);
        field.extend_front(&record_level);
        match field.get(ConstraintId::Title) {
            Some(Constraint::Title(t)) => assert_eq!(t, "field title"),
            _ => panic!("expected title"),
        }
        assert!(field.get(ConstraintId::Deprecated).is_some());
    }
}
