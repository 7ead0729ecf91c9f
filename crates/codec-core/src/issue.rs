//! The closed set of data-shaped problems a handler can report, and the composite error
//! the codec driver raises when a call produces at least one of them.

use std::fmt;

use crate::constraints::{Comparator, DataType, Encoding, Format};
use crate::pointer::Pointer;

/// One reported problem, always anchored at a [`Pointer`]. Handlers only ever
/// *accumulate* issues; they never raise/panic for a data-shaped problem — only for a
/// genuine protocol error (see [`crate::error::ProtocolError`]).
#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    Serialize { message: String },
    Deserialize { message: String },
    JsonType { expected: DataType, actual: DataType },
    StructType { expected: String, actual: String },
    Format { format: Format },
    Decoding { encoding: Encoding },
    Encoding { encoding: Encoding },
    Pattern { pattern: String, value: String },
    Length { comparator: Comparator, limit: usize, actual: usize },
    Number { comparator: Comparator, limit: String },
    ExtraField { name: String },
    MissingField,
    Dependent { group: Vec<String>, given: Vec<String>, missing: Vec<String> },
    Disjoint { group: Vec<String>, given: Vec<String> },
    MissingDiscriminator { name: String },
    InvalidDiscriminator { name: String },
    EnumOption { options: Vec<String> },
    Constant { expected: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub pointer: Pointer,
    pub kind: IssueKind,
}

impl Issue {
    pub fn new(pointer: Pointer, kind: IssueKind) -> Issue {
        Issue { pointer, kind }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.pointer.path();
        match &self.kind {
            IssueKind::Serialize { message } => write!(f, "{at}: could not serialize: {message}"),
            IssueKind::Deserialize { message } => {
                write!(f, "{at}: could not deserialize: {message}")
            }
            IssueKind::JsonType { expected, actual } => write!(
                f,
                "{at}: expected json type {}, got {}",
                expected.as_str(),
                actual.as_str()
            ),
            IssueKind::StructType { expected, actual } => {
                write!(f, "{at}: expected type {expected}, got {actual}")
            }
            IssueKind::Format { format } => write!(f, "{at}: does not match format {format:?}"),
            IssueKind::Decoding { encoding } => {
                write!(f, "{at}: could not decode as {encoding:?}")
            }
            IssueKind::Encoding { encoding } => {
                write!(f, "{at}: could not encode as {encoding:?}")
            }
            IssueKind::Pattern { pattern, value } => {
                write!(f, "{at}: {value:?} does not match pattern {pattern:?}")
            }
            IssueKind::Length { comparator, limit, actual } => write!(
                f,
                "{at}: length {actual} fails {comparator:?} {limit}"
            ),
            IssueKind::Number { comparator, limit } => {
                write!(f, "{at}: value fails {comparator:?} {limit}")
            }
            IssueKind::ExtraField { name } => write!(f, "{at}: unexpected field {name:?}"),
            IssueKind::MissingField => write!(f, "{at}: missing required field"),
            IssueKind::Dependent { group, given, missing } => write!(
                f,
                "{at}: dependent group {group:?} partially set (given {given:?}, missing {missing:?})"
            ),
            IssueKind::Disjoint { group, given } => {
                write!(f, "{at}: disjoint group {group:?} has more than one field set: {given:?}")
            }
            IssueKind::MissingDiscriminator { name } => {
                write!(f, "{at}: missing discriminator field {name:?}")
            }
            IssueKind::InvalidDiscriminator { name } => {
                write!(f, "{at}: unrecognized value for discriminator field {name:?}")
            }
            IssueKind::EnumOption { options } => {
                write!(f, "{at}: value is not one of {options:?}")
            }
            IssueKind::Constant { expected } => {
                write!(f, "{at}: value does not equal the required constant {expected:?}")
            }
        }
    }
}

/// Raised by the codec driver when a call accumulates one or more issues.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("validation failed with {} issue(s): {}", issues.len(), render(issues))]
pub struct ValidationError {
    pub issues: Vec<Issue>,
}

impl ValidationError {
    pub fn new(issues: Vec<Issue>) -> ValidationError {
        ValidationError { issues }
    }

    pub fn from_issues(issues: Vec<Issue>) -> Result<(), ValidationError> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(issues))
        }
    }
}

fn render(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_issue_list_is_ok() {
        assert!(ValidationError::from_issues(Vec::new()).is_ok());
    }

    #[test]
    fn non_empty_issue_list_is_err() {
        let issue = Issue::new(Pointer::root(), IssueKind::MissingField);
        let err = ValidationError::from_issues(vec![issue]).unwrap_err();
        assert_eq!(err.issues.len(), 1);
    }
}
