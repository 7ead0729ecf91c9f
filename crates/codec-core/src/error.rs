//! Programmer/protocol errors: the things that raise synchronously instead of
//! accumulating as [`crate::issue::Issue`]s, because they represent a bug in how the
//! codec was configured or a type was declared rather than a problem with input data.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("no type handler registered for {type_name}")]
    HandlerMissing { type_name: String },

    #[error("could not fully resolve type expression for {type_name} (unresolved forward reference or cycle)")]
    UnresolvedType { type_name: String },

    #[error("unsupported encoding {encoding:?} for this value's constraint surface")]
    UnsupportedEncoding { encoding: String },

    #[error("malformed path pattern {pattern:?}: {source}")]
    MalformedPath {
        pattern: String,
        #[source]
        source: crate::path::PathError,
    },

    #[error("discriminator field {name:?} is missing a constant value on union arm {arm}")]
    DiscriminatorFieldMissing { name: String, arm: String },

    #[error("duplicate discriminator value {value:?} on union arms {first} and {second}")]
    DuplicateDiscriminator {
        value: String,
        first: String,
        second: String,
    },

    #[error("dependent group {dependent:?} and disjoint group {disjoint:?} overlap by more than one field")]
    DependentDisjointConflict {
        dependent: Vec<String>,
        disjoint: Vec<String>,
    },

    #[error("at least one of coerce, validate, or convert must be requested")]
    NoOperationRequested,

    #[error("type_hint_value must be provided for a constant-carrier type")]
    MissingPinnedValue,

    #[error("field {field:?} declares a dependent/disjoint constraint; those only make sense at record level")]
    FieldLevelGroupConstraint { field: String },
}
