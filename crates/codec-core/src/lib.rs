//! The type-handler engine: resolver, registry, constraint catalog, handler
//! hierarchy, and record runtime described by the workspace's design document.
//!
//! This crate has no opinion about where bytes/text come from (that's
//! `codec-json`) or how a user type becomes a [`types::TypeExpr`] (that's the
//! `#[derive(Record)]` macro in `codec-derive`). It only knows how to walk a
//! `serde_json::Value` tree against a resolved schema.

pub mod config;
pub mod constraints;
pub mod default_registry;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod issue;
pub mod patch;
pub mod path;
pub mod pointer;
pub mod record;
pub mod registry;
pub mod resolve;
pub mod types;

pub use config::{ExtrasMode, HandleConfig, Shape};
pub use constraints::{Comparator, Constraint, ConstraintId, Constraints, DataType, Encoding, Format};
pub use default_registry::default_registry;
pub use error::ProtocolError;
pub use handler::{Handler, HandlerOutput};
pub use issue::{Issue, IssueKind, ValidationError};
pub use patch::{PatchMode, PatchStage, Patches};
pub use path::{Path, PathError};
pub use pointer::{Atom, Pointer};
pub use record::{FieldDescriptor, Record, RecordSchema};
pub use registry::{HandlerFactory, TypeKey, TypeRegistry};
pub use resolve::LazyHandler;
pub use types::{HasTypeExpr, TypeExpr};
