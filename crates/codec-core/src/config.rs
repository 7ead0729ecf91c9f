//! The per-call configuration threaded through every handler invocation.

use std::collections::HashSet;
use std::sync::Arc;

use crate::patch::Patches;
use crate::path::Path;
use crate::registry::TypeRegistry;

/// Which logical shape a value is in (or should end up in).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A typed instance of a `#[derive(Record)]` type (or a primitive Rust value).
    Struct,
    /// An untyped `serde_json::Value` tree produced without a declared schema.
    Unstruct,
    /// An untyped `serde_json::Value` tree that is specifically the wire JSON form
    /// (distinguished from `Unstruct` because some handlers behave more strictly, e.g.
    /// numbers must already be the exact JSON numeric type rather than a coercible
    /// near-match).
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtrasMode {
    Forbid,
    Drop,
    Roundtrip,
}

/// Configuration for one `handle()` call tree. Cheap to clone (`Path`/`Patches`/
/// `registry` are all reference-counted internally).
#[derive(Clone)]
pub struct HandleConfig {
    pub source: Shape,
    pub target: Shape,
    pub coerce: bool,
    pub validate: bool,
    pub convert: bool,
    pub include: Path,
    pub exclude: Path,
    pub exclude_none: bool,
    pub exclude_unset: bool,
    pub exclude_default: bool,
    pub extras_mode: ExtrasMode,
    pub patches: Patches,
    /// Field names the `struct`-shaped root value actually had set, per
    /// [`crate::record::Record::setted_names`]. Only meaningful when `source ==
    /// Shape::Struct`; a `json`/`unstruct` source already omits unset fields from its
    /// decoded map, so there's nothing for the record handler to consult there. `None`
    /// means "not a struct source" — `exclude_unset` is then a no-op.
    pub setted: Option<HashSet<String>>,
    /// The registry nested handlers (sequence items, mapping keys/values, union
    /// arms, record fields) resolve their [`crate::resolve::LazyHandler`]s
    /// against. Threaded through `HandleConfig`, rather than captured at
    /// handler-build time, so the same built handler tree can be reused from a
    /// registry that later gained more registrations (the registry's own
    /// cache-invalidation guarantee from the design doc).
    pub registry: Arc<TypeRegistry>,
}

impl HandleConfig {
    pub fn new(source: Shape, target: Shape, registry: Arc<TypeRegistry>) -> HandleConfig {
        HandleConfig {
            source,
            target,
            coerce: false,
            validate: false,
            convert: false,
            include: Path::everything(),
            exclude: Path::nothing(),
            exclude_none: false,
            exclude_unset: false,
            exclude_default: false,
            extras_mode: ExtrasMode::Forbid,
            patches: Patches::empty(),
            setted: None,
            registry,
        }
    }
}

#[cfg(test)]
impl HandleConfig {
    /// An empty-registry config for handler unit tests that never need to
    /// resolve a nested handler (scalars, strings, bytes, numbers).
    pub fn for_test(source: Shape, target: Shape) -> HandleConfig {
        HandleConfig::new(source, target, std::sync::Arc::new(TypeRegistry::builder().build()))
    }
}

impl std::fmt::Debug for HandleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleConfig")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("coerce", &self.coerce)
            .field("validate", &self.validate)
            .field("convert", &self.convert)
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("exclude_none", &self.exclude_none)
            .field("exclude_unset", &self.exclude_unset)
            .field("exclude_default", &self.exclude_default)
            .field("extras_mode", &self.extras_mode)
            .field("setted", &self.setted)
            .finish_non_exhaustive()
    }
}
