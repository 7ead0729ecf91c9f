//! The handler protocol every canonical-type handler implements.

use std::sync::OnceLock;

use serde_json::Value;

use crate::config::HandleConfig;
use crate::error::ProtocolError;
use crate::issue::Issue;
use crate::pointer::Pointer;

/// The result of one `handle()` call: either a produced value, or `Empty` meaning "this
/// node contributed nothing to the output" (excluded, not included, or the input itself
/// was absent).
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    Empty,
    Value(Value),
}

impl HandlerOutput {
    pub fn is_empty(&self) -> bool {
        matches!(self, HandlerOutput::Empty)
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            HandlerOutput::Value(value) => Some(value),
            HandlerOutput::Empty => None,
        }
    }
}

/// A handler bound to one `(canonical type, constraints, pinned value)` triple.
/// `build()` is called lazily, on first dispatch, and must be idempotent; `handle()`
/// must never panic for a data-shaped problem, only accumulate [`Issue`]s.
pub trait Handler: Send + Sync {
    fn build(&self) -> Result<(), ProtocolError>;

    fn handle(
        &self,
        value: &Value,
        pointer: &Pointer,
        included: bool,
        excluded: bool,
        config: &HandleConfig,
    ) -> (HandlerOutput, Vec<Issue>);
}

/// Helper implementing the "build exactly once, idempotently" pattern every concrete
/// handler uses instead of the original's descriptor-based `prebuild` trick.
pub struct BuildOnce<T> {
    cell: OnceLock<T>,
}

impl<T> Default for BuildOnce<T> {
    fn default() -> Self {
        BuildOnce { cell: OnceLock::new() }
    }
}

impl<T> BuildOnce<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Run `f` only if this is the first call; later callers (even concurrent ones)
    /// observe the first successful result.
    pub fn get_or_try_init<F>(&self, f: F) -> Result<&T, ProtocolError>
    where
        F: FnOnce() -> Result<T, ProtocolError>,
    {
        if let Some(existing) = self.cell.get() {
            return Ok(existing);
        }
        let built = f()?;
        let _ = self.cell.set(built);
        Ok(self.cell.get().expect("just initialized"))
    }
}

/// Helper shared by every handler's entry point: returns `Empty` immediately when the
/// pointer is excluded or not included, without even looking at `value`.
pub fn short_circuit(included: bool, excluded: bool) -> Option<(HandlerOutput, Vec<Issue>)> {
    if excluded || !included {
        Some((HandlerOutput::Empty, Vec::new()))
    } else {
        None
    }
}
