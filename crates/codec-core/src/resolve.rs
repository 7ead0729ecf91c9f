//! Type resolution.
//!
//! In the original, resolving a type hint to its canonical form is a run-time
//! operation: forward references are `eval`'d against the owner's module globals,
//! `Annotated`/alias/`NewType` wrappers are unwrapped, and unions are rebuilt arm by
//! arm, all memoized behind a cache keyed by the raw input. Here that whole step
//! happens at *compile* time instead, through [`crate::types::HasTypeExpr`] (implemented
//! by hand for built-ins, generated by `#[derive(Record)]` for user types) — by the time
//! a [`crate::types::TypeExpr`] value exists, it is already fully canonical. There is no
//! runtime resolver to memoize.
//!
//! What survives from the original's resolver is the cycle problem: a self-referential
//! record (a tree node holding `Vec<Node>`) must not make building its handler recurse
//! forever. The original breaks this by marking an in-progress resolution `is_partial`
//! and lazily completing it. This implementation breaks it the same way the rest of the
//! engine already treats nested handlers — lazily: a record/sequence/mapping/union
//! handler resolves each nested field's handler on first *dispatch*, not at `build()`
//! time, via [`LazyHandler`]. Since [§ Non-goals] rule out cyclic *data*, a finite input
//! only ever triggers finitely many lazy builds even against an infinitely-recursive
//! schema.

use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::constraints::Constraints;
use crate::error::ProtocolError;
use crate::handler::Handler;
use crate::registry::TypeRegistry;
use crate::types::TypeExpr;

/// A handle to a nested handler that is resolved from the registry on first use and
/// cached thereafter. Used by every handler with one or more nested type parameters
/// (sequence item, mapping key/value, union arm, record field).
pub struct LazyHandler {
    type_expr: TypeExpr,
    constraints: Constraints,
    pinned: Option<Value>,
    cell: OnceLock<Arc<dyn Handler>>,
}

impl LazyHandler {
    pub fn new(type_expr: TypeExpr, constraints: Constraints) -> LazyHandler {
        LazyHandler::new_with_pinned(type_expr, constraints, None)
    }

    /// Like [`LazyHandler::new`], but also carries the pinned value a record field
    /// needs when its type is a constant-carrier (the registry requires one to
    /// build that handler at all).
    pub fn new_with_pinned(type_expr: TypeExpr, constraints: Constraints, pinned: Option<Value>) -> LazyHandler {
        LazyHandler {
            type_expr,
            constraints,
            pinned,
            cell: OnceLock::new(),
        }
    }

    pub fn type_expr(&self) -> &TypeExpr {
        &self.type_expr
    }

    pub fn get(&self, registry: &TypeRegistry) -> Result<Arc<dyn Handler>, ProtocolError> {
        if let Some(handler) = self.cell.get() {
            return Ok(handler.clone());
        }
        let handler = registry.get_handler(&self.type_expr, &self.constraints, self.pinned.as_ref())?;
        let _ = self.cell.set(handler.clone());
        Ok(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{HandlerFactory, TypeKey};
    use crate::handler::{Handler, HandlerOutput};
    use crate::config::HandleConfig;
    use crate::issue::Issue;
    use crate::pointer::Pointer;
    use serde_json::Value;

    struct EchoHandler;
    impl Handler for EchoHandler {
        fn build(&self) -> Result<(), ProtocolError> {
            Ok(())
        }
        fn handle(
            &self,
            value: &Value,
            _pointer: &Pointer,
            _included: bool,
            _excluded: bool,
            _config: &HandleConfig,
        ) -> (HandlerOutput, Vec<Issue>) {
            (HandlerOutput::Value(value.clone()), Vec::new())
        }
    }

    struct EchoFactory;
    impl HandlerFactory for EchoFactory {
        fn build_handler(
            &self,
            _type_expr: &TypeExpr,
            _constraints: &Constraints,
            _pinned: Option<&Value>,
            _registry: &TypeRegistry,
        ) -> Result<Arc<dyn Handler>, ProtocolError> {
            Ok(Arc::new(EchoHandler))
        }
    }

    #[test]
    fn lazy_handler_resolves_once() {
        let registry = TypeRegistry::builder()
            .register(TypeKey::Int, Arc::new(EchoFactory))
            .build();
        let lazy = LazyHandler::new(TypeExpr::Int, Constraints::empty());
        let first = lazy.get(&registry).unwrap();
        let second = lazy.get(&registry).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
