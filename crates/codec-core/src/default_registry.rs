//! Wires every built-in [`crate::registry::TypeKey`] to its handler factory. A caller
//! that never needs a custom or overridden handler can reach for
//! [`default_registry`] directly; one that does can still build its own
//! [`crate::registry::TypeRegistry`] with this one set as `parent()`.

use std::sync::Arc;

use crate::handlers::bytes::BytesFactory;
use crate::handlers::enums::EnumFactory;
use crate::handlers::literal::{ConstCarrierFactory, LiteralFactory};
use crate::handlers::mapping::MapFactory;
use crate::handlers::number::{NumberFactory, NumberKind};
use crate::handlers::record::RecordFactory;
use crate::handlers::scalar::{BoolFactory, NullFactory};
use crate::handlers::sequence::{SeqFactory, TupleFactory};
use crate::handlers::string::StringFactory;
use crate::handlers::union::{OptFactory, UnionFactory};
use crate::registry::TypeKey;
use crate::registry::TypeRegistry;

/// The registry every built-in canonical type resolves against out of the box.
pub fn default_registry() -> Arc<TypeRegistry> {
    Arc::new(
        TypeRegistry::builder()
            .register(TypeKey::Null, Arc::new(NullFactory))
            .register(TypeKey::Bool, Arc::new(BoolFactory))
            .register(TypeKey::Int, Arc::new(NumberFactory(NumberKind::Int)))
            .register(TypeKey::Float, Arc::new(NumberFactory(NumberKind::Float)))
            .register(TypeKey::Decimal, Arc::new(NumberFactory(NumberKind::Decimal)))
            .register(TypeKey::String, Arc::new(StringFactory))
            .register(TypeKey::Bytes, Arc::new(BytesFactory))
            .register(TypeKey::Seq, Arc::new(SeqFactory))
            .register(TypeKey::Tuple, Arc::new(TupleFactory))
            .register(TypeKey::Map, Arc::new(MapFactory))
            .register(TypeKey::Union, Arc::new(UnionFactory))
            .register(TypeKey::Opt, Arc::new(OptFactory))
            .register(TypeKey::Literal, Arc::new(LiteralFactory))
            .register(TypeKey::Enum, Arc::new(EnumFactory))
            .register(TypeKey::Record, Arc::new(RecordFactory))
            .register(TypeKey::ConstCarrier, Arc::new(ConstCarrierFactory))
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HandleConfig, Shape};
    use crate::constraints::Constraints;
    use crate::handler::HandlerOutput;
    use crate::pointer::Pointer;
    use crate::types::TypeExpr;
    use serde_json::Value;

    #[test]
    fn resolves_a_handler_for_every_registered_key() {
        let registry = default_registry();
        let config = HandleConfig::new(Shape::Json, Shape::Json, registry.clone());
        let handler = registry.get_handler(&TypeExpr::Int, &Constraints::empty(), None).unwrap();
        let (out, issues) = handler.handle(&Value::from(3), &Pointer::root(), true, false, &config);
        assert!(issues.is_empty());
        assert_eq!(out, HandlerOutput::Value(Value::from(3)));
    }
}
