//! Maps a canonical type (or a predicate over one) to the handler that knows how to
//! validate/coerce/convert it, with parent-registry delegation and two layers of
//! caching (handler factory by type family, handler instance by the full
//! `(type, constraints, pinned value)` triple).

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde_json::Value;

use crate::constraints::Constraints;
use crate::error::ProtocolError;
use crate::handler::Handler;
use crate::limits::{HANDLER_CLASS_CACHE_CAPACITY, HANDLER_INSTANCE_CACHE_CAPACITY};
use crate::types::TypeExpr;

/// The outer "family" of a canonical type, ignoring nested type parameters. Played by
/// `origin` in the original (the un-parameterized container class); here it doubles as
/// the primary registry lookup key since `TypeExpr` is already fully canonical by
/// construction (resolved at compile time, not run time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    String,
    Bytes,
    Seq,
    Tuple,
    Map,
    Union,
    Literal,
    Enum,
    Record,
    Opt,
    ConstCarrier,
}

impl TypeKey {
    pub fn of(expr: &TypeExpr) -> TypeKey {
        match expr.root() {
            TypeExpr::Null => TypeKey::Null,
            TypeExpr::Bool => TypeKey::Bool,
            TypeExpr::Int => TypeKey::Int,
            TypeExpr::Float => TypeKey::Float,
            TypeExpr::Decimal => TypeKey::Decimal,
            TypeExpr::String => TypeKey::String,
            TypeExpr::Bytes => TypeKey::Bytes,
            TypeExpr::Seq(_) => TypeKey::Seq,
            TypeExpr::Tuple(_) => TypeKey::Tuple,
            TypeExpr::Map(_, _) => TypeKey::Map,
            TypeExpr::Union(_) => TypeKey::Union,
            TypeExpr::Literal(_) => TypeKey::Literal,
            TypeExpr::Enum { .. } => TypeKey::Enum,
            TypeExpr::Record(_) => TypeKey::Record,
            TypeExpr::Opt(_) => TypeKey::Opt,
            TypeExpr::ConstCarrier(_) => TypeKey::ConstCarrier,
            TypeExpr::Annotated(_, _) => unreachable!("root() strips Annotated"),
        }
    }
}

/// Builds a handler for one canonical type. Implemented once per handler family
/// (`ScalarHandler::factory()`, `RecordHandler::factory()`, ...).
pub trait HandlerFactory: Send + Sync {
    fn build_handler(
        &self,
        type_expr: &TypeExpr,
        constraints: &Constraints,
        pinned: Option<&Value>,
        registry: &TypeRegistry,
    ) -> Result<Arc<dyn Handler>, ProtocolError>;
}

type Predicate = Arc<dyn Fn(&TypeExpr) -> bool + Send + Sync>;

struct CacheKey {
    type_expr: TypeExpr,
    constraints: Constraints,
    pinned: Option<Value>,
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_expr == other.type_expr
            && self.constraints == other.constraints
            && self.pinned == other.pinned
    }
}

/// A registry of handler factories. Registries are built up-front via
/// [`TypeRegistry::builder`] and then treated as read-only; the instance/factory caches
/// use interior mutability (`Mutex`) so a frozen registry can still be shared across
/// threads.
pub struct TypeRegistry {
    by_key: HashMap<TypeKey, Arc<dyn HandlerFactory>>,
    predicates: Vec<(Predicate, Arc<dyn HandlerFactory>)>,
    parents: Vec<Arc<TypeRegistry>>,
    factory_cache: Mutex<LruCache<TypeKey, Arc<dyn HandlerFactory>>>,
    handler_cache: Mutex<Vec<(CacheKey, Arc<dyn Handler>)>>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    fn get_handler_factory(&self, type_expr: &TypeExpr) -> Result<Arc<dyn HandlerFactory>, ProtocolError> {
        let key = TypeKey::of(type_expr);
        {
            let mut cache = self.factory_cache.lock().expect("factory cache poisoned");
            if let Some(found) = cache.get(&key) {
                return Ok(found.clone());
            }
        }
        if let Some(factory) = self.by_key.get(&key) {
            self.factory_cache
                .lock()
                .expect("factory cache poisoned")
                .put(key, factory.clone());
            return Ok(factory.clone());
        }
        for (predicate, factory) in &self.predicates {
            if predicate(type_expr) {
                self.factory_cache
                    .lock()
                    .expect("factory cache poisoned")
                    .put(key, factory.clone());
                return Ok(factory.clone());
            }
        }
        for parent in &self.parents {
            if let Ok(factory) = parent.get_handler_factory(type_expr) {
                self.factory_cache
                    .lock()
                    .expect("factory cache poisoned")
                    .put(key, factory.clone());
                return Ok(factory);
            }
        }
        Err(ProtocolError::HandlerMissing {
            type_name: format!("{type_expr:?}"),
        })
    }

    /// Fetch (building and caching if necessary) the handler for `type_expr` with the
    /// given constraints and, for constant-carrier types, the pinned value.
    pub fn get_handler(
        &self,
        type_expr: &TypeExpr,
        constraints: &Constraints,
        pinned: Option<&Value>,
    ) -> Result<Arc<dyn Handler>, ProtocolError> {
        {
            let cache = self.handler_cache.lock().expect("handler cache poisoned");
            if let Some((_, handler)) = cache.iter().find(|(key, _)| {
                key.type_expr == *type_expr
                    && key.constraints == *constraints
                    && key.pinned.as_ref() == pinned
            }) {
                return Ok(handler.clone());
            }
        }
        if matches!(type_expr.root(), TypeExpr::ConstCarrier(_)) && pinned.is_none() {
            return Err(ProtocolError::MissingPinnedValue);
        }
        let factory = self.get_handler_factory(type_expr)?;
        let handler = factory.build_handler(type_expr, constraints, pinned, self)?;
        let mut cache = self.handler_cache.lock().expect("handler cache poisoned");
        if cache.len() >= HANDLER_INSTANCE_CACHE_CAPACITY {
            cache.remove(0);
        }
        cache.push((
            CacheKey {
                type_expr: type_expr.clone(),
                constraints: constraints.clone(),
                pinned: pinned.cloned(),
            },
            handler.clone(),
        ));
        Ok(handler)
    }
}

#[derive(Default)]
pub struct TypeRegistryBuilder {
    by_key: HashMap<TypeKey, Arc<dyn HandlerFactory>>,
    predicates: Vec<(Predicate, Arc<dyn HandlerFactory>)>,
    parents: Vec<Arc<TypeRegistry>>,
}

impl TypeRegistryBuilder {
    pub fn register(mut self, key: TypeKey, factory: Arc<dyn HandlerFactory>) -> Self {
        self.by_key.insert(key, factory);
        self
    }

    pub fn register_predicate(
        mut self,
        predicate: impl Fn(&TypeExpr) -> bool + Send + Sync + 'static,
        factory: Arc<dyn HandlerFactory>,
    ) -> Self {
        self.predicates.push((Arc::new(predicate), factory));
        self
    }

    pub fn parent(mut self, parent: Arc<TypeRegistry>) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            by_key: self.by_key,
            predicates: self.predicates,
            parents: self.parents,
            factory_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(HANDLER_CLASS_CACHE_CAPACITY).unwrap(),
            )),
            handler_cache: Mutex::new(Vec::new()),
        }
    }
}
