//! Canonical type expressions.
//!
//! A [`TypeExpr`] is the compile-time-constructed tagged tree a schema reduces to. It
//! plays the role the original implementation fills at run time by introspecting a
//! dynamic type system (unwrapping `Annotated`, following aliases, resolving forward
//! references): here, every type that can appear in a schema implements
//! [`HasTypeExpr::type_expr`], which is generated for user records by the
//! `#[derive(Record)]` macro and implemented by hand for the handful of built-in
//! containers below.

use std::sync::Arc;

use crate::constraints::{Constraint, Constraints};
use crate::record::RecordSchema;

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Null,
    Bool,
    Int,
    Float,
    Decimal,
    String,
    Bytes,
    Seq(Box<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    Literal(Vec<serde_json::Value>),
    /// A C-like enum: a base representation type plus the set of member values.
    Enum {
        base: Box<TypeExpr>,
        members: Vec<serde_json::Value>,
    },
    Record(Arc<RecordSchema>),
    Opt(Box<TypeExpr>),
    /// The Rust analogue of `ClassVar`/`Final`: a type paired with a single statically
    /// known value, not carried in the type itself, provided by the caller instead.
    ConstCarrier(Box<TypeExpr>),
    Annotated(Box<TypeExpr>, Constraints),
}

impl TypeExpr {
    /// Strip one layer of `Annotated`, returning the inner type and the constraints
    /// that were attached (empty if this expression isn't annotated).
    pub fn unwrap_annotated(&self) -> (&TypeExpr, Option<&Constraints>) {
        match self {
            TypeExpr::Annotated(inner, constraints) => (inner, Some(constraints)),
            other => (other, None),
        }
    }

    /// The type with every `Annotated` wrapper stripped, recursively at the top.
    pub fn root(&self) -> &TypeExpr {
        match self {
            TypeExpr::Annotated(inner, _) => inner.root(),
            other => other,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.root(), TypeExpr::Opt(_))
    }
}

/// Implemented for every Rust type that can appear as a schema. Implemented by hand for
/// built-in containers; generated by `#[derive(Record)]` for user record types.
pub trait HasTypeExpr {
    fn type_expr() -> TypeExpr;
}

macro_rules! impl_scalar {
    ($ty:ty, $expr:expr) => {
        impl HasTypeExpr for $ty {
            fn type_expr() -> TypeExpr {
                $expr
            }
        }
    };
}

impl_scalar!(bool, TypeExpr::Bool);
impl_scalar!(i8, TypeExpr::Int);
impl_scalar!(i16, TypeExpr::Int);
impl_scalar!(i32, TypeExpr::Int);
impl_scalar!(i64, TypeExpr::Int);
impl_scalar!(i128, TypeExpr::Int);
impl_scalar!(u8, TypeExpr::Int);
impl_scalar!(u16, TypeExpr::Int);
impl_scalar!(u32, TypeExpr::Int);
impl_scalar!(u64, TypeExpr::Int);
impl_scalar!(f32, TypeExpr::Float);
impl_scalar!(f64, TypeExpr::Float);
impl_scalar!(String, TypeExpr::String);
impl_scalar!(bigdecimal::BigDecimal, TypeExpr::Decimal);

impl HasTypeExpr for uuid::Uuid {
    fn type_expr() -> TypeExpr {
        TypeExpr::Annotated(
            Box::new(TypeExpr::String),
            Constraints::new([Constraint::Format(crate::constraints::Format::Uuid)]),
        )
    }
}

impl HasTypeExpr for Vec<u8> {
    fn type_expr() -> TypeExpr {
        TypeExpr::Bytes
    }
}

impl<T: HasTypeExpr> HasTypeExpr for Vec<T> {
    fn type_expr() -> TypeExpr {
        TypeExpr::Seq(Box::new(T::type_expr()))
    }
}

impl<T: HasTypeExpr> HasTypeExpr for Option<T> {
    fn type_expr() -> TypeExpr {
        TypeExpr::Opt(Box::new(T::type_expr()))
    }
}

impl<K: HasTypeExpr, V: HasTypeExpr> HasTypeExpr for std::collections::HashMap<K, V> {
    fn type_expr() -> TypeExpr {
        TypeExpr::Map(Box::new(K::type_expr()), Box::new(V::type_expr()))
    }
}

impl<K: HasTypeExpr, V: HasTypeExpr> HasTypeExpr for std::collections::BTreeMap<K, V> {
    fn type_expr() -> TypeExpr {
        TypeExpr::Map(Box::new(K::type_expr()), Box::new(V::type_expr()))
    }
}

macro_rules! impl_tuple {
    ($($name:ident)+) => {
        impl<$($name: HasTypeExpr),+> HasTypeExpr for ($($name,)+) {
            fn type_expr() -> TypeExpr {
                TypeExpr::Tuple(vec![$($name::type_expr()),+])
            }
        }
    };
}

impl_tuple!(A);
impl_tuple!(A B);
impl_tuple!(A B C);
impl_tuple!(A B C D);
