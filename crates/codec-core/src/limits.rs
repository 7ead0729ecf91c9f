//! Named cache capacities. Kept as constants rather than scattered literals so the
//! concurrency/resource model in the design notes has one place to point at.

/// Capacity of the pointer interning table and of each pointer's child-join cache.
pub const POINTER_CACHE_CAPACITY: usize = 65_536;

/// Capacity of the path interning table and of each path's match-result cache.
pub const PATH_CACHE_CAPACITY: usize = 65_536;

/// Capacity of a single path's per-value `matches()` memoization cache.
pub const PATH_MATCH_CACHE_CAPACITY: usize = 1_024;

/// Capacity of the resolved-type-expression cache.
pub const RESOLVE_CACHE_CAPACITY: usize = 1_048_576;

/// Capacity of a registry's handler-class cache.
pub const HANDLER_CLASS_CACHE_CAPACITY: usize = 4_096;

/// Capacity of a registry's handler-instance cache.
pub const HANDLER_INSTANCE_CACHE_CAPACITY: usize = 4_096;

/// Capacity of a single `Patches` value's per-pointer match cache, per `(format, mode)` bucket.
pub const PATCH_MATCH_CACHE_CAPACITY: usize = 1_024;
