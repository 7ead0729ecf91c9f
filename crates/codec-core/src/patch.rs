//! Path-addressed overrides applied while the handler tree descends: a patch can
//! replace an object key or a value, at either the source stage (before a handler sees
//! the raw input) or the target stage (after a handler produces its output).

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde_json::Value;

use crate::limits::PATCH_MATCH_CACHE_CAPACITY;
use crate::path::Path;
use crate::pointer::Pointer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchStage {
    Source,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchMode {
    Key,
    Value,
}

struct PatchEntry {
    path: Path,
    value: Value,
}

type Bucket = (PatchStage, PatchMode);

struct PatchesData {
    buckets: HashMap<Bucket, Vec<PatchEntry>>,
    // lazily created per-bucket cache, matching the first-match-wins + memoize-miss
    // behavior of the original; a bucket absent from `buckets` never gets a cache.
    caches: Mutex<HashMap<Bucket, LruCache<Pointer, Option<Value>>>>,
}

/// A set of patches. `Patches::empty()` is the well-known "no patches configured" value
/// and is safe/cheap to check against in hot loops via [`Patches::have_for`].
#[derive(Clone)]
pub struct Patches(Arc<PatchesData>);

impl Patches {
    pub fn empty() -> Patches {
        Patches(Arc::new(PatchesData {
            buckets: HashMap::new(),
            caches: Mutex::new(HashMap::new()),
        }))
    }

    pub fn builder() -> PatchesBuilder {
        PatchesBuilder::default()
    }

    /// Cheap presence check, meant to be called once per `(stage, mode)` outside of a
    /// per-field loop so the per-field code can skip pointer computation entirely when
    /// there is nothing to apply.
    pub fn have_for(&self, stage: PatchStage, mode: PatchMode) -> bool {
        self.0.buckets.contains_key(&(stage, mode))
    }

    /// Return the (possibly overridden) value for `pointer` in the given bucket.
    /// Returns `value` unchanged if no patch applies.
    pub fn apply(&self, stage: PatchStage, mode: PatchMode, pointer: &Pointer, value: Value) -> Value {
        let bucket = (stage, mode);
        let Some(entries) = self.0.buckets.get(&bucket) else {
            return value;
        };
        let mut caches = self.0.caches.lock().expect("patch cache poisoned");
        let cache = caches
            .entry(bucket)
            .or_insert_with(|| LruCache::new(NonZeroUsize::new(PATCH_MATCH_CACHE_CAPACITY).unwrap()));
        if let Some(hit) = cache.get(pointer) {
            return hit.clone().unwrap_or(value);
        }
        let found = entries
            .iter()
            .find(|entry| entry.path.matches(pointer))
            .map(|entry| entry.value.clone());
        cache.put(pointer.clone(), found.clone());
        found.unwrap_or(value)
    }
}

#[derive(Default)]
pub struct PatchesBuilder {
    buckets: HashMap<Bucket, Vec<PatchEntry>>,
}

impl PatchesBuilder {
    pub fn add(mut self, stage: PatchStage, mode: PatchMode, path: Path, value: Value) -> Self {
        self.buckets
            .entry((stage, mode))
            .or_default()
            .push(PatchEntry { path, value });
        self
    }

    /// Merge another, already-built `Patches` in (its buckets are appended after
    /// this builder's own entries, preserving first-match-wins order).
    pub fn merge(mut self, other: &Patches) -> Self {
        for (bucket, entries) in &other.0.buckets {
            let dest = self.buckets.entry(*bucket).or_default();
            for entry in entries {
                dest.push(PatchEntry {
                    path: entry.path.clone(),
                    value: entry.value.clone(),
                });
            }
        }
        self
    }

    pub fn build(self) -> Patches {
        Patches(Arc::new(PatchesData {
            buckets: self.buckets,
            caches: Mutex::new(HashMap::new()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patches_never_applies() {
        let patches = Patches::empty();
        assert!(!patches.have_for(PatchStage::Source, PatchMode::Value));
        let p = Pointer::root().join("a");
        assert_eq!(
            patches.apply(PatchStage::Source, PatchMode::Value, &p, Value::from(1)),
            Value::from(1)
        );
    }

    #[test]
    fn first_match_wins() {
        let path = Path::compile("$.a").unwrap();
        let patches = Patches::builder()
            .add(PatchStage::Target, PatchMode::Value, path.clone(), Value::from("first"))
            .add(PatchStage::Target, PatchMode::Value, path, Value::from("second"))
            .build();
        let p = Pointer::root().join("a");
        assert_eq!(
            patches.apply(PatchStage::Target, PatchMode::Value, &p, Value::from("orig")),
            Value::from("first")
        );
    }

    #[test]
    fn miss_returns_original_value() {
        let path = Path::compile("$.a").unwrap();
        let patches = Patches::builder()
            .add(PatchStage::Target, PatchMode::Value, path, Value::from("patched"))
            .build();
        let other = Pointer::root().join("b");
        assert_eq!(
            patches.apply(PatchStage::Target, PatchMode::Value, &other, Value::from("orig")),
            Value::from("orig")
        );
    }
}
