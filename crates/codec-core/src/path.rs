//! Path patterns: a small, fast subset of JSONPath used for include/exclude filters and
//! for addressing patches. See the module doc on [`Path::compile`] for the supported
//! grammar.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};

use lru::LruCache;
use regex::Regex;
use thiserror::Error;

use crate::limits::{PATH_CACHE_CAPACITY, PATH_MATCH_CACHE_CAPACITY};
use crate::pointer::Pointer;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("error compiling path expression {pattern:?}: {source}")]
    Compile {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

enum Strategy {
    /// Always matches (the `everything` singleton).
    Everything,
    /// Never matches (the `nothing` singleton).
    Nothing,
    /// Pattern was exactly `..literal..` with no other metacharacters: plain substring test.
    Contains(String),
    /// No metacharacters at all: plain string equality.
    Exact,
    /// General case: compiled regular expression.
    Pattern(Regex),
}

struct PathData {
    raw: String,
    strategy: Strategy,
    cache: Mutex<LruCache<String, bool>>,
}

/// A compiled path pattern. Supports:
/// - the root marker `$`
/// - dot-notation field children: `.name`
/// - bracket-notation index children: `[3]`
/// - a single-level wildcard: `.*.` or `[*]`
/// - a recursive wildcard: `..`
/// - a union of sub-patterns: `<a>,<b>`
///
/// Not supported: negative indices, array slices, filter/script expressions, the
/// current-node operator, bracket-notation field names.
#[derive(Clone)]
pub struct Path(Arc<PathData>);

impl Path {
    /// The pattern matching every pointer.
    pub fn everything() -> Path {
        static EVERYTHING: OnceLock<Path> = OnceLock::new();
        EVERYTHING
            .get_or_init(|| {
                Path(Arc::new(PathData {
                    raw: "$".to_string(),
                    strategy: Strategy::Everything,
                    cache: new_cache(),
                }))
            })
            .clone()
    }

    /// The pattern matching no pointer.
    pub fn nothing() -> Path {
        static NOTHING: OnceLock<Path> = OnceLock::new();
        NOTHING
            .get_or_init(|| {
                Path(Arc::new(PathData {
                    raw: String::new(),
                    strategy: Strategy::Nothing,
                    cache: new_cache(),
                }))
            })
            .clone()
    }

    /// Compile a single path pattern from its textual form, interning by content.
    pub fn compile(pattern: &str) -> Result<Path, PathError> {
        if pattern.is_empty() {
            return Ok(Path::nothing());
        }
        let mut table = path_table().lock().expect("path table poisoned");
        if let Some(existing) = table.get(pattern) {
            return Ok(existing.clone());
        }
        let strategy = build_strategy(pattern)?;
        let path = Path(Arc::new(PathData {
            raw: pattern.to_string(),
            strategy,
            cache: new_cache(),
        }));
        table.put(pattern.to_string(), path.clone());
        Ok(path)
    }

    /// Build a union of multiple sub-patterns: `<a>,<b>,<c>`.
    pub fn union(parts: &[Path]) -> Result<Path, PathError> {
        let joined = parts
            .iter()
            .map(|p| p.as_str().to_string())
            .collect::<Vec<_>>()
            .join(",");
        Path::compile(&joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0.raw
    }

    /// Whether this pattern matches the given pointer.
    pub fn matches(&self, pointer: &Pointer) -> bool {
        self.matches_str(&pointer.path())
    }

    /// Whether this pattern matches the given rendered path string directly.
    pub fn matches_str(&self, rendered: &str) -> bool {
        match &self.0.strategy {
            Strategy::Everything => return true,
            Strategy::Nothing => return false,
            _ => {}
        }
        let mut cache = self.0.cache.lock().expect("path match cache poisoned");
        if let Some(hit) = cache.get(rendered) {
            return *hit;
        }
        let result = match &self.0.strategy {
            Strategy::Everything | Strategy::Nothing => unreachable!(),
            Strategy::Contains(needle) => rendered.contains(needle.as_str()),
            Strategy::Exact => self.0.raw == rendered,
            Strategy::Pattern(regex) => regex.is_match(rendered),
        };
        cache.put(rendered.to_string(), result);
        result
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.raw)
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({:?})", self.0.raw)
    }
}

fn build_strategy(pattern: &str) -> Result<Strategy, PathError> {
    const MARK: &str = "..";
    if let Some(inner) = pattern
        .strip_prefix(MARK)
        .and_then(|s| s.strip_suffix(MARK))
    {
        if !inner.contains(',') && !inner.contains('*') && !inner.contains("..") {
            return Ok(Strategy::Contains(inner.to_string()));
        }
    }
    let is_pattern = pattern.contains(',') || pattern.contains('*') || pattern.contains("..");
    if !is_pattern {
        return Ok(Strategy::Exact);
    }
    // Order matters: later substitutions key off strings produced by earlier ones.
    let escaped = pattern
        .replace(' ', "")
        .replace('$', r"\$")
        .replace(',', "|")
        .replace('.', r"\.")
        .replace('[', r"\[")
        .replace(']', r"\]")
        .replace(r"\.*", r"\.\w+")
        .replace(r"\.\.", r".*")
        .replace(r"\[*\]", r"\[\d+\]");
    let regex = Regex::new(&format!("^(?:{escaped})$")).map_err(|source| PathError::Compile {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(Strategy::Pattern(regex))
}

fn new_cache() -> Mutex<LruCache<String, bool>> {
    Mutex::new(LruCache::new(
        NonZeroUsize::new(PATH_MATCH_CACHE_CAPACITY).unwrap(),
    ))
}

fn path_table() -> &'static Mutex<LruCache<String, Path>> {
    static TABLE: OnceLock<Mutex<LruCache<String, Path>>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(LruCache::new(NonZeroUsize::new(PATH_CACHE_CAPACITY).unwrap())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_matches_any_pointer() {
        let p = Pointer::root().join("a").join(3usize);
        assert!(Path::everything().matches(&p));
        assert!(!Path::nothing().matches(&p));
    }

    #[test]
    fn contains_fast_path() {
        let path = Path::compile("..streetName..").unwrap();
        let p = Pointer::root().join("addresses").join(0usize).join("streetName");
        assert!(path.matches(&p));
    }

    #[test]
    fn exact_fast_path() {
        let path = Path::compile("$.a.b").unwrap();
        let p = Pointer::root().join("a").join("b");
        assert!(path.matches(&p));
        let q = Pointer::root().join("a").join("c");
        assert!(!path.matches(&q));
    }

    #[test]
    fn wildcard_and_recursive() {
        let path = Path::compile("$.addresses[*].streetName").unwrap();
        let matching = Pointer::root().join("addresses").join(2usize).join("streetName");
        assert!(path.matches(&matching));
        let non_matching = Pointer::root().join("addresses").join(2usize).join("zip");
        assert!(!path.matches(&non_matching));
    }

    #[test]
    fn union_of_patterns() {
        let path = Path::compile("$.a,$.b").unwrap();
        assert!(path.matches(&Pointer::root().join("a")));
        assert!(path.matches(&Pointer::root().join("b")));
        assert!(!path.matches(&Pointer::root().join("c")));
    }
}
