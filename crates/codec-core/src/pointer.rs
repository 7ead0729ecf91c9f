//! Addresses into a decoded value tree.
//!
//! A [`Pointer`] is an ordered sequence of atoms (object field names or array indices)
//! locating exactly one node. Pointers are interned by content: two pointers built from
//! the same atom sequence are the same `Pointer` value, which lets issues and patches key
//! off of pointer identity cheaply.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};

use lru::LruCache;

use crate::limits::POINTER_CACHE_CAPACITY;

/// A single step in a pointer: either an object field name or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Atom {
    Name(String),
    Index(usize),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Name(name) => write!(f, "{name}"),
            Atom::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Atom {
    fn from(value: &str) -> Self {
        Atom::Name(value.to_string())
    }
}

impl From<String> for Atom {
    fn from(value: String) -> Self {
        Atom::Name(value)
    }
}

impl From<usize> for Atom {
    fn from(value: usize) -> Self {
        Atom::Index(value)
    }
}

struct PointerData {
    atoms: Vec<Atom>,
    children: Mutex<LruCache<Atom, Pointer>>,
}

/// An interned pointer into a value tree. Cheap to clone (an `Arc` underneath).
#[derive(Clone)]
pub struct Pointer(Arc<PointerData>);

impl Pointer {
    /// The pointer referring to the whole document.
    pub fn root() -> Pointer {
        static ROOT: OnceLock<Pointer> = OnceLock::new();
        ROOT.get_or_init(|| Pointer(Arc::new(PointerData {
            atoms: Vec::new(),
            children: Mutex::new(LruCache::new(
                NonZeroUsize::new(POINTER_CACHE_CAPACITY).unwrap(),
            )),
        })))
        .clone()
    }

    /// Build (or fetch an interned copy of) the pointer for the given atom sequence.
    pub fn new(atoms: Vec<Atom>) -> Pointer {
        if atoms.is_empty() {
            return Pointer::root();
        }
        let mut cache = pointer_table().lock().expect("pointer table poisoned");
        if let Some(existing) = cache.get(&atoms) {
            return existing.clone();
        }
        let pointer = Pointer(Arc::new(PointerData {
            atoms: atoms.clone(),
            children: Mutex::new(LruCache::new(
                NonZeroUsize::new(POINTER_CACHE_CAPACITY).unwrap(),
            )),
        }));
        cache.put(atoms, pointer.clone());
        pointer
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.0.atoms
    }

    pub fn is_root(&self) -> bool {
        self.0.atoms.is_empty()
    }

    /// A new pointer extending `self` by one atom, memoized per parent.
    pub fn join(&self, atom: impl Into<Atom>) -> Pointer {
        let atom = atom.into();
        let mut children = self.0.children.lock().expect("pointer cache poisoned");
        if let Some(child) = children.get(&atom) {
            return child.clone();
        }
        let mut atoms = self.0.atoms.clone();
        atoms.push(atom.clone());
        let child = Pointer::new(atoms);
        children.put(atom, child.clone());
        child
    }

    /// Render using `$`-rooted dotted/bracket notation, e.g. `$.addresses[0].street`.
    pub fn path(&self) -> String {
        if self.0.atoms.is_empty() {
            return "$".to_string();
        }
        let mut out = String::from("$");
        for atom in &self.0.atoms {
            match atom {
                Atom::Name(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                Atom::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

impl fmt::Display for Pointer {
    /// Raw `/`-joined rendering (RFC 6901 flavored, without `~0`/`~1` escaping since
    /// atoms here never contain `/` or `~` literally in practice; kept simple on purpose).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.atoms.is_empty() {
            return write!(f, "");
        }
        let rendered: Vec<String> = self.0.atoms.iter().map(|a| a.to_string()).collect();
        write!(f, "/{}", rendered.join("/"))
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pointer({:?})", self.path())
    }
}

impl PartialEq for Pointer {
    fn eq(&self, other: &Self) -> bool {
        self.0.atoms == other.0.atoms
    }
}

impl Eq for Pointer {}

impl Hash for Pointer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.atoms.hash(state);
    }
}

impl PartialOrd for Pointer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pointer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.atoms.cmp(&other.0.atoms)
    }
}

fn pointer_table() -> &'static Mutex<LruCache<Vec<Atom>, Pointer>> {
    static TABLE: OnceLock<Mutex<LruCache<Vec<Atom>, Pointer>>> = OnceLock::new();
    TABLE.get_or_init(|| {
        Mutex::new(LruCache::new(
            NonZeroUsize::new(POINTER_CACHE_CAPACITY).unwrap(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_no_atoms() {
        assert!(Pointer::root().is_root());
        assert_eq!(Pointer::root().path(), "$");
    }

    #[test]
    fn join_renders_dot_and_bracket_notation() {
        let p = Pointer::root().join("addresses").join(0usize).join("street");
        assert_eq!(p.path(), "$.addresses[0].street");
    }

    #[test]
    fn same_atoms_intern_to_same_pointer() {
        let a = Pointer::root().join("a").join(1usize);
        let b = Pointer::new(vec![Atom::Name("a".into()), Atom::Index(1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn ordering_follows_atom_sequence() {
        let a = Pointer::root().join("a");
        let b = Pointer::root().join("b");
        assert!(a < b);
    }
}
