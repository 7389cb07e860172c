//! Atom table for canonicalized tag, prefix and attribute names.

use std::collections::HashMap;
use std::sync::Arc;

/// Opaque atom identifier, valid only for the table that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(pub usize);

/// Document-level atom table.
///
/// Invariant: ASCII letters are stored in canonical lowercase form, so two
/// names that differ only in ASCII case intern to the same id. Non-ASCII code
/// points are preserved as-is.
#[derive(Debug, Default, Clone)]
pub struct AtomTable {
    atoms: Vec<Arc<str>>,
    map: HashMap<Arc<str>, AtomId>,
}

impl AtomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, applying ASCII-lowercase folding.
    pub fn intern_ascii_folded(&mut self, name: &str) -> AtomId {
        if !name.bytes().any(|b| b.is_ascii_uppercase()) {
            if let Some(id) = self.map.get(name) {
                return *id;
            }
            return self.insert(Arc::from(name));
        }
        let folded = name.to_ascii_lowercase();
        if let Some(id) = self.map.get(folded.as_str()) {
            return *id;
        }
        self.insert(Arc::from(folded))
    }

    /// Look up a name without interning it.
    pub fn get(&self, name: &str) -> Option<AtomId> {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.map.get(name.to_ascii_lowercase().as_str()).copied()
        } else {
            self.map.get(name).copied()
        }
    }

    pub fn resolve(&self, id: AtomId) -> &str {
        self.atoms.get(id.0).map(|s| s.as_ref()).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    fn insert(&mut self, atom: Arc<str>) -> AtomId {
        let id = AtomId(self.atoms.len());
        self.atoms.push(Arc::clone(&atom));
        self.map.insert(atom, id);
        id
    }
}
