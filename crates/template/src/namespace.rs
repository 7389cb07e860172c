//! Lexically scoped namespace resolution.
//!
//! Each element that declares `xmlns` or `xmlns:<prefix>` gets its own scope
//! whose parent is the enclosing element's scope. Elements without
//! declarations share their parent's scope. Lookups walk the chain outward,
//! so an inner declaration shadows an outer one only for its own subtree.

/// Handle to a scope in a [`NamespaceScopes`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) usize);

/// Key used for the default namespace (`xmlns="..."`).
pub const DEFAULT_PREFIX: &str = "";

#[derive(Clone, Debug)]
struct Scope {
    parent: Option<ScopeId>,
    /// Prefix -> identifier, in declaration order. Later duplicates win.
    bindings: Vec<(String, String)>,
}

/// Arena of namespace scopes for one document.
#[derive(Clone, Debug)]
pub struct NamespaceScopes {
    scopes: Vec<Scope>,
}

impl NamespaceScopes {
    /// Create an arena containing the empty document scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                bindings: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Derive a scope for an element from its parent scope and declarations.
    ///
    /// Returns `parent` unchanged when there are no declarations.
    pub fn derive(&mut self, parent: ScopeId, declarations: Vec<(String, String)>) -> ScopeId {
        if declarations.is_empty() {
            return parent;
        }
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(parent),
            bindings: declarations,
        });
        id
    }

    /// Resolve `prefix` in `scope`, delegating unset prefixes outward.
    pub fn resolve(&self, scope: ScopeId, prefix: &str) -> Option<&str> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let entry = self.scopes.get(id.0)?;
            if let Some((_, uri)) = entry.bindings.iter().rev().find(|(p, _)| p == prefix) {
                return Some(uri.as_str());
            }
            current = entry.parent;
        }
        None
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl Default for NamespaceScopes {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract a namespace declaration from an attribute name, returning the
/// declared prefix (`""` for the default namespace).
pub fn declared_prefix(attr_prefix: &str, attr_local: &str) -> Option<String> {
    if attr_prefix.is_empty() && attr_local == "xmlns" {
        Some(DEFAULT_PREFIX.to_string())
    } else if attr_prefix == "xmlns" {
        Some(attr_local.to_string())
    } else {
        None
    }
}
