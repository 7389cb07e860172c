//! Arena-backed node tree.
//!
//! Nodes are addressed by [`NodeId`]; children lists own their entries and
//! `parent` is a non-owning back-reference. A node whose `parent` is `None`
//! (other than the document root) is detached: either bound as a template
//! attribute value or dropped by a hook.

use std::fmt;

use crate::namespace::{NamespaceScopes, ScopeId};
use crate::shared::{AtomId, AtomTable, Position};

/// Handle to a node in a [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The arena already holds as many nodes as [`NodeId`] can address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("document has more than {} nodes", u32::MAX)]
pub struct ArenaFull;

fn node_id_at(index: usize) -> Result<NodeId, ArenaFull> {
    u32::try_from(index).map(NodeId).map_err(|_| ArenaFull)
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrValue {
    Literal(String),
    /// Detached element subtree bound as the value.
    Template(NodeId),
}

impl AttrValue {
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            AttrValue::Literal(value) => Some(value),
            AttrValue::Template(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

/// Attributes in first-occurrence order. Setting an existing name replaces
/// its value in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    items: Vec<Attribute>,
}

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.items.iter().find(|a| a.name == name).map(|a| &a.value)
    }

    pub fn literal(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttrValue::as_literal)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&mut self, name: impl Into<String>, value: AttrValue) {
        let name = name.into();
        match self.items.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.items.push(Attribute { name, value }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        let index = self.items.iter().position(|a| a.name == name)?;
        Some(self.items.remove(index).value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribute> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    /// Local name, ASCII-lowercased.
    pub name: AtomId,
    /// Tag prefix, ASCII-lowercased.
    pub prefix: AtomId,
    /// Identifier the prefix resolves to in this element's scope.
    pub namespace: Option<String>,
    pub scope: ScopeId,
    pub attributes: Attributes,
    pub children: Vec<NodeId>,
    /// Byte offset of the opening `<` in the source.
    pub offset: usize,
    pub position: Position,
    pub self_closing: bool,
    /// Still open at end of input; close-time validation and hooks did not run.
    pub force_closed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Document { children: Vec<NodeId> },
    Element(Element),
    Text { value: String },
    Comment { value: String },
    /// Entity reference; `name` is the dotted path after the namespace.
    Entity { name: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match &self.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Document { children } => children,
            NodeKind::Element(element) => &element.children,
            _ => &[],
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.kind {
            NodeKind::Document { children } => Some(children),
            NodeKind::Element(element) => Some(&mut element.children),
            _ => None,
        }
    }
}

/// A parsed template: node arena, interned names and namespace scopes.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<Node>,
    atoms: AtomTable,
    scopes: NamespaceScopes,
    prolog: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                kind: NodeKind::Document {
                    children: Vec::new(),
                },
            }],
            atoms: AtomTable::new(),
            scopes: NamespaceScopes::new(),
            prolog: None,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.node(id).and_then(Node::as_element)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(Node::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// Local name of an element.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| self.atoms.resolve(e.name))
    }

    /// `prefix:name` of an element.
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        self.element(id)
            .map(|e| format!("{}:{}", self.atoms.resolve(e.prefix), self.atoms.resolve(e.name)))
    }

    /// Resolve `prefix` in the scope of element `id`.
    pub fn resolve_prefix(&self, id: NodeId, prefix: &str) -> Option<&str> {
        let scope = self.element(id).map(|e| e.scope)?;
        self.scopes.resolve(scope, prefix)
    }

    /// Nodes below `id` in document order, `id` excluded.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    pub fn atoms(&self) -> &AtomTable {
        &self.atoms
    }

    pub fn scopes(&self) -> &NamespaceScopes {
        &self.scopes
    }

    /// Leading declaration/doctype. Recorded even when `remove_prolog` keeps
    /// it out of the children of the root.
    pub fn prolog(&self) -> Option<&str> {
        self.prolog.as_deref()
    }

    /// Total nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub(crate) fn atoms_mut(&mut self) -> &mut AtomTable {
        &mut self.atoms
    }

    pub(crate) fn scopes_mut(&mut self) -> &mut NamespaceScopes {
        &mut self.scopes
    }

    pub(crate) fn set_prolog(&mut self, prolog: String) {
        self.prolog = Some(prolog);
    }

    pub(crate) fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(id.index()).map(|n| &mut n.kind) {
            Some(NodeKind::Element(element)) => Some(element),
            _ => None,
        }
    }

    /// Create a node and append it to `parent`'s children.
    pub(crate) fn append(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, ArenaFull> {
        let id = node_id_at(self.nodes.len())?;
        self.nodes.push(Node {
            parent: Some(parent),
            kind,
        });
        if let Some(children) = self.nodes.get_mut(parent.index()).and_then(Node::children_mut) {
            children.push(id);
        }
        Ok(id)
    }

    /// Remove `id` from its parent's children and clear its back-reference.
    /// Returns the index it occupied.
    pub(crate) fn detach(&mut self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        let children = self.nodes.get_mut(parent.index())?.children_mut()?;
        let index = children.iter().position(|c| *c == id)?;
        children.remove(index);
        self.nodes[id.index()].parent = None;
        Some(index)
    }

    /// Put a new node where `id` was and detach `id`. `Ok(None)` when `id`
    /// is not attached.
    pub(crate) fn replace_with(
        &mut self,
        id: NodeId,
        kind: NodeKind,
    ) -> Result<Option<NodeId>, ArenaFull> {
        let replacement = node_id_at(self.nodes.len())?;
        let Some(parent) = self.parent(id) else {
            return Ok(None);
        };
        let Some(index) = self.detach(id) else {
            return Ok(None);
        };
        self.nodes.push(Node {
            parent: Some(parent),
            kind,
        });
        if let Some(siblings) = self.nodes[parent.index()].children_mut() {
            siblings.insert(index, replacement);
        }
        Ok(Some(replacement))
    }

    /// Move the children of `id` into its parent at `id`'s position and
    /// detach `id`.
    pub(crate) fn unwrap_into_parent(&mut self, id: NodeId) -> Option<()> {
        let parent = self.parent(id)?;
        let moved = std::mem::take(self.nodes.get_mut(id.index())?.children_mut()?);
        let index = self.detach(id)?;
        for child in &moved {
            self.nodes[child.index()].parent = Some(parent);
        }
        let siblings = self.nodes[parent.index()].children_mut()?;
        siblings.splice(index..index, moved);
        Some(())
    }
}

/// Pre-order traversal produced by [`Document::descendants`].
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(id).iter().rev().copied());
        Some(id)
    }
}
