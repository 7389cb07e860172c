//! Tag-handler registry consulted by the tree builder.
//!
//! A registry is built once and passed to the [`crate::Parser`] explicitly.
//! Extending a registry produces a new builder seeded with its entries; the
//! original registry is left untouched.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::ParserConfig;
use crate::tree_builder::{AttrValue, Attributes, Document, Element, NodeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrKind {
    String,
    /// Must parse as a number unless it carries an entity reference.
    Number,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttrSchema {
    pub name: String,
    pub required: bool,
    pub kind: AttrKind,
    /// Applied at close time when the attribute is absent and not required.
    pub default: Option<String>,
}

impl AttrSchema {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            kind: AttrKind::String,
            default: None,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            kind: AttrKind::Number,
            ..Self::string(name)
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Whether a tag produces an inline expression or drives block logic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TagKind {
    Inline,
    #[default]
    Block,
}

/// What the tree builder does with a node after its parse hook ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookOutcome {
    Keep,
    /// Replace the node with literal text.
    Replace(String),
    /// Detach the node and bind it as a template value of the parent
    /// element's attribute with this name.
    BindToParentAttribute(String),
    /// Drop the node and record a diagnostic with this message.
    Reject(String),
}

/// A closing node as seen by its [`ParseHook`].
///
/// The tree is read-only. The node's attributes are a working copy the hook
/// may edit; the builder writes the copy back to the element whatever the
/// outcome, so a rewritten attribute survives `Keep` and
/// `BindToParentAttribute`.
pub struct HookContext<'a> {
    document: &'a Document,
    node: NodeId,
    config: &'a ParserConfig,
    attributes: Attributes,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(document: &'a Document, node: NodeId, config: &'a ParserConfig) -> Self {
        let attributes = document
            .element(node)
            .map(|e| e.attributes.clone())
            .unwrap_or_default();
        Self {
            document,
            node,
            config,
            attributes,
        }
    }

    pub(crate) fn into_attributes(self) -> Attributes {
        self.attributes
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn config(&self) -> &'a ParserConfig {
        self.config
    }

    /// The element as it stands in the tree, without this hook's edits.
    pub fn element(&self) -> Option<&'a Element> {
        self.document.element(self.node)
    }

    pub fn name(&self) -> Option<&'a str> {
        self.document.name(self.node)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Attributes {
        &mut self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    /// Literal value of an attribute; `None` when absent or a template.
    pub fn literal(&self, name: &str) -> Option<&str> {
        self.attributes.literal(name)
    }

    pub fn set_literal(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.set(name, AttrValue::Literal(value.into()));
    }

    /// Local name of the parent element, `None` at document level.
    pub fn parent_name(&self) -> Option<&'a str> {
        self.document
            .parent(self.node)
            .and_then(|p| self.document.name(p))
    }
}

/// Parse-time hook run when a registered tag closes with valid attributes.
pub trait ParseHook: Send + Sync {
    fn parse(&self, cx: &mut HookContext<'_>) -> HookOutcome;
}

impl<F> ParseHook for F
where
    F: Fn(&mut HookContext<'_>) -> HookOutcome + Send + Sync,
{
    fn parse(&self, cx: &mut HookContext<'_>) -> HookOutcome {
        self(cx)
    }
}

#[derive(Clone, Default)]
pub struct TagDescriptor {
    pub schema: Vec<AttrSchema>,
    pub hook: Option<Arc<dyn ParseHook>>,
    pub kind: TagKind,
}

impl TagDescriptor {
    pub fn new(kind: TagKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn attr(mut self, schema: AttrSchema) -> Self {
        self.schema.push(schema);
        self
    }

    pub fn hook(mut self, hook: impl ParseHook + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for TagDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagDescriptor")
            .field("schema", &self.schema)
            .field("hook", &self.hook.is_some())
            .field("kind", &self.kind)
            .finish()
    }
}

/// Immutable map from local tag name to descriptor.
#[derive(Clone, Debug, Default)]
pub struct TagRegistry {
    tags: HashMap<String, TagDescriptor>,
}

impl TagRegistry {
    pub fn builder() -> TagRegistryBuilder {
        TagRegistryBuilder::default()
    }

    /// Look up a local name (ASCII case-insensitive).
    pub fn get(&self, name: &str) -> Option<&TagDescriptor> {
        self.tags
            .get(name)
            .or_else(|| self.tags.get(&name.to_ascii_lowercase()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Start a new registry from this one's entries.
    pub fn extend(&self) -> TagRegistryBuilder {
        TagRegistryBuilder {
            tags: self.tags.clone(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TagRegistryBuilder {
    tags: HashMap<String, TagDescriptor>,
}

impl TagRegistryBuilder {
    /// Register `name`, replacing any previous descriptor.
    pub fn tag(mut self, name: &str, descriptor: TagDescriptor) -> Self {
        self.tags.insert(name.to_ascii_lowercase(), descriptor);
        self
    }

    pub fn remove(mut self, name: &str) -> Self {
        self.tags.remove(&name.to_ascii_lowercase());
        self
    }

    pub fn build(self) -> TagRegistry {
        TagRegistry { tags: self.tags }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_leaves_base_untouched() {
        let base = TagRegistry::builder()
            .tag("echo", TagDescriptor::new(TagKind::Inline))
            .build();
        let extended = base
            .extend()
            .tag("Custom", TagDescriptor::new(TagKind::Block))
            .build();
        assert!(!base.contains("custom"));
        assert!(extended.contains("custom"));
        assert!(extended.contains("ECHO"));
        assert_eq!(extended.names(), vec!["custom", "echo"]);
    }

    fn replace_with_x(_: &mut HookContext<'_>) -> HookOutcome {
        HookOutcome::Replace("x".into())
    }

    #[test]
    fn functions_are_hooks() {
        let descriptor = TagDescriptor::new(TagKind::Inline)
            .attr(AttrSchema::number("count").required())
            .hook(replace_with_x);
        assert!(descriptor.hook.is_some());
        assert_eq!(descriptor.schema[0].kind, AttrKind::Number);
        assert!(descriptor.schema[0].required);
    }
}
