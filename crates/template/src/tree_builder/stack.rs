//! Stack of open template elements.

use super::node::NodeId;
use crate::shared::AtomId;

/// Entry in the stack of open elements.
///
/// `node` is `None` for a discarded element (unknown tag, or any tag opened
/// inside one). Discarded entries still take part in close-tag matching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OpenElement {
    pub(crate) node: Option<NodeId>,
    pub(crate) name: AtomId,
    /// `prefix:name` as reported in diagnostics.
    pub(crate) tag_name: String,
    /// Offset of the opening `<`.
    pub(crate) offset: usize,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct OpenElementsStack {
    items: Vec<OpenElement>,
    max_depth: usize,
}

impl OpenElementsStack {
    pub(crate) fn push(&mut self, entry: OpenElement) {
        self.items.push(entry);
        self.max_depth = self.max_depth.max(self.items.len());
    }

    pub(crate) fn pop(&mut self) -> Option<OpenElement> {
        self.items.pop()
    }

    pub(crate) fn current(&self) -> Option<&OpenElement> {
        self.items.last()
    }

    /// Entry directly below the current one.
    pub(crate) fn parent_of_current(&self) -> Option<&OpenElement> {
        self.items
            .len()
            .checked_sub(2)
            .and_then(|i| self.items.get(i))
    }

    pub(crate) fn depth(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
