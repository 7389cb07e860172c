//! Diagnostics recorded while configuring, tokenizing and tree-building.
//!
//! Nothing here aborts a parse: every diagnostic is recorded and parsing
//! continues with a best-effort tree.

use std::path::PathBuf;

use super::position::Position;
use crate::tree_builder::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Self-closing tag whose name is not in the registry.
    UnknownEmptyTag,
    /// Opening tag whose name is not in the registry.
    UnknownTagOpening,
    /// Element skipped by recovery or left open at end of input.
    TagNotClosed,
    /// Closing tag with no matching open element.
    ClosingTagMatchesNothing,
    /// Required attribute absent.
    MissingAttribute,
    /// Numeric attribute with a non-numeric value.
    InvalidNumber,
    /// A tag's parse hook rejected the node.
    Rejected,
    /// Configuration value replaced by its default.
    InvalidConfig,
    /// The node arena is full; later content was dropped.
    TooManyNodes,
}

impl DiagnosticKind {
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            DiagnosticKind::UnknownEmptyTag
                | DiagnosticKind::UnknownTagOpening
                | DiagnosticKind::TagNotClosed
                | DiagnosticKind::ClosingTagMatchesNothing
        )
    }
}

/// A non-fatal parse, validation or configuration error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message} (line {}, column {})", .position.line, .position.column)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Full tag name as written (`prefix:name`), when a tag is involved.
    pub tag_name: Option<String>,
    pub position: Position,
    /// Template path from the parser configuration.
    pub path: Option<PathBuf>,
    /// Node the diagnostic was recorded against, if it is still reachable.
    pub node: Option<NodeId>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            tag_name: None,
            position: Position::default(),
            path: None,
            node: None,
        }
    }

    pub fn with_tag(mut self, tag_name: impl Into<String>) -> Self {
        self.tag_name = Some(tag_name.into());
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        self.path = path;
        self
    }

    pub fn on_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn line(&self) -> usize {
        self.position.line
    }

    pub fn column(&self) -> usize {
        self.position.column
    }
}

pub(crate) const MSG_UNKNOWN_EMPTY_TAG: &str = "Unknown empty tag.";
pub(crate) const MSG_UNKNOWN_TAG_OPENING: &str = "Unknown tag opening.";
pub(crate) const MSG_NOT_CLOSED: &str = "Tag is not closed.";
pub(crate) const MSG_MATCHES_NOTHING: &str = "Closing tag matches nothing.";
