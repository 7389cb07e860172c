//! Shared types for the tokenizer and tree builder.

mod atom;
mod error;
mod position;
mod span;

pub use atom::{AtomId, AtomTable};
pub use error::{Diagnostic, DiagnosticKind};
pub(crate) use error::{
    MSG_MATCHES_NOTHING, MSG_NOT_CLOSED, MSG_UNKNOWN_EMPTY_TAG, MSG_UNKNOWN_TAG_OPENING,
};
pub use position::{Position, PositionTracker};
pub use span::Span;
