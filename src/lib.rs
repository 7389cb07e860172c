//! Server-side template compiler core.
//!
//! - [`template`]: tokenizer and tree builder turning template source into a
//!   positioned, namespace-resolved node tree with diagnostics.
//! - [`slots`]: the ordered merge tree an execution engine uses to assemble
//!   output in document order while parts of the render finish out of order.

pub use slots;
pub use template;

pub mod prelude {
    pub use slots::{
        Callback, Finalize, MergeTree, RenderSink, SharedMergeTree, SlotError, SlotHandle,
        SlotId,
    };
    pub use template::{
        AttrValue, Diagnostic, DiagnosticKind, Document, NodeId, NodeKind, Parsed, Parser,
        ParserConfig, TagRegistry, standard_registry,
    };
}
