//! Template compiler front end: tokenizer and tree builder for a tag
//! vocabulary embedded in XML-like markup.
//!
//! ```
//! use template::{ParserConfig, Parser, standard_registry};
//!
//! let registry = standard_registry();
//! let parser = Parser::new(ParserConfig::default(), &registry);
//! let parsed = parser.parse("<ten:if expr=\"a\">Hi &ten.name;</ten:if>");
//! assert!(parsed.diagnostics.is_empty());
//! ```

pub mod builtin;
pub mod config;
pub mod namespace;
pub mod perf_fixtures;
pub mod registry;
pub mod tokenizer;
pub mod tree_builder;
#[cfg(any(test, feature = "tree-snapshot"))]
pub mod tree_snapshot;

mod shared;

pub use crate::builtin::standard_registry;
pub use crate::config::{ConfigError, ParserConfig};
pub use crate::namespace::{NamespaceScopes, ScopeId};
pub use crate::registry::{
    AttrKind, AttrSchema, HookContext, HookOutcome, ParseHook, TagDescriptor, TagKind,
    TagRegistry, TagRegistryBuilder,
};
pub use crate::shared::{
    AtomId, AtomTable, Diagnostic, DiagnosticKind, Position, PositionTracker, Span,
};
pub use crate::tokenizer::{Token, TokenKind, TokenStream, Tokenizer, tokenize};
pub use crate::tree_builder::{
    ArenaFull, AttrValue, Attribute, Attributes, Document, Element, Node, NodeId, NodeKind, Parsed,
    Parser, parse,
};
