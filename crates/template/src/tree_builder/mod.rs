//! Template tree builder.
//!
//! Consumes a [`TokenStream`] and builds a [`Document`]. The builder keeps an
//! explicit stack of open elements; literal text between tokens becomes
//! `Text` children of the current element. Structural errors never stop the
//! build:
//!
//! - unknown tags are reported and discarded together with their content;
//!   tags inside discarded content are still resolved and checked;
//! - a close tag matching the element below the current one closes both,
//!   splicing the unclosed element's children into its parent;
//! - a close tag matching neither is reported and ignored;
//! - elements still open at end of input are reported and kept as-is.

mod node;
mod stack;


pub use node::{
    ArenaFull, AttrValue, Attribute, Attributes, Descendants, Document, Element, Node, NodeId,
    NodeKind,
};

use crate::config::ParserConfig;
use crate::namespace::declared_prefix;
use crate::registry::{AttrKind, HookContext, HookOutcome, TagDescriptor, TagRegistry};
use crate::shared::{
    Diagnostic, DiagnosticKind, MSG_MATCHES_NOTHING, MSG_NOT_CLOSED, MSG_UNKNOWN_EMPTY_TAG,
    MSG_UNKNOWN_TAG_OPENING, PositionTracker,
};
use crate::tokenizer::{RawAttribute, Token, TokenKind, TokenStream, Tokenizer, normalize};
use stack::{OpenElement, OpenElementsStack};

/// Result of parsing one source.
#[derive(Clone, Debug)]
pub struct Parsed {
    pub document: Document,
    /// Configuration diagnostics first, then parse diagnostics in source order.
    pub diagnostics: Vec<Diagnostic>,
    /// Deepest nesting of open template tags seen.
    pub max_depth: usize,
}

impl Parsed {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }
}

/// Configured parser. The configuration is validated once at construction;
/// its diagnostics are repeated at the head of every [`Parsed`].
#[derive(Debug)]
pub struct Parser<'r> {
    config: ParserConfig,
    registry: &'r TagRegistry,
    tokenizer: Tokenizer,
    config_diagnostics: Vec<Diagnostic>,
}

impl<'r> Parser<'r> {
    pub fn new(mut config: ParserConfig, registry: &'r TagRegistry) -> Self {
        let config_diagnostics = config.validate();
        let tokenizer = Tokenizer::new(&config);
        Self {
            config,
            registry,
            tokenizer,
            config_diagnostics,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn config_diagnostics(&self) -> &[Diagnostic] {
        &self.config_diagnostics
    }

    pub fn parse(&self, source: &str) -> Parsed {
        let stream = self.tokenizer.tokenize(source);
        self.build(&stream)
    }

    /// Build a tree from an already tokenized source.
    pub fn build(&self, stream: &TokenStream) -> Parsed {
        let mut builder = TreeBuilder::new(&self.config, self.registry, stream);
        builder.diagnostics = self.config_diagnostics.clone();
        builder.run();
        Parsed {
            max_depth: builder.stack.max_depth(),
            document: builder.document,
            diagnostics: builder.diagnostics,
        }
    }
}

/// Parse `source` with a one-off [`Parser`].
pub fn parse(source: &str, config: ParserConfig, registry: &TagRegistry) -> Parsed {
    Parser::new(config, registry).parse(source)
}

struct TreeBuilder<'a> {
    config: &'a ParserConfig,
    registry: &'a TagRegistry,
    stream: &'a TokenStream,
    positions: PositionTracker,
    document: Document,
    stack: OpenElementsStack,
    diagnostics: Vec<Diagnostic>,
    /// Set once the node arena refused a node; reported a single time.
    arena_full: bool,
}

impl<'a> TreeBuilder<'a> {
    fn new(config: &'a ParserConfig, registry: &'a TagRegistry, stream: &'a TokenStream) -> Self {
        Self {
            config,
            registry,
            stream,
            positions: PositionTracker::new(stream.source()),
            document: Document::new(),
            stack: OpenElementsStack::default(),
            diagnostics: Vec::new(),
            arena_full: false,
        }
    }

    fn run(&mut self) {
        let stream = self.stream;
        if let Some(prolog) = stream.prolog() {
            self.document.set_prolog(prolog.to_string());
            if !self.config.remove_prolog {
                let root = self.document.root();
                self.append(
                    root,
                    NodeKind::Text {
                        value: prolog.to_string(),
                    },
                );
            }
        }

        let mut last_end = stream.body_start();
        for token in stream.iter() {
            self.flush_text(last_end, token.span.start);
            self.process(token);
            last_end = token.span.end;
        }
        self.flush_text(last_end, stream.source().len());
        self.close_all_at_eof();
    }

    fn process(&mut self, token: &Token) {
        match &token.kind {
            TokenKind::Entity { name } => {
                if let Some(parent) = self.attach_target() {
                    self.append(parent, NodeKind::Entity { name: name.clone() });
                }
            }
            TokenKind::Comment { text } => {
                if self.config.save_comments
                    && let Some(parent) = self.attach_target()
                {
                    self.append(parent, NodeKind::Comment { value: text.clone() });
                }
            }
            TokenKind::CData { raw } => {
                if let Some(parent) = self.attach_target() {
                    self.append(parent, NodeKind::Text { value: raw.clone() });
                }
            }
            TokenKind::StartTag {
                prefix,
                name,
                attributes,
                self_closing,
            } => self.start_tag(token, prefix, name, attributes, *self_closing),
            TokenKind::EndTag { prefix, name } => self.end_tag(token, prefix, name),
        }
    }

    /// Node new content attaches to; `None` inside a discarded element.
    fn attach_target(&self) -> Option<NodeId> {
        match self.stack.current() {
            None => Some(self.document.root()),
            Some(entry) => entry.node,
        }
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> Option<NodeId> {
        match self.document.append(parent, kind) {
            Ok(id) => Some(id),
            Err(full) => {
                self.report_arena_full(full);
                None
            }
        }
    }

    fn report_arena_full(&mut self, full: ArenaFull) {
        if !self.arena_full {
            self.arena_full = true;
            self.record(Diagnostic::new(DiagnosticKind::TooManyNodes, full.to_string()));
        }
    }

    fn flush_text(&mut self, start: usize, end: usize) {
        let raw = self.stream.text_between(start, end);
        if raw.is_empty() {
            return;
        }
        let Some(parent) = self.attach_target() else {
            return;
        };
        let unescaped = normalize::unescape_xml(raw);
        let value = if self.config.strip_indent {
            normalize::strip_indent(
                &unescaped,
                self.stack.depth(),
                self.config.indent,
                self.config.tabs_per_level(),
            )
            .into_owned()
        } else {
            unescaped.into_owned()
        };
        if !value.is_empty() {
            self.append(parent, NodeKind::Text { value });
        }
    }

    fn start_tag(
        &mut self,
        token: &Token,
        prefix: &str,
        name: &str,
        attributes: &[RawAttribute],
        self_closing: bool,
    ) {
        let tag_name = format!("{prefix}:{name}");
        let name_atom = self.document.atoms_mut().intern_ascii_folded(name);
        let position = self.positions.construct_position(token.span.start);
        let discarded = OpenElement {
            node: None,
            name: name_atom,
            tag_name: tag_name.clone(),
            offset: token.start,
        };

        let registry = self.registry;
        let Some(descriptor) = registry.get(name) else {
            let (kind, message) = if self_closing {
                (DiagnosticKind::UnknownEmptyTag, MSG_UNKNOWN_EMPTY_TAG)
            } else {
                (DiagnosticKind::UnknownTagOpening, MSG_UNKNOWN_TAG_OPENING)
            };
            let diagnostic = Diagnostic::new(kind, message).with_tag(tag_name);
            self.record(diagnostic.at(position));
            if !self_closing {
                self.stack.push(discarded);
            }
            return;
        };

        let attrs = literal_attributes(attributes);

        // Inside discarded content nothing is built, but the tag is still
        // checked against its schema.
        let Some(parent) = self.attach_target() else {
            if let Err((kind, message)) =
                check_attributes(descriptor, &attrs, &self.config.namespace)
            {
                let diagnostic = Diagnostic::new(kind, message).with_tag(tag_name);
                self.record(diagnostic.at(position));
            }
            if !self_closing {
                self.stack.push(discarded);
            }
            return;
        };

        let prefix_atom = self.document.atoms_mut().intern_ascii_folded(prefix);
        let parent_scope = self
            .document
            .element(parent)
            .map(|e| e.scope)
            .unwrap_or_else(|| self.document.scopes().root());
        let declarations: Vec<(String, String)> = attributes
            .iter()
            .filter_map(|a| declared_prefix(&a.prefix, &a.local).map(|p| (p, a.value.clone())))
            .collect();
        let scope = self.document.scopes_mut().derive(parent_scope, declarations);
        let namespace = self
            .document
            .scopes()
            .resolve(scope, prefix)
            .map(str::to_string);

        let element = self.append(
            parent,
            NodeKind::Element(Element {
                name: name_atom,
                prefix: prefix_atom,
                namespace,
                scope,
                attributes: attrs,
                children: Vec::new(),
                offset: token.start,
                position,
                self_closing,
                force_closed: false,
            }),
        );
        let Some(node) = element else {
            if !self_closing {
                self.stack.push(discarded);
            }
            return;
        };

        if self_closing {
            self.close_element(node);
        } else {
            self.stack.push(OpenElement {
                node: Some(node),
                name: name_atom,
                tag_name,
                offset: token.start,
            });
        }
    }

    fn end_tag(&mut self, token: &Token, prefix: &str, name: &str) {
        let atom = self.document.atoms_mut().intern_ascii_folded(name);

        if self.stack.current().is_some_and(|e| e.name == atom) {
            if let Some(node) = self.stack.pop().and_then(|e| e.node) {
                self.close_element(node);
            }
            return;
        }

        if self.stack.parent_of_current().is_some_and(|e| e.name == atom) {
            if let Some(skipped) = self.stack.pop() {
                log::debug!(
                    target: "template.tree_builder",
                    "closing {} implicitly before {prefix}:{name}",
                    skipped.tag_name
                );
                self.report_not_closed(&skipped);
                if let Some(node) = skipped.node {
                    self.document.unwrap_into_parent(node);
                }
            }
            if let Some(node) = self.stack.pop().and_then(|e| e.node) {
                self.close_element(node);
            }
            return;
        }

        let position = self.positions.construct_position(token.span.start);
        self.record(
            Diagnostic::new(DiagnosticKind::ClosingTagMatchesNothing, MSG_MATCHES_NOTHING)
                .with_tag(format!("{prefix}:{name}"))
                .at(position),
        );
    }

    fn close_all_at_eof(&mut self) {
        while let Some(entry) = self.stack.pop() {
            self.report_not_closed(&entry);
            if let Some(element) = entry.node.and_then(|n| self.document.element_mut(n)) {
                element.force_closed = true;
            }
        }
    }

    fn report_not_closed(&mut self, entry: &OpenElement) {
        let mut diagnostic = Diagnostic::new(DiagnosticKind::TagNotClosed, MSG_NOT_CLOSED)
            .with_tag(entry.tag_name.clone())
            .at(self.positions.position(entry.offset));
        if let Some(node) = entry.node {
            diagnostic = diagnostic.on_node(node);
        }
        self.record(diagnostic);
    }

    /// Close-time processing: schema defaults and checks, then the hook.
    /// A node failing its schema is dropped and its hook never runs.
    fn close_element(&mut self, node: NodeId) {
        if self.apply_schema(node) {
            self.run_hook(node);
        }
    }

    fn apply_schema(&mut self, node: NodeId) -> bool {
        let registry = self.registry;
        let Some(descriptor) = self.document.name(node).and_then(|n| registry.get(n)) else {
            return true;
        };
        let Some(element) = self.document.element(node) else {
            return true;
        };
        let position = element.position;

        match check_attributes(descriptor, &element.attributes, &self.config.namespace) {
            Ok(defaults) => {
                if let Some(element) = self.document.element_mut(node) {
                    for (name, value) in defaults {
                        element.attributes.set(name, AttrValue::Literal(value));
                    }
                }
                true
            }
            Err((kind, message)) => {
                let mut diagnostic = Diagnostic::new(kind, message).at(position).on_node(node);
                if let Some(tag_name) = self.document.qualified_name(node) {
                    diagnostic = diagnostic.with_tag(tag_name);
                }
                self.record(diagnostic);
                self.document.detach(node);
                false
            }
        }
    }

    fn run_hook(&mut self, node: NodeId) {
        let registry = self.registry;
        let Some(hook) = self
            .document
            .name(node)
            .and_then(|n| registry.get(n))
            .and_then(|d| d.hook.as_ref())
        else {
            return;
        };
        let mut cx = HookContext::new(&self.document, node, self.config);
        let outcome = hook.parse(&mut cx);
        let attributes = cx.into_attributes();
        if let Some(element) = self.document.element_mut(node) {
            element.attributes = attributes;
        }

        match outcome {
            HookOutcome::Keep => {}
            HookOutcome::Replace(text) => {
                if text.is_empty() {
                    self.document.detach(node);
                } else if let Err(full) = self
                    .document
                    .replace_with(node, NodeKind::Text { value: text })
                {
                    self.report_arena_full(full);
                }
            }
            HookOutcome::BindToParentAttribute(attribute) => {
                let parent = self
                    .document
                    .parent(node)
                    .filter(|p| self.document.element(*p).is_some());
                match parent {
                    Some(parent) => {
                        self.document.detach(node);
                        if let Some(element) = self.document.element_mut(parent) {
                            element
                                .attributes
                                .set(attribute, AttrValue::Template(node));
                        }
                    }
                    None => self.reject(node, "Tag must have a parent tag.".to_string()),
                }
            }
            HookOutcome::Reject(message) => self.reject(node, message),
        }
    }

    fn reject(&mut self, node: NodeId, message: String) {
        let mut diagnostic = Diagnostic::new(DiagnosticKind::Rejected, message).on_node(node);
        if let Some(element) = self.document.element(node) {
            diagnostic = diagnostic.at(element.position);
        }
        if let Some(tag_name) = self.document.qualified_name(node) {
            diagnostic = diagnostic.with_tag(tag_name);
        }
        self.record(diagnostic);
        self.document.detach(node);
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        let diagnostic = diagnostic.with_path(self.config.path.clone());
        log::warn!(
            target: "template.tree_builder",
            "{}: {}",
            diagnostic.tag_name.as_deref().unwrap_or("<template>"),
            diagnostic
        );
        self.diagnostics.push(diagnostic);
    }
}

fn literal_attributes(raw: &[RawAttribute]) -> Attributes {
    let mut attributes = Attributes::default();
    for attribute in raw {
        attributes.set(
            attribute.qualified_name(),
            AttrValue::Literal(attribute.value.clone()),
        );
    }
    attributes
}

/// Check `attributes` against a tag's schema in declaration order.
///
/// Returns the defaults to fill in, or the first problem. A required
/// attribute is never satisfied by its default.
fn check_attributes(
    descriptor: &TagDescriptor,
    attributes: &Attributes,
    namespace: &str,
) -> Result<Vec<(String, String)>, (DiagnosticKind, String)> {
    let mut defaults = Vec::new();
    for schema in &descriptor.schema {
        match attributes.get(&schema.name) {
            Some(AttrValue::Literal(value))
                if schema.kind == AttrKind::Number
                    && !has_entity_reference(value, namespace)
                    && !is_number(value) =>
            {
                return Err((
                    DiagnosticKind::InvalidNumber,
                    format!("The value of the attribute \"{}\" must be a number", schema.name),
                ));
            }
            Some(_) => {}
            None if schema.required => {
                return Err((
                    DiagnosticKind::MissingAttribute,
                    format!("Attribute \"{}\" is not defined.", schema.name),
                ));
            }
            None => {
                if let Some(default) = &schema.default {
                    defaults.push((schema.name.clone(), default.clone()));
                }
            }
        }
    }
    Ok(defaults)
}

/// Whether `value` carries an `&<namespace>.<path>;` reference, which is
/// only resolved at render time. The namespace matches case-insensitively.
fn has_entity_reference(value: &str, namespace: &str) -> bool {
    let bytes = value.as_bytes();
    let ns = namespace.as_bytes();
    memchr::memchr_iter(b'&', bytes).any(|at| {
        let rest = &bytes[at + 1..];
        let Some(after_ns) = rest.get(ns.len()..) else {
            return false;
        };
        if !rest[..ns.len()].eq_ignore_ascii_case(ns) {
            return false;
        }
        let Some((b'.', path)) = after_ns.split_first() else {
            return false;
        };
        let run = path
            .iter()
            .take_while(|&&b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
            .count();
        run > 0 && path.get(run) == Some(&b';')
    })
}

/// Numeric attribute check following JavaScript `Number()`. Blank counts as
/// zero; radix-prefixed literals and `Infinity` are numbers.
fn is_number(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    let radix = match trimmed.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &trimmed[2..];
        return !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix));
    }
    let unsigned = trimmed.strip_prefix(['+', '-']).unwrap_or(trimmed);
    if unsigned == "Infinity" {
        return true;
    }
    unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
        && trimmed.parse::<f64>().is_ok()
}
