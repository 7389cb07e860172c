//! Single-pass scanner for template markup embedded in arbitrary text.
//!
//! Only constructs carrying the configured namespace prefix are recognized:
//! `&ns.a.b;` entity references, `<ns:tag ...>` / `<ns:tag .../>` opening tags
//! and `</ns:tag>` closing tags. Comments and CDATA blocks are recognized so
//! they can be kept or dropped as a unit. Everything else is literal text that
//! the tree builder reads back from the source between token spans.
//!
//! The scanner never fails. A construct that starts like markup but does not
//! complete falls through as literal text and scanning resumes one byte later.
//!
//! Offsets in every [`Token`] are byte offsets into the original source
//! (prolog included), so they feed [`crate::PositionTracker`] directly.

mod attrs;
pub mod normalize;
mod prolog;


pub use attrs::RawAttribute;
pub use prolog::prolog_len;

use memchr::memchr2;

use crate::config::ParserConfig;
use crate::shared::Span;
use attrs::{scan_name, scan_tag_tail};

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";
const CDATA_START: &str = "<![CDATA[";
const CDATA_END: &str = "]]>";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// `&ns.a.b;`, with `name` holding the dotted path after the namespace.
    Entity { name: String },
    /// Ordinary comment; `text` excludes the delimiters.
    Comment { text: String },
    /// A whole `<![CDATA[...]]>` block, delimiters included.
    CData { raw: String },
    EndTag {
        prefix: String,
        name: String,
    },
    StartTag {
        prefix: String,
        name: String,
        attributes: Vec<RawAttribute>,
        self_closing: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Whole match, including an absorbed leading line break.
    pub span: Span,
    /// Offset of the construct itself (`<` or `&`).
    pub start: usize,
}

impl TokenKind {
    /// Tag name as written in diagnostics, `prefix:name`.
    pub fn tag_name(&self) -> Option<String> {
        match self {
            TokenKind::StartTag { prefix, name, .. } | TokenKind::EndTag { prefix, name } => {
                Some(format!("{prefix}:{name}"))
            }
            _ => None,
        }
    }
}

/// Tokens for one source, in document order.
#[derive(Clone, Debug)]
pub struct TokenStream {
    source: String,
    prolog_end: usize,
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The leading XML declaration/doctype, if any (trailing whitespace included).
    pub fn prolog(&self) -> Option<&str> {
        (self.prolog_end > 0).then(|| &self.source[..self.prolog_end])
    }

    /// Offset where template content starts.
    pub fn body_start(&self) -> usize {
        self.prolog_end
    }

    /// Raw text of a token's whole match.
    pub fn raw(&self, token: &Token) -> &str {
        token.span.slice(&self.source)
    }

    /// Literal text between two offsets (the previous match end and the next
    /// match start).
    pub fn text_between(&self, start: usize, end: usize) -> &str {
        self.source.get(start..end).unwrap_or("")
    }
}

/// Configured scanner. Cheap to build; holds no per-source state.
#[derive(Clone, Debug)]
pub struct Tokenizer {
    namespace: String,
    parse_cdata: bool,
}

impl Tokenizer {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            namespace: config.namespace.to_ascii_lowercase(),
            parse_cdata: config.parse_cdata,
        }
    }

    pub fn tokenize(&self, source: &str) -> TokenStream {
        let prolog_end = prolog_len(source);
        let bytes = source.as_bytes();
        let mut tokens = Vec::new();
        let mut last_end = prolog_end;
        let mut i = prolog_end;

        // Slices are only cut at ASCII delimiters, so every offset stays on a
        // char boundary.
        while i < bytes.len() {
            let Some(rel) = memchr2(b'<', b'&', &bytes[i..]) else {
                break;
            };
            let at = i + rel;
            let matched = if bytes[at] == b'&' {
                self.scan_entity(source, at)
            } else {
                self.scan_markup(source, at)
            };
            let Some((kind, end)) = matched else {
                i = at + 1;
                continue;
            };
            let span_start = if matches!(kind, TokenKind::CData { .. }) {
                at
            } else {
                normalize::absorb_leading_break(source, last_end, at)
            };
            #[cfg(any(test, feature = "debug-stats"))]
            log::trace!(
                target: "template.tokenizer",
                "token {:?} span={}..{}",
                kind,
                span_start,
                end
            );
            tokens.push(Token {
                kind,
                span: Span::new(span_start, end),
                start: at,
            });
            last_end = end;
            i = end;
        }

        TokenStream {
            source: source.to_string(),
            prolog_end,
            tokens,
        }
    }

    /// `ns:` immediately at `k` (ASCII case-insensitive). Returns the offset
    /// past the colon.
    fn match_prefix(&self, bytes: &[u8], k: usize) -> Option<usize> {
        let ns = self.namespace.as_bytes();
        let end = k + ns.len();
        if end < bytes.len() && bytes[k..end].eq_ignore_ascii_case(ns) && bytes[end] == b':' {
            Some(end + 1)
        } else {
            None
        }
    }

    fn scan_entity(&self, source: &str, at: usize) -> Option<(TokenKind, usize)> {
        let bytes = source.as_bytes();
        let ns = self.namespace.as_bytes();
        let mut k = at + 1;
        if k + ns.len() >= bytes.len() || !bytes[k..k + ns.len()].eq_ignore_ascii_case(ns) {
            return None;
        }
        k += ns.len();
        let path_start = k + 1;
        loop {
            if bytes.get(k) != Some(&b'.') {
                return None;
            }
            let ident_end = scan_name(bytes, k + 1);
            if ident_end == k + 1 {
                return None;
            }
            k = ident_end;
            if bytes.get(k) == Some(&b';') {
                let name = source[path_start..k].to_string();
                return Some((TokenKind::Entity { name }, k + 1));
            }
        }
    }

    fn scan_markup(&self, source: &str, at: usize) -> Option<(TokenKind, usize)> {
        let rest = &source[at..];
        if rest.starts_with(COMMENT_START) {
            return scan_comment(source, at);
        }
        if rest.starts_with(CDATA_START) {
            if self.parse_cdata {
                return None;
            }
            let close = rest.find(CDATA_END)?;
            let end = at + close + CDATA_END.len();
            return Some((
                TokenKind::CData {
                    raw: source[at..end].to_string(),
                },
                end,
            ));
        }
        let bytes = source.as_bytes();
        if bytes.get(at + 1) == Some(&b'/') {
            return self.scan_end_tag(source, at + 2);
        }
        self.scan_start_tag(source, at + 1)
    }

    fn scan_qualified_name<'a>(
        &self,
        source: &'a str,
        k: usize,
    ) -> Option<(&'a str, &'a str, usize)> {
        let bytes = source.as_bytes();
        let k = skip_whitespace(bytes, k);
        let name_start = self.match_prefix(bytes, k)?;
        let name_end = scan_name(bytes, name_start);
        if name_end == name_start {
            return None;
        }
        Some((&source[k..name_start - 1], &source[name_start..name_end], name_end))
    }

    fn scan_end_tag(&self, source: &str, k: usize) -> Option<(TokenKind, usize)> {
        let bytes = source.as_bytes();
        let (prefix, name, name_end) = self.scan_qualified_name(source, k)?;
        let close = skip_whitespace(bytes, name_end);
        if bytes.get(close) != Some(&b'>') {
            return None;
        }
        Some((
            TokenKind::EndTag {
                prefix: prefix.to_ascii_lowercase(),
                name: name.to_ascii_lowercase(),
            },
            close + 1,
        ))
    }

    fn scan_start_tag(&self, source: &str, k: usize) -> Option<(TokenKind, usize)> {
        let (prefix, name, name_end) = self.scan_qualified_name(source, k)?;
        let tail = scan_tag_tail(source, name_end)?;
        Some((
            TokenKind::StartTag {
                prefix: prefix.to_ascii_lowercase(),
                name: name.to_ascii_lowercase(),
                attributes: tail.attributes,
                self_closing: tail.self_closing,
            },
            tail.end,
        ))
    }
}

/// Ordinary comments only. A conditional comment opener (`<!--[if ...]>`) is
/// not a match, so it and its closer stay literal while the markup between
/// them is still scanned.
fn scan_comment(source: &str, at: usize) -> Option<(TokenKind, usize)> {
    let body_start = at + COMMENT_START.len();
    let body = &source[body_start..];
    if is_conditional_opener(body) {
        return None;
    }
    let close = body.find(COMMENT_END)?;
    Some((
        TokenKind::Comment {
            text: body[..close].to_string(),
        },
        body_start + close + COMMENT_END.len(),
    ))
}

fn is_conditional_opener(body: &str) -> bool {
    let Some(condition) = body.strip_prefix("[if ") else {
        return false;
    };
    match condition.find(']') {
        Some(close) => close > 0 && condition[close + 1..].starts_with('>'),
        None => false,
    }
}

fn skip_whitespace(bytes: &[u8], mut k: usize) -> usize {
    while k < bytes.len() && bytes[k].is_ascii_whitespace() {
        k += 1;
    }
    k
}

/// Tokenize `source` with the scanner settings of `config`.
pub fn tokenize(source: &str, config: &ParserConfig) -> TokenStream {
    Tokenizer::new(config).tokenize(source)
}
