//! Text normalization rules shared by the tokenizer and tree builder.
//!
//! - Line-break absorption: a recognized construct swallows at most one line
//!   break directly before it, together with the horizontal whitespace between
//!   that break and the construct. Indentation around tags therefore never
//!   reaches literal output.
//! - XML character references: the five predefined references are unescaped
//!   in attribute values and text.
//! - Indentation stripping: text nested `depth` template tags deep loses the
//!   indentation those tags introduced.

use std::borrow::Cow;

use memchr::memchr;

fn is_horizontal_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | 0x0B | 0x0C)
}

/// Start of a match whose construct begins at `start`, after absorbing one
/// preceding line break and its trailing horizontal whitespace.
///
/// Never returns an offset below `floor` (the end of the previous match).
/// Horizontal whitespace that is not preceded by a line break is not absorbed.
pub fn absorb_leading_break(source: &str, floor: usize, start: usize) -> usize {
    let bytes = source.as_bytes();
    debug_assert!(floor <= start && start <= bytes.len());
    let mut j = start;
    while j > floor && is_horizontal_space(bytes[j - 1]) {
        j -= 1;
    }
    if j == floor {
        return start;
    }
    match bytes[j - 1] {
        b'\n' => {
            if j - 1 > floor && bytes[j - 2] == b'\r' {
                j - 2
            } else {
                j - 1
            }
        }
        b'\r' => j - 1,
        _ => start,
    }
}

/// Unescape `&amp;`, `&lt;`, `&gt;`, `&quot;` and `&apos;`.
///
/// Single pass: `&amp;lt;` becomes `&lt;`, not `<`. Any other `&` sequence is
/// left untouched.
pub fn unescape_xml(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let Some(first) = memchr(b'&', bytes) else {
        return Cow::Borrowed(text);
    };
    let mut out = String::with_capacity(text.len());
    let mut copy_start = 0;
    let mut i = first;
    while i < bytes.len() {
        let Some(rel) = memchr(b'&', &bytes[i..]) else {
            break;
        };
        let at = i + rel;
        let rest = &text[at..];
        let replacement = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ]
        .into_iter()
        .find(|(reference, _)| rest.starts_with(reference));
        match replacement {
            Some((reference, ch)) => {
                out.push_str(&text[copy_start..at]);
                out.push(ch);
                i = at + reference.len();
                copy_start = i;
            }
            None => i = at + 1,
        }
    }
    if copy_start == 0 {
        return Cow::Borrowed(text);
    }
    out.push_str(&text[copy_start..]);
    Cow::Owned(out)
}

/// Remove the indentation owned by `depth` enclosing template tags from the
/// start of every line after the first.
///
/// A line loses exactly `depth * tabs_per_level` leading tabs, or failing
/// that exactly `depth * indent` leading spaces. Lines indented less keep
/// their whitespace.
pub fn strip_indent(
    text: &str,
    depth: usize,
    indent: usize,
    tabs_per_level: usize,
) -> Cow<'_, str> {
    if depth == 0 || text.is_empty() {
        return Cow::Borrowed(text);
    }
    let tabs = depth.saturating_mul(tabs_per_level);
    let spaces = depth.saturating_mul(indent);
    let bytes = text.as_bytes();
    let mut out: Option<String> = None;
    let mut copy_start = 0;
    let mut i = 0;
    while let Some(rel) = memchr::memchr2(b'\n', b'\r', &bytes[i..]) {
        let at = i + rel;
        let line_start = if bytes[at] == b'\r' && bytes.get(at + 1) == Some(&b'\n') {
            at + 2
        } else {
            at + 1
        };
        let remove = if run_length(bytes, line_start, b'\t') >= tabs {
            tabs
        } else if run_length(bytes, line_start, b' ') >= spaces {
            spaces
        } else {
            0
        };
        if remove > 0 {
            let buf = out.get_or_insert_with(|| String::with_capacity(text.len()));
            buf.push_str(&text[copy_start..line_start]);
            copy_start = line_start + remove;
        }
        i = line_start;
        if i >= bytes.len() {
            break;
        }
    }
    match out {
        Some(mut buf) => {
            buf.push_str(&text[copy_start..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(text),
    }
}

fn run_length(bytes: &[u8], start: usize, byte: u8) -> usize {
    bytes[start.min(bytes.len())..]
        .iter()
        .take_while(|b| **b == byte)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorbs_lf_and_indentation() {
        let src = "text\n    <ten:if>";
        assert_eq!(absorb_leading_break(src, 0, 9), 4);
    }

    #[test]
    fn absorbs_crlf_as_one_break() {
        let src = "text\r\n\t<ten:if>";
        assert_eq!(absorb_leading_break(src, 0, 7), 4);
    }

    #[test]
    fn absorbs_lone_cr() {
        let src = "text\r  <ten:if>";
        assert_eq!(absorb_leading_break(src, 0, 7), 4);
    }

    #[test]
    fn absorbs_only_one_break() {
        let src = "text\n\n  <ten:if>";
        assert_eq!(absorb_leading_break(src, 0, 8), 5);
    }

    #[test]
    fn keeps_inline_spaces_without_break() {
        let src = "text   <ten:if>";
        assert_eq!(absorb_leading_break(src, 0, 7), 7);
    }

    #[test]
    fn never_reaches_past_floor() {
        let src = "<ten:a/>\n  <ten:b/>";
        assert_eq!(absorb_leading_break(src, 8, 11), 8);
        assert_eq!(absorb_leading_break(src, 9, 11), 11);
    }

    #[test]
    fn crlf_split_by_floor_only_absorbs_lf() {
        let src = "ab\r\n<x>";
        assert_eq!(absorb_leading_break(src, 3, 4), 3);
    }

    #[test]
    fn unescapes_the_five_references_once() {
        assert_eq!(
            unescape_xml("&lt;a href=&quot;x&quot;&gt; &amp;&apos;"),
            "<a href=\"x\"> &'"
        );
        assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
        assert_eq!(unescape_xml("&nbsp; & &ten.x;"), "&nbsp; & &ten.x;");
        assert!(matches!(unescape_xml("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn strips_depth_owned_spaces() {
        let text = "\n    hello\n      world\n  short";
        assert_eq!(strip_indent(text, 2, 2, 1), "\nhello\n  world\n  short");
    }

    #[test]
    fn strips_depth_owned_tabs() {
        let text = "\n\t\tvalue\r\n\t\t\tdeeper";
        assert_eq!(strip_indent(text, 2, 2, 1), "\nvalue\r\n\tdeeper");
    }

    #[test]
    fn depth_zero_is_untouched() {
        let text = "\n    hello";
        assert!(matches!(strip_indent(text, 0, 2, 1), Cow::Borrowed(_)));
    }
}
