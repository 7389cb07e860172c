//! Attribute list scanning for template opening tags.

use memchr::memchr;

use super::normalize::unescape_xml;

/// One `name="value"` pair as written in an opening tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawAttribute {
    /// Lowercased prefix, empty when the name has no `:`.
    pub prefix: String,
    /// Lowercased local name.
    pub local: String,
    /// Value with the five XML references unescaped.
    pub value: String,
}

impl RawAttribute {
    /// Lowercased name as written, `prefix:local` or `local`.
    pub fn qualified_name(&self) -> String {
        if self.prefix.is_empty() {
            self.local.clone()
        } else {
            format!("{}:{}", self.prefix, self.local)
        }
    }
}

/// Result of scanning the rest of an opening tag.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct TagTail {
    pub attributes: Vec<RawAttribute>,
    pub self_closing: bool,
    /// Offset just past the closing `>`.
    pub end: usize,
}

pub(crate) fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

pub(crate) fn scan_name(bytes: &[u8], start: usize) -> usize {
    let mut j = start;
    while j < bytes.len() && is_name_byte(bytes[j]) {
        j += 1;
    }
    j
}

fn skip_whitespace(bytes: &[u8], mut k: usize) -> usize {
    while k < bytes.len() && bytes[k].is_ascii_whitespace() {
        k += 1;
    }
    k
}

/// Scan attributes and the tag terminator starting right after the tag name.
///
/// Every attribute must be preceded by whitespace and carry a quoted value.
/// Anything else makes the whole tag malformed (`None`), and the caller falls
/// back to literal text.
pub(crate) fn scan_tag_tail(input: &str, mut k: usize) -> Option<TagTail> {
    let bytes = input.as_bytes();
    let mut attributes = Vec::new();
    loop {
        let before_ws = k;
        k = skip_whitespace(bytes, k);
        match bytes.get(k)? {
            b'>' => {
                return Some(TagTail {
                    attributes,
                    self_closing: false,
                    end: k + 1,
                });
            }
            b'/' => {
                if bytes.get(k + 1) == Some(&b'>') {
                    return Some(TagTail {
                        attributes,
                        self_closing: true,
                        end: k + 2,
                    });
                }
                return None;
            }
            _ => {}
        }
        if k == before_ws {
            return None;
        }

        let name_start = k;
        let mut name_end = scan_name(bytes, k);
        if name_end == name_start {
            return None;
        }
        let mut colon = None;
        if bytes.get(name_end) == Some(&b':') {
            let local_end = scan_name(bytes, name_end + 1);
            if local_end == name_end + 1 {
                return None;
            }
            colon = Some(name_end);
            name_end = local_end;
        }
        let (prefix, local) = match colon {
            Some(c) => (&input[name_start..c], &input[c + 1..name_end]),
            None => ("", &input[name_start..name_end]),
        };

        k = skip_whitespace(bytes, name_end);
        if bytes.get(k) != Some(&b'=') {
            return None;
        }
        k = skip_whitespace(bytes, k + 1);
        let quote = *bytes.get(k)?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        let value_start = k + 1;
        let value_len = memchr(quote, &bytes[value_start..])?;
        let value_end = value_start + value_len;
        debug_assert!(input.is_char_boundary(value_start));
        debug_assert!(input.is_char_boundary(value_end));

        attributes.push(RawAttribute {
            prefix: prefix.to_ascii_lowercase(),
            local: local.to_ascii_lowercase(),
            value: unescape_xml(&input[value_start..value_end]).into_owned(),
        });
        k = value_end + 1;
    }
}
