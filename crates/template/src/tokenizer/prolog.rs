//! Leading XML declaration / doctype detection.
//!
//! The prolog is split off once before scanning and never rescanned, so a
//! doctype internal subset can carry `<` and `&` freely.

fn starts_with_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Byte length of the leading prolog, including the whitespace that follows
/// it. Returns 0 when the source has no prolog.
///
/// Accepted forms: `<?xml ...?>`, `<!DOCTYPE ...>` (optionally with an
/// internal `[...]` subset and quoted identifiers), or the declaration
/// followed by the doctype. Leading whitespace before the prolog is part of it.
pub fn prolog_len(source: &str) -> usize {
    let bytes = source.as_bytes();
    let mut i = skip_whitespace(bytes, 0);
    let mut found = false;

    if starts_with_ignore_ascii_case(&bytes[i..], b"<?xml")
        && bytes
            .get(i + 5)
            .is_some_and(|b| b.is_ascii_whitespace() || *b == b'?')
    {
        let Some(rel) = source[i..].find("?>") else {
            return 0;
        };
        i = skip_whitespace(bytes, i + rel + 2);
        found = true;
    }

    if starts_with_ignore_ascii_case(&bytes[i..], b"<!doctype") {
        if let Some(end) = doctype_end(bytes, i + b"<!doctype".len()) {
            i = skip_whitespace(bytes, end);
            found = true;
        }
    }

    if found { i } else { 0 }
}

/// Offset just past the `>` closing a doctype whose body starts at `i`.
fn doctype_end(bytes: &[u8], mut i: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut in_subset = false;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'[' => in_subset = true,
                b']' => in_subset = false,
                b'>' if !in_subset => return Some(i + 1),
                _ => {}
            },
        }
        i += 1;
    }
    None
}
