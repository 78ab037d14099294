//! Display sanitizer for captured request text.
//!
//! Viewers insert each pushed line straight into an HTML page, so captured
//! data must come out as inert text: markup delimiters, quotes and template
//! braces are replaced with character references. An `&` that already starts
//! a well-formed character reference is left alone, which makes the output a
//! fixed point: sanitizing sanitized text returns it unchanged.

use thiserror::Error;

/// Longest named reference we accept as already-escaped (`&CounterClockwiseContourIntegral;`).
const MAX_NAMED_REF: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    /// Control characters (other than tab, LF, CR) are not valid HTML text.
    #[error("control character U+{codepoint:04X} at byte {offset}")]
    ControlCharacter { offset: usize, codepoint: u32 },
}

/// Convert arbitrary captured text into a string safe to render as HTML text.
pub fn sanitize(raw: &str) -> Result<String, SanitizeError> {
    let mut out = String::with_capacity(raw.len() + raw.len() / 8);

    for (offset, c) in raw.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            '&' if is_char_reference(&raw[offset + 1..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c.is_control() => {
                return Err(SanitizeError::ControlCharacter {
                    offset,
                    codepoint: c as u32,
                })
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

/// True when `rest` (the text right after an `&`) begins a complete
/// character reference: `name;`, `#digits;` or `#xhex;`.
fn is_char_reference(rest: &str) -> bool {
    let bytes = rest.as_bytes();

    let (body, max, valid): (&[u8], usize, fn(&u8) -> bool) = match bytes {
        [b'#', b'x' | b'X', tail @ ..] => (tail, 6, u8::is_ascii_hexdigit),
        [b'#', tail @ ..] => (tail, 7, u8::is_ascii_digit),
        [first, ..] if first.is_ascii_alphabetic() => {
            (bytes, MAX_NAMED_REF, u8::is_ascii_alphanumeric)
        }
        _ => return false,
    };

    let len = body.iter().take_while(|&b| valid(b)).count();
    (1..=max).contains(&len) && body.get(len) == Some(&b';')
}
