//! Newline-terminated text framing.
//!
//! Wire format:
//! ```text
//! <utf-8 text without line breaks>\n
//! ```
//! Readers also accept `\r\n`; the terminator is never part of the record.

use thiserror::Error;

/// Terminator appended to every outbound record.
pub const LINE_TERMINATOR: char = '\n';

/// Errors that can occur while framing a record.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The record contains a line break, which would split it into two
    /// records on the wire.
    #[error("record contains an embedded line terminator at byte {0}")]
    EmbeddedTerminator(usize),
}

/// Frames `text` as one wire record.
///
/// # Errors
///
/// Returns [`ProtocolError::EmbeddedTerminator`] if `text` contains `\n` or
/// `\r`.
///
/// # Examples
///
/// ```rust
/// use pairlink_core::encode_line;
///
/// assert_eq!(encode_line("$ConReq$").unwrap(), "$ConReq$\n");
/// assert!(encode_line("two\nlines").is_err());
/// ```
pub fn encode_line(text: &str) -> Result<String, ProtocolError> {
    if let Some(pos) = text.find(['\n', '\r']) {
        return Err(ProtocolError::EmbeddedTerminator(pos));
    }
    let mut framed = String::with_capacity(text.len() + 1);
    framed.push_str(text);
    framed.push(LINE_TERMINATOR);
    Ok(framed)
}

/// Strips a trailing `\n` or `\r\n` from a raw record read off the stream.
///
/// A record that reached end-of-stream without a terminator is returned
/// unchanged.
pub fn decode_line(raw: &str) -> &str {
    let without_lf = raw.strip_suffix('\n').unwrap_or(raw);
    without_lf.strip_suffix('\r').unwrap_or(without_lf)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_line_appends_single_newline() {
        assert_eq!(encode_line("hello").unwrap(), "hello\n");
    }

    #[test]
    fn test_encode_line_allows_empty_record() {
        assert_eq!(encode_line("").unwrap(), "\n");
    }

    #[test]
    fn test_encode_line_rejects_embedded_newline() {
        assert_eq!(
            encode_line("ab\ncd"),
            Err(ProtocolError::EmbeddedTerminator(2))
        );
    }

    #[test]
    fn test_encode_line_rejects_carriage_return() {
        assert!(matches!(
            encode_line("x\r"),
            Err(ProtocolError::EmbeddedTerminator(1))
        ));
    }

    #[test]
    fn test_decode_line_strips_lf_and_crlf() {
        assert_eq!(decode_line("$ConAck$\n"), "$ConAck$");
        assert_eq!(decode_line("$ConAck$\r\n"), "$ConAck$");
    }

    #[test]
    fn test_decode_line_keeps_unterminated_tail() {
        assert_eq!(decode_line("partial"), "partial");
    }

    #[test]
    fn test_decode_line_strips_only_one_terminator() {
        assert_eq!(decode_line("a\n\n"), "a\n");
    }
}
