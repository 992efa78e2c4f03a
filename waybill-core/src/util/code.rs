//! Transcript path field escaping.
//!
//! Path fields are stored percent-escaped so paths containing whitespace
//! survive the line grammar. Decode is permissive: bytes that were never
//! escaped pass through unchanged, so an unchanged line can always be
//! re-emitted verbatim.

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Everything that would break whitespace tokenization, plus `%` itself.
const ESCAPED: &AsciiSet = &CONTROLS.add(b' ').add(b'\t').add(b'%');

pub fn encode(path: &str) -> String {
    utf8_percent_encode(path, ESCAPED).to_string()
}

pub fn decode(field: &str) -> String {
    percent_decode_str(field).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_pass_through() {
        assert_eq!(encode("/etc/hosts"), "/etc/hosts");
        assert_eq!(decode("/etc/hosts"), "/etc/hosts");
    }

    #[test]
    fn whitespace_round_trips() {
        let path = "/Library/Application Support/x";
        let encoded = encode(path);
        assert!(!encoded.contains(' '));
        assert_eq!(decode(&encoded), path);
    }

    #[test]
    fn percent_itself_round_trips() {
        assert_eq!(decode(&encode("/tmp/100%")), "/tmp/100%");
    }

    #[test]
    fn decode_tolerates_unencoded_input() {
        assert_eq!(decode("/no/escapes-here"), "/no/escapes-here");
    }
}
