// strings.rs — CP437 wire-text conversions
//
// Protocol 75 strings (player names, team names, chat) are CP437 on the
// wire, not UTF-8. Names that cannot be decoded fall back to "Unknown";
// outgoing text that cannot be encoded is dropped by the caller.

use codepage_437::{FromCp437, ToCp437, CP437_CONTROL};

/// Substitute used when a client-supplied name fails to decode.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Decode a CP437 byte slice, stripping trailing NUL padding first.
pub fn from_cp437_bytes(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |i| i + 1);
    String::from_cp437(bytes[..end].to_vec(), &CP437_CONTROL)
}

/// Decode a player name, substituting "Unknown" for undecodable input.
/// CP437 maps all 256 byte values, so the substitution only fires for
/// hostile frames that smuggle replacement characters through.
pub fn name_from_cp437(bytes: &[u8]) -> String {
    let s = from_cp437_bytes(bytes);
    let trimmed = s.trim();
    if trimmed.chars().any(|c| c == '\u{FFFD}') {
        return UNKNOWN_NAME.to_string();
    }
    trimmed.to_string()
}

/// Encode text to CP437. Returns `None` when the text contains characters
/// with no CP437 representation.
pub fn to_cp437_bytes(s: &str) -> Option<Vec<u8>> {
    s.to_cp437(&CP437_CONTROL).ok().map(|c| c.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trip() {
        let encoded = to_cp437_bytes("Deuce").unwrap();
        assert_eq!(encoded, b"Deuce");
        assert_eq!(from_cp437_bytes(&encoded), "Deuce");
    }

    #[test]
    fn trailing_nuls_stripped() {
        let padded = [b'a', b'b', 0, 0, 0];
        assert_eq!(from_cp437_bytes(&padded), "ab");
    }

    #[test]
    fn high_bytes_decode_to_cp437_glyphs() {
        // 0xE1 is sharp-s in CP437.
        assert_eq!(from_cp437_bytes(&[0xE1]), "\u{00DF}");
    }

    #[test]
    fn unencodable_text_rejected() {
        assert!(to_cp437_bytes("\u{4E2D}").is_none());
    }

    #[test]
    fn name_trimming() {
        assert_eq!(name_from_cp437(b"  Deuce \x00\x00"), "Deuce");
        assert_eq!(name_from_cp437(b"\x00\x00"), "");
    }
}
