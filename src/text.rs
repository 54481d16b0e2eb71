//! Encoding normalization for chat and HTTP bytes.
//!
//! IRC has no declared encoding and web pages frequently lie about theirs, so
//! anything displayed, logged, or relayed goes through [`to_display_text`].

use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;

/// Decodes bytes as UTF-8, falling back to ISO-8859-1 on invalid input.
///
/// The fallback uses Windows-1252, the superset browsers apply to the
/// `iso-8859-1` label, so it never fails.
pub fn to_display_text<T: AsRef<[u8]> + ?Sized>(value: &T) -> Cow<'_, str> {
    let bytes = value.as_ref();
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}

/// Drops an incomplete UTF-8 sequence from the end of `bytes`.
///
/// Input that is valid up to a cut-off final character loses that partial
/// character. Anything else is returned unchanged, so non-UTF-8 input still
/// reaches the fallback decoder intact.
pub fn trim_partial_utf8(bytes: &[u8]) -> &[u8] {
    match std::str::from_utf8(bytes) {
        Err(e) if e.error_len().is_none() => &bytes[..e.valid_up_to()],
        _ => bytes,
    }
}

/// Encodes text as UTF-8 wire bytes.
pub fn to_utf8(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}
