//! Base64 and RFC 2047 encoded-word helpers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(data)
}

/// Encodes header text as an RFC 2047 encoded-word
/// (`=?UTF-8?B?<base64>?=`) when it contains characters that cannot
/// travel in a header verbatim. Plain ASCII input passes through
/// untouched.
#[must_use]
pub fn encode_word(text: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && c != '=' && c != '?') {
        return text.to_string();
    }

    format!("=?UTF-8?B?{}?=", encode_base64(text.as_bytes()))
}
