//! Conversion between raw file bytes and manifest content strings.

use crate::error::SnapcubeError;
use crate::types::Encoding;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Encodes file bytes for the manifest.
///
/// Text that turns out not to be valid UTF-8 is stored as Base64, so the returned
/// encoding is the one to trust.
pub fn encode(bytes: Vec<u8>, is_binary: bool) -> (String, Encoding) {
    if is_binary {
        return (STANDARD.encode(&bytes), Encoding::Base64);
    }
    match String::from_utf8(bytes) {
        Ok(text) => (text, Encoding::Utf8),
        Err(e) => (STANDARD.encode(e.as_bytes()), Encoding::Base64),
    }
}

/// Decodes manifest content back into the original bytes.
pub fn decode(content: &str, encoding: Encoding) -> Result<Vec<u8>, SnapcubeError> {
    match encoding {
        Encoding::Utf8 => Ok(content.as_bytes().to_vec()),
        Encoding::Base64 => STANDARD
            .decode(content)
            .map_err(|e| SnapcubeError::corrupt("", format!("invalid base64: {}", e))),
    }
}

/// Decodes Base64 as the hosting APIs return it, with embedded line breaks.
pub(crate) fn decode_wrapped(content: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact)
}
