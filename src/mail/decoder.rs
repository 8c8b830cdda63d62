//! Plain-text extraction from raw message payloads.
//!
//! Only `text/plain` parts are read, and only at the top level or one level
//! below it. HTML-only messages and attachments therefore decode to an empty
//! string.

use super::MessagePart;
use base64::Engine;
use base64::alphabet::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use thiserror::Error;

/// Maximum number of characters kept from each `text/plain` part.
pub const MAX_PART_CHARS: usize = 3000;

/// The only MIME type the decoder reads.
pub const PLAIN_TEXT_MIME: &str = "text/plain";

/// Base64url that accepts bodies with or without trailing padding.
const BODY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed base64url body: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Extracts the plain-text content of a message.
///
/// Each `text/plain` part is decoded, cut to [`MAX_PART_CHARS`] characters and
/// followed by a newline. Returns an empty string when the message has no
/// plain-text part.
pub fn decode(payload: &MessagePart) -> Result<String, DecodeError> {
    let mut text = String::new();
    match payload.parts.as_deref() {
        Some(parts) if !parts.is_empty() => {
            for part in parts {
                append_plain_text(part, &mut text)?;
            }
        }
        _ => append_plain_text(payload, &mut text)?,
    }
    Ok(text)
}

fn append_plain_text(part: &MessagePart, out: &mut String) -> Result<(), DecodeError> {
    if part.mime_type != PLAIN_TEXT_MIME {
        return Ok(());
    }
    let Some(data) = part.body.as_ref().and_then(|body| body.data.as_deref()) else {
        return Ok(());
    };
    if data.is_empty() {
        return Ok(());
    }
    let decoded = String::from_utf8(BODY_ENGINE.decode(data)?)?;
    out.extend(decoded.chars().take(MAX_PART_CHARS));
    out.push('\n');
    Ok(())
}

/// Base64url-encodes `bytes` with padding, the form Gmail returns bodies in.
pub fn encode_body(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE.encode(bytes)
}
