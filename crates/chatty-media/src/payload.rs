use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;

use crate::error::MediaError;

const DEFAULT_MIME: &str = "image/jpeg";

/// A decoded client image.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    /// Decode a bare base64 string or a `data:<mime>;base64,<data>` URI.
    pub fn decode(input: &str) -> Result<Self, MediaError> {
        let (mime, data) = split_data_uri(input);
        if data.is_empty() {
            return Err(MediaError::Empty);
        }
        let bytes = B64.decode(data).map_err(|_| MediaError::InvalidEncoding)?;
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        Ok(Self {
            bytes,
            mime_type: mime.unwrap_or(DEFAULT_MIME).to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Split off a data URI header, returning the declared mime type (if any)
/// and the base64 body.
pub fn split_data_uri(input: &str) -> (Option<&str>, &str) {
    let input = input.trim();
    let Some(rest) = input.strip_prefix("data:") else {
        return (None, input);
    };
    match rest.split_once(',') {
        Some((header, data)) => {
            let mime = header.split(';').next().filter(|m| !m.is_empty());
            (mime, data.trim())
        }
        None => (None, ""),
    }
}

/// Size the base64 body will have once decoded, computed without decoding.
pub fn decoded_len(input: &str) -> usize {
    let (_, data) = split_data_uri(input);
    let padding = data.bytes().rev().take(2).filter(|&b| b == b'=').count();
    (data.len() / 4 * 3 + (data.len() % 4) * 3 / 4).saturating_sub(padding)
}
