use std::sync::Arc;

use tracing::{debug, error, info, warn};

use chatty_moderation::ModerationGate;

use crate::compress;
use crate::error::{MediaError, StoreError};
use crate::payload::{self, ImagePayload};
use crate::store::ContentStore;

/// Hard limit on the decoded image size.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Images above this decoded size are recompressed before upload.
pub const RECOMPRESS_THRESHOLD_BYTES: usize = 1024 * 1024;

const GENERIC_REJECTION: &str = "Image contains inappropriate content";

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub url: String,
    pub compressed: bool,
}

/// Size check, moderation, recompression and upload for one image.
pub struct ImagePipeline {
    gate: ModerationGate,
    store: Option<Arc<dyn ContentStore>>,
    /// Set outside production only.
    fallback: Option<Arc<dyn ContentStore>>,
}

impl ImagePipeline {
    pub fn new(
        gate: ModerationGate,
        store: Option<Arc<dyn ContentStore>>,
        fallback: Option<Arc<dyn ContentStore>>,
    ) -> Self {
        Self {
            gate,
            store,
            fallback,
        }
    }

    /// Turn a base64 (or data URI) image into a stored URL.
    pub async fn prepare_image(
        &self,
        input: &str,
        folder: &str,
    ) -> Result<PreparedImage, MediaError> {
        let estimated = payload::decoded_len(input);
        if estimated > MAX_IMAGE_BYTES {
            warn!(bytes = estimated, "Image rejected: over the hard size limit");
            return Err(MediaError::TooLarge {
                bytes: estimated,
                limit: MAX_IMAGE_BYTES,
            });
        }

        let ImagePayload {
            mut bytes,
            mut mime_type,
        } = ImagePayload::decode(input)?;

        let verdict = self.gate.evaluate_image(&bytes, &mime_type).await;
        if let Err(rejected) = verdict.ensure_allowed(GENERIC_REJECTION) {
            info!(reason = %rejected.reason, "Image rejected by moderation");
            return Err(MediaError::Rejected(rejected.reason));
        }

        let mut compressed = false;
        if bytes.len() > RECOMPRESS_THRESHOLD_BYTES {
            let original = bytes.len();
            match compress::recompress_blocking(bytes.clone()).await {
                Ok(out) => {
                    debug!(original, compressed = out.len(), "Image recompressed");
                    bytes = out;
                    mime_type = "image/jpeg".to_string();
                    compressed = true;
                }
                Err(e) => warn!(error = %e, "Image recompression failed, uploading original"),
            }
        }

        let url = self.upload(&bytes, &mime_type, folder).await?;
        Ok(PreparedImage { url, compressed })
    }

    async fn upload(&self, bytes: &[u8], mime_type: &str, folder: &str) -> Result<String, MediaError> {
        let primary = match &self.store {
            Some(store) => store.upload(bytes, mime_type, folder).await,
            None => Err(StoreError::NotConfigured),
        };

        let err = match primary {
            Ok(url) => return Ok(url),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            error!(error = %err, "Image upload failed");
            return Err(MediaError::UploadFailed);
        };

        warn!(error = %err, "Image upload failed, writing to local storage");
        fallback.upload(bytes, mime_type, folder).await.map_err(|e| {
            error!(error = %e, "Local image fallback failed");
            MediaError::UploadFailed
        })
    }
}
