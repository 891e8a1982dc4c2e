use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use reqwest::multipart::Form;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::error::StoreError;
use crate::store::ContentStore;

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Signed uploads to Cloudinary's image endpoint.
pub struct CloudinaryStore {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl ContentStore for CloudinaryStore {
    async fn upload(
        &self,
        image: &[u8],
        mime_type: &str,
        folder: &str,
    ) -> Result<String, StoreError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", folder), ("timestamp", timestamp.as_str())],
            &self.config.api_secret,
        );

        let form = Form::new()
            .text("file", format!("data:{};base64,{}", mime_type, B64.encode(image)))
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", folder.to_string())
            .text("signature", signature);

        let url = format!("{}/{}/image/upload", API_BASE, self.config.cloud_name);
        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Timeout
                } else {
                    StoreError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: UploadResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        let secure_url = parsed
            .secure_url
            .ok_or_else(|| StoreError::Malformed("missing secure_url".into()))?;

        debug!(folder, url = %secure_url, "Uploaded image to Cloudinary");
        Ok(secure_url)
    }
}

/// Cloudinary request signature: SHA-1 over the parameters sorted by name,
/// joined as `k=v&k=v`, with the API secret appended.
pub fn sign(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let to_sign = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_sorts_parameters() {
        // sha1("folder=avatars&timestamp=1315060510abcd")
        let mut hasher = Sha1::new();
        hasher.update(b"folder=avatars&timestamp=1315060510abcd");
        let expected = hex::encode(hasher.finalize());

        let sig = sign(&[("timestamp", "1315060510"), ("folder", "avatars")], "abcd");
        assert_eq!(sig, expected);
        assert_eq!(sig.len(), 40);
    }

    #[test]
    fn empty_parameters_are_not_signed() {
        assert_eq!(
            sign(&[("folder", ""), ("timestamp", "1")], "s"),
            sign(&[("timestamp", "1")], "s")
        );
    }
}
