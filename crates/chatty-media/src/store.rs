use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;

/// Somewhere an image can be persisted and addressed by URL.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `image` under `folder`, returning its public URL.
    async fn upload(&self, image: &[u8], mime_type: &str, folder: &str)
    -> Result<String, StoreError>;
}

/// Writes images to a local directory served under `public_prefix`.
///
/// Only meant as the development fallback for the remote store: files live
/// at `{dir}/{folder}/{uuid}.{ext}` and are not cleaned up.
pub struct LocalStore {
    dir: PathBuf,
    public_prefix: String,
}

impl LocalStore {
    pub fn new(dir: PathBuf, public_prefix: impl Into<String>) -> Self {
        Self {
            dir,
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ContentStore for LocalStore {
    async fn upload(
        &self,
        image: &[u8],
        mime_type: &str,
        folder: &str,
    ) -> Result<String, StoreError> {
        let folder = sanitize_folder(folder);
        let target_dir = self.dir.join(&folder);
        fs::create_dir_all(&target_dir).await?;

        let name = format!("{}.{}", Uuid::new_v4(), extension_for(mime_type));
        let path = target_dir.join(&name);
        let mut file = fs::File::create(&path).await?;
        file.write_all(image).await?;
        file.flush().await?;

        info!("Stored image locally at {}", path.display());
        Ok(format!("{}/{}/{}", self.public_prefix, folder, name))
    }
}

pub fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

// Folder names come from code, but keep them from escaping the store dir.
fn sanitize_folder(folder: &str) -> String {
    let cleaned: String = folder
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if cleaned.is_empty() { "misc".to_string() } else { cleaned }
}
