use thiserror::Error;

/// Why an image could not be turned into a URL.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("image is {bytes} bytes, the limit is {limit} bytes")]
    TooLarge { bytes: usize, limit: usize },

    #[error("image payload is empty")]
    Empty,

    #[error("image payload is not valid base64")]
    InvalidEncoding,

    /// The classifier explicitly rejected the image.
    #[error("{0}")]
    Rejected(String),

    /// Both the remote store and any fallback failed. Details are logged,
    /// never returned.
    #[error("failed to upload image")]
    UploadFailed,
}

/// Recompression failed; the caller keeps the original bytes.
#[derive(Debug, Error)]
pub enum RecompressError {
    #[error("could not re-encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("recompression task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failure of a single content store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content store not configured")]
    NotConfigured,

    #[error("upload timed out")]
    Timeout,

    #[error("upload transport error: {0}")]
    Transport(String),

    #[error("content store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed content store response: {0}")]
    Malformed(String),

    #[error("local storage error: {0}")]
    Io(#[from] std::io::Error),
}
