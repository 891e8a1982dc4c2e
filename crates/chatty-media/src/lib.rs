//! Turns a base64 image submitted by a client into a durable URL.

pub mod cloudinary;
pub mod compress;
pub mod error;
pub mod payload;
pub mod pipeline;
pub mod store;

pub use cloudinary::{CloudinaryConfig, CloudinaryStore};
pub use error::{MediaError, RecompressError, StoreError};
pub use payload::ImagePayload;
pub use pipeline::{ImagePipeline, MAX_IMAGE_BYTES, PreparedImage, RECOMPRESS_THRESHOLD_BYTES};
pub use store::{ContentStore, LocalStore};
