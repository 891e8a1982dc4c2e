//! Content moderation for display names, message text and images.
//!
//! [`ModerationGate`] asks a remote [`Classifier`] when one is configured and
//! degrades to a local term list for text. Images fail open: only an explicit
//! verdict from the classifier can reject one.

pub mod classifier;
pub mod gate;
pub mod gemini;
pub mod result;
pub mod terms;

pub use classifier::{Classifier, ClassifierError};
pub use gate::{MAX_MODERATED_IMAGE_BYTES, ModerationGate};
pub use gemini::GeminiClassifier;
pub use result::{ContentKind, ModerationResult, Rejected, Verdict};
