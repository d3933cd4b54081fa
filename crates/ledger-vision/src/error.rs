//! Error types for receipt recognition.

use thiserror::Error;

/// Errors that can occur while recognizing an image.
///
/// Callers treat every variant the same way: the image failed. The variants
/// exist so logs say why.
#[derive(Debug, Error)]
pub enum VisionError {
    /// Transport-level failure talking to the recognition service.
    #[error("recognition request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("recognition service returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The service answered without any content.
    #[error("recognition service returned an empty response")]
    EmptyResponse,

    /// The content was not the expected JSON object.
    #[error("failed to parse recognition result: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failure reported by a recognizer implementation.
    #[error("recognition failed: {0}")]
    Failed(String),
}
