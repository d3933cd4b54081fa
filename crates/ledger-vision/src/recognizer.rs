//! The recognition seam.

use async_trait::async_trait;
use ledger_core::RecognitionResult;

use crate::error::VisionError;

/// Turns an image plus instructions into a structured recognition result.
///
/// Implementations make exactly one attempt; retry policy, rate limiting and
/// deadlines belong to the caller. Cancellation happens by dropping the
/// returned future.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognize a single image.
    ///
    /// `mime_type` is the declared content type of `image` and `prompt` the
    /// full instruction text sent alongside it.
    async fn recognize(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<RecognitionResult, VisionError>;
}
