use super::error::RecognitionError;
use crate::models::detection::Detection;
use async_trait::async_trait;

/// Recognition source abstraction - text detection and recognition happen
/// behind this seam, callers only see the detections it reports.
#[async_trait]
pub trait RecognitionSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Detect and recognize every text line in the image addressed by
    /// `image_id`, in the order the engine reports them.
    async fn detect_and_recognize(&self, image_id: &str) -> Result<Vec<Detection>, RecognitionError>;
}
