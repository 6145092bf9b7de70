use thiserror::Error;

/// Why a recognition request produced no result list.
///
/// A request that succeeds with zero admissible plates is not an error;
/// it is an empty `RankedResult`.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecognitionError {
    #[error("recognition source unavailable: {message}")]
    SourceUnavailable { message: String },
    #[error("image '{image_id}' could not be read: {message}")]
    ImageUnreadable { image_id: String, message: String },
}

impl RecognitionError {
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
        }
    }

    pub fn image_unreadable(image_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ImageUnreadable {
            image_id: image_id.into(),
            message: message.into(),
        }
    }

    pub fn is_image_unreadable(&self) -> bool {
        matches!(self, Self::ImageUnreadable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RecognitionError::image_unreadable("missing.jpg", "No such file");
        assert_eq!(
            err.to_string(),
            "image 'missing.jpg' could not be read: No such file"
        );
        assert!(err.is_image_unreadable());

        let err = RecognitionError::source_unavailable("connection refused");
        assert_eq!(
            err.to_string(),
            "recognition source unavailable: connection refused"
        );
        assert!(!err.is_image_unreadable());
    }
}
