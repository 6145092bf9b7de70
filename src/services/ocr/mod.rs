pub mod engine;
pub mod error;
pub mod http_ocr;

// Re-export main types
pub use engine::RecognitionSource;
pub use error::RecognitionError;
pub use http_ocr::HttpOcrClient;
