pub mod config;
pub mod ocr;
pub mod ocr_server;
pub mod pipeline;
pub mod plate_validator;
pub mod preview;
pub mod recognition_cache;
