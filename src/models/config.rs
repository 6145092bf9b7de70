use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;

/// Recognition source (PaddleOCR server) settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OcrConfig {
    pub base_url: String,
    /// Per-request limit; 0 disables the timeout
    pub timeout_secs: u64,
    pub lang: String,
    pub use_angle_cls: bool,
    /// Server binary to spawn when no server answers on `base_url`
    #[serde(default)]
    pub server_binary: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:39835".to_string(),
            timeout_secs: 30,
            lang: "ch".to_string(),
            use_angle_cls: true,
            server_binary: None,
        }
    }
}

/// Candidate filtering settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Detections must score strictly above this value
    pub min_confidence: f64,
    pub allow_international: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.9,
            allow_international: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(format!(
                "min_confidence {} out of valid range (0.0-1.0)",
                self.min_confidence
            ));
        }
        Ok(())
    }
}

/// Eviction policy of the recognition cache
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum CachePolicy {
    /// Entries live until cleared
    #[default]
    Unbounded,
    /// Least recently used entries are dropped past `capacity`
    Lru { capacity: NonZeroUsize },
}

impl CachePolicy {
    pub fn capacity(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Lru { capacity } => Some(capacity.get()),
        }
    }
}

/// Preview rendering settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreviewConfig {
    pub max_width: u32,
    pub max_height: u32,
    pub highlight_regions: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_width: 500,
            max_height: 300,
            highlight_regions: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    pub ocr: OcrConfig,
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub cache: CachePolicy,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.pipeline.validate()?;
        if self.preview.max_width == 0 || self.preview.max_height == 0 {
            return Err("Preview bounds must be non-zero".to_string());
        }
        Ok(())
    }
}
