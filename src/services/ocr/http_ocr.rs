use super::engine::RecognitionSource;
use super::error::RecognitionError;
use crate::models::config::OcrConfig;
use crate::models::detection::{Detection, Point};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// HTTP OCR client that communicates with the PaddleOCR server
#[derive(Clone)]
pub struct HttpOcrClient {
    client: reqwest::Client,
    base_url: String,
    lang: String,
    use_angle_cls: bool,
}

#[derive(Serialize)]
struct OcrRequest<'a> {
    image_base64: String,
    lang: &'a str,
    use_angle_cls: bool,
}

/// Single text box with its polygon
#[derive(Deserialize, Clone, Debug)]
struct TextBox {
    #[serde(rename = "box", default)]
    bbox: Vec<Vec<f64>>, // corner points [[x1,y1], [x2,y2], ...]
    text: String,
    score: f64,
}

#[derive(Deserialize)]
struct OcrResponse {
    boxes: Vec<TextBox>,
}

impl TextBox {
    /// Polygon of the box, or None when the server sent no usable points
    fn region(&self) -> Option<Vec<Point>> {
        if self.bbox.is_empty() || self.bbox.iter().any(|p| p.len() < 2) {
            return None;
        }
        Some(self.bbox.iter().map(|p| Point::new(p[0], p[1])).collect())
    }

    fn into_detection(self) -> Detection {
        let region = self.region();
        Detection {
            text: self.text,
            confidence: self.score,
            region,
        }
    }
}

impl HttpOcrClient {
    /// Create a new HTTP OCR client
    pub fn new(config: &OcrConfig) -> Result<Self, String> {
        let mut builder = reqwest::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            lang: config.lang.clone(),
            use_angle_cls: config.use_angle_cls,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if server is healthy
    pub async fn health_check(&self) -> Result<(), RecognitionError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RecognitionError::source_unavailable(format!("Health check failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RecognitionError::source_unavailable(format!(
                "Health check returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Read the image file and make sure it decodes before it goes on the wire
    async fn load_image_bytes(image_id: &str) -> Result<Vec<u8>, RecognitionError> {
        let bytes = tokio::fs::read(Path::new(image_id))
            .await
            .map_err(|e| RecognitionError::image_unreadable(image_id, e.to_string()))?;

        let owned_id = image_id.to_string();
        tokio::task::spawn_blocking(move || match image::load_from_memory(&bytes) {
            Ok(_) => Ok(bytes),
            Err(e) => Err(RecognitionError::image_unreadable(owned_id, e.to_string())),
        })
        .await
        .map_err(|e| RecognitionError::source_unavailable(format!("Image decode task failed: {}", e)))?
    }

    /// Map a non-success status onto the error taxonomy: the server
    /// rejecting the image is the image's fault, anything else is the server's
    fn classify_status(image_id: &str, status: reqwest::StatusCode, body: String) -> RecognitionError {
        if status.is_client_error() {
            RecognitionError::image_unreadable(image_id, format!("OCR server rejected image ({}): {}", status, body))
        } else {
            RecognitionError::source_unavailable(format!("OCR server error ({}): {}", status, body))
        }
    }

    fn parse_response(body: &str) -> Result<Vec<Detection>, RecognitionError> {
        let data: OcrResponse = serde_json::from_str(body)
            .map_err(|e| RecognitionError::source_unavailable(format!("Failed to parse response: {}", e)))?;
        Ok(data.boxes.into_iter().map(TextBox::into_detection).collect())
    }
}

#[async_trait]
impl RecognitionSource for HttpOcrClient {
    fn name(&self) -> &'static str {
        "paddleocr-http"
    }

    async fn detect_and_recognize(&self, image_id: &str) -> Result<Vec<Detection>, RecognitionError> {
        let bytes = Self::load_image_bytes(image_id).await?;
        let request = OcrRequest {
            image_base64: general_purpose::STANDARD.encode(&bytes),
            lang: &self.lang,
            use_angle_cls: self.use_angle_cls,
        };
        let url = format!("{}/ocr", self.base_url);

        debug!(image_id, bytes = bytes.len(), %url, "Sending image to OCR server");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RecognitionError::source_unavailable(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RecognitionError::source_unavailable(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::classify_status(image_id, status, body));
        }

        let detections = Self::parse_response(&body)?;
        debug!(image_id, count = detections.len(), "OCR server returned detections");
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn test_client() -> HttpOcrClient {
        let config = OcrConfig {
            // Nothing listens here; tests below never reach the network
            base_url: "http://127.0.0.1:9/".to_string(),
            timeout_secs: 1,
            ..OcrConfig::default()
        };
        HttpOcrClient::new(&config).unwrap()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("plate-reader-http-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(test_client().base_url(), "http://127.0.0.1:9");
    }

    #[test]
    fn test_parse_response_keeps_server_order() {
        let body = r#"{
            "boxes": [
                {"box": [[0,0],[10,0],[10,5],[0,5]], "text": "京A·12345", "score": 0.95},
                {"box": [[20,20],[30,20],[30,25],[20,25]], "text": "hello", "score": 0.99}
            ],
            "raw_text": "京A·12345hello"
        }"#;

        let detections = HttpOcrClient::parse_response(body).unwrap();

        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].text, "京A·12345");
        assert_eq!(detections[0].confidence, 0.95);
        let region = detections[0].region.as_ref().unwrap();
        assert_eq!(region.len(), 4);
        assert_eq!(region[2], Point::new(10.0, 5.0));
        assert_eq!(detections[1].text, "hello");
    }

    #[test]
    fn test_parse_response_without_polygon() {
        let body = r#"{"boxes": [{"text": "ABC123", "score": 0.97}, {"box": [[1]], "text": "X1", "score": 0.5}]}"#;

        let detections = HttpOcrClient::parse_response(body).unwrap();

        assert!(detections[0].region.is_none());
        assert!(detections[1].region.is_none(), "Malformed points are dropped");
    }

    #[test]
    fn test_parse_response_malformed_is_source_failure() {
        let result = HttpOcrClient::parse_response("not json");
        assert!(matches!(result, Err(RecognitionError::SourceUnavailable { .. })));
    }

    #[test]
    fn test_classify_status() {
        let err = HttpOcrClient::classify_status("a.jpg", reqwest::StatusCode::UNPROCESSABLE_ENTITY, "bad image".into());
        assert!(err.is_image_unreadable());

        let err = HttpOcrClient::classify_status("a.jpg", reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom".into());
        assert!(matches!(err, RecognitionError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_missing_file_is_unreadable() {
        let client = test_client();
        let result = client.detect_and_recognize("missing.jpg").await;

        match result {
            Err(RecognitionError::ImageUnreadable { image_id, .. }) => assert_eq!(image_id, "missing.jpg"),
            other => panic!("Expected ImageUnreadable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_file_is_unreadable() {
        let path = temp_path("garbage.jpg");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let client = test_client();
        let result = client.detect_and_recognize(path.to_str().unwrap()).await;
        assert!(matches!(result, Err(RecognitionError::ImageUnreadable { .. })));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_load_image_bytes_accepts_png() {
        let path = temp_path("ok.png");
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])))
            .save(&path)
            .unwrap();

        let bytes = HttpOcrClient::load_image_bytes(path.to_str().unwrap()).await.unwrap();
        assert!(!bytes.is_empty());

        let _ = std::fs::remove_file(&path);
    }
}
