use crate::models::config::AppConfig;
use crate::models::detection::RankedResult;
use crate::services::ocr::{HttpOcrClient, RecognitionError};
use crate::services::pipeline::RecognitionPipeline;
use crate::services::preview::PreviewRenderer;
use crate::services::recognition_cache::RecognitionCache;
use serde_json::{json, Value};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What a recognition request ended with, as shown to the user
#[derive(Debug, Clone, PartialEq)]
pub enum PlateOutcome {
    Found(Arc<RankedResult>),
    NoCandidates,
    Failed(RecognitionError),
}

impl PlateOutcome {
    pub fn from_result(result: Result<Arc<RankedResult>, RecognitionError>) -> Self {
        match result {
            Ok(ranked) if ranked.is_empty() => Self::NoCandidates,
            Ok(ranked) => Self::Found(ranked),
            Err(e) => Self::Failed(e),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn message(&self) -> String {
        match self {
            Self::Found(ranked) => {
                let lines: Vec<String> = ranked
                    .iter()
                    .map(|c| format!("  Plate: {}, confidence: {:.2} ({})", c.text, c.confidence, c.kind.label()))
                    .collect();
                format!("Recognized plates:\n{}", lines.join("\n"))
            }
            Self::NoCandidates => "No plate matching a known format was found".to_string(),
            Self::Failed(e) => format!("Could not process image: {}", e),
        }
    }
}

/// Recognition outcome for one image
#[derive(Debug, Clone)]
pub struct PlateReport {
    pub image_id: String,
    pub outcome: PlateOutcome,
    pub preview: Option<PathBuf>,
}

impl PlateReport {
    pub fn to_json(&self) -> Value {
        let mut value = match &self.outcome {
            PlateOutcome::Found(ranked) => json!({
                "status": "found",
                "plates": ranked.candidates,
                "recognized_at": ranked.recognized_at,
            }),
            PlateOutcome::NoCandidates => json!({ "status": "no_candidates", "plates": [] }),
            PlateOutcome::Failed(e) => json!({
                "status": match e {
                    RecognitionError::SourceUnavailable { .. } => "source_unavailable",
                    RecognitionError::ImageUnreadable { .. } => "image_unreadable",
                },
                "error": e.to_string(),
            }),
        };
        value["image_id"] = json!(self.image_id);
        if let Some(preview) = &self.preview {
            value["preview"] = json!(preview.to_string_lossy());
        }
        value
    }
}

impl fmt::Display for PlateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.image_id, self.outcome.message())
    }
}

/// Plate recognition service: pipeline plus optional preview output
pub struct PlateService {
    pipeline: RecognitionPipeline,
    preview: Option<(Arc<PreviewRenderer>, PathBuf)>,
}

impl PlateService {
    pub fn new(pipeline: RecognitionPipeline) -> Self {
        Self {
            pipeline,
            preview: None,
        }
    }

    /// Wire the HTTP recognition source, cache and pipeline from config
    pub fn from_config(config: &AppConfig) -> Result<Self, String> {
        let client = HttpOcrClient::new(&config.ocr)?;
        let cache = Arc::new(RecognitionCache::new(config.cache));

        let mut pipeline = RecognitionPipeline::new(Arc::new(client), cache).with_config(&config.pipeline);
        if config.ocr.timeout_secs > 0 {
            pipeline = pipeline.with_timeout(Duration::from_secs(config.ocr.timeout_secs));
        }

        info!(
            base_url = %config.ocr.base_url,
            min_confidence = config.pipeline.min_confidence,
            cache = ?config.cache,
            "Plate service initialized"
        );
        Ok(Self::new(pipeline))
    }

    /// Write a preview PNG for every successfully recognized image into `dir`
    pub fn with_preview(mut self, renderer: PreviewRenderer, dir: impl Into<PathBuf>) -> Self {
        self.preview = Some((Arc::new(renderer), dir.into()));
        self
    }

    pub fn pipeline(&self) -> &RecognitionPipeline {
        &self.pipeline
    }

    pub async fn recognize_plate(&self, image_id: &str) -> PlateReport {
        let result = self.pipeline.get_plates(image_id).await;

        let preview = match &result {
            Ok(ranked) => self.write_preview(image_id, ranked).await,
            Err(_) => None,
        };

        PlateReport {
            image_id: image_id.to_string(),
            outcome: PlateOutcome::from_result(result),
            preview,
        }
    }

    /// Recognize images one after another, in the given order
    pub async fn recognize_all(&self, image_ids: &[String]) -> Vec<PlateReport> {
        let mut reports = Vec::with_capacity(image_ids.len());
        for image_id in image_ids {
            reports.push(self.recognize_plate(image_id).await);
        }
        reports
    }

    async fn write_preview(&self, image_id: &str, ranked: &Arc<RankedResult>) -> Option<PathBuf> {
        let (renderer, dir) = self.preview.as_ref()?;
        let output = preview_path(dir, image_id);

        let renderer = Arc::clone(renderer);
        let ranked = Arc::clone(ranked);
        let owned_id = image_id.to_string();
        let target = output.clone();
        let written = tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(target.parent().unwrap_or(Path::new(".")))
                .map_err(|e| format!("Failed to create preview directory: {}", e))?;
            renderer.save(&owned_id, &ranked.candidates, &target)
        })
        .await;

        match written {
            Ok(Ok(())) => Some(output),
            Ok(Err(e)) => {
                warn!(image_id, error = %e, "Preview not written");
                None
            }
            Err(e) => {
                warn!(image_id, error = %e, "Preview task failed");
                None
            }
        }
    }
}

/// `<dir>/<file stem>-<id hash>.preview.png`. The hash keeps images with
/// the same file name from different directories apart.
fn preview_path(dir: &Path, image_id: &str) -> PathBuf {
    let stem = Path::new(image_id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let mut hasher = DefaultHasher::new();
    image_id.hash(&mut hasher);
    dir.join(format!("{}-{:08x}.preview.png", stem, hasher.finish() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::PreviewConfig;
    use crate::models::detection::{Detection, Point};
    use crate::services::ocr::RecognitionSource;
    use async_trait::async_trait;
    use image::{DynamicImage, Rgb, RgbImage};

    struct FixedSource(Vec<Detection>);

    #[async_trait]
    impl RecognitionSource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn detect_and_recognize(&self, image_id: &str) -> Result<Vec<Detection>, RecognitionError> {
            if image_id.ends_with("missing.jpg") {
                return Err(RecognitionError::image_unreadable(image_id, "No such file"));
            }
            Ok(self.0.clone())
        }
    }

    fn service(detections: Vec<Detection>) -> PlateService {
        let pipeline = RecognitionPipeline::new(
            Arc::new(FixedSource(detections)),
            Arc::new(RecognitionCache::default()),
        );
        PlateService::new(pipeline)
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("plate-reader-report-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_found_report() {
        let report = service(vec![Detection::new("京A·12345", 0.987)])
            .recognize_plate("car.jpg")
            .await;

        assert!(matches!(report.outcome, PlateOutcome::Found(_)));
        assert_eq!(
            report.to_string(),
            "car.jpg: Recognized plates:\n  Plate: 京A·12345, confidence: 0.99 (standard)"
        );

        let json = report.to_json();
        assert_eq!(json["status"], "found");
        assert_eq!(json["image_id"], "car.jpg");
        assert_eq!(json["plates"][0]["text"], "京A·12345");
        assert_eq!(json["plates"][0]["kind"], "standard");
    }

    #[tokio::test]
    async fn test_no_candidates_report_is_not_failure() {
        let report = service(vec![Detection::new("hello", 0.99)]).recognize_plate("car.jpg").await;

        assert_eq!(report.outcome, PlateOutcome::NoCandidates);
        assert!(!report.outcome.is_failure());
        assert_eq!(report.outcome.message(), "No plate matching a known format was found");
        assert_eq!(report.to_json()["status"], "no_candidates");
    }

    #[tokio::test]
    async fn test_failure_report_is_distinct() {
        let report = service(Vec::new()).recognize_plate("missing.jpg").await;

        assert!(report.outcome.is_failure());
        assert!(report.outcome.message().starts_with("Could not process image:"));
        assert_eq!(report.to_json()["status"], "image_unreadable");
        assert!(report.preview.is_none());
    }

    #[tokio::test]
    async fn test_recognize_all_keeps_order() {
        let service = service(vec![Detection::new("ABC1234", 0.95)]);
        let ids = vec!["b.jpg".to_string(), "missing.jpg".to_string(), "a.jpg".to_string()];

        let reports = service.recognize_all(&ids).await;

        let order: Vec<&str> = reports.iter().map(|r| r.image_id.as_str()).collect();
        assert_eq!(order, vec!["b.jpg", "missing.jpg", "a.jpg"]);
        assert!(reports[1].outcome.is_failure());
        assert_eq!(service.pipeline().cache().len(), 2);
    }

    #[tokio::test]
    async fn test_preview_written_for_recognized_image() {
        let dir = temp_dir("preview");
        let image_path = dir.join("car.png");
        DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([255, 255, 255])))
            .save(&image_path)
            .unwrap();

        let region = vec![Point::new(2.0, 2.0), Point::new(30.0, 2.0), Point::new(30.0, 10.0)];
        let service = service(vec![Detection::new("ABC1234", 0.95).with_region(region)])
            .with_preview(PreviewRenderer::new(PreviewConfig::default()), dir.join("out"));

        let report = service.recognize_plate(image_path.to_str().unwrap()).await;

        let preview = report.preview.expect("preview should be written");
        assert!(preview.file_name().unwrap().to_str().unwrap().starts_with("car-"));
        assert!(preview.to_str().unwrap().ends_with(".preview.png"));
        assert!(preview.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_preview_path() {
        let path = preview_path(Path::new("/out"), "/photos/car 1.jpg");
        assert_eq!(path.parent(), Some(Path::new("/out")));

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("car 1-"));
        assert!(name.ends_with(".preview.png"));
        assert_eq!(path, preview_path(Path::new("/out"), "/photos/car 1.jpg"));
    }

    #[test]
    fn test_preview_path_same_stem_different_dirs() {
        let out = Path::new("/out");
        assert_ne!(preview_path(out, "a/car.jpg"), preview_path(out, "b/car.jpg"));
    }

    #[tokio::test]
    async fn test_batch_previews_do_not_overwrite() {
        let dir = temp_dir("batch");
        let mut ids = Vec::new();
        for sub in ["a", "b"] {
            std::fs::create_dir_all(dir.join(sub)).unwrap();
            let image_path = dir.join(sub).join("car.png");
            DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([255, 255, 255])))
                .save(&image_path)
                .unwrap();
            ids.push(image_path.to_string_lossy().into_owned());
        }

        let service = service(vec![Detection::new("ABC1234", 0.95)])
            .with_preview(PreviewRenderer::new(PreviewConfig::default()), dir.join("out"));
        let reports = service.recognize_all(&ids).await;

        let first = reports[0].preview.clone().expect("first preview");
        let second = reports[1].preview.clone().expect("second preview");
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
