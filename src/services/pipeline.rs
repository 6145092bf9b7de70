use crate::models::config::PipelineConfig;
use crate::models::detection::{Candidate, Detection, RankedResult};
use crate::services::ocr::{RecognitionError, RecognitionSource};
use crate::services::plate_validator::PlateValidator;
use crate::services::recognition_cache::RecognitionCache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Turns raw recognition output for an image into a ranked list of plates.
///
/// Each image id reaches the recognition source at most once while its
/// result stays cached; later calls return the cached list.
pub struct RecognitionPipeline {
    source: Arc<dyn RecognitionSource>,
    cache: Arc<RecognitionCache>,
    validator: PlateValidator,
    min_confidence: f64,
    allow_international: bool,
    timeout: Option<Duration>,
}

impl RecognitionPipeline {
    pub fn new(source: Arc<dyn RecognitionSource>, cache: Arc<RecognitionCache>) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            source,
            cache,
            validator: PlateValidator::new(),
            min_confidence: defaults.min_confidence,
            allow_international: defaults.allow_international,
            timeout: None,
        }
    }

    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.min_confidence = config.min_confidence;
        self.allow_international = config.allow_international;
        self
    }

    /// Treat a source call running longer than `timeout` as a source failure
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cache(&self) -> &Arc<RecognitionCache> {
        &self.cache
    }

    /// Ranked plates for `image_id`. An empty list means no admissible
    /// plate was found; errors mean the image could not be recognized.
    pub async fn get_plates(&self, image_id: &str) -> Result<Arc<RankedResult>, RecognitionError> {
        if let Some(cached) = self.cache.get(image_id) {
            debug!(image_id, candidates = cached.len(), "Recognition cache hit");
            return Ok(cached);
        }

        self.cache
            .get_or_try_insert_with(image_id, || async {
                let detections = self.recognize(image_id).await?;
                Ok::<_, RecognitionError>(RankedResult::new(image_id, self.rank(detections)))
            })
            .await
    }

    async fn recognize(&self, image_id: &str) -> Result<Vec<Detection>, RecognitionError> {
        info!(image_id, source = self.source.name(), "Running recognition");

        let call = self.source.detect_and_recognize(image_id);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                RecognitionError::source_unavailable(format!(
                    "Recognition timed out after {:.1}s",
                    limit.as_secs_f64()
                ))
            })?,
            None => call.await,
        };

        if let Err(e) = &result {
            warn!(image_id, error = %e, "Recognition failed");
        }
        result
    }

    /// Keep valid, confident detections, best first. The sort is stable,
    /// so equal confidences keep the source's order.
    pub fn rank(&self, detections: Vec<Detection>) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = detections
            .into_iter()
            .filter_map(|detection| self.admit(detection))
            .collect();

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates
    }

    fn admit(&self, detection: Detection) -> Option<Candidate> {
        let Some(kind) = self.validator.classify(&detection.text) else {
            debug!(text = %detection.text, "Rejected: not a plate format");
            return None;
        };

        // Written as a negated `>` so NaN scores are rejected too
        if !(detection.confidence > self.min_confidence) {
            debug!(
                text = %detection.text,
                confidence = detection.confidence,
                "Rejected: confidence not above threshold"
            );
            return None;
        }

        if kind.is_permissive() {
            if !self.allow_international {
                debug!(text = %detection.text, "Rejected: international plates disabled");
                return None;
            }
            debug!(text = %detection.text, "Accepted on the permissive international format");
        }

        Some(Candidate::admit(detection, kind))
    }
}
