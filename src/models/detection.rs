use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A polygon vertex in image pixel coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One raw text line reported by the recognition source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    pub text: String,
    pub confidence: f64,
    #[serde(default)]
    pub region: Option<Vec<Point>>,
}

impl Detection {
    pub fn new(text: impl Into<String>, confidence: f64) -> Self {
        Self {
            text: text.into(),
            confidence,
            region: None,
        }
    }

    pub fn with_region(mut self, region: Vec<Point>) -> Self {
        self.region = Some(region);
        self
    }
}

/// Plate grammar a text matched
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlateKind {
    Standard,
    International,
    SpecialRegion,
    NewEnergy,
}

impl PlateKind {
    /// The international grammar accepts most short uppercase-alphanumeric
    /// strings, so matches of this kind are weaker evidence of a plate.
    pub fn is_permissive(&self) -> bool {
        matches!(self, Self::International)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::International => "international",
            Self::SpecialRegion => "special-region",
            Self::NewEnergy => "new-energy",
        }
    }
}

/// A detection that passed grammar validation and the confidence threshold.
/// Text, confidence and region are carried over from the detection as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub confidence: f64,
    pub region: Option<Vec<Point>>,
    pub kind: PlateKind,
}

impl Candidate {
    pub(crate) fn admit(detection: Detection, kind: PlateKind) -> Self {
        Self {
            text: detection.text,
            confidence: detection.confidence,
            region: detection.region,
            kind,
        }
    }
}

/// Candidates for one image, highest confidence first
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedResult {
    pub image_id: String,
    pub candidates: Vec<Candidate>,
    pub recognized_at: DateTime<Utc>,
}

impl RankedResult {
    pub fn new(image_id: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            image_id: image_id.into(),
            candidates,
            recognized_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Highest-ranked candidate, if any
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_deserializes_without_region() {
        let detection: Detection =
            serde_json::from_str(r#"{"text":"ABC1234","confidence":0.97}"#).unwrap();
        assert_eq!(detection.text, "ABC1234");
        assert!(detection.region.is_none());
    }

    #[test]
    fn test_candidate_keeps_detection_fields() {
        let region = vec![Point::new(1.0, 2.0), Point::new(3.0, 2.0), Point::new(3.0, 4.0)];
        let detection = Detection::new("京A·12345", 0.95).with_region(region.clone());

        let candidate = Candidate::admit(detection, PlateKind::Standard);

        assert_eq!(candidate.text, "京A·12345");
        assert_eq!(candidate.confidence, 0.95);
        assert_eq!(candidate.region, Some(region));
    }

    #[test]
    fn test_ranked_result_best() {
        let empty = RankedResult::new("a.jpg", Vec::new());
        assert!(empty.is_empty());
        assert!(empty.best().is_none());

        let result = RankedResult::new(
            "b.jpg",
            vec![
                Candidate::admit(Detection::new("ABC123", 0.99), PlateKind::International),
                Candidate::admit(Detection::new("XYZ9", 0.95), PlateKind::International),
            ],
        );
        assert_eq!(result.len(), 2);
        assert_eq!(result.best().map(|c| c.text.as_str()), Some("ABC123"));
    }

    #[test]
    fn test_plate_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&PlateKind::SpecialRegion).unwrap(),
            "\"special_region\""
        );
        assert!(PlateKind::International.is_permissive());
        assert!(!PlateKind::NewEnergy.is_permissive());
    }
}
