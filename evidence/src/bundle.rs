//! Submitted field evidence and the submitter's history record.

use crate::satellite::SatelliteObservation;
use serde::{Deserialize, Serialize};
use tidemark_types::{ContentId, GeoPoint, GpsFix, SubmitterId, Timestamp};

/// Device-reported metadata attached to a field image.
///
/// Both fields are optional because field devices routinely strip EXIF
/// data; the fraud heuristic penalizes the absence rather than rejecting
/// the submission outright.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub gps: Option<GpsFix>,
    pub capture_time: Option<Timestamp>,
}

/// Features extracted from a field image by the upstream capture pipeline.
///
/// Extraction itself (the ML model) happens before evidence reaches the
/// orchestrator; the analyzers only judge the reported numbers against
/// thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageFeatures {
    pub vegetation_detected: bool,
    /// Vegetation health in [0, 1].
    pub health_score: f64,
    /// Confidence that the detected species matches the claimed ecosystem, in [0, 1].
    pub species_confidence: f64,
    /// Overall image quality in [0, 1].
    pub quality: f64,
}

/// One field photograph with its metadata and extracted features.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldImage {
    /// Content-store handle once uploaded; `None` for not-yet-stored evidence.
    pub content_id: Option<ContentId>,
    pub metadata: ImageMetadata,
    pub features: ImageFeatures,
}

/// The complete evidence package submitted for one MRV collection round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub submitter: SubmitterId,
    /// The submitting device's GPS fix for the restoration site.
    pub location: Option<GpsFix>,
    /// When the submitter claims the evidence was captured.
    pub claimed_capture_time: Option<Timestamp>,
    pub images: Vec<FieldImage>,
    pub satellite: Option<SatelliteObservation>,
}

impl EvidenceBundle {
    /// Number of images missing capture-time metadata.
    pub fn images_missing_metadata(&self) -> usize {
        self.images
            .iter()
            .filter(|img| img.metadata.capture_time.is_none())
            .count()
    }
}

/// A single entry in a submitter's recent-submission log, retained for the
/// fraud heuristic's duplicate-GPS and frequency checks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submitter: SubmitterId,
    pub point: GeoPoint,
    pub submitted_at: Timestamp,
}
