//! Image-quality analysis over submitted field photographs.

use crate::bundle::FieldImage;
use serde::{Deserialize, Serialize};
use tidemark_types::ScoringParams;

/// Outcome of assessing the submitted images as a set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageAssessment {
    /// Whether the image evidence passes: vegetation detected and no anomalies.
    pub verified: bool,
    /// Lowest quality across the set; the set is as weak as its worst image.
    pub min_quality: f64,
    /// Anomaly descriptions in image order.
    pub anomalies: Vec<String>,
}

/// Assess the submitted images against the configured thresholds.
///
/// Returns `None` when no images were submitted, so the consensus
/// combination can exclude the check instead of scoring it zero.
pub fn assess_images(images: &[FieldImage], params: &ScoringParams) -> Option<ImageAssessment> {
    if images.is_empty() {
        return None;
    }

    let mut anomalies = Vec::new();
    let mut all_vegetation = true;
    let mut min_quality = f64::MAX;

    for (index, image) in images.iter().enumerate() {
        let f = &image.features;
        min_quality = min_quality.min(f.quality);

        if !f.vegetation_detected {
            all_vegetation = false;
            anomalies.push(format!("image {index}: no vegetation detected"));
        }
        if f.health_score < params.vegetation_health_threshold {
            anomalies.push(format!(
                "image {index}: low vegetation health ({:.2})",
                f.health_score
            ));
        }
        if image.metadata.gps.is_none() {
            anomalies.push(format!("image {index}: geotag missing"));
        }
        if f.quality < params.image_quality_threshold {
            anomalies.push(format!(
                "image {index}: quality {:.2} below threshold {:.2}",
                f.quality, params.image_quality_threshold
            ));
        }
    }

    Some(ImageAssessment {
        verified: anomalies.is_empty() && all_vegetation,
        min_quality,
        anomalies,
    })
}
