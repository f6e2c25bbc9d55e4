//! GPS-geotag validation.
//!
//! Coordinate-range and null-island validation happens at `GeoPoint`
//! construction; what remains here is the accuracy check used by the
//! consensus combination.

use serde::{Deserialize, Serialize};
use tidemark_types::{GpsFix, ScoringParams};

/// Outcome of the GPS-accuracy check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsCheck {
    pub accuracy_m: f64,
    /// Whether the reported accuracy is within the configured bound.
    pub within_accuracy: bool,
}

/// Check the submitted GPS fix against the configured accuracy bound.
///
/// Returns `None` when no fix was submitted, so the consensus combination
/// can exclude the check rather than zero it.
pub fn check_gps_accuracy(fix: Option<&GpsFix>, params: &ScoringParams) -> Option<GpsCheck> {
    let fix = fix?;
    Some(GpsCheck {
        accuracy_m: fix.accuracy_m,
        within_accuracy: fix.accuracy_m <= params.gps_accuracy_max_m,
    })
}
