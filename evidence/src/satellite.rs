//! Satellite-consistency check against an independent remote-sensing read.

use serde::{Deserialize, Serialize};
use tidemark_types::{GeoPoint, ScoringParams, Timestamp};

/// A remote-sensing observation of the claimed restoration site, obtained
/// from an independent provider before verification runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SatelliteObservation {
    pub location: GeoPoint,
    /// Normalized Difference Vegetation Index, in [-1, 1].
    pub ndvi: f64,
    /// Cloud-cover fraction, in [0, 1].
    pub cloud_cover: f64,
    /// Land-cover classification reported by the provider.
    pub land_cover: String,
    /// Provider name, e.g. "Sentinel-2".
    pub source: String,
    pub captured_at: Timestamp,
}

/// Outcome of the satellite-consistency check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SatelliteCheck {
    pub ndvi_healthy: bool,
    pub low_cloud_cover: bool,
    /// Passes only if vegetation reads healthy through a usable image.
    pub verified: bool,
}

/// Check a satellite observation against the configured thresholds.
///
/// Returns `None` when no observation is available, so the consensus
/// combination can exclude the check rather than zero it.
pub fn check_satellite(
    observation: Option<&SatelliteObservation>,
    params: &ScoringParams,
) -> Option<SatelliteCheck> {
    let obs = observation?;
    let ndvi_healthy = obs.ndvi > params.ndvi_healthy_threshold;
    let low_cloud_cover = obs.cloud_cover < params.cloud_cover_max;
    Some(SatelliteCheck {
        ndvi_healthy,
        low_cloud_cover,
        verified: ndvi_healthy && low_cloud_cover,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(ndvi: f64, cloud_cover: f64) -> SatelliteObservation {
        SatelliteObservation {
            location: GeoPoint::new(12.0, 77.0).unwrap(),
            ndvi,
            cloud_cover,
            land_cover: "mangrove".to_string(),
            source: "Sentinel-2".to_string(),
            captured_at: Timestamp::new(1_000),
        }
    }

    #[test]
    fn healthy_clear_read_verifies() {
        let params = ScoringParams::restoration_defaults();
        let check = check_satellite(Some(&observation(0.7, 0.1)), &params).unwrap();
        assert!(check.verified);
    }

    #[test]
    fn sparse_vegetation_fails() {
        let params = ScoringParams::restoration_defaults();
        let check = check_satellite(Some(&observation(0.2, 0.1)), &params).unwrap();
        assert!(!check.ndvi_healthy);
        assert!(!check.verified);
    }

    #[test]
    fn cloudy_read_fails_even_with_healthy_ndvi() {
        let params = ScoringParams::restoration_defaults();
        let check = check_satellite(Some(&observation(0.7, 0.8)), &params).unwrap();
        assert!(check.ndvi_healthy);
        assert!(!check.low_cloud_cover);
        assert!(!check.verified);
    }

    #[test]
    fn missing_observation_excludes_the_check() {
        let params = ScoringParams::restoration_defaults();
        assert!(check_satellite(None, &params).is_none());
    }
}
