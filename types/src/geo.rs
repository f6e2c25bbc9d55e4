//! Geographic primitives: validated coordinates and GPS fixes.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Mean Earth radius in meters, used for haversine distance.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("null island coordinates (0, 0) rejected")]
    NullIsland,
}

/// A validated WGS84 coordinate pair.
///
/// Construction rejects out-of-range values and the exact (0, 0) point,
/// which in practice is a stripped or spoofed geotag.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::LongitudeOutOfRange(longitude));
        }
        if latitude == 0.0 && longitude == 0.0 {
            return Err(GeoError::NullIsland);
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance to another point in meters (haversine).
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// A GPS fix as reported by a field device: position, horizontal accuracy
/// estimate, and the device-reported capture time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub point: GeoPoint,
    /// Reported horizontal accuracy in meters (larger = worse).
    pub accuracy_m: f64,
    pub recorded_at: Timestamp,
}

impl GpsFix {
    pub fn new(point: GeoPoint, accuracy_m: f64, recorded_at: Timestamp) -> Self {
        Self {
            point,
            accuracy_m,
            recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_latitude() {
        assert!(matches!(
            GeoPoint::new(91.0, 0.0),
            Err(GeoError::LatitudeOutOfRange(_))
        ));
        assert!(matches!(
            GeoPoint::new(-90.5, 0.0),
            Err(GeoError::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_longitude() {
        assert!(matches!(
            GeoPoint::new(10.0, 181.0),
            Err(GeoError::LongitudeOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_null_island() {
        assert!(matches!(GeoPoint::new(0.0, 0.0), Err(GeoError::NullIsland)));
    }

    #[test]
    fn accepts_boundary_coordinates() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = GeoPoint::new(12.5, 80.1).unwrap();
        assert!(p.distance_m(&p) < 1e-6);
    }

    #[test]
    fn distance_one_degree_latitude_is_about_111_km() {
        let a = GeoPoint::new(10.0, 20.0).unwrap();
        let b = GeoPoint::new(11.0, 20.0).unwrap();
        let d = a.distance_m(&b);
        assert!((d - 111_195.0).abs() < 200.0, "got {d}");
    }

    #[test]
    fn ten_meter_offsets_are_resolved() {
        // ~0.0001 degrees of latitude is about 11 m.
        let a = GeoPoint::new(12.0, 77.0).unwrap();
        let b = GeoPoint::new(12.0001, 77.0).unwrap();
        let d = a.distance_m(&b);
        assert!(d > 5.0 && d < 20.0, "got {d}");
    }
}
