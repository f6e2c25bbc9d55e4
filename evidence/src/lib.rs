//! Evidence model and scoring primitives.
//!
//! The analyzers in this crate are pure functions: they look only at the
//! submitted evidence (plus, for the fraud heuristic, the submitter's
//! recent history) and deterministic parameters. No I/O, no clocks — the
//! caller supplies `now`. Identical inputs always produce identical output,
//! which is what makes verification decisions reproducible for audit.

pub mod bundle;
pub mod fraud;
pub mod geotag;
pub mod image;
pub mod satellite;

pub use bundle::{EvidenceBundle, FieldImage, ImageFeatures, ImageMetadata, SubmissionRecord};
pub use fraud::{evaluate_fraud, FraudAssessment, RiskLevel};
pub use geotag::{check_gps_accuracy, GpsCheck};
pub use image::{assess_images, ImageAssessment};
pub use satellite::{check_satellite, SatelliteCheck, SatelliteObservation};
