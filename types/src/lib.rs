//! Fundamental types for the Tidemark MRV workflow.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: identifiers, timestamps, geographic primitives, ecosystem
//! classification, and the tunable protocol parameters.

pub mod ecosystem;
pub mod geo;
pub mod id;
pub mod params;
pub mod time;

pub use ecosystem::EcosystemType;
pub use geo::{GeoError, GeoPoint, GpsFix};
pub use id::{BatchId, ContentId, ProjectId, RegistryProjectId, SubmitterId, TxId};
pub use params::{OrchestratorParams, ScoringParams};
pub use time::Timestamp;
