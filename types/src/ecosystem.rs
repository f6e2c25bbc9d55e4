//! Blue-carbon ecosystem classification and sequestration rates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Annual carbon sequestration rate used when the ecosystem is unknown.
/// The lowest rate in the table, so unknown ecosystems are never credited
/// more than a recognized one would be.
pub const CONSERVATIVE_RATE_TCO2_PER_HA: f64 = 2.0;

/// The coastal ecosystem a restoration project claims to restore.
///
/// Rates are the conservative end of published per-ecosystem ranges; they
/// determine how many credits an approved project earns per hectare per
/// year and are deliberately not generous.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EcosystemType {
    Mangrove,
    Seagrass,
    SaltMarsh,
    CoastalWetland,
    /// Unrecognized ecosystem; credited at the conservative fallback rate.
    Other,
}

impl EcosystemType {
    /// Conservative sequestration rate in tCO2e per hectare per year.
    pub fn sequestration_rate_tco2_per_ha(&self) -> f64 {
        match self {
            EcosystemType::Mangrove => 3.0,
            EcosystemType::Seagrass => 2.0,
            EcosystemType::SaltMarsh => 4.0,
            EcosystemType::CoastalWetland => 3.0,
            EcosystemType::Other => CONSERVATIVE_RATE_TCO2_PER_HA,
        }
    }

    /// Parse a free-form ecosystem label as submitted by project uploads.
    /// Unrecognized labels map to [`EcosystemType::Other`].
    pub fn parse(label: &str) -> Self {
        match label.to_lowercase().replace([' ', '-'], "_").as_str() {
            "mangrove" | "mangroves" => EcosystemType::Mangrove,
            "seagrass" | "seagrasses" => EcosystemType::Seagrass,
            "salt_marsh" | "salt_marshes" | "saltmarsh" => EcosystemType::SaltMarsh,
            "coastal_wetland" | "coastal_wetlands" | "wetland" => EcosystemType::CoastalWetland,
            _ => EcosystemType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EcosystemType::Mangrove => "mangrove",
            EcosystemType::Seagrass => "seagrass",
            EcosystemType::SaltMarsh => "salt_marsh",
            EcosystemType::CoastalWetland => "coastal_wetland",
            EcosystemType::Other => "other",
        }
    }
}

impl fmt::Display for EcosystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
