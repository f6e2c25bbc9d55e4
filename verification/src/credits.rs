//! Carbon-credit quantity for an approved project.

use tidemark_types::EcosystemType;

const SQ_METERS_PER_HECTARE: f64 = 10_000.0;

/// Annual credit quantity (tCO2e) for a project area and ecosystem.
///
/// Uses the conservative per-ecosystem sequestration rate; an unknown
/// ecosystem earns the lowest rate in the table. Negative or non-finite
/// areas yield zero credits.
pub fn credit_quantity(area_sq_m: f64, ecosystem: EcosystemType) -> f64 {
    if !area_sq_m.is_finite() || area_sq_m <= 0.0 {
        return 0.0;
    }
    area_sq_m / SQ_METERS_PER_HECTARE * ecosystem.sequestration_rate_tco2_per_ha()
}
