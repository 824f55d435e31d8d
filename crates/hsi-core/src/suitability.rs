//! Run-global suitability layers: the coefficient-of-variation score and the
//! seasonal high-flow velocity layer. Both are derived once per run, not per
//! survey unit.
use crate::error::{HsiError, Result};
use crate::raster::Raster;

/// Velocity threshold (ft/s) below which seasonal high flow is fully
/// suitable. 3.281 ft/s = 1 m/s.
pub const SEASONAL_HIGH_FLOW_THRESHOLD: f32 = 3.281;

/// Persisted name of the seasonal high-flow suitability raster.
pub const SEASONAL_HSI_NAME: &str = "SeasHighFlowVelRas_HSI";

/// Parse the caller-supplied coefficient of variation.
pub fn parse_cv(input: &str) -> Result<f64> {
    input.trim().parse().map_err(|source| HsiError::Parse {
        input: input.to_string(),
        source,
    })
}

/// Step function mapping hydrologic variability to a suitability constant.
/// Buckets are closed on the upper side, so the score is monotonically
/// non-increasing in cv.
pub fn cv_score(cv: f64) -> f64 {
    if cv <= 0.9 {
        1.0
    } else if cv <= 1.05 {
        0.75
    } else if cv <= 1.15 {
        0.6
    } else {
        0.3
    }
}

/// Seasonal high-flow suitability: fully suitable at or below the threshold,
/// marginal above it.
pub fn seasonal_high_flow_hsi(velocity: &Raster) -> Raster {
    velocity.map(|v| {
        if v.is_nan() {
            f32::NAN
        } else if v <= SEASONAL_HIGH_FLOW_THRESHOLD {
            1.0
        } else {
            0.5
        }
    })
}
