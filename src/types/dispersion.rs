//! Dispersion model output types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dimension of the plume fingerprint vector.
pub const PLUME_FINGERPRINT_DIM: usize = 64;

/// Short-term PM2.5 threshold, µg/m³. The effective radius is the
/// distance beyond which predicted concentration stays below this.
pub const PM25_THRESHOLD: f64 = 35.0;

/// One ray of the ground-level footprint: how far the 35 µg/m³ boundary
/// extends along a compass bearing from the burn centroid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FootprintRay {
    pub bearing_deg: f64,
    pub radius_m: f64,
}

/// Output of the Gaussian plume model for one burn under one weather
/// snapshot. All fields are finite; `max_radius_m > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispersionResult {
    pub request_id: Uuid,
    /// Emission rate, g/s.
    pub emission_rate_gs: f64,
    /// Effective plume height (surface release + buoyant rise), m.
    pub effective_height_m: f64,
    /// Crosswind dispersion coefficient at the reference distance, m.
    pub sigma_y_ref_m: f64,
    /// Vertical dispersion coefficient at the reference distance, m.
    pub sigma_z_ref_m: f64,
    /// Max ground-level PM2.5 at fixed downwind receptors, µg/m³.
    pub pm25_at_1km: f64,
    pub pm25_at_5km: f64,
    pub pm25_at_10km: f64,
    pub pm25_at_25km: f64,
    /// Ground-level footprint sampled on compass bearings.
    pub footprint: Vec<FootprintRay>,
    /// Smallest downwind distance where PM2.5 ≤ 35 µg/m³, m.
    pub max_radius_m: f64,
    /// Calm-wind conditions were clamped; dispersion is poor.
    pub poor_dispersion: bool,
    /// Inputs were clamped to the parameterization envelope.
    pub out_of_envelope: bool,
}

impl DispersionResult {
    /// Whether every numeric output is finite (and the radius positive).
    pub fn is_finite(&self) -> bool {
        let scalars = [
            self.emission_rate_gs,
            self.effective_height_m,
            self.sigma_y_ref_m,
            self.sigma_z_ref_m,
            self.pm25_at_1km,
            self.pm25_at_5km,
            self.pm25_at_10km,
            self.pm25_at_25km,
            self.max_radius_m,
        ];
        scalars.iter().all(|v| v.is_finite())
            && self.max_radius_m > 0.0
            && self.footprint.iter().all(|r| r.bearing_deg.is_finite() && r.radius_m.is_finite())
    }
}
