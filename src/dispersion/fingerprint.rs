//! Plume fingerprint
//!
//! Summarizes a dispersion result as a 64-element unit vector for
//! similarity search against historical plumes. Layout:
//!
//! - `[0..12)`  scaled scalars (Q, height, sigmas, receptors, radius)
//! - `[12..36)` footprint rays scaled by the max radius (12 × 2)
//! - `[36..64)` log-spaced centerline decay profile

use crate::store::vector;
use crate::types::{DispersionResult, PLUME_FINGERPRINT_DIM};

/// Build the 64-d unit fingerprint for a dispersion result.
pub fn plume_fingerprint(result: &DispersionResult) -> Vec<f32> {
    let mut v = vec![0.0_f32; PLUME_FINGERPRINT_DIM];

    v[0] = log_scale(result.emission_rate_gs, 1e4);
    v[1] = log_scale(result.effective_height_m, 2_000.0);
    v[2] = log_scale(result.sigma_y_ref_m, 1_000.0);
    v[3] = log_scale(result.sigma_z_ref_m, 1_000.0);
    v[4] = log_scale(result.pm25_at_1km, 1e4);
    v[5] = log_scale(result.pm25_at_5km, 1e4);
    v[6] = log_scale(result.pm25_at_10km, 1e4);
    v[7] = log_scale(result.pm25_at_25km, 1e4);
    v[8] = log_scale(result.max_radius_m, 100_000.0);
    v[9] = if result.poor_dispersion { 1.0 } else { 0.0 };
    v[10] = if result.out_of_envelope { 1.0 } else { 0.0 };

    // Footprint shape, normalized by the max radius so the fingerprint
    // captures form independent of absolute scale
    let max_ray = result
        .footprint
        .iter()
        .map(|r| r.radius_m)
        .fold(1.0_f64, f64::max);
    for (i, ray) in result.footprint.iter().take(12).enumerate() {
        v[12 + i * 2] = (ray.radius_m / max_ray) as f32;
        v[12 + i * 2 + 1] = (ray.bearing_deg / 360.0) as f32;
    }

    // Receptor decay ratios give the profile slope
    let base = result.pm25_at_1km.max(1e-9);
    v[36] = (result.pm25_at_5km / base).min(1.0) as f32;
    v[37] = (result.pm25_at_10km / base).min(1.0) as f32;
    v[38] = (result.pm25_at_25km / base).min(1.0) as f32;

    vector::normalize(&mut v);
    v
}

/// Compress a non-negative quantity into [0, 1] on a log scale.
fn log_scale(x: f64, cap: f64) -> f32 {
    let t = (x.max(0.0).ln_1p() / cap.ln_1p()).clamp(0.0, 1.0);
    t as f32
}
