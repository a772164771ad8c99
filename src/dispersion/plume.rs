//! Gaussian plume core: Briggs rise, Pasquill–Gifford sigmas, receptor
//! concentration, and the effective-radius search
//!
//! Key formulas:
//! - Buoyancy flux `F = g·Q_H / (π·cp·ρ·T)` with sensible heat scaled
//!   from the PM2.5 emission rate (see `SENSIBLE_HEAT_W_PER_GS`)
//! - Briggs final rise: `21.425·F^¾/u` (F < 55), `38.71·F^⅗/u` (F ≥ 55),
//!   stable classes use `2.6·(F/(u·s))^⅓`
//! - σ_y = a·x^0.894 (x in km), σ_z = c·x^d + f (Martin 1976, split at
//!   1 km)
//! - `C = Q/(π·u·σy·σz) · exp(−y²/2σy²) · exp(−H²/2σz²)`, µg/m³

use crate::types::StabilityClass;

/// Wind speed floor, m/s. Below this the plume equation is singular.
pub const MIN_WIND_MS: f64 = 0.5;

/// Reference distance for reported σ values, m.
pub const REFERENCE_DISTANCE_M: f64 = 1_000.0;

/// Outer bound of the radius search, m.
pub const MAX_SCAN_DISTANCE_M: f64 = 100_000.0;

/// Floor applied to σ values to keep divisions finite near the source.
const MIN_SIGMA_M: f64 = 0.5;

/// Sensible heat per g/s of PM2.5 emitted, W. Derived from biomass heat
/// content and PM2.5 yield, discounted heavily because a field burn is a
/// distributed strip source rather than a point release — only a small
/// fraction of the total heat drives a coherent buoyant column.
const SENSIBLE_HEAT_W_PER_GS: f64 = 5.0e5;

// ============================================================================
// Briggs plume rise
// ============================================================================

/// Effective plume height: surface release (stack height 0) plus
/// buoyant rise from the fire's sensible heat.
pub fn effective_height_m(
    q_gs: f64,
    wind_ms: f64,
    stability: StabilityClass,
    ambient_temp_c: f64,
) -> f64 {
    let u = wind_ms.max(MIN_WIND_MS);
    let t_ambient_k = (ambient_temp_c + 273.15).max(200.0);

    // Buoyancy flux, m⁴/s³
    let q_heat_w = q_gs.max(0.0) * SENSIBLE_HEAT_W_PER_GS;
    let f = 9.81 * q_heat_w / (std::f64::consts::PI * 1_005.0 * 1.2 * t_ambient_k);

    if f <= 0.0 {
        return 0.0;
    }

    let rise = match stability {
        StabilityClass::E | StabilityClass::F => {
            // Stable: limited rise against the potential temperature gradient
            let dtheta_dz = if stability == StabilityClass::E { 0.02 } else { 0.035 };
            let s = 9.81 / t_ambient_k * dtheta_dz;
            2.6 * (f / (u * s.max(1e-6))).powf(1.0 / 3.0)
        }
        _ => {
            if f < 55.0 {
                21.425 * f.powf(0.75) / u
            } else {
                38.71 * f.powf(0.6) / u
            }
        }
    };

    // Surface burns: no physical stack
    rise.max(0.0)
}

// ============================================================================
// Pasquill–Gifford dispersion coefficients
// ============================================================================

/// σ_y power-law coefficient by class: σ_y = a·x_km^0.894 (m).
fn sigma_y_coeff(stability: StabilityClass) -> f64 {
    match stability {
        StabilityClass::A => 213.0,
        StabilityClass::B => 156.0,
        StabilityClass::C => 104.0,
        StabilityClass::D => 68.0,
        StabilityClass::E => 50.5,
        StabilityClass::F => 34.0,
    }
}

/// σ_z = c·x_km^d + f (m), Martin (1976) coefficients, split at 1 km.
fn sigma_z_coeffs(stability: StabilityClass, x_km: f64) -> (f64, f64, f64) {
    if x_km <= 1.0 {
        match stability {
            StabilityClass::A => (440.8, 1.941, 9.27),
            StabilityClass::B => (106.6, 1.149, 3.3),
            StabilityClass::C => (61.0, 0.911, 0.0),
            StabilityClass::D => (33.2, 0.725, -1.7),
            StabilityClass::E => (22.8, 0.678, -1.3),
            StabilityClass::F => (14.35, 0.740, -0.35),
        }
    } else {
        match stability {
            StabilityClass::A => (459.7, 2.094, -9.6),
            StabilityClass::B => (108.2, 1.098, 2.0),
            StabilityClass::C => (61.0, 0.911, 0.0),
            StabilityClass::D => (44.053, 0.516, -13.0),
            StabilityClass::E => (55.025, 0.305, -34.0),
            StabilityClass::F => (62.6, 0.180, -48.6),
        }
    }
}

/// Dispersion coefficients (σ_y, σ_z) at downwind distance x, meters.
/// Both are floored to stay positive arbitrarily close to the source.
pub fn sigmas_at(stability: StabilityClass, x_m: f64) -> (f64, f64) {
    let x_km = (x_m / 1_000.0).max(1e-4);
    let sigma_y = sigma_y_coeff(stability) * x_km.powf(0.894);
    let (c, d, f) = sigma_z_coeffs(stability, x_km);
    let sigma_z = c * x_km.powf(d) + f;
    (sigma_y.max(MIN_SIGMA_M), sigma_z.max(MIN_SIGMA_M))
}

// ============================================================================
// Receptor concentration
// ============================================================================

/// Ground-level PM2.5 concentration at downwind distance `x_m` and
/// crosswind offset `y_m`, in µg/m³. Returns 0 at or behind the source.
pub fn concentration_ugm3(
    q_gs: f64,
    wind_ms: f64,
    stability: StabilityClass,
    effective_height_m: f64,
    x_m: f64,
    y_m: f64,
) -> f64 {
    if x_m <= 0.0 || q_gs <= 0.0 {
        return 0.0;
    }
    let u = wind_ms.max(MIN_WIND_MS);
    let (sigma_y, sigma_z) = sigmas_at(stability, x_m);

    let crosswind = (-y_m * y_m / (2.0 * sigma_y * sigma_y)).exp();
    let vertical = (-effective_height_m * effective_height_m / (2.0 * sigma_z * sigma_z)).exp();

    // g/m³ → µg/m³
    let c = q_gs / (std::f64::consts::PI * u * sigma_y * sigma_z) * crosswind * vertical * 1e6;
    if c.is_finite() {
        c
    } else {
        0.0
    }
}

/// Smallest downwind distance beyond which centerline concentration
/// stays at or below `threshold` µg/m³.
///
/// The profile rises to a peak (the elevated plume touches down) and
/// then decays, so the boundary is the last grid point above the
/// threshold, refined by bisection against the next one.
pub fn effective_radius_m(
    q_gs: f64,
    wind_ms: f64,
    stability: StabilityClass,
    effective_height_m: f64,
    threshold: f64,
) -> f64 {
    let conc = |x: f64| concentration_ugm3(q_gs, wind_ms, stability, effective_height_m, x, 0.0);

    // Logarithmic scan for the last exceedance
    let mut last_above = 0.0_f64;
    let mut next_below = 0.0_f64;
    let mut x = 50.0_f64;
    while x <= MAX_SCAN_DISTANCE_M {
        if conc(x) > threshold {
            last_above = x;
            next_below = 0.0;
        } else if last_above > 0.0 && next_below == 0.0 {
            next_below = x;
        }
        x *= 1.2;
    }

    if last_above == 0.0 {
        // Never exceeds the threshold anywhere
        return 0.0;
    }
    if next_below == 0.0 {
        // Still above threshold at the scan boundary
        return MAX_SCAN_DISTANCE_M;
    }

    // Bisection between the bracketing grid points
    let (mut lo, mut hi) = (last_above, next_below);
    for _ in 0..40 {
        let mid = (lo + hi) / 2.0;
        if conc(mid) > threshold {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmas_grow_with_distance() {
        let (y1, z1) = sigmas_at(StabilityClass::D, 500.0);
        let (y2, z2) = sigmas_at(StabilityClass::D, 5_000.0);
        assert!(y2 > y1);
        assert!(z2 > z1);
    }

    #[test]
    fn unstable_classes_spread_more() {
        let (ya, _) = sigmas_at(StabilityClass::A, 1_000.0);
        let (yf, _) = sigmas_at(StabilityClass::F, 1_000.0);
        assert!(ya > yf);
    }

    #[test]
    fn sigmas_are_floored_near_source() {
        let (y, z) = sigmas_at(StabilityClass::F, 0.001);
        assert!(y >= MIN_SIGMA_M);
        assert!(z >= MIN_SIGMA_M);
    }

    #[test]
    fn concentration_is_zero_upwind_and_at_source() {
        assert!(concentration_ugm3(100.0, 3.0, StabilityClass::D, 20.0, 0.0, 0.0).abs() < 1e-12);
        assert!(concentration_ugm3(100.0, 3.0, StabilityClass::D, 20.0, -100.0, 0.0).abs() < 1e-12);
    }

    #[test]
    fn crosswind_offset_reduces_concentration() {
        let center = concentration_ugm3(100.0, 3.0, StabilityClass::D, 20.0, 2_000.0, 0.0);
        let offset = concentration_ugm3(100.0, 3.0, StabilityClass::D, 20.0, 2_000.0, 500.0);
        assert!(center > offset);
    }

    #[test]
    fn calm_wind_never_produces_infinity() {
        for wind in [0.0, 0.1, 0.4] {
            let c = concentration_ugm3(5_000.0, wind, StabilityClass::F, 5.0, 1_000.0, 0.0);
            assert!(c.is_finite(), "wind {wind} gave {c}");
        }
    }

    #[test]
    fn briggs_rise_decreases_with_wind() {
        let calm = effective_height_m(200.0, 1.0, StabilityClass::D, 20.0);
        let windy = effective_height_m(200.0, 10.0, StabilityClass::D, 20.0);
        assert!(calm > windy);
        assert!(calm.is_finite() && windy.is_finite());
    }

    #[test]
    fn stable_rise_is_bounded() {
        let neutral = effective_height_m(200.0, 3.0, StabilityClass::D, 20.0);
        let stable = effective_height_m(200.0, 3.0, StabilityClass::F, 20.0);
        assert!(stable < neutral);
        assert!(stable > 0.0);
    }

    #[test]
    fn radius_brackets_the_threshold() {
        let q = 250.0;
        let h = effective_height_m(q, 3.0, StabilityClass::D, 20.0);
        let radius = effective_radius_m(q, 3.0, StabilityClass::D, h, 35.0);
        if radius > 0.0 && radius < MAX_SCAN_DISTANCE_M {
            let just_inside = concentration_ugm3(q, 3.0, StabilityClass::D, h, radius * 0.98, 0.0);
            let just_outside = concentration_ugm3(q, 3.0, StabilityClass::D, h, radius * 1.5, 0.0);
            assert!(just_inside > just_outside);
            assert!(just_outside <= 35.0 * 1.05);
        }
    }

    #[test]
    fn tiny_source_has_zero_radius() {
        let radius = effective_radius_m(0.01, 5.0, StabilityClass::A, 1.0, 35.0);
        assert!(radius.abs() < f64::EPSILON);
    }
}
