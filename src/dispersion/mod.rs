//! Smoke dispersion model
//!
//! Steady-state Gaussian plume parameterization producing ground-level
//! PM2.5 predictions for a single burn under one weather snapshot. All
//! math here is deterministic physics — no external I/O.
//!
//! Pipeline:
//! 1. Emission rate Q from acreage, fuel factor, and intensity
//! 2. Effective plume height from Briggs buoyant rise
//! 3. Pasquill–Gifford dispersion coefficients σ_y(x), σ_z(x)
//! 4. Receptor concentrations and the 35 µg/m³ effective radius
//!
//! Numerics policy: every division has a positive floor, outputs are
//! checked finite, and a non-finite producer falls back to the most
//! stable class before being reported as a numeric failure.

pub mod emission;
mod fingerprint;
pub mod plume;

pub use fingerprint::plume_fingerprint;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::types::{
    BurnRequest, DispersionResult, FootprintRay, StabilityClass, WeatherSnapshot, PM25_THRESHOLD,
};

/// Bearings sampled for the ground-level footprint (every 30°).
const FOOTPRINT_BEARINGS: usize = 12;

/// Downwind receptor distances reported as fixed outputs, km.
const RECEPTOR_KM: [f64; 4] = [1.0, 5.0, 10.0, 25.0];

/// Floor on the minimum effective radius, m. A burn always has some
/// footprint; zero would break conflict gridding downstream.
const MIN_RADIUS_M: f64 = 100.0;

/// Run the plume model for a burn under a weather snapshot.
///
/// Calm wind is clamped to 0.5 m/s and flagged `poor_dispersion` rather
/// than treated as infinite concentration. Temperatures outside the
/// parameterization envelope are clamped and flagged `out_of_envelope`.
pub fn predict(
    request: &BurnRequest,
    weather: &WeatherSnapshot,
    fuel_factor_gs_ha: f64,
) -> Result<DispersionResult, PipelineError> {
    let mut snap = weather.clone();
    let out_of_envelope = snap.sanitize();
    let poor_dispersion = snap.wind_speed_ms < plume::MIN_WIND_MS;
    let u = snap.wind_speed_ms.max(plume::MIN_WIND_MS);

    let q = emission::emission_rate_gs(
        request.acres,
        fuel_factor_gs_ha,
        request.intensity.factor(),
        request.duration_hours(),
    );

    match compute(request, &snap, q, u, snap.stability) {
        Ok(mut result) => {
            result.poor_dispersion = poor_dispersion;
            result.out_of_envelope = out_of_envelope;
            debug!(
                request_id = %request.id,
                q_gs = q,
                radius_m = result.max_radius_m,
                stability = %snap.stability,
                "Dispersion prediction complete"
            );
            Ok(result)
        }
        Err(_) => {
            // Corner cases of the sigma tables can underflow; the most
            // stable class bounds the plume from above.
            warn!(
                request_id = %request.id,
                stability = %snap.stability,
                "Non-finite plume output, retrying with worst-case stability"
            );
            let mut result = compute(request, &snap, q, u, StabilityClass::F)?;
            result.poor_dispersion = poor_dispersion;
            result.out_of_envelope = true;
            Ok(result)
        }
    }
}

fn compute(
    request: &BurnRequest,
    snap: &WeatherSnapshot,
    q: f64,
    u: f64,
    stability: StabilityClass,
) -> Result<DispersionResult, PipelineError> {
    let h = plume::effective_height_m(q, u, stability, snap.temperature_c);

    let receptors: Vec<f64> = RECEPTOR_KM
        .iter()
        .map(|&km| plume::concentration_ugm3(q, u, stability, h, km * 1000.0, 0.0))
        .collect();

    let max_radius_m =
        plume::effective_radius_m(q, u, stability, h, PM25_THRESHOLD).max(MIN_RADIUS_M);

    let footprint = footprint_rays(q, u, stability, h, snap.wind_dir_deg);

    let (sigma_y_ref_m, sigma_z_ref_m) = plume::sigmas_at(stability, plume::REFERENCE_DISTANCE_M);

    let result = DispersionResult {
        request_id: request.id,
        emission_rate_gs: q,
        effective_height_m: h,
        sigma_y_ref_m,
        sigma_z_ref_m,
        pm25_at_1km: receptors[0],
        pm25_at_5km: receptors[1],
        pm25_at_10km: receptors[2],
        pm25_at_25km: receptors[3],
        footprint,
        max_radius_m,
        poor_dispersion: false,
        out_of_envelope: false,
    };

    if result.is_finite() {
        Ok(result)
    } else {
        Err(PipelineError::Numeric(format!(
            "non-finite plume output for request {} (u={u}, stability={stability})",
            request.id
        )))
    }
}

/// Sample the 35 µg/m³ boundary on compass bearings around the source.
///
/// Smoke travels downwind: a receptor at distance r along bearing θ sits
/// at downwind offset `r·cos(Δ)` and crosswind offset `r·sin(Δ)` where Δ
/// is the angle off the plume axis. Upwind bearings collapse to the
/// minimum radius.
fn footprint_rays(
    q: f64,
    u: f64,
    stability: StabilityClass,
    h: f64,
    wind_dir_deg: f64,
) -> Vec<FootprintRay> {
    // Wind direction is where wind comes FROM; the plume axis points the
    // opposite way.
    let plume_axis_deg = (wind_dir_deg + 180.0) % 360.0;

    (0..FOOTPRINT_BEARINGS)
        .map(|i| {
            let bearing_deg = f64::from(i as u32) * 360.0 / FOOTPRINT_BEARINGS as f64;
            let delta = (bearing_deg - plume_axis_deg).to_radians();
            let radius_m = if delta.cos() <= 0.05 {
                MIN_RADIUS_M
            } else {
                boundary_along(q, u, stability, h, delta).max(MIN_RADIUS_M)
            };
            FootprintRay { bearing_deg, radius_m }
        })
        .collect()
}

/// Largest distance along a ray (angle `delta` off the plume axis) where
/// concentration still exceeds the threshold. Log-grid scan.
fn boundary_along(q: f64, u: f64, stability: StabilityClass, h: f64, delta: f64) -> f64 {
    let mut boundary = 0.0;
    let mut r = 50.0_f64;
    while r <= plume::MAX_SCAN_DISTANCE_M {
        let x = r * delta.cos();
        let y = r * delta.sin();
        if x > 0.0 && plume::concentration_ugm3(q, u, stability, h, x, y) > PM25_THRESHOLD {
            boundary = r;
        }
        r *= 1.25;
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BurnIntensity, BurnWindow, ContactMethod, FieldPolygon, FuelType, GeoPoint, RequestState,
    };
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn test_request(acres: f64) -> BurnRequest {
        let ring = vec![
            GeoPoint::new(38.542, -121.742),
            GeoPoint::new(38.542, -121.738),
            GeoPoint::new(38.546, -121.738),
            GeoPoint::new(38.546, -121.742),
            GeoPoint::new(38.542, -121.742),
        ];
        BurnRequest {
            id: Uuid::from_u128(7),
            farm_id: "f1".into(),
            field_boundary: FieldPolygon::new(ring),
            acres,
            fuel: FuelType::WheatStubble,
            intensity: BurnIntensity::Moderate,
            burn_date: NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date"),
            window: BurnWindow::new(8, 16),
            priority: 5.0,
            max_radius_m: 0.0,
            contact: ContactMethod::Sms,
            contact_handle: "+15550100".into(),
            state: RequestState::Validated,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn calm_snapshot(wind: f64) -> WeatherSnapshot {
        WeatherSnapshot {
            temperature_c: 22.0,
            humidity_pct: 45.0,
            wind_speed_ms: wind,
            wind_dir_deg: 270.0,
            precip_prob_pct: 10.0,
            visibility_km: 16.0,
            stability: StabilityClass::D,
            ts: 0,
        }
    }

    #[test]
    fn moderate_burn_produces_finite_result() {
        let result = predict(&test_request(100.0), &calm_snapshot(3.0), 12.0).expect("predict");
        assert!(result.is_finite());
        assert!(result.max_radius_m >= MIN_RADIUS_M);
        assert!(!result.poor_dispersion);
        assert_eq!(result.footprint.len(), FOOTPRINT_BEARINGS);
    }

    #[test]
    fn zero_wind_is_clamped_and_flagged() {
        let result = predict(&test_request(100.0), &calm_snapshot(0.0), 12.0).expect("predict");
        assert!(result.is_finite());
        assert!(result.poor_dispersion);
    }

    #[test]
    fn extreme_temperature_is_clamped_and_flagged() {
        let mut snap = calm_snapshot(3.0);
        snap.temperature_c = 60.0;
        let result = predict(&test_request(100.0), &snap, 12.0).expect("predict");
        assert!(result.is_finite());
        assert!(result.out_of_envelope);
    }

    #[test]
    fn hurricane_wind_stays_finite() {
        let result = predict(&test_request(100.0), &calm_snapshot(45.0), 12.0).expect("predict");
        assert!(result.is_finite());
    }

    #[test]
    fn far_field_concentration_decays() {
        // The elevated plume may peak past 1 km, but beyond touchdown
        // the profile is strictly decaying
        let result = predict(&test_request(500.0), &calm_snapshot(3.0), 18.0).expect("predict");
        assert!(result.pm25_at_5km >= result.pm25_at_10km);
        assert!(result.pm25_at_10km >= result.pm25_at_25km);
        assert!(result.pm25_at_25km >= 0.0);
    }

    #[test]
    fn calm_hundred_acre_burn_stays_under_threshold_at_receptors() {
        let result = predict(&test_request(100.0), &calm_snapshot(3.0), 12.0).expect("predict");
        for receptor in [
            result.pm25_at_1km,
            result.pm25_at_5km,
            result.pm25_at_10km,
            result.pm25_at_25km,
        ] {
            assert!(receptor < PM25_THRESHOLD, "receptor at {receptor}");
        }
    }

    #[test]
    fn larger_burns_reach_farther() {
        let small = predict(&test_request(50.0), &calm_snapshot(3.0), 12.0).expect("predict");
        let large = predict(&test_request(2000.0), &calm_snapshot(3.0), 12.0).expect("predict");
        assert!(large.max_radius_m >= small.max_radius_m);
    }

    #[test]
    fn upwind_footprint_collapses_to_minimum() {
        // Wind from 270° → plume axis 90° (east). The 270° bearing is upwind.
        let result = predict(&test_request(500.0), &calm_snapshot(5.0), 18.0).expect("predict");
        let upwind = result
            .footprint
            .iter()
            .find(|ray| (ray.bearing_deg - 270.0).abs() < 1.0)
            .expect("upwind ray present");
        assert!((upwind.radius_m - MIN_RADIUS_M).abs() < f64::EPSILON);
    }
}
