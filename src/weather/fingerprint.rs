//! Weather condition fingerprint
//!
//! Encodes a current snapshot plus its hourly context into a fixed
//! 128-element unit vector for nearest-neighbor lookup against
//! historical conditions. Layout:
//!
//! - `[0..16)`   scaled scalar conditions (temp, humidity, wind, etc.)
//! - `[16..24)`  stability class one-hot (6 used, 2 spare)
//! - `[24..32)`  diurnal + seasonal phase (sin/cos pairs)
//! - `[32..80)`  hourly trend samples (up to 16 hours × 3 channels)
//! - `[80..128)` hour-over-hour deltas of the same channels
//!
//! The vector is normalized to unit magnitude; an all-zero input (which
//! cannot occur for finite snapshots) would stay zero rather than
//! divide by zero.

use chrono::{Datelike, NaiveDate, Timelike};

use crate::store::vector;
use crate::types::{StabilityClass, WeatherSnapshot, WEATHER_FINGERPRINT_DIM};

const TREND_HOURS: usize = 16;

/// Build the 128-d unit fingerprint for a snapshot in its hourly context.
pub fn weather_fingerprint(
    current: &WeatherSnapshot,
    hourly: &[WeatherSnapshot],
    date: NaiveDate,
) -> Vec<f32> {
    let mut v = vec![0.0_f32; WEATHER_FINGERPRINT_DIM];

    // Scalar conditions, scaled to roughly [-1, 1]
    v[0] = scale(current.temperature_c, -40.0, 49.0);
    v[1] = scale(current.humidity_pct, 0.0, 100.0);
    v[2] = scale(current.wind_speed_ms, 0.0, 45.0);
    v[3] = (current.wind_dir_deg.to_radians().sin()) as f32;
    v[4] = (current.wind_dir_deg.to_radians().cos()) as f32;
    v[5] = scale(current.precip_prob_pct, 0.0, 100.0);
    v[6] = scale(current.visibility_km, 0.0, 50.0);

    // Stability one-hot
    let base = 16;
    for class in StabilityClass::ALL {
        if class == current.stability {
            v[base + class.index()] = 1.0;
        }
    }

    // Diurnal phase from the snapshot timestamp, seasonal from the date
    let hour = chrono::DateTime::from_timestamp(current.ts, 0)
        .map(|dt| dt.hour() as f64)
        .unwrap_or(12.0);
    let day_phase = hour / 24.0 * std::f64::consts::TAU;
    v[24] = day_phase.sin() as f32;
    v[25] = day_phase.cos() as f32;
    let year_phase = f64::from(date.ordinal()) / 365.25 * std::f64::consts::TAU;
    v[26] = year_phase.sin() as f32;
    v[27] = year_phase.cos() as f32;

    // Hourly trend channels: wind, humidity, temperature
    for (i, snap) in hourly.iter().take(TREND_HOURS).enumerate() {
        v[32 + i * 3] = scale(snap.wind_speed_ms, 0.0, 45.0);
        v[32 + i * 3 + 1] = scale(snap.humidity_pct, 0.0, 100.0);
        v[32 + i * 3 + 2] = scale(snap.temperature_c, -40.0, 49.0);
    }

    // Hour-over-hour deltas of the same channels
    for (i, pair) in hourly.windows(2).take(TREND_HOURS).enumerate() {
        v[80 + i * 3] = scale(pair[1].wind_speed_ms - pair[0].wind_speed_ms, -10.0, 10.0);
        v[80 + i * 3 + 1] = scale(pair[1].humidity_pct - pair[0].humidity_pct, -30.0, 30.0);
        v[80 + i * 3 + 2] = scale(pair[1].temperature_c - pair[0].temperature_c, -10.0, 10.0);
    }

    vector::normalize(&mut v);
    v
}

/// Linear map of `x` from [lo, hi] into [-1, 1], clamped.
fn scale(x: f64, lo: f64, hi: f64) -> f32 {
    let t = ((x - lo) / (hi - lo)).clamp(0.0, 1.0);
    (t * 2.0 - 1.0) as f32
}
