//! Deterministic mock weather provider
//!
//! Snapshots are generated from a seed mixed out of (lat, lon, date), so
//! the same coordinate and date always replay the same conditions. Tests
//! can pin conditions with `with_conditions` or inject failures with
//! `failing` to exercise retry and breaker paths.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::PipelineError;
use crate::types::{BurnWindow, StabilityClass, WeatherSnapshot};

use super::{stability, WeatherProvider};

/// In-memory weather provider with the same contract as the HTTP one.
pub struct MockWeatherProvider {
    /// Pinned conditions override the seeded generator when set.
    pinned: Option<WeatherSnapshot>,
    /// Remaining calls that fail with `Unavailable` before recovery.
    failures_remaining: AtomicU32,
}

impl Default for MockWeatherProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWeatherProvider {
    pub fn new() -> Self {
        Self { pinned: None, failures_remaining: AtomicU32::new(0) }
    }

    /// Pin every snapshot to fixed conditions (hour/timestamp still vary).
    pub fn with_conditions(snapshot: WeatherSnapshot) -> Self {
        Self { pinned: Some(snapshot), failures_remaining: AtomicU32::new(0) }
    }

    /// Fail the next `n` calls with `Unavailable`, then behave normally.
    pub fn failing(n: u32) -> Self {
        Self { pinned: None, failures_remaining: AtomicU32::new(n) }
    }

    fn maybe_fail(&self) -> Result<(), PipelineError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(PipelineError::Unavailable("mock outage".into()));
        }
        Ok(())
    }

    /// Mix (lat, lon, date) into a stable RNG seed.
    fn seed(lat: f64, lon: f64, date: NaiveDate) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for bits in [
            lat.to_bits(),
            lon.to_bits(),
            u64::from(date.num_days_from_ce().unsigned_abs()),
        ] {
            h ^= bits;
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
        h
    }

    fn synthesize(&self, lat: f64, lon: f64, date: NaiveDate, hour: u8) -> WeatherSnapshot {
        let ts = date
            .and_hms_opt(u32::from(hour.min(23)), 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);

        if let Some(ref pinned) = self.pinned {
            return WeatherSnapshot { ts, ..pinned.clone() };
        }

        let mut rng = StdRng::seed_from_u64(Self::seed(lat, lon, date) ^ u64::from(hour));
        // Diurnal temperature curve around a seeded daily mean
        let mean_temp: f64 = rng.gen_range(8.0..28.0);
        let diurnal = ((f64::from(hour) - 14.0) / 24.0 * std::f64::consts::TAU).cos() * 6.0;
        let wind: f64 = rng.gen_range(1.0..8.0);
        let cloud: f64 = rng.gen_range(0.0..60.0);
        let mut snap = WeatherSnapshot {
            temperature_c: mean_temp + diurnal,
            humidity_pct: rng.gen_range(25.0..75.0),
            wind_speed_ms: wind,
            wind_dir_deg: rng.gen_range(0.0..360.0),
            precip_prob_pct: (cloud * 0.6).min(50.0),
            visibility_km: rng.gen_range(8.0..40.0),
            stability: StabilityClass::D,
            ts,
        };
        snap.stability = stability::classify(snap.wind_speed_ms, hour, cloud);
        snap
    }
}

#[async_trait]
impl WeatherProvider for MockWeatherProvider {
    async fn current(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, PipelineError> {
        self.maybe_fail()?;
        let today = chrono::Utc::now().date_naive();
        let hour = chrono::Utc::now().format("%H").to_string().parse().unwrap_or(12);
        Ok(self.synthesize(lat, lon, today, hour))
    }

    async fn forecast(
        &self,
        lat: f64,
        lon: f64,
        date: NaiveDate,
        window: BurnWindow,
    ) -> Result<Vec<WeatherSnapshot>, PipelineError> {
        self.maybe_fail()?;
        Ok((window.start_hour..window.end_hour)
            .map(|hour| self.synthesize(lat, lon, date, hour))
            .collect())
    }
}
