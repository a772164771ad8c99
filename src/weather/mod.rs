//! Weather provider facade
//!
//! Narrow interface the pipeline consumes: current conditions and an
//! hourly forecast filtered to a local date and burn window. The HTTP
//! provider speaks an Open-Meteo-shaped JSON API; the mock produces
//! deterministic snapshots seeded by (lat, lon, date) so integration
//! tests and demo mode replay identically.

mod fingerprint;
mod http;
mod mock;
pub mod stability;

pub use fingerprint::weather_fingerprint;
pub use http::HttpWeatherProvider;
pub use mock::MockWeatherProvider;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::PipelineError;
use crate::types::{BurnWindow, WeatherSnapshot};

/// Fetch current + hourly forecast for a coordinate/date.
///
/// Failures map to the pipeline taxonomy: `Unavailable` (transient),
/// `Auth` (bad credentials), `RateLimited` (honored delay). Retry policy
/// lives in the calling stage, not here.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Point-in-time conditions at a coordinate.
    async fn current(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, PipelineError>;

    /// Hourly snapshots for the requested local date, filtered to the
    /// burn window, in chronological order.
    async fn forecast(
        &self,
        lat: f64,
        lon: f64,
        date: NaiveDate,
        window: BurnWindow,
    ) -> Result<Vec<WeatherSnapshot>, PipelineError>;
}
