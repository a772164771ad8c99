//! HTTP weather provider
//!
//! Speaks an Open-Meteo-shaped hourly JSON API. Status codes map onto
//! the pipeline taxonomy so the calling stage and breaker treat provider
//! trouble uniformly: 401/403 → `Auth`, 429 → `RateLimited` (honoring
//! `Retry-After`), everything else non-2xx and transport errors →
//! `Unavailable`.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Timelike, Utc};
use serde::Deserialize;

use crate::error::PipelineError;
use crate::types::{BurnWindow, WeatherSnapshot};

use super::{stability, WeatherProvider};

/// Weather client backed by a real HTTP provider.
#[derive(Clone)]
pub struct HttpWeatherProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

/// Hourly block of the provider response. Arrays are index-aligned.
#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<i64>,
    #[serde(rename = "temperature_2m")]
    temperature: Vec<f64>,
    #[serde(rename = "relative_humidity_2m")]
    humidity: Vec<f64>,
    #[serde(rename = "wind_speed_10m")]
    wind_speed: Vec<f64>,
    #[serde(rename = "wind_direction_10m")]
    wind_direction: Vec<f64>,
    #[serde(rename = "precipitation_probability")]
    precip_probability: Vec<f64>,
    visibility: Vec<f64>,
    cloud_cover: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    hourly: HourlyBlock,
}

impl HttpWeatherProvider {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| PipelineError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn fetch_hourly(&self, lat: f64, lon: f64) -> Result<Vec<WeatherSnapshot>, PipelineError> {
        let mut request = self
            .http
            .get(&self.base_url)
            .query(&[("latitude", lat), ("longitude", lon)])
            .query(&[(
                "hourly",
                "temperature_2m,relative_humidity_2m,wind_speed_10m,wind_direction_10m,\
                 precipitation_probability,visibility,cloud_cover",
            )])
            .query(&[("windspeed_unit", "ms"), ("timeformat", "unixtime")]);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| PipelineError::Unavailable(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => {}
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                return Err(PipelineError::Auth);
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30);
                return Err(PipelineError::RateLimited { retry_after_secs });
            }
            status => {
                return Err(PipelineError::Unavailable(format!(
                    "weather provider returned {status}"
                )));
            }
        }

        let body: ForecastResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::Unavailable(format!("malformed response: {e}")))?;

        Ok(Self::decode_hourly(&body.hourly))
    }

    /// Zip the index-aligned arrays into snapshots, dropping any index
    /// where a series is short.
    fn decode_hourly(hourly: &HourlyBlock) -> Vec<WeatherSnapshot> {
        let n = hourly
            .time
            .len()
            .min(hourly.temperature.len())
            .min(hourly.humidity.len())
            .min(hourly.wind_speed.len())
            .min(hourly.wind_direction.len())
            .min(hourly.precip_probability.len())
            .min(hourly.visibility.len())
            .min(hourly.cloud_cover.len());

        (0..n)
            .map(|i| {
                let ts = hourly.time[i];
                let hour = Utc
                    .timestamp_opt(ts, 0)
                    .single()
                    .map(|dt| dt.hour() as u8)
                    .unwrap_or(12);
                let mut snap = WeatherSnapshot {
                    temperature_c: hourly.temperature[i],
                    humidity_pct: hourly.humidity[i],
                    wind_speed_ms: hourly.wind_speed[i],
                    wind_dir_deg: hourly.wind_direction[i],
                    precip_prob_pct: hourly.precip_probability[i],
                    // Provider reports meters
                    visibility_km: hourly.visibility[i] / 1000.0,
                    stability: stability::classify(hourly.wind_speed[i], hour, hourly.cloud_cover[i]),
                    ts,
                };
                snap.sanitize();
                snap
            })
            .collect()
    }
}

#[async_trait]
impl WeatherProvider for HttpWeatherProvider {
    async fn current(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, PipelineError> {
        let now = Utc::now().timestamp();
        let hourly = self.fetch_hourly(lat, lon).await?;
        hourly
            .into_iter()
            .min_by_key(|snap| (snap.ts - now).abs())
            .ok_or_else(|| PipelineError::Unavailable("empty hourly series".into()))
    }

    async fn forecast(
        &self,
        lat: f64,
        lon: f64,
        date: NaiveDate,
        window: BurnWindow,
    ) -> Result<Vec<WeatherSnapshot>, PipelineError> {
        let hourly = self.fetch_hourly(lat, lon).await?;
        Ok(hourly
            .into_iter()
            .filter(|snap| {
                Utc.timestamp_opt(snap.ts, 0).single().is_some_and(|dt| {
                    dt.date_naive() == date
                        && (window.start_hour..window.end_hour).contains(&(dt.hour() as u8))
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_zips_shortest_series() {
        let hourly = HourlyBlock {
            time: vec![0, 3600, 7200],
            temperature: vec![20.0, 21.0],
            humidity: vec![40.0, 42.0, 44.0],
            wind_speed: vec![3.0, 3.5, 4.0],
            wind_direction: vec![270.0, 271.0, 272.0],
            precip_probability: vec![5.0, 5.0, 5.0],
            visibility: vec![16_000.0, 16_000.0, 16_000.0],
            cloud_cover: vec![10.0, 10.0, 10.0],
        };
        let snaps = HttpWeatherProvider::decode_hourly(&hourly);
        assert_eq!(snaps.len(), 2);
        assert!((snaps[0].visibility_km - 16.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decode_sanitizes_out_of_range_humidity() {
        let hourly = HourlyBlock {
            time: vec![0],
            temperature: vec![20.0],
            humidity: vec![130.0],
            wind_speed: vec![3.0],
            wind_direction: vec![270.0],
            precip_probability: vec![5.0],
            visibility: vec![16_000.0],
            cloud_cover: vec![10.0],
        };
        let snaps = HttpWeatherProvider::decode_hourly(&hourly);
        assert!((snaps[0].humidity_pct - 100.0).abs() < f64::EPSILON);
    }
}
