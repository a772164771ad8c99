//! Stage B — Weather-Assess
//!
//! Fetches current + forecast conditions through the cache and breaker,
//! builds the 128-d condition fingerprint, estimates confidence from
//! nearest historical neighbors, and gates unsafe conditions behind
//! human approval. Budget: 25 s including retries; the approval wait is
//! not counted against it.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::defaults::{STAGE_BACKOFF_BASE_MS, STAGE_MAX_RETRIES};
use crate::error::PipelineError;
use crate::infra::{delay_for_error, TtlCache};
use crate::store::{tables, vector};
use crate::types::{EventKind, StageName, WeatherSnapshot};
use crate::weather::weather_fingerprint;
use crate::pipeline::records;

use super::{StageContext, WorkingSet};

pub async fn run(
    ctx: &StageContext,
    ws: &mut WorkingSet,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    let centroid = ws.request.centroid();
    let budget = Duration::from_millis(StageName::WeatherAssess.budget_ms());

    // I/O section under the stage budget
    let fetched = tokio::select! {
        res = tokio::time::timeout(budget, fetch_conditions(ctx, ws, centroid.lat, centroid.lon)) => {
            res.map_err(|_| PipelineError::Unavailable("weather budget exceeded".into()))?
        }
        () = cancel.cancelled() => return Err(PipelineError::Cancelled),
    };
    let (current, hourly) = fetched?;

    // Representative snapshot: first in-window forecast hour, falling
    // back to current conditions when the forecast is empty
    let assessed = hourly.first().cloned().unwrap_or(current);

    let fingerprint = weather_fingerprint(&assessed, &hourly, ws.request.burn_date);
    let confidence = historical_confidence(ctx, &fingerprint)?;
    ws.confidence = confidence;

    ctx.events.emit(
        ws.request.id,
        EventKind::StageThinking {
            stage: StageName::WeatherAssess,
            confidence,
            note: format!(
                "wind {:.1} m/s, humidity {:.0}%, stability {}",
                assessed.wind_speed_ms, assessed.humidity_pct, assessed.stability
            ),
        },
    );

    // Persist the snapshot with its fingerprint
    let row_id = Uuid::new_v4().to_string();
    let row = records::weather_row(
        &row_id,
        ws.request.id,
        centroid.lat,
        centroid.lon,
        &assessed,
        fingerprint,
    )?;
    ctx.store.put(tables::WEATHER_SNAPSHOTS, row)?;
    ws.weather_row_id = Some(row_id);

    let stats = ctx.current_cache.stats();
    ctx.events.emit(
        ws.request.id,
        EventKind::Metric { name: "weather_cache_hits".into(), value: stats.hits as f64 },
    );

    if assessed.is_unsafe_for_burning() {
        let context = format!(
            "unsafe conditions: wind {:.1} m/s, humidity {:.0}%, visibility {:.1} km, precip {:.0}%",
            assessed.wind_speed_ms,
            assessed.humidity_pct,
            assessed.visibility_km,
            assessed.precip_prob_pct
        );
        warn!(request_id = %ws.request.id, %context, "Requesting human approval");
        // Gate first, event second: a subscriber reacting to the event
        // must find the gate already in place
        let rx = ctx.approvals.register(ws.request.id);
        ctx.events.emit(ws.request.id, EventKind::ApprovalRequired { context });
        let approved = tokio::select! {
            decision = rx => match decision {
                Ok(approve) => approve,
                // Sender dropped without a decision: cancellation path
                Err(_) => return Err(PipelineError::Cancelled),
            },
            () = cancel.cancelled() => {
                ctx.approvals.forget(ws.request.id);
                return Err(PipelineError::Cancelled);
            }
        };
        if !approved {
            return Err(PipelineError::Validation {
                fields: vec!["weather: unsafe conditions rejected by operator".to_string()],
            });
        }
        info!(request_id = %ws.request.id, "Unsafe-weather approval granted, resuming");
    }

    ws.weather = Some(assessed);
    ws.hourly = hourly;
    Ok(())
}

/// Current + forecast through cache, breaker, and bounded retries.
async fn fetch_conditions(
    ctx: &StageContext,
    ws: &WorkingSet,
    lat: f64,
    lon: f64,
) -> Result<(WeatherSnapshot, Vec<WeatherSnapshot>), PipelineError> {
    let lat_param = format!("lat={lat:.4}");
    let lon_param = format!("lon={lon:.4}");
    let current_key =
        TtlCache::<()>::key("weather/current", &[lat_param.as_str(), lon_param.as_str()]);
    let current = match ctx.current_cache.get(&current_key) {
        Some(snap) => snap,
        None => {
            let snap = with_retries(ctx, || ctx.weather.current(lat, lon)).await?;
            ctx.current_cache.put(current_key, snap.clone());
            snap
        }
    };

    let date = ws.request.burn_date;
    let window = ws.request.window;
    let date_param = format!("date={date}");
    let window_param = format!("window={window}");
    let forecast_key = TtlCache::<()>::key(
        "weather/forecast",
        &[
            lat_param.as_str(),
            lon_param.as_str(),
            date_param.as_str(),
            window_param.as_str(),
        ],
    );
    let hourly = match ctx.forecast_cache.get(&forecast_key) {
        Some(hourly) => hourly,
        None => {
            let hourly = with_retries(ctx, || ctx.weather.forecast(lat, lon, date, window)).await?;
            ctx.forecast_cache.put(forecast_key, hourly.clone());
            hourly
        }
    };

    Ok((current, hourly))
}

/// Run one provider call under the breaker with exponential backoff on
/// transient failures.
async fn with_retries<T, F, Fut>(ctx: &StageContext, call: F) -> Result<T, PipelineError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, PipelineError>>,
{
    let mut attempt = 0;
    loop {
        ctx.weather_breaker.check()?;
        match call().await {
            Ok(value) => {
                ctx.weather_breaker.record_success();
                return Ok(value);
            }
            Err(err) => {
                ctx.weather_breaker.record_failure(&err);
                if !err.is_transient() || attempt >= STAGE_MAX_RETRIES {
                    return Err(err);
                }
                let delay = delay_for_error(&err, attempt, STAGE_BACKOFF_BASE_MS);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Weather call failed, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Confidence from the nearest historical fingerprints: mean cosine
/// similarity of the top matches mapped to [0, 1]. An empty history
/// gives a neutral 0.5.
fn historical_confidence(ctx: &StageContext, fingerprint: &[f32]) -> Result<f64, PipelineError> {
    // Coarse probe key: first components quantized
    let probe_key: String = fingerprint
        .iter()
        .take(8)
        .map(|x| format!("{:+.2}", x))
        .collect::<Vec<_>>()
        .join(",");
    let key = TtlCache::<()>::key("weather/nearest", &[probe_key.as_str()]);
    if let Some(cached) = ctx.nearest_cache.get(&key) {
        return Ok(cached);
    }

    if vector::magnitude(fingerprint) < vector::ZERO_MAGNITUDE_EPS {
        return Ok(0.5);
    }

    let neighbors =
        ctx.store.nearest(tables::WEATHER_SNAPSHOTS, tables::FIELD_WEATHER_VEC, fingerprint, 5)?;
    let confidence = if neighbors.is_empty() {
        0.5
    } else {
        let mean: f64 = neighbors.iter().map(|n| f64::from(n.similarity)).sum::<f64>()
            / neighbors.len() as f64;
        ((mean + 1.0) / 2.0).clamp(0.0, 1.0)
    };

    ctx.nearest_cache.put(key, confidence);
    Ok(confidence)
}
