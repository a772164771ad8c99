//! Endpoint handlers

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::pipeline::{Coordinator, CoordinatorStats, StatusView};
use crate::types::{
    AgentEvent, BurnIntensity, BurnRequest, BurnWindow, ContactMethod, FieldPolygon, FuelType,
    GeoPoint, RequestState,
};

use super::ErrorResponse;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(kind: &str, message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(kind, message)))
}

fn map_pipeline_error(err: &PipelineError) -> ApiError {
    let status = match err {
        PipelineError::Backpressure => StatusCode::TOO_MANY_REQUESTS,
        PipelineError::Validation { .. } => StatusCode::BAD_REQUEST,
        PipelineError::Storage(msg) if msg.starts_with("unknown request") => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::new(err.kind(), err.to_string())))
}

// ============================================================================
// Submit
// ============================================================================

/// GeoJSON polygon as submitted: `coordinates[0]` is the outer ring of
/// `[lon, lat]` positions.
#[derive(Debug, Deserialize)]
pub struct GeoJsonPolygon {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitBurnBody {
    pub farm_id: String,
    pub field_boundary: GeoJsonPolygon,
    pub acres: f64,
    pub crop_type: String,
    /// ISO 8601 calendar date.
    pub burn_date: String,
    pub time_window_start: u8,
    pub time_window_end: u8,
    #[serde(default)]
    pub priority_score: Option<f64>,
    #[serde(default)]
    pub intensity: Option<String>,
    pub contact_method: String,
    pub contact_handle: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitBurnResponse {
    pub request_id: Uuid,
    pub state: RequestState,
    pub events_cursor: u64,
}

/// POST /api/burns — submit a burn request.
pub async fn submit_burn(
    State(coordinator): State<Arc<Coordinator>>,
    Json(body): Json<SubmitBurnBody>,
) -> Result<(StatusCode, Json<SubmitBurnResponse>), ApiError> {
    let request = decode_submit(body)?;
    let request_id = coordinator.submit(request).map_err(|e| map_pipeline_error(&e))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitBurnResponse {
            request_id,
            state: RequestState::Received,
            events_cursor: 0,
        }),
    ))
}

/// Decode and shape-check the submit body. Deep validation (geometry,
/// acreage consistency, dates) belongs to the validate stage.
fn decode_submit(body: SubmitBurnBody) -> Result<BurnRequest, ApiError> {
    if !body.kind_is_polygon() {
        return Err(bad_request("validation", "field_boundary.type must be \"Polygon\""));
    }
    let ring = body
        .field_boundary
        .coordinates
        .first()
        .ok_or_else(|| bad_request("validation", "field_boundary has no outer ring"))?;
    let ring: Vec<GeoPoint> = ring.iter().map(|[lon, lat]| GeoPoint::new(*lat, *lon)).collect();

    let fuel = FuelType::parse(&body.crop_type)
        .ok_or_else(|| bad_request("validation", format!("unrecognized crop_type {:?}", body.crop_type)))?;

    let burn_date = body
        .burn_date
        .parse()
        .map_err(|_| bad_request("validation", format!("burn_date {:?} is not an ISO date", body.burn_date)))?;

    let intensity = match body.intensity.as_deref() {
        None => BurnIntensity::Moderate,
        Some("low") => BurnIntensity::Low,
        Some("moderate") => BurnIntensity::Moderate,
        Some("high") => BurnIntensity::High,
        Some(other) => {
            return Err(bad_request("validation", format!("unrecognized intensity {other:?}")))
        }
    };

    let contact = match body.contact_method.as_str() {
        "sms" => ContactMethod::Sms,
        "broadcast" => ContactMethod::Broadcast,
        other => {
            return Err(bad_request("validation", format!("unrecognized contact_method {other:?}")))
        }
    };

    Ok(BurnRequest {
        id: Uuid::nil(), // assigned by the coordinator
        farm_id: body.farm_id,
        field_boundary: FieldPolygon::new(ring),
        acres: body.acres,
        fuel,
        intensity,
        burn_date,
        window: BurnWindow::new(body.time_window_start, body.time_window_end),
        priority: body.priority_score.unwrap_or(5.0),
        max_radius_m: 0.0,
        contact,
        contact_handle: body.contact_handle,
        state: RequestState::Received,
        created_at: 0,
        updated_at: 0,
    })
}

impl SubmitBurnBody {
    fn kind_is_polygon(&self) -> bool {
        self.field_boundary.kind.eq_ignore_ascii_case("polygon")
    }
}

// ============================================================================
// Status / events
// ============================================================================

/// GET /api/burns/:id — current state, recent events, result ids.
pub async fn burn_status(
    State(coordinator): State<Arc<Coordinator>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusView>, ApiError> {
    coordinator
        .status(id, 10)
        .map(Json)
        .map_err(|e| map_pipeline_error(&e))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub cursor: u64,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<AgentEvent>,
    /// Pass back as `cursor` to resume.
    pub next_cursor: u64,
}

/// GET /api/burns/:id/events?cursor= — ordered events from a cursor.
pub async fn burn_events(
    State(coordinator): State<Arc<Coordinator>>,
    Path(id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
) -> Json<EventsResponse> {
    let events = coordinator.events_after(id, query.cursor, query.limit.min(1_000));
    let next_cursor = events.last().map_or(query.cursor, |e| e.seq);
    Json(EventsResponse { events, next_cursor })
}

// ============================================================================
// Approval / cancel
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApprovalBody {
    pub approve: bool,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub acknowledged: bool,
}

/// POST /api/burns/:id/approval — resolve a pending unsafe-weather gate.
pub async fn resolve_approval(
    State(coordinator): State<Arc<Coordinator>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ApprovalBody>,
) -> Result<Json<AckResponse>, ApiError> {
    if coordinator.resolve_approval(id, body.approve) {
        Ok(Json(AckResponse { acknowledged: true }))
    } else {
        Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse::new("validation", "no pending approval for this request")),
        ))
    }
}

/// POST /api/burns/:id/cancel — cooperative cancellation.
pub async fn cancel_burn(
    State(coordinator): State<Arc<Coordinator>>,
    Path(id): Path<Uuid>,
) -> Json<AckResponse> {
    coordinator.cancel(id);
    Json(AckResponse { acknowledged: true })
}

// ============================================================================
// Health / stats
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub coordinator: CoordinatorStats,
    pub bus_published: u64,
    pub bus_dropped: u64,
    pub weather_cache: CacheStatsBody,
    pub forecast_cache: CacheStatsBody,
    pub weather_breaker: String,
    pub notifier_breaker: String,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsBody {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl From<crate::infra::CacheStats> for CacheStatsBody {
    fn from(stats: crate::infra::CacheStats) -> Self {
        Self { hits: stats.hits, misses: stats.misses, size: stats.size }
    }
}

/// GET /api/stats — coordinator, bus, cache, and breaker counters.
pub async fn stats(State(coordinator): State<Arc<Coordinator>>) -> Json<StatsResponse> {
    let ctx = coordinator.context();
    Json(StatsResponse {
        coordinator: coordinator.stats(),
        bus_published: ctx.bus.published(),
        bus_dropped: ctx.bus.dropped(),
        weather_cache: ctx.current_cache.stats().into(),
        forecast_cache: ctx.forecast_cache.stats().into(),
        weather_breaker: ctx.weather_breaker.state().to_string(),
        notifier_breaker: ctx.notifier_breaker.state().to_string(),
    })
}
