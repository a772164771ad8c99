//! Row conversions between domain types and the vector store
//!
//! One place owns the persisted shapes so the stages, the coordinator,
//! and the API read and write identical records.

use serde_json::json;
use uuid::Uuid;

use crate::conflict::ScheduledBurn;
use crate::error::PipelineError;
use crate::optimizer::Candidate;
use crate::store::{tables, Row};
use crate::types::{
    AgentEvent, BurnRequest, ConflictRecord, DispersionResult, RequestState, Schedule, SlotTime,
    StabilityClass, WeatherSnapshot,
};

// ============================================================================
// Burn requests
// ============================================================================

/// Build the burn-request row. Scalar copies of the queried fields sit
/// beside the full serialized request so `query` predicates never have
/// to deserialize the whole record.
pub fn request_row(request: &BurnRequest) -> Result<Row, PipelineError> {
    Ok(Row::new(request.id.to_string())
        .with_field("request", serde_json::to_value(request)?)
        .with_field("farm_id", json!(request.farm_id))
        .with_field("date", json!(request.burn_date.to_string()))
        .with_field("state", json!(request.state.to_string()))
        .with_field("acres", json!(request.acres))
        .with_field("priority", json!(request.priority)))
}

/// Insert or update the burn-request row, preserving any fields other
/// writers attached (plume figures, assigned slot). `extras` are merged
/// last.
pub fn upsert_request(
    store: &dyn crate::store::VectorStore,
    request: &BurnRequest,
    extras: &[(&str, serde_json::Value)],
) -> Result<(), PipelineError> {
    let fresh = request_row(request)?;
    let mut row = match store.get(tables::BURN_REQUESTS, &fresh.id)? {
        Some(mut existing) => {
            for (key, value) in fresh.fields {
                existing.fields.insert(key, value);
            }
            existing
        }
        None => fresh,
    };
    for (key, value) in extras {
        row.fields.insert((*key).to_string(), value.clone());
    }
    store.put(tables::BURN_REQUESTS, row)
}

/// The plume figures the conflict detector and optimizer read back for
/// a whole date's candidate set, attached to the request row to avoid a
/// dispersion-table join.
pub fn plume_fields(
    dispersion: &DispersionResult,
    weather: &WeatherSnapshot,
) -> Vec<(&'static str, serde_json::Value)> {
    vec![
        ("emission_rate_gs", json!(dispersion.emission_rate_gs)),
        ("effective_height_m", json!(dispersion.effective_height_m)),
        ("wind_ms", json!(weather.wind_speed_ms)),
        ("stability", json!(weather.stability.to_string())),
    ]
}

/// The assigned start slot, attached after optimization.
pub fn assignment_field(slot: SlotTime) -> (&'static str, serde_json::Value) {
    ("assigned_slot", json!(slot.0))
}

pub fn parse_request(row: &Row) -> Result<BurnRequest, PipelineError> {
    let value = row
        .fields
        .get("request")
        .ok_or_else(|| PipelineError::Storage("burn request row missing payload".into()))?;
    serde_json::from_value(value.clone()).map_err(PipelineError::from)
}

/// Rebuild an optimizer candidate from a predicted burn-request row.
/// Returns `None` for rows that have not passed the predict stage.
pub fn candidate_from_row(row: &Row) -> Option<Candidate> {
    let request = parse_request(row).ok()?;
    let emission_rate_gs = row.f64_field("emission_rate_gs")?;
    let effective_height_m = row.f64_field("effective_height_m")?;
    let wind_ms = row.f64_field("wind_ms")?;
    let stability = StabilityClass::parse(row.str_field("stability")?)?;
    // Gathering radius is the request-level interaction radius, set at
    // validation
    let radius_m = request.max_radius_m;

    let start = row
        .f64_field("assigned_slot")
        .map(|s| SlotTime(s as u16))
        .unwrap_or_else(|| SlotTime::from_hour(request.window.start_hour));

    Some(Candidate {
        burn: ScheduledBurn {
            id: request.id,
            centroid: request.centroid(),
            radius_m,
            emission_rate_gs,
            effective_height_m,
            wind_ms,
            stability,
            start,
            duration_h: request.duration_hours(),
            priority: request.priority,
        },
        window: request.window,
    })
}

// ============================================================================
// Weather, dispersion, schedules, conflicts
// ============================================================================

pub fn weather_row(
    id: &str,
    request_id: Uuid,
    lat: f64,
    lon: f64,
    snapshot: &WeatherSnapshot,
    fingerprint: Vec<f32>,
) -> Result<Row, PipelineError> {
    Ok(Row::new(id)
        .with_field("request_id", json!(request_id.to_string()))
        .with_field("lat", json!(lat))
        .with_field("lon", json!(lon))
        .with_field("ts", json!(snapshot.ts))
        .with_field("snapshot", serde_json::to_value(snapshot)?)
        .with_vector(tables::FIELD_WEATHER_VEC, fingerprint))
}

pub fn parse_weather(row: &Row) -> Result<WeatherSnapshot, PipelineError> {
    let value = row
        .fields
        .get("snapshot")
        .ok_or_else(|| PipelineError::Storage("weather row missing snapshot".into()))?;
    serde_json::from_value(value.clone()).map_err(PipelineError::from)
}

pub fn dispersion_row(
    id: &str,
    result: &DispersionResult,
    fingerprint: Vec<f32>,
) -> Result<Row, PipelineError> {
    Ok(Row::new(id)
        .with_field("request_id", json!(result.request_id.to_string()))
        .with_field("q_rate", json!(result.emission_rate_gs))
        .with_field("eff_height", json!(result.effective_height_m))
        .with_field("max_radius_m", json!(result.max_radius_m))
        .with_field("result", serde_json::to_value(result)?)
        .with_vector(tables::FIELD_PLUME_VEC, fingerprint))
}

pub fn schedule_row(schedule: &Schedule) -> Result<Row, PipelineError> {
    Ok(Row::new(schedule.date.to_string())
        .with_field("date", json!(schedule.date.to_string()))
        .with_field("score", json!(schedule.score))
        .with_field("schedule", serde_json::to_value(schedule)?))
}

pub fn parse_schedule(row: &Row) -> Result<Schedule, PipelineError> {
    let value = row
        .fields
        .get("schedule")
        .ok_or_else(|| PipelineError::Storage("schedule row missing payload".into()))?;
    serde_json::from_value(value.clone()).map_err(PipelineError::from)
}

/// Conflict rows key on the canonical pair so re-detection overwrites
/// rather than duplicates.
pub fn conflict_row(record: &ConflictRecord, date: &str) -> Result<Row, PipelineError> {
    Ok(Row::new(format!("{}:{}", record.a, record.b))
        .with_field("a_id", json!(record.a.to_string()))
        .with_field("b_id", json!(record.b.to_string()))
        .with_field("date", json!(date))
        .with_field("severity", json!(record.severity.to_string()))
        .with_field("record", serde_json::to_value(record)?))
}

pub fn parse_conflict(row: &Row) -> Result<ConflictRecord, PipelineError> {
    let value = row
        .fields
        .get("record")
        .ok_or_else(|| PipelineError::Storage("conflict row missing payload".into()))?;
    serde_json::from_value(value.clone()).map_err(PipelineError::from)
}

// ============================================================================
// Burn outcomes
// ============================================================================

/// Dimension of the outcome fingerprint.
const OUTCOME_DIM: usize = 32;

/// Record how a completed burn turned out: scheduling satisfaction,
/// residual conflicts, and plume scale, summarized as a 32-d unit
/// vector for biasing future priors.
pub fn outcome_row(
    request: &BurnRequest,
    assigned_slot: Option<SlotTime>,
    conflicts: &[ConflictRecord],
    confidence: f64,
) -> Result<Row, PipelineError> {
    let mut v = vec![0.0_f32; OUTCOME_DIM];
    v[0] = (request.priority / 10.0) as f32;
    v[1] = (request.acres.ln_1p() / 10.0).clamp(0.0, 1.0) as f32;
    v[2] = (request.duration_hours() / 8.0) as f32;
    v[3] = confidence as f32;
    if let Some(slot) = assigned_slot {
        v[4] = 1.0;
        let span = f64::from(request.window.hours()).max(1.0) * 4.0;
        v[5] = (f64::from(slot.0.saturating_sub(u16::from(request.window.start_hour) * 4)) / span)
            .clamp(0.0, 1.0) as f32;
    }
    v[6] = (conflicts.len() as f32 / 8.0).min(1.0);
    let worst = conflicts.iter().map(|c| c.severity.weight()).fold(0.0_f64, f64::max);
    v[7] = worst as f32;
    v[8] = (request.max_radius_m / 10_000.0).clamp(0.0, 1.0) as f32;
    // Slots 9+ stay zero until post-burn verification data exists
    crate::store::vector::normalize(&mut v);

    Ok(Row::new(request.id.to_string())
        .with_field("request_id", json!(request.id.to_string()))
        .with_field("date", json!(request.burn_date.to_string()))
        .with_field("priority", json!(request.priority))
        .with_field("conflicts", json!(conflicts.len()))
        .with_vector(tables::FIELD_OUTCOME_VEC, v))
}

// ============================================================================
// Events
// ============================================================================

/// Append-only event rows, keyed `request_id:seq` with zero-padded seq
/// so id order is publish order.
pub fn event_row(event: &AgentEvent) -> Result<Row, PipelineError> {
    Ok(Row::new(format!("{}:{:08}", event.request_id, event.seq))
        .with_field("request_id", json!(event.request_id.to_string()))
        .with_field("seq", json!(event.seq))
        .with_field("ts", json!(event.ts))
        .with_field("event", serde_json::to_value(event)?))
}

pub fn parse_event(row: &Row) -> Result<AgentEvent, PipelineError> {
    let value = row
        .fields
        .get("event")
        .ok_or_else(|| PipelineError::Storage("event row missing payload".into()))?;
    serde_json::from_value(value.clone()).map_err(PipelineError::from)
}

/// Predicate for rows belonging to one request.
pub fn belongs_to(request_id: Uuid) -> impl Fn(&Row) -> bool {
    let id = request_id.to_string();
    move |row: &Row| row.str_field("request_id") == Some(id.as_str())
}

/// Predicate for burn-request rows on a date in one of the given states.
pub fn on_date_in_states(date: &str, states: &[RequestState]) -> impl Fn(&Row) -> bool + 'static {
    let date = date.to_string();
    let names: Vec<String> = states.iter().map(ToString::to_string).collect();
    move |row: &Row| {
        row.str_field("date") == Some(date.as_str())
            && row.str_field("state").is_some_and(|s| names.iter().any(|n| n == s))
    }
}
