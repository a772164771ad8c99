//! End-to-end pipeline scenarios
//!
//! Exercises the full coordinator + stages over in-memory mocks: happy
//! path, unsafe-weather approval gates, conflict pairs, breaker
//! behavior, cancellation, and event-log invariants.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use emberline::config::CoordinationConfig;
use emberline::notify::{MockNotifier, Notifier};
use emberline::pipeline::Coordinator;
use emberline::store::{tables, MemoryVectorStore, QueryOrder, VectorStore};
use emberline::types::{
    BurnIntensity, BurnRequest, BurnWindow, ContactMethod, FieldPolygon, FuelType, GeoPoint,
    RequestState, StabilityClass, WeatherSnapshot,
};
use emberline::weather::{MockWeatherProvider, WeatherProvider};

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    coordinator: Arc<Coordinator>,
    store: Arc<MemoryVectorStore>,
    notifier: Arc<MockNotifier>,
}

fn test_config() -> CoordinationConfig {
    let mut cfg = CoordinationConfig::default();
    cfg.providers.use_mock_store = true;
    cfg.providers.use_mock_weather = true;
    cfg.providers.use_mock_notifier = true;
    cfg.optimizer.seed = Some(42);
    cfg.optimizer.max_iterations = 1_500;
    cfg
}

fn start_with(
    cfg: CoordinationConfig,
    weather: Arc<dyn WeatherProvider>,
    notifier: Arc<MockNotifier>,
) -> Harness {
    let store = Arc::new(MemoryVectorStore::new());
    let ctx = emberline::build_with(
        cfg,
        Arc::clone(&store) as Arc<dyn VectorStore>,
        weather,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
    );
    Harness {
        coordinator: Coordinator::start(ctx),
        store,
        notifier,
    }
}

fn calm_weather() -> WeatherSnapshot {
    WeatherSnapshot {
        temperature_c: 22.0,
        humidity_pct: 45.0,
        wind_speed_ms: 3.0,
        wind_dir_deg: 270.0,
        precip_prob_pct: 10.0,
        visibility_km: 16.0,
        stability: StabilityClass::D,
        ts: 0,
    }
}

fn windy_weather() -> WeatherSnapshot {
    WeatherSnapshot { wind_speed_ms: 14.0, ..calm_weather() }
}

/// Square ring around a point sized to the requested acreage.
fn ring_for_acres(lat: f64, lon: f64, acres: f64) -> Vec<GeoPoint> {
    let side_m = (acres * 4_046.856).sqrt();
    let half_lat = side_m / 2.0 / 111_320.0;
    let half_lon = half_lat / lat.to_radians().cos();
    vec![
        GeoPoint::new(lat - half_lat, lon - half_lon),
        GeoPoint::new(lat - half_lat, lon + half_lon),
        GeoPoint::new(lat + half_lat, lon + half_lon),
        GeoPoint::new(lat + half_lat, lon - half_lon),
        GeoPoint::new(lat - half_lat, lon - half_lon),
    ]
}

fn burn_request(lat: f64, lon: f64, acres: f64, window: BurnWindow) -> BurnRequest {
    BurnRequest {
        id: Uuid::nil(),
        farm_id: "farm-1".into(),
        field_boundary: FieldPolygon::new(ring_for_acres(lat, lon, acres)),
        acres,
        fuel: FuelType::WheatStubble,
        intensity: BurnIntensity::Moderate,
        burn_date: (Utc::now() + chrono::Duration::days(2)).date_naive(),
        window,
        priority: 7.0,
        max_radius_m: 0.0,
        contact: ContactMethod::Sms,
        contact_handle: "+15550100".into(),
        state: RequestState::Received,
        created_at: 0,
        updated_at: 0,
    }
}

/// Poll until the request reaches a terminal state.
async fn wait_terminal(harness: &Harness, id: Uuid, secs: u64) -> RequestState {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
    loop {
        let status = harness.coordinator.status(id, 5).expect("status");
        if status.state.is_terminal() {
            return status.state;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "request {id} stuck in {}",
            status.state
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Poll until an event of the given kind appears, returning all events.
async fn wait_for_event(harness: &Harness, id: Uuid, kind: &str, secs: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
    loop {
        let events = harness.coordinator.events_after(id, 0, 1_000);
        if events.iter().any(|e| e.kind.name() == kind) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no {kind} event for {id}; saw {:?}",
            events.iter().map(|e| e.kind.name()).collect::<Vec<_>>()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn happy_path_reaches_done() {
    let harness = start_with(
        test_config(),
        Arc::new(MockWeatherProvider::with_conditions(calm_weather())),
        Arc::new(MockNotifier::new()),
    );

    let id = harness
        .coordinator
        .submit(burn_request(38.544, -121.740, 100.0, BurnWindow::new(8, 16)))
        .expect("submit");

    let state = wait_terminal(&harness, id, 30).await;
    assert_eq!(state, RequestState::Done);

    // Schedule assigns a slot inside the window
    let status = harness.coordinator.status(id, 10).expect("status");
    let schedule_id = status.schedule_id.expect("schedule persisted");
    let schedule_row = harness
        .store
        .get(tables::SCHEDULES, &schedule_id)
        .expect("get")
        .expect("schedule row");
    let schedule = emberline::pipeline::records::parse_schedule(&schedule_row).expect("parse");
    let slot = schedule.assignments.get(&id).expect("assignment for request");
    assert!((8.0..16.0).contains(&slot.as_hours()), "slot {}", slot);

    // No conflicts for a lone burn; decision alert went out
    let conflicts = harness
        .store
        .query(tables::CONFLICTS, &|_| true, 100, QueryOrder::IdAsc)
        .expect("query");
    assert!(conflicts.is_empty());
    assert!(harness.notifier.sent_count() >= 1);

    // Weather and dispersion results were materialized; a calm 100-acre
    // burn stays under the short-term threshold at every receptor
    assert!(status.weather_snapshot_id.is_some());
    let dispersion_id = status.dispersion_id.expect("dispersion persisted");
    let row = harness
        .store
        .get(tables::DISPERSION_RESULTS, &dispersion_id)
        .expect("get")
        .expect("dispersion row");
    let result: emberline::DispersionResult =
        serde_json::from_value(row.fields["result"].clone()).expect("parse dispersion");
    assert!(result.is_finite());
    for receptor in
        [result.pm25_at_1km, result.pm25_at_5km, result.pm25_at_10km, result.pm25_at_25km]
    {
        assert!(receptor < 35.0, "receptor pm2.5 {receptor}");
    }
}

#[tokio::test]
async fn unsafe_weather_rejection_path() {
    let harness = start_with(
        test_config(),
        Arc::new(MockWeatherProvider::with_conditions(windy_weather())),
        Arc::new(MockNotifier::new()),
    );

    let id = harness
        .coordinator
        .submit(burn_request(38.544, -121.740, 100.0, BurnWindow::new(8, 16)))
        .expect("submit");

    wait_for_event(&harness, id, "approval_required", 10).await;
    assert!(harness.coordinator.resolve_approval(id, false));

    let state = wait_terminal(&harness, id, 10).await;
    assert_eq!(state, RequestState::Rejected);
}

#[tokio::test]
async fn unsafe_weather_approval_resumes_to_done() {
    let harness = start_with(
        test_config(),
        Arc::new(MockWeatherProvider::with_conditions(windy_weather())),
        Arc::new(MockNotifier::new()),
    );

    let id = harness
        .coordinator
        .submit(burn_request(38.544, -121.740, 100.0, BurnWindow::new(8, 16)))
        .expect("submit");

    wait_for_event(&harness, id, "approval_required", 10).await;
    assert!(harness.coordinator.resolve_approval(id, true));

    let state = wait_terminal(&harness, id, 30).await;
    assert_eq!(state, RequestState::Done);
}

#[tokio::test]
async fn conflict_pair_is_staggered_or_alerted() {
    let harness = start_with(
        test_config(),
        Arc::new(MockWeatherProvider::with_conditions(calm_weather())),
        Arc::new(MockNotifier::new()),
    );

    // ~1.3 km apart, overlapping windows
    let a = harness
        .coordinator
        .submit(burn_request(38.544, -121.740, 100.0, BurnWindow::new(9, 12)))
        .expect("submit a");
    let b = harness
        .coordinator
        .submit(burn_request(38.556, -121.740, 100.0, BurnWindow::new(10, 13)))
        .expect("submit b");

    assert_ne!(a, b);
    assert_eq!(wait_terminal(&harness, a, 30).await, RequestState::Done);
    assert_eq!(wait_terminal(&harness, b, 30).await, RequestState::Done);

    // The date's schedule covers both burns inside their windows
    let date = (Utc::now() + chrono::Duration::days(2)).date_naive();
    let schedule_row = harness
        .store
        .get(tables::SCHEDULES, &date.to_string())
        .expect("get")
        .expect("schedule row");
    let schedule = emberline::pipeline::records::parse_schedule(&schedule_row).expect("parse");
    assert_eq!(schedule.assignments.len(), 2);

    let slot_a = schedule.assignments[&a].as_hours();
    let slot_b = schedule.assignments[&b].as_hours();
    assert!((9.0..12.0).contains(&slot_a), "a at {slot_a}");
    assert!((10.0..13.0).contains(&slot_b), "b at {slot_b}");

    // Canonical ordering holds for every recorded conflict
    let conflicts = harness
        .store
        .query(tables::CONFLICTS, &|_| true, 100, QueryOrder::IdAsc)
        .expect("query");
    for row in &conflicts {
        let record = emberline::pipeline::records::parse_conflict(row).expect("parse conflict");
        assert!(record.a < record.b);
    }

    // Either the optimizer staggered the 2 h burns apart (any residual
    // record is then spatial/low), or the combined conflict persists at
    // ≥ medium and alerts went to both contacts
    let staggered = (slot_a - slot_b).abs() >= 2.0;
    if staggered {
        for row in &conflicts {
            let record = emberline::pipeline::records::parse_conflict(row).expect("parse");
            assert!(
                record.time_overlap_h < f64::EPSILON,
                "staggered schedule still shows time overlap"
            );
        }
    } else {
        let worst = conflicts
            .iter()
            .filter_map(|row| emberline::pipeline::records::parse_conflict(row).ok())
            .map(|r| r.severity)
            .max()
            .expect("overlapping schedule must record a conflict");
        assert!(worst >= emberline::ConflictSeverity::Medium, "worst severity {worst}");
        assert!(harness.notifier.sent_count() >= 3, "conflict alerts expected");
    }
}

#[tokio::test]
async fn breaker_probe_recovers_after_outage() {
    let mut cfg = test_config();
    cfg.breaker.cooldown_secs = 0; // probe immediately after opening

    let harness = start_with(
        cfg,
        Arc::new(MockWeatherProvider::failing(5)),
        Arc::new(MockNotifier::new()),
    );

    // First request burns through its retry budget (4 attempts) and fails
    let r1 = harness
        .coordinator
        .submit(burn_request(38.544, -121.740, 100.0, BurnWindow::new(8, 16)))
        .expect("submit r1");
    assert_eq!(wait_terminal(&harness, r1, 30).await, RequestState::Failed);

    // Second request's first attempt opens the breaker (failure #5);
    // the immediate half-open probe then succeeds and closes it
    let r2 = harness
        .coordinator
        .submit(burn_request(38.545, -121.741, 100.0, BurnWindow::new(8, 16)))
        .expect("submit r2");
    assert_eq!(wait_terminal(&harness, r2, 30).await, RequestState::Done);

    let ctx = harness.coordinator.context();
    assert_eq!(ctx.weather_breaker.state(), emberline::infra::BreakerState::Closed);
}

#[tokio::test]
async fn open_breaker_fails_fast_within_cooldown() {
    let mut cfg = test_config();
    cfg.breaker.cooldown_secs = 300;

    let harness = start_with(
        cfg,
        Arc::new(MockWeatherProvider::failing(50)),
        Arc::new(MockNotifier::new()),
    );

    let r1 = harness
        .coordinator
        .submit(burn_request(38.544, -121.740, 100.0, BurnWindow::new(8, 16)))
        .expect("submit r1");
    assert_eq!(wait_terminal(&harness, r1, 30).await, RequestState::Failed);

    let r2 = harness
        .coordinator
        .submit(burn_request(38.545, -121.741, 100.0, BurnWindow::new(8, 16)))
        .expect("submit r2");
    assert_eq!(wait_terminal(&harness, r2, 30).await, RequestState::Failed);

    // Breaker is now open; a third request fails fast without a provider call
    let r3 = harness
        .coordinator
        .submit(burn_request(38.546, -121.742, 100.0, BurnWindow::new(8, 16)))
        .expect("submit r3");
    let started = tokio::time::Instant::now();
    assert_eq!(wait_terminal(&harness, r3, 10).await, RequestState::Failed);
    assert!(started.elapsed() < Duration::from_secs(5), "open breaker must fail fast");
    assert_eq!(
        harness.coordinator.context().weather_breaker.state(),
        emberline::infra::BreakerState::Open
    );
}

#[tokio::test]
async fn cancellation_mid_optimize_discards_schedule() {
    let mut cfg = test_config();
    // Long search with convergence disabled so the annealer is still
    // running when the cancel lands
    cfg.optimizer.max_iterations = 200_000_000;
    cfg.optimizer.convergence_window = u64::MAX;

    let harness = start_with(
        cfg,
        Arc::new(MockWeatherProvider::with_conditions(calm_weather())),
        Arc::new(MockNotifier::new()),
    );

    let id = harness
        .coordinator
        .submit(burn_request(38.544, -121.740, 100.0, BurnWindow::new(8, 16)))
        .expect("submit");

    // Wait for the optimize stage to start, then cancel mid-run
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        let events = harness.coordinator.events_after(id, 0, 1_000);
        let optimizing = events.iter().any(|e| {
            matches!(
                &e.kind,
                emberline::types::EventKind::StageStarted { stage }
                    if *stage == emberline::types::StageName::Optimize
            )
        });
        if optimizing {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "optimize never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    harness.coordinator.cancel(id);

    let state = wait_terminal(&harness, id, 15).await;
    assert_eq!(state, RequestState::Failed);

    // Best-so-far schedule was not persisted
    let date = (Utc::now() + chrono::Duration::days(2)).date_naive();
    assert!(harness
        .store
        .get(tables::SCHEDULES, &date.to_string())
        .expect("get")
        .is_none());

    // A metric event reported the iterations completed before abort
    let events = harness.coordinator.events_after(id, 0, 1_000);
    assert!(events.iter().any(|e| matches!(
        &e.kind,
        emberline::types::EventKind::Metric { name, .. } if name == "optimizer_iterations"
    )));
    assert!(events.iter().any(|e| matches!(
        &e.kind,
        emberline::types::EventKind::Error { error_kind, .. } if error_kind == "cancelled"
    )));
}

// ============================================================================
// Invariants
// ============================================================================

#[tokio::test]
async fn event_sequences_are_dense_from_one() {
    let harness = start_with(
        test_config(),
        Arc::new(MockWeatherProvider::with_conditions(calm_weather())),
        Arc::new(MockNotifier::new()),
    );

    let id = harness
        .coordinator
        .submit(burn_request(38.544, -121.740, 100.0, BurnWindow::new(8, 16)))
        .expect("submit");
    wait_terminal(&harness, id, 30).await;

    let events = harness.coordinator.events_after(id, 0, 10_000);
    assert!(!events.is_empty());
    let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
    let expected: Vec<u64> = (1..=seqs.len() as u64).collect();
    assert_eq!(seqs, expected, "sequence numbers must be dense [1, n]");
}

#[tokio::test]
async fn duplicate_submission_gets_distinct_ids_same_normalization() {
    let harness = start_with(
        test_config(),
        Arc::new(MockWeatherProvider::with_conditions(calm_weather())),
        Arc::new(MockNotifier::new()),
    );

    let request = burn_request(38.544, -121.740, 100.0, BurnWindow::new(8, 16));
    let a = harness.coordinator.submit(request.clone()).expect("submit a");
    let b = harness.coordinator.submit(request).expect("submit b");
    assert_ne!(a, b);

    wait_terminal(&harness, a, 30).await;
    wait_terminal(&harness, b, 30).await;

    let row_a = harness
        .store
        .get(tables::BURN_REQUESTS, &a.to_string())
        .expect("get")
        .expect("row a");
    let row_b = harness
        .store
        .get(tables::BURN_REQUESTS, &b.to_string())
        .expect("get")
        .expect("row b");
    let req_a = emberline::pipeline::records::parse_request(&row_a).expect("parse a");
    let req_b = emberline::pipeline::records::parse_request(&row_b).expect("parse b");

    // Identical normalized records, identity and clocks aside
    assert_eq!(req_a.farm_id, req_b.farm_id);
    assert_eq!(req_a.field_boundary, req_b.field_boundary);
    assert!((req_a.acres - req_b.acres).abs() < f64::EPSILON);
    assert_eq!(req_a.window, req_b.window);
    assert!((req_a.priority - req_b.priority).abs() < f64::EPSILON);
}

#[tokio::test]
async fn queue_overflow_returns_backpressure() {
    let mut cfg = test_config();
    cfg.coordinator.queue_capacity = 2;
    cfg.coordinator.worker_pool_size = 1;
    // Slow every request down in optimize so the queue stays full
    cfg.optimizer.max_iterations = 40_000_000;
    cfg.optimizer.convergence_window = u64::MAX;

    let harness = start_with(
        cfg,
        Arc::new(MockWeatherProvider::with_conditions(calm_weather())),
        Arc::new(MockNotifier::new()),
    );

    // Fill the worker and the queue, then expect backpressure
    let mut accepted = Vec::new();
    let mut backpressured = false;
    for i in 0..8 {
        let request =
            burn_request(38.5 + f64::from(i) * 0.01, -121.74, 100.0, BurnWindow::new(8, 16));
        match harness.coordinator.submit(request) {
            Ok(id) => accepted.push(id),
            Err(emberline::PipelineError::Backpressure) => {
                backpressured = true;
                break;
            }
            Err(other) => panic!("unexpected submit error: {other}"),
        }
    }
    assert!(backpressured, "bounded queue must eventually refuse submissions");

    for id in accepted {
        harness.coordinator.cancel(id);
    }
}
