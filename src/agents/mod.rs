//! Agent stages
//!
//! The five-stage sequential pipeline: validate → weather-assess →
//! smoke-predict → schedule-optimize → alert. Each stage is a function
//! `(ctx, working set) → Result` with its own timeout budget and retry
//! policy. Stages never call each other — the coordinator is the only
//! hub — and share no mutable state outside the working set it hands
//! them.

mod alert;
mod optimize;
mod predict;
mod validate;
mod weather_assess;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::NaiveDate;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::config::CoordinationConfig;
use crate::error::PipelineError;
use crate::infra::{CircuitBreaker, TtlCache};
use crate::notify::Notifier;
use crate::pipeline::EventLog;
use crate::store::VectorStore;
use crate::types::{
    BurnRequest, ConflictRecord, DispersionResult, EventKind, SlotTime, StageName, WeatherSnapshot,
};
use crate::weather::WeatherProvider;

// ============================================================================
// Stage context — everything a stage may touch
// ============================================================================

/// Shared, immutable wiring injected into every stage. Constructed once
/// at startup from configuration; mock mode swaps the provider fields
/// for in-memory implementations behind the same traits.
pub struct StageContext {
    pub config: CoordinationConfig,
    pub store: Arc<dyn VectorStore>,
    pub weather: Arc<dyn WeatherProvider>,
    pub notifier: Arc<dyn Notifier>,
    pub bus: Arc<EventBus>,
    pub events: Arc<EventLog>,
    pub current_cache: TtlCache<WeatherSnapshot>,
    pub forecast_cache: TtlCache<Vec<WeatherSnapshot>>,
    /// Nearest-neighbor confidence lookups, keyed by probe fingerprint.
    pub nearest_cache: TtlCache<f64>,
    pub weather_breaker: CircuitBreaker,
    pub notifier_breaker: CircuitBreaker,
    pub approvals: ApprovalHub,
    date_locks: DateLocks,
}

impl StageContext {
    pub fn new(
        config: CoordinationConfig,
        store: Arc<dyn VectorStore>,
        weather: Arc<dyn WeatherProvider>,
        notifier: Arc<dyn Notifier>,
        bus: Arc<EventBus>,
        events: Arc<EventLog>,
    ) -> Self {
        let cache = &config.cache;
        let breaker = &config.breaker;
        Self {
            current_cache: TtlCache::new(
                cache.capacity,
                std::time::Duration::from_secs(cache.ttl_weather_current_secs),
            ),
            forecast_cache: TtlCache::new(
                cache.capacity,
                std::time::Duration::from_secs(cache.ttl_weather_forecast_secs),
            ),
            nearest_cache: TtlCache::new(
                cache.capacity,
                std::time::Duration::from_secs(cache.ttl_nearest_secs),
            ),
            weather_breaker: CircuitBreaker::new(
                "weather",
                breaker.threshold,
                std::time::Duration::from_secs(breaker.cooldown_secs),
            ),
            notifier_breaker: CircuitBreaker::new(
                "notifier",
                breaker.threshold,
                std::time::Duration::from_secs(breaker.cooldown_secs),
            ),
            approvals: ApprovalHub::default(),
            date_locks: DateLocks::default(),
            config,
            store,
            weather,
            notifier,
            bus,
            events,
        }
    }

    /// Serialize optimizations per target date.
    pub async fn lock_date(&self, date: NaiveDate) -> tokio::sync::OwnedMutexGuard<()> {
        self.date_locks.acquire(date).await
    }
}

// ============================================================================
// Working set — per-request state accumulated across stages
// ============================================================================

/// Mutable state a request accumulates as it moves through the stages.
/// Owned by the worker; stages receive it exclusively, one at a time.
#[derive(Debug)]
pub struct WorkingSet {
    pub request: BurnRequest,
    /// Representative assessed snapshot (stage B).
    pub weather: Option<WeatherSnapshot>,
    /// In-window hourly forecast (stage B).
    pub hourly: Vec<WeatherSnapshot>,
    /// Persisted weather row id (stage B).
    pub weather_row_id: Option<String>,
    /// Historical-similarity confidence (stage B).
    pub confidence: f64,
    /// Smoke prediction (stage C).
    pub dispersion: Option<DispersionResult>,
    /// Persisted dispersion row id (stage C).
    pub dispersion_row_id: Option<String>,
    /// Assigned start slot (stage D).
    pub assigned_slot: Option<SlotTime>,
    /// Conflicts involving this request at the final assignment (stage D).
    pub conflicts: Vec<ConflictRecord>,
    /// Schedule row id (stage D).
    pub schedule_row_id: Option<String>,
}

impl WorkingSet {
    pub fn new(request: BurnRequest) -> Self {
        Self {
            request,
            weather: None,
            hourly: Vec::new(),
            weather_row_id: None,
            confidence: 0.0,
            dispersion: None,
            dispersion_row_id: None,
            assigned_slot: None,
            conflicts: Vec::new(),
            schedule_row_id: None,
        }
    }
}

// ============================================================================
// Stage dispatch
// ============================================================================

/// Run one stage against the working set, emitting start/complete
/// events. The per-stage budget applies to the stage body; the worker
/// layers the overall per-request deadline and cancellation on top.
pub async fn run_stage(
    stage: StageName,
    ctx: &StageContext,
    ws: &mut WorkingSet,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    let request_id = ws.request.id;
    ctx.events.emit(request_id, EventKind::StageStarted { stage });
    let started = Instant::now();

    let result = match stage {
        StageName::Validate => validate::run(ctx, ws).await,
        StageName::WeatherAssess => weather_assess::run(ctx, ws, cancel).await,
        StageName::Predict => predict::run(ctx, ws).await,
        StageName::Optimize => optimize::run(ctx, ws, cancel).await,
        StageName::Alert => alert::run(ctx, ws, cancel).await,
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(()) => {
            ctx.events.emit(
                request_id,
                EventKind::StageCompleted {
                    stage,
                    duration_ms,
                    tools: stage_tools(stage),
                },
            );
            if let Some(next) = ws.request.state.next() {
                debug!(
                    request_id = %request_id,
                    stage = %stage,
                    duration_ms,
                    next = %next,
                    "Stage complete"
                );
            }
        }
        Err(err) => {
            ctx.events.emit(
                request_id,
                EventKind::Error { error_kind: err.kind().to_string(), message: err.to_string() },
            );
        }
    }
    result
}

/// Facades a stage reaches through, recorded on its completion event.
fn stage_tools(stage: StageName) -> Vec<String> {
    let tools: &[&str] = match stage {
        StageName::Validate => &[],
        StageName::WeatherAssess => &["weather_provider", "vector_store"],
        StageName::Predict => &["dispersion_model", "vector_store"],
        StageName::Optimize => &["schedule_optimizer", "conflict_detector", "vector_store"],
        StageName::Alert => &["notifier", "broadcast_bus"],
    };
    tools.iter().map(|s| (*s).to_string()).collect()
}

// ============================================================================
// Approval hub
// ============================================================================

/// Pending human-approval gates, one per request. Stage B registers a
/// gate and awaits it; the coordinator resolves it from the API.
#[derive(Default)]
pub struct ApprovalHub {
    pending: Mutex<HashMap<Uuid, oneshot::Sender<bool>>>,
}

impl ApprovalHub {
    /// Register a gate and return the receiving half to await.
    pub fn register(&self, request_id: Uuid) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(request_id, tx);
        }
        rx
    }

    /// Resolve a pending gate. Returns false when none is waiting.
    pub fn resolve(&self, request_id: Uuid, approve: bool) -> bool {
        let sender = match self.pending.lock() {
            Ok(mut pending) => pending.remove(&request_id),
            Err(_) => None,
        };
        match sender {
            Some(tx) => tx.send(approve).is_ok(),
            None => false,
        }
    }

    /// Whether a request is paused on approval (the worker's deadline
    /// timer is suspended while true).
    pub fn is_pending(&self, request_id: Uuid) -> bool {
        self.pending.lock().map(|p| p.contains_key(&request_id)).unwrap_or(false)
    }

    /// Drop a gate without resolving it (cancellation).
    pub fn forget(&self, request_id: Uuid) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&request_id);
        }
    }
}

// ============================================================================
// Per-date optimization locks
// ============================================================================

/// Concurrent optimizations for the same target date serialize here.
#[derive(Default)]
struct DateLocks {
    locks: Mutex<HashMap<NaiveDate, Arc<tokio::sync::Mutex<()>>>>,
}

impl DateLocks {
    async fn acquire(&self, date: NaiveDate) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = match self.locks.lock() {
                Ok(locks) => locks,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(locks.entry(date).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))))
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn approval_gate_resolves_to_waiter() {
        let hub = ApprovalHub::default();
        let id = Uuid::from_u128(1);
        let rx = hub.register(id);
        assert!(hub.is_pending(id));

        assert!(hub.resolve(id, true));
        assert!(!hub.is_pending(id));
        assert_eq!(rx.await, Ok(true));
    }

    #[tokio::test]
    async fn resolving_unknown_request_is_noop() {
        let hub = ApprovalHub::default();
        assert!(!hub.resolve(Uuid::from_u128(9), true));
    }

    #[tokio::test]
    async fn date_locks_serialize_same_date() {
        let locks = DateLocks::default();
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).expect("valid date");
        let guard = locks.acquire(date).await;

        // Same date: second acquire must wait
        let pending = {
            let lock = {
                let map = locks.locks.lock().expect("lock map");
                Arc::clone(map.get(&date).expect("entry exists"))
            };
            let is_err = lock.try_lock().is_err();
            is_err
        };
        assert!(pending);
        drop(guard);

        // Different date proceeds immediately
        let other = NaiveDate::from_ymd_opt(2026, 9, 2).expect("valid date");
        let _g2 = locks.acquire(other).await;
    }
}
