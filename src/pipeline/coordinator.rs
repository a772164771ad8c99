//! Coordinator — submission, status, cancellation, worker pool
//!
//! `submit` assigns an id, persists the request, and enqueues it into a
//! bounded queue; overflow is backpressure, not blocking. A fixed pool
//! of workers drains the queue, each processing one request end-to-end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::StageContext;
use crate::error::PipelineError;
use crate::store::{tables, QueryOrder};
use crate::types::{AgentEvent, BurnRequest, RequestState};

use super::records;
use super::worker;

// ============================================================================
// Registry — live request bookkeeping shared with workers
// ============================================================================

/// Cancellation tokens and terminal counters for in-flight requests.
pub struct Registry {
    tokens: Mutex<HashMap<Uuid, CancellationToken>>,
    pub submitted: AtomicU64,
    pub done: AtomicU64,
    pub rejected: AtomicU64,
    pub failed: AtomicU64,
}

impl Registry {
    fn new() -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            submitted: AtomicU64::new(0),
            done: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    fn register(&self, id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(id, token.clone());
        }
        token
    }

    /// Token for a request; a fresh one if the request is unknown.
    pub fn token(&self, id: Uuid) -> CancellationToken {
        match self.tokens.lock() {
            Ok(mut tokens) => tokens.entry(id).or_default().clone(),
            Err(_) => CancellationToken::new(),
        }
    }

    /// Record a terminal state and release the token.
    pub fn finish(&self, id: Uuid, state: RequestState) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.remove(&id);
        }
        match state {
            RequestState::Done => self.done.fetch_add(1, Ordering::Relaxed),
            RequestState::Rejected => self.rejected.fetch_add(1, Ordering::Relaxed),
            _ => self.failed.fetch_add(1, Ordering::Relaxed),
        };
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Pipeline statistics for the stats endpoint and shutdown summary.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CoordinatorStats {
    pub submitted: u64,
    pub done: u64,
    pub rejected: u64,
    pub failed: u64,
    pub in_flight: u64,
}

impl std::fmt::Display for CoordinatorStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Coordinator: {} submitted, {} done, {} rejected, {} failed, {} in flight",
            self.submitted, self.done, self.rejected, self.failed, self.in_flight
        )
    }
}

/// Materialized view returned by `status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusView {
    pub request_id: Uuid,
    pub state: RequestState,
    pub events: Vec<AgentEvent>,
    pub events_cursor: u64,
    pub weather_snapshot_id: Option<String>,
    pub dispersion_id: Option<String>,
    pub schedule_id: Option<String>,
}

/// Drives the per-request pipeline across a bounded worker pool.
pub struct Coordinator {
    ctx: Arc<StageContext>,
    registry: Arc<Registry>,
    tx: mpsc::Sender<Uuid>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Construct the coordinator and spawn its worker pool.
    pub fn start(ctx: Arc<StageContext>) -> Arc<Self> {
        let pool_size = ctx.config.coordinator.worker_pool_size;
        let capacity = ctx.config.coordinator.queue_capacity;
        let (tx, rx) = mpsc::channel::<Uuid>(capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let registry = Arc::new(Registry::new());
        let shutdown = CancellationToken::new();

        let mut workers = Vec::with_capacity(pool_size);
        for worker_id in 0..pool_size {
            let ctx = Arc::clone(&ctx);
            let registry = Arc::clone(&registry);
            let rx = Arc::clone(&rx);
            let shutdown = shutdown.clone();
            workers.push(tokio::spawn(async move {
                worker_loop(worker_id, ctx, registry, rx, shutdown).await;
            }));
        }

        info!(pool_size, capacity, "Coordinator started");
        Arc::new(Self {
            ctx,
            registry,
            tx,
            shutdown,
            workers: Mutex::new(workers),
        })
    }

    /// Submit a request: assign an id, persist, enqueue. Returns
    /// `Backpressure` when the queue is full.
    pub fn submit(&self, mut request: BurnRequest) -> Result<Uuid, PipelineError> {
        // Reserve the queue slot first so a full queue never leaves a
        // persisted-but-never-processed request behind
        let permit = self.tx.try_reserve().map_err(|_| PipelineError::Backpressure)?;

        let id = Uuid::new_v4();
        request.id = id;
        request.state = RequestState::Received;
        let now = chrono::Utc::now().timestamp();
        request.created_at = now;
        request.updated_at = now;

        records::upsert_request(self.ctx.store.as_ref(), &request, &[])?;
        self.registry.register(id);
        self.registry.submitted.fetch_add(1, Ordering::Relaxed);
        permit.send(id);

        info!(request_id = %id, farm_id = %request.farm_id, date = %request.burn_date, "Request submitted");
        Ok(id)
    }

    /// Current state, recent events, and materialized result ids.
    pub fn status(&self, id: Uuid, last_events: usize) -> Result<StatusView, PipelineError> {
        let row = self
            .ctx
            .store
            .get(tables::BURN_REQUESTS, &id.to_string())?
            .ok_or_else(|| PipelineError::Storage(format!("unknown request {id}")))?;
        let request = records::parse_request(&row)?;

        let cursor = self.ctx.events.cursor(id);
        let from = cursor.saturating_sub(last_events as u64);
        let events = self.ctx.events.events_after(id, from, last_events);

        let first_id = |table: &str| -> Option<String> {
            let predicate = records::belongs_to(id);
            self.ctx
                .store
                .query(table, &predicate, 1, QueryOrder::IdDesc)
                .ok()
                .and_then(|rows| rows.first().map(|r| r.id.clone()))
        };

        let schedule_id = self
            .ctx
            .store
            .get(tables::SCHEDULES, &request.burn_date.to_string())
            .ok()
            .flatten()
            .map(|r| r.id);

        Ok(StatusView {
            request_id: id,
            state: request.state,
            events,
            events_cursor: cursor,
            weather_snapshot_id: first_id(tables::WEATHER_SNAPSHOTS),
            dispersion_id: first_id(tables::DISPERSION_RESULTS),
            schedule_id,
        })
    }

    /// Events for a request after a cursor.
    pub fn events_after(&self, id: Uuid, cursor: u64, limit: usize) -> Vec<AgentEvent> {
        self.ctx.events.events_after(id, cursor, limit)
    }

    /// Cooperative cancellation: the running stage returns at its next
    /// suspension point.
    pub fn cancel(&self, id: Uuid) {
        info!(request_id = %id, "Cancellation requested");
        self.registry.token(id).cancel();
        // A request paused on approval unblocks through the gate
        self.ctx.approvals.forget(id);
    }

    /// Resolve a pending unsafe-weather approval.
    pub fn resolve_approval(&self, id: Uuid, approve: bool) -> bool {
        let resolved = self.ctx.approvals.resolve(id, approve);
        if resolved {
            info!(request_id = %id, approve, "Approval resolved");
        } else {
            warn!(request_id = %id, "No pending approval to resolve");
        }
        resolved
    }

    pub fn stats(&self) -> CoordinatorStats {
        let submitted = self.registry.submitted.load(Ordering::Relaxed);
        let done = self.registry.done.load(Ordering::Relaxed);
        let rejected = self.registry.rejected.load(Ordering::Relaxed);
        let failed = self.registry.failed.load(Ordering::Relaxed);
        CoordinatorStats {
            submitted,
            done,
            rejected,
            failed,
            in_flight: submitted.saturating_sub(done + rejected + failed),
        }
    }

    pub fn context(&self) -> &Arc<StageContext> {
        &self.ctx
    }

    /// Stop the worker pool after in-flight requests finish their
    /// current stage boundaries.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let workers = {
            let mut guard = match self.workers.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.drain(..).collect::<Vec<_>>()
        };
        futures::future::join_all(workers).await;
        info!("{}", self.stats());
    }
}

async fn worker_loop(
    worker_id: usize,
    ctx: Arc<StageContext>,
    registry: Arc<Registry>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Uuid>>>,
    shutdown: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = rx.lock().await;
            tokio::select! {
                id = rx.recv() => id,
                () = shutdown.cancelled() => None,
            }
        };
        let Some(request_id) = next else {
            break;
        };
        worker::process_request(&ctx, &registry, request_id).await;
    }
    tracing::debug!(worker_id, "Worker stopped");
}
