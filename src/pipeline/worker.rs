//! Per-request processing loop
//!
//! One worker drives one request end-to-end: stages strictly in order,
//! state persisted before the corresponding event, cancellation checked
//! at every suspension point, and the overall deadline (sum of stage
//! budgets plus 20% slack) enforced around each stage. The deadline
//! timer is suspended while the request is paused on human approval.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::{run_stage, StageContext, WorkingSet};
use crate::error::PipelineError;
use crate::store::tables;
use crate::types::{EventKind, RequestState, StageName};

use super::coordinator::Registry;
use super::records;

const STAGES: [StageName; 5] = [
    StageName::Validate,
    StageName::WeatherAssess,
    StageName::Predict,
    StageName::Optimize,
    StageName::Alert,
];

/// Sum of stage budgets plus 20% slack, ms.
fn overall_deadline_ms() -> u64 {
    let total: u64 = STAGES.iter().map(StageName::budget_ms).sum();
    total * 12 / 10
}

/// Process one submitted request to a terminal state.
pub(super) async fn process_request(
    ctx: &Arc<StageContext>,
    registry: &Arc<Registry>,
    request_id: Uuid,
) {
    let request = match ctx
        .store
        .get(tables::BURN_REQUESTS, &request_id.to_string())
        .and_then(|row| {
            row.map(|r| records::parse_request(&r)).transpose()
        }) {
        Ok(Some(request)) => request,
        Ok(None) => {
            warn!(request_id = %request_id, "Dequeued request not found in store");
            registry.finish(request_id, RequestState::Failed);
            return;
        }
        Err(err) => {
            warn!(request_id = %request_id, error = %err, "Failed to load dequeued request");
            registry.finish(request_id, RequestState::Failed);
            return;
        }
    };

    let cancel = registry.token(request_id);
    let mut ws = WorkingSet::new(request);
    let deadline = Instant::now() + Duration::from_millis(overall_deadline_ms());

    for stage in STAGES {
        if cancel.is_cancelled() {
            terminal(ctx, registry, &mut ws, &PipelineError::Cancelled, true).await;
            return;
        }

        let result = guarded_stage(ctx, &mut ws, stage, &cancel, deadline).await;
        match result {
            Ok(()) => {
                let Some(next) = ws.request.state.next() else {
                    break;
                };
                if transition(ctx, &mut ws, next).await.is_err() {
                    terminal(
                        ctx,
                        registry,
                        &mut ws,
                        &PipelineError::Storage("state persistence failed".into()),
                        true,
                    )
                    .await;
                    return;
                }
                if let Some(following) = stage_after(stage) {
                    ctx.events.emit(
                        ws.request.id,
                        EventKind::Handoff {
                            from: stage,
                            to: following,
                            reason: format!("{} complete", stage),
                        },
                    );
                }
            }
            Err(err) => {
                // Stage-level errors already produced their error event
                let emitted_by_stage = !matches!(
                    err,
                    PipelineError::Unavailable(ref msg) if msg.contains("deadline")
                );
                terminal(ctx, registry, &mut ws, &err, !emitted_by_stage).await;
                return;
            }
        }
    }

    // Alerted → Done
    if ws.request.state == RequestState::Alerted {
        if transition(ctx, &mut ws, RequestState::Done).await.is_err() {
            registry.finish(ws.request.id, RequestState::Failed);
            return;
        }
        // Outcome fingerprint for future prior biasing
        match records::outcome_row(&ws.request, ws.assigned_slot, &ws.conflicts, ws.confidence)
            .and_then(|row| ctx.store.put(tables::BURN_OUTCOMES, row))
        {
            Ok(()) => {}
            Err(err) => {
                warn!(request_id = %ws.request.id, error = %err, "Failed to persist burn outcome")
            }
        }
    }

    info!(
        request_id = %ws.request.id,
        state = %ws.request.state,
        slot = ?ws.assigned_slot,
        conflicts = ws.conflicts.len(),
        "Request pipeline complete"
    );
    registry.finish(ws.request.id, ws.request.state);
}

/// Run a stage under the overall deadline. The deadline branch is
/// disabled while the request waits on human approval.
async fn guarded_stage(
    ctx: &Arc<StageContext>,
    ws: &mut WorkingSet,
    stage: StageName,
    cancel: &CancellationToken,
    deadline: Instant,
) -> Result<(), PipelineError> {
    let request_id = ws.request.id;
    let approvals_pending = |ctx: &StageContext| ctx.approvals.is_pending(request_id);

    let stage_fut = run_stage(stage, ctx, ws, cancel);
    tokio::pin!(stage_fut);

    loop {
        tokio::select! {
            res = &mut stage_fut => return res,
            () = tokio::time::sleep_until(deadline), if !approvals_pending(ctx) => {
                // The gate may have been registered after this branch was
                // armed; re-enter the select with it disabled
                if approvals_pending(ctx) {
                    continue;
                }
                cancel.cancel();
                warn!(request_id = %request_id, stage = %stage, "Per-request deadline exceeded");
                return Err(PipelineError::Unavailable("per-request deadline exceeded".into()));
            }
        }
    }
}

fn stage_after(stage: StageName) -> Option<StageName> {
    match stage {
        StageName::Validate => Some(StageName::WeatherAssess),
        StageName::WeatherAssess => Some(StageName::Predict),
        StageName::Predict => Some(StageName::Optimize),
        StageName::Optimize => Some(StageName::Alert),
        StageName::Alert => None,
    }
}

/// Persist the next state, then let the caller emit the event.
async fn transition(
    ctx: &Arc<StageContext>,
    ws: &mut WorkingSet,
    next: RequestState,
) -> Result<(), PipelineError> {
    ws.request.state = next;
    ws.request.updated_at = chrono::Utc::now().timestamp();
    records::upsert_request(ctx.store.as_ref(), &ws.request, &[])
}

/// Move the request to its terminal state: `Rejected` for rejection
/// kinds, `Failed` otherwise. Persists before any worker-emitted event.
async fn terminal(
    ctx: &Arc<StageContext>,
    registry: &Arc<Registry>,
    ws: &mut WorkingSet,
    err: &PipelineError,
    emit_error: bool,
) {
    let state = if err.is_rejection() { RequestState::Rejected } else { RequestState::Failed };
    ws.request.state = state;
    ws.request.updated_at = chrono::Utc::now().timestamp();
    if let Err(persist_err) = records::upsert_request(ctx.store.as_ref(), &ws.request, &[]) {
        warn!(request_id = %ws.request.id, error = %persist_err, "Failed to persist terminal state");
    }
    if emit_error {
        ctx.events.emit(
            ws.request.id,
            EventKind::Error { error_kind: err.kind().to_string(), message: err.to_string() },
        );
    }
    info!(
        request_id = %ws.request.id,
        state = %state,
        error = %err,
        "Request terminated"
    );
    registry.finish(ws.request.id, state);
}
