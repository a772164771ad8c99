//! Stage D — Optimize
//!
//! Loads the target date's candidate set, runs the annealer on a
//! private copy under the per-date lock, and persists the schedule and
//! conflict records on success. An aborted run persists nothing.
//! Budget: 30 s.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::optimizer::{anneal, AnnealOutcome, Candidate};
use crate::pipeline::records;
use crate::store::{tables, QueryOrder};
use crate::types::{EventKind, RequestState, StageName};

use super::{StageContext, WorkingSet};

pub async fn run(
    ctx: &StageContext,
    ws: &mut WorkingSet,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    let date = ws.request.burn_date;
    let cap = ctx.config.conflict.cap;
    let slack_m = ctx.config.conflict.slack_m;

    // Concurrent optimizations for one date serialize here
    let _date_guard = ctx.lock_date(date).await;

    // Every burn on the date that has a plume prediction competes for a
    // slot, including ones that already completed their own pipeline
    let date_str = date.to_string();
    let predicate = records::on_date_in_states(
        &date_str,
        &[
            RequestState::Predicted,
            RequestState::Scheduled,
            RequestState::Alerted,
            RequestState::Done,
        ],
    );
    let rows = ctx
        .store
        .query(tables::BURN_REQUESTS, &predicate, cap + 1, QueryOrder::IdAsc)?;
    if rows.len() > cap {
        return Err(PipelineError::Capacity { limit: cap });
    }

    let candidates: Vec<Candidate> = rows.iter().filter_map(records::candidate_from_row).collect();
    if candidates.iter().all(|c| c.burn.id != ws.request.id) {
        return Err(PipelineError::Storage(format!(
            "request {} missing from its own candidate set",
            ws.request.id
        )));
    }

    // Conflict count at the incoming assignments, for the delta metric
    let burns_before: Vec<_> = candidates.iter().map(|c| c.burn.clone()).collect();
    let before = crate::conflict::detect(&burns_before, cap, slack_m)?.len();

    let params = ctx.config.optimizer.clone();
    let budget = Duration::from_millis(StageName::Optimize.budget_ms());
    let anneal_cancel = cancel.child_token();
    let anneal_token = anneal_cancel.clone();
    let anneal_candidates = candidates.clone();
    let handle = tokio::task::spawn_blocking(move || {
        anneal(date, anneal_candidates, &params, slack_m, &anneal_token)
    });

    let outcome: AnnealOutcome = match tokio::time::timeout(budget, handle).await {
        Ok(joined) => {
            joined.map_err(|e| PipelineError::Storage(format!("optimizer task failed: {e}")))?
        }
        Err(_) => {
            // Budget exceeded: stop the search and discard its result
            anneal_cancel.cancel();
            warn!(request_id = %ws.request.id, "Optimization budget exceeded");
            return Err(PipelineError::Unavailable("optimize budget exceeded".into()));
        }
    };

    ctx.events.emit(
        ws.request.id,
        EventKind::Metric {
            name: "optimizer_iterations".into(),
            value: outcome.schedule.iterations as f64,
        },
    );

    if outcome.schedule.termination == crate::types::TerminationReason::Aborted {
        // Cancelled mid-run: best-so-far is not persisted
        return Err(PipelineError::Cancelled);
    }

    let mut schedule = outcome.schedule;
    schedule.created_at = chrono::Utc::now().timestamp();

    // Persist schedule, then conflicts, then per-request assignments
    ctx.store.put(tables::SCHEDULES, records::schedule_row(&schedule)?)?;
    for record in &outcome.residual_conflicts {
        ctx.store.put(tables::CONFLICTS, records::conflict_row(record, &date_str)?)?;
    }
    for (id, slot) in &schedule.assignments {
        if let Some(mut row) = ctx.store.get(tables::BURN_REQUESTS, &id.to_string())? {
            let (key, value) = records::assignment_field(*slot);
            row.fields.insert(key.to_string(), value);
            ctx.store.put(tables::BURN_REQUESTS, row)?;
        }
    }

    let after = outcome.residual_conflicts.len();
    ctx.events.emit(
        ws.request.id,
        EventKind::Metric {
            name: "conflict_delta".into(),
            value: after as f64 - before as f64,
        },
    );

    ws.assigned_slot = schedule.assignments.get(&ws.request.id).copied();
    ws.conflicts = outcome
        .residual_conflicts
        .into_iter()
        .filter(|c| c.involves(ws.request.id))
        .collect();
    ws.schedule_row_id = Some(date_str);

    info!(
        request_id = %ws.request.id,
        date = %date,
        burns = schedule.assignments.len(),
        score = schedule.score,
        conflicts_before = before,
        conflicts_after = after,
        slot = ?ws.assigned_slot,
        "Schedule optimized"
    );
    Ok(())
}
