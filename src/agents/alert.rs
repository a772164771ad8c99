//! Stage E — Alert
//!
//! Notifies the operator of the schedule decision, notifies every
//! contact involved in an unresolved conflict, and announces the
//! decision on the broadcast channel. Send failures are surfaced as
//! error events but never fail the pipeline. Budget: 10 s.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::defaults::STAGE_BACKOFF_BASE_MS;
use crate::error::PipelineError;
use crate::notify::Channel;
use crate::pipeline::records;
use crate::store::tables;
use crate::types::{ContactMethod, EventKind, StageName};

use super::{StageContext, WorkingSet};

/// Send attempts per recipient before giving up.
const SEND_ATTEMPTS: u32 = 2;

pub async fn run(
    ctx: &StageContext,
    ws: &mut WorkingSet,
    cancel: &CancellationToken,
) -> Result<(), PipelineError> {
    let budget = Duration::from_millis(StageName::Alert.budget_ms());
    let result = tokio::select! {
        res = tokio::time::timeout(budget, deliver_all(ctx, ws)) => res,
        () = cancel.cancelled() => return Err(PipelineError::Cancelled),
    };
    if result.is_err() {
        // Budget exhausted mid-delivery: surfaced, not fatal
        warn!(request_id = %ws.request.id, "Alert budget exceeded, remaining sends skipped");
        ctx.events.emit(
            ws.request.id,
            EventKind::Error {
                error_kind: "unavailable".into(),
                message: "alert budget exceeded, remaining sends skipped".into(),
            },
        );
    }
    Ok(())
}

async fn deliver_all(ctx: &StageContext, ws: &WorkingSet) {
    let request_id = ws.request.id;

    // Own schedule decision
    let decision = match ws.assigned_slot {
        Some(slot) => format!(
            "Burn {} scheduled for {} at {} ({} acres, {})",
            short_id(ws),
            ws.request.burn_date,
            slot,
            ws.request.acres,
            ws.request.fuel
        ),
        None => format!("Burn {} could not be scheduled for {}", short_id(ws), ws.request.burn_date),
    };
    send_with_retries(
        ctx,
        ws,
        channel_for(ws.request.contact),
        &ws.request.contact_handle,
        &decision,
    )
    .await;

    // Conflict notifications to every affected contact
    for conflict in &ws.conflicts {
        let other_id = if conflict.a == request_id { conflict.b } else { conflict.a };
        let message = format!(
            "Smoke conflict ({}) with burn {} on {}: {:.1} km apart, {:.1} h overlap, peak {:.0} ug/m3",
            conflict.severity,
            other_id,
            ws.request.burn_date,
            conflict.distance_m / 1000.0,
            conflict.time_overlap_h,
            conflict.peak_pm25
        );
        send_with_retries(
            ctx,
            ws,
            channel_for(ws.request.contact),
            &ws.request.contact_handle,
            &message,
        )
        .await;

        // The counterpart's contact comes off their request row
        if let Ok(Some(row)) = ctx.store.get(tables::BURN_REQUESTS, &other_id.to_string()) {
            if let Ok(other) = records::parse_request(&row) {
                send_with_retries(
                    ctx,
                    ws,
                    channel_for(other.contact),
                    &other.contact_handle,
                    &message,
                )
                .await;
            }
        }
    }

    // Broadcast the decision for dashboard listeners
    send_with_retries(ctx, ws, Channel::Broadcast, "coordination", &decision).await;
}

fn channel_for(contact: ContactMethod) -> Channel {
    match contact {
        ContactMethod::Sms => Channel::Sms,
        ContactMethod::Broadcast => Channel::Broadcast,
    }
}

fn short_id(ws: &WorkingSet) -> String {
    ws.request.id.to_string()[..8].to_string()
}

/// Send through the breaker with capped backoff. Permanent failure
/// becomes an error event, never a stage failure.
async fn send_with_retries(
    ctx: &StageContext,
    ws: &WorkingSet,
    channel: Channel,
    recipient: &str,
    payload: &str,
) {
    let mut attempt = 0;
    loop {
        if let Err(err) = ctx.notifier_breaker.check() {
            ctx.events.emit(
                ws.request.id,
                EventKind::Error { error_kind: err.kind().to_string(), message: err.to_string() },
            );
            return;
        }
        match ctx.notifier.send(channel, recipient, payload).await {
            Ok(receipt) => {
                ctx.notifier_breaker.record_success();
                debug!(
                    request_id = %ws.request.id,
                    %channel,
                    provider_id = %receipt.provider_id,
                    state = ?receipt.state,
                    "Alert delivered"
                );
                return;
            }
            Err(err) => {
                ctx.notifier_breaker.record_failure(&err);
                attempt += 1;
                if !err.is_transient() || attempt >= SEND_ATTEMPTS {
                    warn!(request_id = %ws.request.id, %channel, error = %err, "Alert send failed");
                    ctx.events.emit(
                        ws.request.id,
                        EventKind::Error {
                            error_kind: err.kind().to_string(),
                            message: format!("alert to {channel} failed: {err}"),
                        },
                    );
                    return;
                }
                tokio::time::sleep(crate::infra::delay_for_error(
                    &err,
                    attempt,
                    STAGE_BACKOFF_BASE_MS,
                ))
                .await;
            }
        }
    }
}
