//! Stage C — Predict
//!
//! Runs the dispersion model, fingerprints the plume, and persists both
//! the result and the enriched request row. A non-finite model output is
//! a fatal bug class (`Numeric`) — never silently retried. Budget: 5 s.

use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::dispersion::{self, plume_fingerprint};
use crate::error::PipelineError;
use crate::pipeline::records;
use crate::store::tables;
use crate::types::StageName;

use super::{StageContext, WorkingSet};

pub async fn run(ctx: &StageContext, ws: &mut WorkingSet) -> Result<(), PipelineError> {
    let weather = ws
        .weather
        .clone()
        .ok_or_else(|| PipelineError::Numeric("predict without assessed weather".into()))?;

    let budget = Duration::from_millis(StageName::Predict.budget_ms());
    let fuel_factor = ctx.config.emission_factors.factor(ws.request.fuel);

    // The model is pure CPU; the timeout guards pathological inputs
    let request = ws.request.clone();
    let model_weather = weather.clone();
    let result = tokio::time::timeout(budget, async move {
        dispersion::predict(&request, &model_weather, fuel_factor)
    })
    .await
    .map_err(|_| PipelineError::Numeric("dispersion model exceeded budget".into()))??;

    let fingerprint = plume_fingerprint(&result);
    let row_id = Uuid::new_v4().to_string();
    ctx.store.put(
        tables::DISPERSION_RESULTS,
        records::dispersion_row(&row_id, &result, fingerprint)?,
    )?;

    // Enrich the request row with the plume figures the detector and
    // optimizer read back for the whole date's candidate set
    let extras = records::plume_fields(&result, &weather);
    records::upsert_request(ctx.store.as_ref(), &ws.request, &extras)?;

    debug!(
        request_id = %ws.request.id,
        q_gs = result.emission_rate_gs,
        radius_m = result.max_radius_m,
        poor_dispersion = result.poor_dispersion,
        "Plume predicted and stored"
    );

    ws.dispersion = Some(result);
    ws.dispersion_row_id = Some(row_id);
    Ok(())
}
