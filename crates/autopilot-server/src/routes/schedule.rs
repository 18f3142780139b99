use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::{batch_items, item_id, parse_body, BatchEntry, JsonBody};
use crate::error::AppError;
use crate::state::AppState;
use autopilot_core::schedule::SchedulePlan;
use autopilot_core::types::{ActionRequest, Urgency};
use autopilot_core::AutopilotError;

/// Body of `POST /schedule/plan`: an ActionRequest plus scheduling inputs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanBody {
    #[serde(flatten)]
    pub request: ActionRequest,
    /// Parsed separately so an unknown urgency is a 400, not a decode error.
    pub urgency: String,
    pub gas_ceiling: u64,
    #[serde(default)]
    pub cadence_secs: Option<u64>,
}

fn plan_one(app: &AppState, body: serde_json::Value) -> Result<SchedulePlan, AutopilotError> {
    let body: PlanBody = parse_body(body)?;
    let urgency: Urgency = body.urgency.parse()?;
    let plan = app.planner().plan_with_cadence(
        &body.request,
        urgency,
        body.gas_ceiling,
        Utc::now(),
        body.cadence_secs,
    )?;
    tracing::debug!(
        request = %plan.request_id,
        eligible = plan.eligible,
        gas = plan.gas_estimate,
        "planned"
    );
    Ok(plan)
}

/// POST /schedule/plan: decide whether and when an action may run.
///
/// Ineligible plans are a normal 200 response with `eligible: false` and a
/// reason code.
pub async fn plan(
    State(app): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<Json<SchedulePlan>, AppError> {
    Ok(Json(plan_one(&app, body)?))
}

/// POST /schedule/batch: plan an array of bodies independently.
pub async fn plan_batch(
    State(app): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<Json<Vec<BatchEntry<SchedulePlan>>>, AppError> {
    let entries = batch_items(body)?
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let id = item_id(&item);
            BatchEntry::from_result(index, id, plan_one(&app, item))
        })
        .collect();
    Ok(Json(entries))
}
