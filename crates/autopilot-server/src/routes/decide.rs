use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use super::{parse_body, JsonBody};
use super::rebalance::VaultBody;
use crate::error::AppError;
use crate::state::AppState;
use autopilot_core::orchestrator::CombinedPlan;
use autopilot_core::types::{ActionRequest, Urgency};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideBody {
    pub request: ActionRequest,
    pub urgency: String,
    pub gas_ceiling: u64,
    #[serde(default)]
    pub vault: Option<VaultBody>,
}

/// POST /decide: schedule a request and, for rebalances, attach the
/// allocation. Nothing is executed.
pub async fn decide(
    State(app): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<Json<CombinedPlan>, AppError> {
    let body: DecideBody = parse_body(body)?;
    let urgency: Urgency = body.urgency.parse()?;
    let vault = body.vault.map(|v| v.resolve(&app)).transpose()?;

    let plan = app.orchestrator.decide(
        &body.request,
        urgency,
        body.gas_ceiling,
        vault.as_ref(),
        Utc::now(),
    )?;
    tracing::info!(
        request = %plan.request_id,
        action = %plan.action,
        outcome = %plan.outcome,
        "decided"
    );
    Ok(Json(plan))
}
