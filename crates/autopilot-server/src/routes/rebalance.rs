use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use super::{parse_body, JsonBody};
use crate::error::AppError;
use crate::state::AppState;
use autopilot_core::orchestrator::VaultContext;
use autopilot_core::rebalance::{AllocationPlan, Constraints, MarketSignals, Model};
use autopilot_core::types::Strategy;
use autopilot_core::AutopilotError;
use std::collections::BTreeMap;

/// Vault inputs as clients send them. Anything omitted is filled from the
/// cached signal snapshot and then from config.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultBody {
    pub vault_id: String,
    #[serde(default)]
    pub signals: Option<MarketSignals>,
    #[serde(default)]
    pub risk_tolerance: Option<u8>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub current_allocation: Option<BTreeMap<Strategy, u32>>,
}

impl VaultBody {
    pub fn resolve(self, app: &AppState) -> Result<VaultContext, AutopilotError> {
        let model = self.model.as_deref().map(str::parse::<Model>).transpose()?;
        let cached = app.cache.snapshot();

        let cached_vault = cached.as_ref().and_then(|snap| snap.vault(&self.vault_id));

        let signals = match self.signals {
            Some(signals) => signals,
            None => cached
                .as_ref()
                .and_then(|snap| snap.signals_for(&self.vault_id))
                .ok_or(AutopilotError::InsufficientSignals { valid: 0 })?,
        };
        let risk_tolerance = self
            .risk_tolerance
            .or_else(|| cached_vault.and_then(|v| v.risk_tolerance))
            .unwrap_or(app.config.rebalance.default_risk_tolerance);
        let current_allocation = self
            .current_allocation
            .or_else(|| cached_vault.map(|v| v.current_allocation.clone()))
            .unwrap_or_default();

        Ok(VaultContext {
            vault_id: self.vault_id,
            signals,
            risk_tolerance,
            model,
            constraints: self.constraints,
            current_allocation,
        })
    }
}

/// POST /rebalance/plan: target allocation for one vault.
pub async fn plan(
    State(app): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<Json<AllocationPlan>, AppError> {
    let ctx = parse_body::<VaultBody>(body)?.resolve(&app)?;
    let model = ctx.model.unwrap_or(app.rebalancer().config().default_model);
    let plan = app.rebalancer().rebalance_with(
        &ctx.vault_id,
        &ctx.signals,
        ctx.risk_tolerance,
        model,
        &ctx.constraints,
    )?;
    tracing::info!(
        vault = %plan.vault_id,
        %model,
        expected_return = plan.expected_return,
        confidence = plan.confidence,
        "allocation planned"
    );
    Ok(Json(plan))
}

/// POST /rebalance/compare: one allocation per model on the same inputs.
/// A `model` field in the body is ignored.
pub async fn compare(
    State(app): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<Json<Vec<AllocationPlan>>, AppError> {
    let mut vault = parse_body::<VaultBody>(body)?;
    vault.model = None;
    let ctx = vault.resolve(&app)?;
    let plans = app.rebalancer().compare(
        &ctx.vault_id,
        &ctx.signals,
        ctx.risk_tolerance,
        &ctx.constraints,
    )?;
    Ok(Json(plans))
}
