use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;

use crate::error::AppError;
use crate::state::AppState;
use autopilot_core::AutopilotError;

/// GET /signals: the cached signal snapshot.
pub async fn get_signals(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let snapshot = app
        .cache
        .snapshot()
        .ok_or_else(|| AppError::not_found("no signal snapshot has been fetched yet"))?;
    Ok(Json(serde_json::to_value(&*snapshot)?))
}

/// POST /signals/refresh/{vault_id}: fetch fresh signals for a vault from
/// the chain data gateway and swap them into the cache.
pub async fn refresh(
    State(app): State<AppState>,
    Path(vault_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let gateway = app.gateway.clone().ok_or_else(|| {
        AutopilotError::UpstreamUnavailable("gateway.base_url is not configured".to_string())
    })?;
    let fresh = gateway.fetch_signals(&vault_id, Utc::now()).await?;
    let snapshot = app.cache.merge(fresh);
    if let Some(signals) = snapshot.signals_for(&vault_id) {
        tracing::info!(
            vault = %vault_id,
            strategies = signals.valid_strategy_count(),
            risk = signals.risk,
            vaults = snapshot.vaults.len(),
            "signals refreshed"
        );
    }
    Ok(Json(serde_json::to_value(&*snapshot)?))
}
