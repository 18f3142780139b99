use axum::extract::State;
use axum::Json;

use super::{batch_items, item_id, parse_body, BatchEntry, JsonBody};
use crate::error::AppError;
use crate::state::AppState;
use autopilot_core::risk::RiskScore;
use autopilot_core::types::ActionRequest;

/// POST /risk/score: score one ActionRequest.
pub async fn score(
    State(app): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<Json<RiskScore>, AppError> {
    let request: ActionRequest = parse_body(body)?;
    let score = app.scorer().score(&request)?;
    tracing::debug!(request = %request.id, value = score.value, band = %score.band, "scored");
    Ok(Json(score))
}

/// POST /risk/batch: score an array of ActionRequests independently.
pub async fn score_batch(
    State(app): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<Json<Vec<BatchEntry<RiskScore>>>, AppError> {
    let entries = batch_items(body)?
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let id = item_id(&item);
            let result = parse_body::<ActionRequest>(item).and_then(|r| app.scorer().score(&r));
            BatchEntry::from_result(index, id, result)
        })
        .collect();
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopilot_core::config::Config;
    use autopilot_core::risk::RiskBand;

    fn app() -> AppState {
        AppState::new(Config::default()).unwrap()
    }

    #[tokio::test]
    async fn score_accepts_string_counters() {
        let body = serde_json::json!({
            "actor": "sei1abc",
            "action": "transfer",
            "amount": { "denom": "usei", "amount": "50000000" },
            "targetId": "pot-1",
            "context": { "txPerHour": "25", "txPerDay": 150, "medianAmount": "500000" }
        });
        let Json(score) = score(State(app()), JsonBody(body)).await.unwrap();
        assert!(score.band >= RiskBand::High);
    }

    #[tokio::test]
    async fn score_rejects_unknown_action() {
        let body = serde_json::json!({ "action": "swap", "targetId": "x" });
        let err = score(State(app()), JsonBody(body)).await.unwrap_err();
        assert_eq!(err.status_and_kind().1, "invalid_input");
    }

    #[tokio::test]
    async fn batch_reports_failures_in_place() {
        let body = serde_json::json!([
            { "id": "ok-1", "action": "harvest", "targetId": "vault-1" },
            { "id": "bad-1", "action": "deposit", "targetId": "vault-1",
              "amount": { "denom": "usei", "amount": "-5" } },
        ]);
        let Json(entries) = score_batch(State(app()), JsonBody(body)).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].result.is_some());
        assert_eq!(entries[1].id.as_deref(), Some("bad-1"));
        assert_eq!(entries[1].kind, Some("invalid_input"));
    }
}
