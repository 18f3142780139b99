pub mod config;
pub mod decide;
pub mod health;
pub mod rebalance;
pub mod risk;
pub mod schedule;
pub mod signals;

use crate::error::AppError;
use autopilot_core::AutopilotError;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A JSON request body. Unlike `Json`, a body that is not valid JSON (or
/// lacks a JSON content type) is rejected with the usual `{error, kind}`
/// response instead of plain text.
pub struct JsonBody(pub serde_json::Value);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<serde_json::Value>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::bad_request(format!(
                "malformed request: {}",
                rejection.body_text()
            ))),
        }
    }
}

/// Decode a JSON body, reporting malformed input as `InvalidInput` so it
/// gets the same `{error, kind}` body as every other client error.
pub(crate) fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, AutopilotError> {
    serde_json::from_value(body)
        .map_err(|e| AutopilotError::invalid(format!("malformed request: {e}")))
}

/// One element of a batch response. Items are processed independently, so a
/// failure is reported in place instead of failing the whole batch.
#[derive(Debug, Serialize)]
pub struct BatchEntry<T: Serialize> {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

impl<T: Serialize> BatchEntry<T> {
    pub fn from_result(index: usize, id: Option<String>, result: Result<T, AutopilotError>) -> Self {
        match result {
            Ok(value) => Self {
                index,
                id,
                result: Some(value),
                error: None,
                kind: None,
            },
            Err(e) => Self {
                index,
                id,
                result: None,
                error: Some(e.to_string()),
                kind: Some(e.kind()),
            },
        }
    }
}

/// Batch bodies must be JSON arrays.
pub(crate) fn batch_items(body: serde_json::Value) -> Result<Vec<serde_json::Value>, AppError> {
    match body {
        serde_json::Value::Array(items) => Ok(items),
        _ => Err(AppError::bad_request("batch body must be a JSON array")),
    }
}

/// The `id` field of a raw batch item, when it has one.
pub(crate) fn item_id(item: &serde_json::Value) -> Option<String> {
    item.get("id").and_then(|v| v.as_str()).map(str::to_string)
}
