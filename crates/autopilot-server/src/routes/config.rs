use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /config: the effective engine config, defaults filled in.
///
/// Read-only. Changes go through `autopilot.yaml` and a restart.
pub async fn get_config(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::to_value(&*app.config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopilot_core::config::Config;

    #[tokio::test]
    async fn get_config_returns_defaults() {
        let app = AppState::new(Config::default()).unwrap();
        let Json(json) = get_config(State(app)).await.unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["schedule"]["batch_cadence_secs"], 3600);
        assert_eq!(json["rebalance"]["default_model"], "rl");
    }

    #[tokio::test]
    async fn get_config_reflects_loaded_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("autopilot.yaml");
        std::fs::write(&path, "schedule:\n  block_interval_ms: 600\n").unwrap();
        let config = Config::load(&path).unwrap();

        let app = AppState::new(config).unwrap();
        let Json(json) = get_config(State(app)).await.unwrap();
        assert_eq!(json["schedule"]["block_interval_ms"], 600);
    }
}
