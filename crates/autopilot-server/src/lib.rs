pub mod error;
pub mod gateway;
pub mod retry;
pub mod routes;
pub mod state;

use autopilot_core::config::Config;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health))
        // Risk
        .route("/risk/score", post(routes::risk::score))
        .route("/risk/batch", post(routes::risk::score_batch))
        // Schedule
        .route("/schedule/plan", post(routes::schedule::plan))
        .route("/schedule/batch", post(routes::schedule::plan_batch))
        // Rebalance
        .route("/rebalance/plan", post(routes::rebalance::plan))
        .route("/rebalance/compare", post(routes::rebalance::compare))
        // Combined decision
        .route("/decide", post(routes::decide::decide))
        // Signals
        .route("/signals", get(routes::signals::get_signals))
        .route(
            "/signals/refresh/{vault_id}",
            post(routes::signals::refresh),
        )
        // Config
        .route("/config", get(routes::config::get_config))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the decision engine API on a pre-bound listener.
///
/// The caller binds the listener so it can report the actual port before
/// starting (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on(config: Config, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual = listener.local_addr()?;
    let gateway = config.gateway.base_url.clone();
    let app = build_router(state::AppState::new(config)?);

    tracing::info!(
        gateway = gateway.as_deref().unwrap_or("none"),
        "autopilot decision engine listening on http://{actual}"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
