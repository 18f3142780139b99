use autopilot_core::config::Config;
use autopilot_server::state::AppState;
use axum::http::StatusCode;
use http_body_util::BodyExt;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn router() -> axum::Router {
    autopilot_server::build_router(AppState::new(Config::default()).unwrap())
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Send a POST request with a JSON body via `oneshot` and return (status, parsed JSON body).
async fn post_json(
    app: axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// POST an arbitrary body, valid JSON or not.
async fn post_raw(app: axum::Router, uri: &str, body: &'static str) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn scenario_signals() -> serde_json::Value {
    serde_json::json!({
        "prices": { "SEI": 0.45, "USDC": 1.0, "ATOM": 8.2 },
        "apr": { "Staking": 0.12, "Lending": 0.08, "LP": 0.15, "PerpsHedge": 0.18 },
        "risk": 35
    })
}

// ---------------------------------------------------------------------------
// Health / config
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_ok() {
    let (status, body) = get(router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn config_endpoint_returns_effective_config() {
    let (status, body) = get(router(), "/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server"]["port"], 7003);
}

// ---------------------------------------------------------------------------
// Risk
// ---------------------------------------------------------------------------

#[tokio::test]
async fn risk_score_transfer_scenario_is_high() {
    let (status, body) = post_json(
        router(),
        "/risk/score",
        serde_json::json!({
            "actor": "sei1sender",
            "action": "transfer",
            "amount": { "denom": "usei", "amount": "50000000" },
            "targetId": "pot-1",
            "context": { "txPerHour": 25, "txPerDay": 150, "medianAmount": "500000" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let band = body["band"].as_str().unwrap();
    assert!(band == "high" || band == "critical", "band was {band}");
    assert_eq!(body["recommendation"], "hold");
    let value = body["value"].as_f64().unwrap();
    assert!((0.0..=100.0).contains(&value));
    assert_eq!(body["factors"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn risk_score_missing_target_is_400() {
    let (status, body) = post_json(
        router(),
        "/risk/score",
        serde_json::json!({ "action": "transfer" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_input");
}

#[tokio::test]
async fn malformed_json_gets_error_body() {
    for uri in ["/risk/score", "/risk/batch", "/schedule/plan", "/rebalance/plan", "/decide"] {
        let (status, body) = post_raw(router(), uri, r#"{"action": "transfer",#"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["kind"], "invalid_input");
        assert!(body["error"].as_str().unwrap().starts_with("malformed request"));
    }
}

#[tokio::test]
async fn risk_batch_scores_each_item() {
    let (status, body) = post_json(
        router(),
        "/risk/batch",
        serde_json::json!([
            { "id": "a", "action": "harvest", "targetId": "vault-1" },
            { "id": "b", "action": "teleport", "targetId": "vault-1" }
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["result"]["band"], "low");
    assert_eq!(body[1]["kind"], "invalid_input");
    assert_eq!(body[1]["id"], "b");
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

fn transfer_scenario() -> serde_json::Value {
    serde_json::json!({
        "action": "transfer",
        "targetId": "pot-1",
        "amount": { "denom": "usei", "amount": "50000000" },
        "context": { "txPerHour": "25", "txPerDay": "150", "medianAmount": 500000 }
    })
}

#[tokio::test]
async fn schedule_transfer_scenario_not_immediately_executable() {
    for urgency in ["low", "normal", "high"] {
        let mut body = transfer_scenario();
        body["urgency"] = serde_json::json!(urgency);
        body["gasCeiling"] = serde_json::json!(200000);
        let (status, body) = post_json(router(), "/schedule/plan", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["urgency"], urgency);
        assert_eq!(body["risk"]["recommendation"], "hold");
        assert!(body["eligible"].as_bool().unwrap());

        let evaluated = body["evaluatedAt"].as_str().unwrap();
        let earliest = body["earliestExecution"].as_str().unwrap();
        let evaluated = chrono::DateTime::parse_from_rfc3339(evaluated).unwrap();
        let earliest = chrono::DateTime::parse_from_rfc3339(earliest).unwrap();
        assert!(earliest > evaluated, "{urgency} executes immediately");
    }
}

#[tokio::test]
async fn decide_transfer_scenario_is_held() {
    for urgency in ["low", "normal", "high"] {
        let (status, body) = post_json(
            router(),
            "/decide",
            serde_json::json!({
                "request": transfer_scenario(),
                "urgency": urgency,
                "gasCeiling": 200000
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "deferred", "{urgency}");
        assert_eq!(body["reason"], "risk_hold");
    }
}

#[tokio::test]
async fn schedule_gas_ceiling_exceeded() {
    let (status, body) = post_json(
        router(),
        "/schedule/plan",
        serde_json::json!({
            "action": "rebalance",
            "targetId": "vault-1",
            "urgency": "high",
            "gasCeiling": 1
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["eligible"], false);
    assert_eq!(body["reason"], "gas_ceiling_exceeded");
    assert_eq!(body["gasEstimate"], 400000);
}

#[tokio::test]
async fn schedule_bad_urgency_is_400() {
    let (status, body) = post_json(
        router(),
        "/schedule/plan",
        serde_json::json!({
            "action": "harvest",
            "targetId": "vault-1",
            "urgency": "whenever",
            "gasCeiling": 300000
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("urgency"));
}

#[tokio::test]
async fn schedule_batch_plans_each_item() {
    let (status, body) = post_json(
        router(),
        "/schedule/batch",
        serde_json::json!([
            { "action": "harvest", "targetId": "v", "urgency": "high", "gasCeiling": 300000 },
            { "action": "harvest", "targetId": "v", "urgency": "high" }
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["result"]["eligible"], true);
    assert_eq!(body[1]["kind"], "invalid_input");
}

// ---------------------------------------------------------------------------
// Rebalance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rebalance_bandit_scenario() {
    let (status, body) = post_json(
        router(),
        "/rebalance/plan",
        serde_json::json!({
            "vaultId": "vault-1",
            "signals": scenario_signals(),
            "riskTolerance": 35,
            "model": "bandit"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let perps = body["weights"]["PerpsHedge"].as_f64().unwrap();
    let staking = body["weights"]["Staking"].as_f64().unwrap();
    assert!(perps >= staking);
    let sum: f64 = body["weights"]
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_f64().unwrap())
        .sum();
    assert!((sum - 1.0).abs() <= 1e-6);
    let bps: u64 = body["legs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["targetBps"].as_u64().unwrap())
        .sum();
    assert_eq!(bps, 10_000);
}

#[tokio::test]
async fn rebalance_single_valid_apr_is_422() {
    let (status, body) = post_json(
        router(),
        "/rebalance/plan",
        serde_json::json!({
            "vaultId": "vault-1",
            "signals": { "apr": { "Staking": 0.12, "Lending": null, "LP": -0.5 } }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "insufficient_signals");
}

#[tokio::test]
async fn rebalance_compare_returns_three_plans() {
    let (status, body) = post_json(
        router(),
        "/rebalance/compare",
        serde_json::json!({ "vaultId": "vault-1", "signals": scenario_signals() }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let models: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["model"].as_str().unwrap())
        .collect();
    assert_eq!(models, vec!["bandit", "rl", "markowitz"]);
}

#[tokio::test]
async fn rebalance_cap_limits_single_allocation() {
    let (status, body) = post_json(
        router(),
        "/rebalance/plan",
        serde_json::json!({
            "vaultId": "vault-1",
            "signals": scenario_signals(),
            "riskTolerance": 100,
            "model": "rl",
            "constraints": { "maxSingleAllocation": 0.4 }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    for w in body["weights"].as_object().unwrap().values() {
        assert!(w.as_f64().unwrap() <= 0.4 + 1e-6);
    }
}

// ---------------------------------------------------------------------------
// Decide / signals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn decide_rebalance_attaches_allocation() {
    let (status, body) = post_json(
        router(),
        "/decide",
        serde_json::json!({
            "request": { "id": "req-9", "action": "rebalance", "targetId": "vault-1" },
            "urgency": "high",
            "gasCeiling": 1000000,
            "vault": { "vaultId": "vault-1", "signals": scenario_signals(), "riskTolerance": 60 }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "execute");
    assert_eq!(body["allocation"]["requestId"], "req-9");
    assert_eq!(body["schedule"]["requestId"], "req-9");
}

#[tokio::test]
async fn decide_mismatched_vault_is_400() {
    let (status, _) = post_json(
        router(),
        "/decide",
        serde_json::json!({
            "request": { "action": "rebalance", "targetId": "vault-1" },
            "urgency": "high",
            "gasCeiling": 1000000,
            "vault": { "vaultId": "vault-2", "signals": scenario_signals() }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signals_empty_until_refreshed() {
    let (status, body) = get(router(), "/signals").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn refresh_then_rebalance_from_cache() {
    let mut server = mockito::Server::new_async().await;
    let _prices = server
        .mock("GET", "/prices")
        .with_body(r#"{"SEI":0.45}"#)
        .create_async()
        .await;
    let _apr = server
        .mock("GET", "/apr")
        .with_body(r#"{"Staking":0.12,"Lending":0.08,"LP":0.15,"PerpsHedge":0.18}"#)
        .create_async()
        .await;
    let _vault = server
        .mock("GET", "/vaults/vault-5")
        .with_body(r#"{"vaultId":"vault-5","risk":35,"riskTolerance":80}"#)
        .create_async()
        .await;

    let mut config = Config::default();
    config.gateway.base_url = Some(server.url());
    config.gateway.retry_initial_delay_ms = 1;
    let app = autopilot_server::build_router(AppState::new(config).unwrap());

    let (status, _) = post_json(
        app.clone(),
        "/signals/refresh/vault-5",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        app,
        "/rebalance/plan",
        serde_json::json!({ "vaultId": "vault-5" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["riskTolerance"], 80);
    assert_eq!(body["weights"].as_object().unwrap().len(), 4);
}

#[tokio::test]
async fn refreshing_one_vault_keeps_anothers_risk() {
    let mut server = mockito::Server::new_async().await;
    let _prices = server
        .mock("GET", "/prices")
        .with_body(r#"{"SEI":0.45}"#)
        .create_async()
        .await;
    let _apr = server
        .mock("GET", "/apr")
        .with_body(r#"{"Staking":0.12,"Lending":0.08}"#)
        .create_async()
        .await;
    let _calm = server
        .mock("GET", "/vaults/vault-a")
        .with_body(r#"{"vaultId":"vault-a","risk":10}"#)
        .create_async()
        .await;
    let _stressed = server
        .mock("GET", "/vaults/vault-b")
        .with_body(r#"{"vaultId":"vault-b","risk":95}"#)
        .create_async()
        .await;

    let mut config = Config::default();
    config.gateway.base_url = Some(server.url());
    config.gateway.retry_initial_delay_ms = 1;
    let app = autopilot_server::build_router(AppState::new(config).unwrap());

    for vault in ["vault-a", "vault-b"] {
        let uri = format!("/signals/refresh/{vault}");
        let (status, _) = post_json(app.clone(), &uri, serde_json::json!({})).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, cached) = get(app.clone(), "/signals").await;
    assert_eq!(cached["vaults"]["vault-a"]["risk"], 10.0);
    assert_eq!(cached["vaults"]["vault-b"]["risk"], 95.0);

    // Staking and Lending base risks are 20 and 30, scaled by 0.5 + risk / 200
    let (_, calm) = post_json(
        app.clone(),
        "/rebalance/plan",
        serde_json::json!({ "vaultId": "vault-a", "model": "bandit" }),
    )
    .await;
    let (_, stressed) = post_json(
        app.clone(),
        "/rebalance/plan",
        serde_json::json!({ "vaultId": "vault-b", "model": "bandit" }),
    )
    .await;
    let calm_risk = calm["estimatedRisk"].as_f64().unwrap();
    let stressed_risk = stressed["estimatedRisk"].as_f64().unwrap();
    assert!(calm_risk < 15.0, "vault-a estimated risk {calm_risk}");
    assert!(stressed_risk > 20.0, "vault-b estimated risk {stressed_risk}");

    let (status, body) = post_json(
        app,
        "/rebalance/plan",
        serde_json::json!({ "vaultId": "vault-c" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "insufficient_signals");
}

#[tokio::test]
async fn refresh_with_unreachable_gateway_is_503() {
    let mut config = Config::default();
    config.gateway.base_url = Some("http://127.0.0.1:9".to_string());
    config.gateway.retry_attempts = 1;
    config.gateway.timeout_ms = 500;
    let app = autopilot_server::build_router(AppState::new(config).unwrap());

    let (status, body) = post_json(app, "/signals/refresh/vault-1", serde_json::json!({})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "upstream_unavailable");
}
