//! HTTP client for the chain data gateway.
//!
//! The gateway exposes `GET /prices`, `GET /apr` and `GET /vaults/{id}`.
//! Every call is bounded by the client timeout and retried with exponential
//! backoff; a call that still fails becomes `UpstreamUnavailable`.

use crate::retry::retry_async;
use autopilot_core::config::GatewayConfig;
use autopilot_core::signals::{SignalSnapshot, VaultSnapshot};
use autopilot_core::types::Strategy;
use autopilot_core::{AutopilotError, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ChainGateway {
    client: Client,
    base_url: String,
    attempts: usize,
    initial_delay: Duration,
}

impl ChainGateway {
    pub fn new(base_url: &str, config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| AutopilotError::UpstreamUnavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            attempts: config.retry_attempts,
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
        })
    }

    /// `None` when no base URL is configured.
    pub fn from_config(config: &GatewayConfig) -> Result<Option<Self>> {
        config
            .base_url
            .as_deref()
            .map(|url| Self::new(url, config))
            .transpose()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Denom to quote price.
    pub async fn get_prices(&self) -> Result<BTreeMap<String, f64>> {
        self.get_json("/prices").await
    }

    /// APR per strategy. Unknown strategy names are skipped.
    pub async fn get_apr(&self) -> Result<BTreeMap<Strategy, Option<f64>>> {
        let raw: BTreeMap<String, Option<f64>> = self.get_json("/apr").await?;
        let mut apr = BTreeMap::new();
        for (name, rate) in raw {
            match name.parse::<Strategy>() {
                Ok(strategy) => {
                    apr.insert(strategy, rate);
                }
                Err(_) => tracing::warn!(strategy = %name, "gateway reported unknown strategy"),
            }
        }
        Ok(apr)
    }

    pub async fn get_vault_state(&self, vault_id: &str) -> Result<VaultSnapshot> {
        validate_vault_id(vault_id)?;
        let mut vault: VaultSnapshot = self.get_json(&format!("/vaults/{vault_id}")).await?;
        if vault.vault_id.is_empty() {
            vault.vault_id = vault_id.to_string();
        }
        Ok(vault)
    }

    /// Fetch prices, APR and vault state concurrently and fold them into one
    /// snapshot.
    pub async fn fetch_signals(&self, vault_id: &str, now: DateTime<Utc>) -> Result<SignalSnapshot> {
        let (prices, apr, vault) = tokio::try_join!(
            self.get_prices(),
            self.get_apr(),
            self.get_vault_state(vault_id)
        )?;
        Ok(SignalSnapshot::assemble(prices, apr, vault, now))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        retry_async(
            |_| {
                let request = self.client.get(&url);
                async move { request.send().await?.error_for_status()?.json::<T>().await }
            },
            self.attempts,
            self.initial_delay,
        )
        .await
        .map_err(|e: reqwest::Error| AutopilotError::UpstreamUnavailable(format!("GET {url}: {e}")))
    }
}

fn validate_vault_id(vault_id: &str) -> Result<()> {
    let ok = !vault_id.is_empty()
        && vault_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(AutopilotError::invalid(format!("invalid vault id '{vault_id}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> GatewayConfig {
        GatewayConfig {
            base_url: None,
            timeout_ms: 2_000,
            retry_attempts: 2,
            retry_initial_delay_ms: 1,
        }
    }

    #[test]
    fn from_config_without_url_is_none() {
        assert!(ChainGateway::from_config(&GatewayConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let gw = ChainGateway::new("http://gateway.local/", &fast_config()).unwrap();
        assert_eq!(gw.base_url(), "http://gateway.local");
    }

    #[tokio::test]
    async fn fetch_signals_assembles_snapshot() {
        let mut server = mockito::Server::new_async().await;
        let _prices = server
            .mock("GET", "/prices")
            .with_header("content-type", "application/json")
            .with_body(r#"{"usei":0.42,"uusdc":1.0}"#)
            .create_async()
            .await;
        let _apr = server
            .mock("GET", "/apr")
            .with_header("content-type", "application/json")
            .with_body(r#"{"Staking":0.12,"Lending":null,"LP":0.15,"Options":0.3}"#)
            .create_async()
            .await;
        let _vault = server
            .mock("GET", "/vaults/vault-1")
            .with_header("content-type", "application/json")
            .with_body(r#"{"vaultId":"vault-1","risk":35,"riskTolerance":60}"#)
            .create_async()
            .await;

        let gw = ChainGateway::new(&server.url(), &fast_config()).unwrap();
        let snapshot = gw.fetch_signals("vault-1", Utc::now()).await.unwrap();

        assert_eq!(snapshot.prices["usei"], 0.42);
        assert_eq!(snapshot.apr.len(), 3);
        assert_eq!(snapshot.apr[&Strategy::Lending], None);
        let signals = snapshot.signals_for("vault-1").unwrap();
        assert_eq!(signals.risk, 35.0);
        assert_eq!(snapshot.vault("vault-1").unwrap().risk_tolerance, Some(60));
    }

    #[tokio::test]
    async fn server_error_is_retried_then_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let prices = server
            .mock("GET", "/prices")
            .with_status(500)
            .expect(2)
            .create_async()
            .await;

        let gw = ChainGateway::new(&server.url(), &fast_config()).unwrap();
        let err = gw.get_prices().await.unwrap_err();

        assert!(matches!(err, AutopilotError::UpstreamUnavailable(_)));
        prices.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_body_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _apr = server
            .mock("GET", "/apr")
            .with_body("not json")
            .create_async()
            .await;

        let gw = ChainGateway::new(&server.url(), &fast_config()).unwrap();
        let err = gw.get_apr().await.unwrap_err();
        assert_eq!(err.kind(), "upstream_unavailable");
    }

    #[tokio::test]
    async fn vault_id_fills_in_when_omitted() {
        let mut server = mockito::Server::new_async().await;
        let _vault = server
            .mock("GET", "/vaults/vault-9")
            .with_body(r#"{"risk":80}"#)
            .create_async()
            .await;

        let gw = ChainGateway::new(&server.url(), &fast_config()).unwrap();
        let vault = gw.get_vault_state("vault-9").await.unwrap();
        assert_eq!(vault.vault_id, "vault-9");
        assert_eq!(vault.risk, 80.0);
    }

    #[tokio::test]
    async fn path_like_vault_id_is_rejected() {
        let gw = ChainGateway::new("http://127.0.0.1:1", &fast_config()).unwrap();
        let err = gw.get_vault_state("../admin").await.unwrap_err();
        assert!(matches!(err, AutopilotError::InvalidInput(_)));
    }
}
