use crate::rebalance::MarketSignals;
use crate::types::Strategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Vault state as reported by the chain data gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSnapshot {
    #[serde(default)]
    pub vault_id: String,
    /// Market risk indicator for the vault's venue, 0-100.
    #[serde(default)]
    pub risk: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_tolerance: Option<u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volatility: BTreeMap<Strategy, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub observations: BTreeMap<Strategy, u32>,
    /// Basis points currently held per strategy.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub current_allocation: BTreeMap<Strategy, u32>,
}

/// Market-wide prices and APRs plus the last known state of every vault
/// refreshed so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSnapshot {
    #[serde(default)]
    pub prices: BTreeMap<String, f64>,
    #[serde(default)]
    pub apr: BTreeMap<Strategy, Option<f64>>,
    #[serde(default)]
    pub vaults: BTreeMap<String, VaultSnapshot>,
    pub fetched_at: DateTime<Utc>,
}

impl SignalSnapshot {
    /// One gateway round trip: market data plus the vault it was fetched for.
    pub fn assemble(
        prices: BTreeMap<String, f64>,
        apr: BTreeMap<Strategy, Option<f64>>,
        vault: VaultSnapshot,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let mut vaults = BTreeMap::new();
        vaults.insert(vault.vault_id.clone(), vault);
        Self {
            prices,
            apr,
            vaults,
            fetched_at,
        }
    }

    pub fn vault(&self, vault_id: &str) -> Option<&VaultSnapshot> {
        self.vaults.get(vault_id)
    }

    /// Market signals as seen by `vault_id`: shared prices and APRs with that
    /// vault's own risk, volatility and observation counts. `None` until the
    /// vault has been refreshed at least once.
    pub fn signals_for(&self, vault_id: &str) -> Option<MarketSignals> {
        let vault = self.vault(vault_id)?;
        Some(MarketSignals {
            prices: self.prices.clone(),
            apr: self.apr.clone(),
            risk: vault.risk,
            volatility: vault.volatility.clone(),
            observations: vault.observations.clone(),
        })
    }
}

/// Copy-on-read holder for the latest signal snapshot.
///
/// Readers clone the `Arc` and keep working on the snapshot they took; a
/// refresh swaps the pointer under a short write lock and never mutates a
/// snapshot in place.
#[derive(Debug, Default)]
pub struct SignalCache {
    current: RwLock<Option<Arc<SignalSnapshot>>>,
}

impl SignalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Arc<SignalSnapshot>> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        guard.clone()
    }

    pub fn replace(&self, snapshot: SignalSnapshot) -> Arc<SignalSnapshot> {
        let next = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::clone(&next));
        next
    }

    /// Replace the snapshot with `fresh`. Market data always comes from
    /// `fresh`; vault entries it does not cover are kept from the previous
    /// snapshot.
    pub fn merge(&self, fresh: SignalSnapshot) -> Arc<SignalSnapshot> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = fresh;
        if let Some(prev) = guard.as_ref() {
            for (id, vault) in &prev.vaults {
                next.vaults
                    .entry(id.clone())
                    .or_insert_with(|| vault.clone());
            }
        }
        let next = Arc::new(next);
        *guard = Some(Arc::clone(&next));
        next
    }
}
