//! Combines the planner and rebalancer into one decision per request.
//!
//! The orchestrator never executes anything. An `execute` outcome is handed to
//! an [`ExecutionCollaborator`] via [`dispatch`], which signs and submits the
//! transaction outside this crate.

use crate::error::{AutopilotError, Result};
use crate::rebalance::{AllocationPlan, Constraints, MarketSignals, Model, Rebalancer};
use crate::risk::Recommendation;
use crate::schedule::{SchedulePlan, SchedulePlanner};
use crate::types::{ActionKind, ActionRequest, Strategy, Urgency};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

pub const INSUFFICIENT_SIGNALS: &str = "insufficient_signals";
pub const RISK_HOLD: &str = "risk_hold";
pub const NO_SIGNIFICANT_CHANGE: &str = "no_significant_change";

// ---------------------------------------------------------------------------
// VaultContext
// ---------------------------------------------------------------------------

/// What the rebalancer needs to know about the vault a rebalance targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultContext {
    pub vault_id: String,
    pub signals: MarketSignals,
    pub risk_tolerance: u8,
    /// Falls back to `rebalance.default_model`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Model>,
    #[serde(default)]
    pub constraints: Constraints,
    /// Basis points the vault holds today. Empty when unknown, in which case
    /// any valid plan is worth executing.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub current_allocation: BTreeMap<Strategy, u32>,
}

// ---------------------------------------------------------------------------
// CombinedPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Eligible; ready for the execution collaborator.
    Execute,
    /// Eligible but not now: held for risk, or nothing worth doing yet.
    Deferred,
    Ineligible,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Execute => "execute",
            Outcome::Deferred => "deferred",
            Outcome::Ineligible => "ineligible",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedPlan {
    pub request_id: String,
    pub action: ActionKind,
    pub target_id: String,
    pub outcome: Outcome,
    /// Why the outcome is not `execute`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub schedule: SchedulePlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation: Option<AllocationPlan>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Orchestrator {
    planner: SchedulePlanner,
    rebalancer: Rebalancer,
}

impl Orchestrator {
    pub fn new(planner: SchedulePlanner, rebalancer: Rebalancer) -> Self {
        Self {
            planner,
            rebalancer,
        }
    }

    pub fn planner(&self) -> &SchedulePlanner {
        &self.planner
    }

    pub fn rebalancer(&self) -> &Rebalancer {
        &self.rebalancer
    }

    pub fn decide(
        &self,
        request: &ActionRequest,
        urgency: Urgency,
        gas_ceiling: u64,
        vault: Option<&VaultContext>,
        now: DateTime<Utc>,
    ) -> Result<CombinedPlan> {
        let vault = if request.action == ActionKind::Rebalance {
            Some(require_vault(request, vault)?)
        } else {
            None
        };

        let schedule = self.planner.plan(request, urgency, gas_ceiling, now)?;
        let mut plan = CombinedPlan {
            request_id: request.id.clone(),
            action: request.action,
            target_id: request.target_id.clone(),
            outcome: Outcome::Execute,
            reason: None,
            schedule,
            allocation: None,
        };

        if let Some(reason) = plan.schedule.reason {
            debug!(request = %request.id, %reason, "request ineligible");
            plan.outcome = Outcome::Ineligible;
            plan.reason = Some(reason.to_string());
            return Ok(plan);
        }

        if plan.schedule.risk.recommendation == Recommendation::Hold {
            debug!(
                request = %request.id,
                risk = plan.schedule.risk.value,
                "request held for risk"
            );
            plan.outcome = Outcome::Deferred;
            plan.reason = Some(RISK_HOLD.to_string());
            return Ok(plan);
        }

        let Some(vault) = vault else {
            debug!(request = %request.id, action = %request.action, "request ready");
            return Ok(plan);
        };

        let model = vault.model.unwrap_or(self.rebalancer.config().default_model);
        match self.rebalancer.rebalance_with(
            &vault.vault_id,
            &vault.signals,
            vault.risk_tolerance,
            model,
            &vault.constraints,
        ) {
            Ok(mut allocation) => {
                allocation.request_id = Some(request.id.clone());
                let min_change = self.rebalancer.config().min_change_bps;
                if !vault.current_allocation.is_empty()
                    && allocation.max_shift_bps(&vault.current_allocation) <= min_change
                {
                    debug!(request = %request.id, vault = %vault.vault_id, "allocation unchanged");
                    plan.outcome = Outcome::Deferred;
                    plan.reason = Some(NO_SIGNIFICANT_CHANGE.to_string());
                } else {
                    debug!(
                        request = %request.id,
                        vault = %vault.vault_id,
                        %model,
                        legs = allocation.legs.len(),
                        "rebalance ready"
                    );
                }
                plan.allocation = Some(allocation);
            }
            Err(AutopilotError::InsufficientSignals { valid }) => {
                debug!(request = %request.id, valid, "rebalance deferred");
                plan.outcome = Outcome::Deferred;
                plan.reason = Some(INSUFFICIENT_SIGNALS.to_string());
            }
            Err(e) => return Err(e),
        }
        Ok(plan)
    }
}

fn require_vault<'a>(
    request: &ActionRequest,
    vault: Option<&'a VaultContext>,
) -> Result<&'a VaultContext> {
    let vault = vault.ok_or_else(|| {
        AutopilotError::invalid(format!(
            "rebalance of '{}' requires vault context",
            request.target_id
        ))
    })?;
    if vault.vault_id != request.target_id {
        return Err(AutopilotError::invalid(format!(
            "vault context '{}' does not match target '{}'",
            vault.vault_id, request.target_id
        )));
    }
    Ok(vault)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Signs and submits an executable plan. Implemented outside the engine.
pub trait ExecutionCollaborator: Send + Sync {
    /// Returns the transaction hash.
    fn execute(&self, plan: &CombinedPlan) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Dispatch {
    Submitted { tx_hash: String },
    Skipped { reason: String },
}

/// Forward `plan` to `collaborator` when its outcome is `execute`.
pub fn dispatch(plan: &CombinedPlan, collaborator: &dyn ExecutionCollaborator) -> Result<Dispatch> {
    if plan.outcome != Outcome::Execute {
        let reason = plan
            .reason
            .clone()
            .unwrap_or_else(|| plan.outcome.to_string());
        return Ok(Dispatch::Skipped { reason });
    }
    let tx_hash = collaborator.execute(plan)?;
    debug!(request = %plan.request_id, %tx_hash, "plan submitted");
    Ok(Dispatch::Submitted { tx_hash })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
