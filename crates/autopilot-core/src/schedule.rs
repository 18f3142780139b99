use crate::config::{GasTable, ScheduleConfig};
use crate::error::{AutopilotError, Result};
use crate::risk::{Recommendation, RiskBand, RiskScore, RiskScorer};
use crate::types::{ActionKind, ActionRequest, Urgency};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// GasEstimator
// ---------------------------------------------------------------------------

/// Gas cost of an action kind. Live estimation belongs to the chain gateway;
/// the planner only needs a number per kind, so tests and offline callers can
/// pass a table or a closure.
pub trait GasEstimator: Send + Sync {
    fn estimate(&self, kind: ActionKind) -> u64;
}

impl GasEstimator for GasTable {
    fn estimate(&self, kind: ActionKind) -> u64 {
        self.cost_of(kind)
    }
}

impl<F> GasEstimator for F
where
    F: Fn(ActionKind) -> u64 + Send + Sync,
{
    fn estimate(&self, kind: ActionKind) -> u64 {
        self(kind)
    }
}

// ---------------------------------------------------------------------------
// SchedulePlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    RiskTooHigh,
    /// Risk is below the deny cut-off but needs a human sign-off.
    EscalationRequired,
    GasCeilingExceeded,
}

impl IneligibleReason {
    pub fn as_str(self) -> &'static str {
        match self {
            IneligibleReason::RiskTooHigh => "risk_too_high",
            IneligibleReason::EscalationRequired => "escalation_required",
            IneligibleReason::GasCeilingExceeded => "gas_ceiling_exceeded",
        }
    }
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePlan {
    pub request_id: String,
    pub action: ActionKind,
    pub eligible: bool,
    /// Set only for eligible plans; never earlier than `evaluated_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earliest_execution: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<IneligibleReason>,
    pub gas_estimate: u64,
    pub gas_ceiling: u64,
    pub urgency: Urgency,
    pub risk: RiskScore,
    pub evaluated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SchedulePlanner
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SchedulePlanner {
    config: ScheduleConfig,
    scorer: RiskScorer,
    gas: Arc<dyn GasEstimator>,
}

impl SchedulePlanner {
    pub fn new(config: ScheduleConfig, scorer: RiskScorer) -> Self {
        let gas = Arc::new(config.gas.clone());
        Self { config, scorer, gas }
    }

    /// Replace the config gas table, e.g. with a closure over live estimates
    /// the caller fetched beforehand.
    pub fn with_gas_estimator(mut self, estimator: impl GasEstimator + 'static) -> Self {
        self.gas = Arc::new(estimator);
        self
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    pub fn plan(
        &self,
        request: &ActionRequest,
        urgency: Urgency,
        gas_ceiling: u64,
        now: DateTime<Utc>,
    ) -> Result<SchedulePlan> {
        self.plan_with_cadence(request, urgency, gas_ceiling, now, None)
    }

    /// Like [`plan`](Self::plan) with a caller-supplied batch cadence for
    /// `low` urgency.
    pub fn plan_with_cadence(
        &self,
        request: &ActionRequest,
        urgency: Urgency,
        gas_ceiling: u64,
        now: DateTime<Utc>,
        cadence_secs: Option<u64>,
    ) -> Result<SchedulePlan> {
        let cadence_secs = cadence_secs.unwrap_or(self.config.batch_cadence_secs);
        if cadence_secs == 0 {
            return Err(AutopilotError::invalid("batch cadence must be positive"));
        }

        let risk = self.scorer.score(request)?;
        let gas_estimate = self.gas.estimate(request.action);

        let reason = if risk.band == RiskBand::Critical
            || risk.recommendation == Recommendation::Deny
        {
            Some(IneligibleReason::RiskTooHigh)
        } else if risk.recommendation == Recommendation::Escalate {
            Some(IneligibleReason::EscalationRequired)
        } else if gas_estimate > gas_ceiling {
            Some(IneligibleReason::GasCeilingExceeded)
        } else {
            None
        };

        let earliest_execution = match reason {
            Some(_) => None,
            None => {
                let at = self.earliest_execution(urgency, now, cadence_secs);
                if risk.recommendation == Recommendation::Hold {
                    Some(at.max(self.hold_until(now)))
                } else {
                    Some(at)
                }
            }
        };

        Ok(SchedulePlan {
            request_id: request.id.clone(),
            action: request.action,
            eligible: reason.is_none(),
            earliest_execution,
            reason,
            gas_estimate,
            gas_ceiling,
            urgency,
            risk,
            evaluated_at: now,
        })
    }

    pub fn plan_batch(
        &self,
        items: &[(ActionRequest, Urgency, u64)],
        now: DateTime<Utc>,
    ) -> Vec<Result<SchedulePlan>> {
        items
            .iter()
            .map(|(request, urgency, ceiling)| self.plan(request, *urgency, *ceiling, now))
            .collect()
    }

    fn earliest_execution(
        &self,
        urgency: Urgency,
        now: DateTime<Utc>,
        cadence_secs: u64,
    ) -> DateTime<Utc> {
        match urgency {
            Urgency::High => now,
            Urgency::Normal => {
                now + Duration::milliseconds(self.config.block_interval_ms.min(i64::MAX as u64) as i64)
            }
            Urgency::Low => next_batch_window(now, cadence_secs),
        }
    }

    fn hold_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs = self.config.risk_hold_secs.max(1).min(i64::MAX as u64 / 1000) as i64;
        now.checked_add_signed(Duration::seconds(secs)).unwrap_or(now)
    }
}

/// The first batch boundary at or after `now`. Boundaries are multiples of
/// the cadence since the unix epoch.
pub fn next_batch_window(now: DateTime<Utc>, cadence_secs: u64) -> DateTime<Utc> {
    let cadence_ms = (cadence_secs.max(1).saturating_mul(1000)).min(i64::MAX as u64) as i64;
    let ts = now.timestamp_millis();
    let floor_ms = ts - ts.rem_euclid(cadence_ms);
    let Some(floor) = DateTime::from_timestamp_millis(floor_ms) else {
        return now;
    };
    if floor == now {
        return now;
    }
    DateTime::from_timestamp_millis(floor_ms.saturating_add(cadence_ms))
        .filter(|t| *t >= now)
        .unwrap_or(now)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
