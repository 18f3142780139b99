use crate::config::{RecommendationThresholds, RiskConfig, VelocityThresholds};
use crate::error::{AutopilotError, Result};
use crate::types::ActionRequest;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// RiskBand
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskBand {
    pub fn from_value(value: f64) -> RiskBand {
        if value >= 80.0 {
            RiskBand::Critical
        } else if value >= 50.0 {
            RiskBand::High
        } else if value >= 25.0 {
            RiskBand::Medium
        } else {
            RiskBand::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
            RiskBand::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

/// What the caller should do with the action, derived from the score alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Allow,
    /// Delay execution and let the actor's counters cool down.
    Hold,
    /// Needs a human decision before it can run.
    Escalate,
    Deny,
}

impl Recommendation {
    pub fn from_value(value: f64, t: &RecommendationThresholds) -> Recommendation {
        if value >= t.deny {
            Recommendation::Deny
        } else if value >= t.escalate {
            Recommendation::Escalate
        } else if value >= t.hold {
            Recommendation::Hold
        } else {
            Recommendation::Allow
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Allow => "allow",
            Recommendation::Hold => "hold",
            Recommendation::Escalate => "escalate",
            Recommendation::Deny => "deny",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RiskFactor / RiskScore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    /// "amount", "velocity" or "novelty".
    pub name: String,
    /// Sub-score from 0 to 100.
    pub score: f64,
    pub weight: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Score from 0 to 100, higher is riskier.
    pub value: f64,
    pub band: RiskBand,
    pub recommendation: Recommendation,
    pub factors: Vec<RiskFactor>,
}

// ---------------------------------------------------------------------------
// RiskScorer
// ---------------------------------------------------------------------------

/// Scores a proposed action from its amount, the actor's velocity counters and
/// counterparty novelty. Holds only configuration, so one scorer can serve any
/// number of concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    config: RiskConfig,
}

impl RiskScorer {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn score(&self, request: &ActionRequest) -> Result<RiskScore> {
        validate_amount(request)?;

        let w = &self.config.weights;
        let (amount, amount_reason) = self.amount_subscore(request);
        let (velocity, velocity_reason) = self.velocity_subscore(request);
        let (novelty, novelty_reason) = if request.context.first_time_counterparty {
            (100.0, "new-counterparty")
        } else {
            (0.0, "known-counterparty")
        };

        let raw = w.amount * amount + w.velocity * velocity + w.novelty * novelty;
        // An undefined combination (e.g. infinite weight times a zero
        // sub-score) is scored as the worst case.
        let raw = if raw.is_nan() { 100.0 } else { raw };
        let value = round2(raw.clamp(0.0, 100.0));

        Ok(RiskScore {
            value,
            band: RiskBand::from_value(value),
            recommendation: Recommendation::from_value(value, &self.config.recommendation),
            factors: vec![
                RiskFactor {
                    name: "amount".to_string(),
                    score: round2(amount),
                    weight: w.amount,
                    reason: amount_reason.to_string(),
                },
                RiskFactor {
                    name: "velocity".to_string(),
                    score: round2(velocity),
                    weight: w.velocity,
                    reason: velocity_reason.to_string(),
                },
                RiskFactor {
                    name: "novelty".to_string(),
                    score: novelty,
                    weight: w.novelty,
                    reason: novelty_reason.to_string(),
                },
            ],
        })
    }

    /// Score every request independently; one failure does not affect the others.
    pub fn score_batch(&self, requests: &[ActionRequest]) -> Vec<Result<RiskScore>> {
        requests.iter().map(|r| self.score(r)).collect()
    }

    // -----------------------------------------------------------------------
    // Sub-scores
    // -----------------------------------------------------------------------

    fn amount_subscore(&self, request: &ActionRequest) -> (f64, &'static str) {
        let Some(coin) = &request.amount else {
            return (0.0, "no-amount");
        };
        let median = match request.context.median_amount {
            Some(m) if m > 0 => m as f64,
            _ => self.config.default_median_amount.max(1) as f64,
        };
        let ratio = coin.amount as f64 / median;
        if ratio <= 1.0 {
            return (0.0, "normal-amount");
        }
        let ceiling = self.config.amount_ratio_ceiling.max(1.0 + f64::EPSILON);
        let score = (100.0 * ratio.log10() / ceiling.log10()).clamp(0.0, 100.0);
        let reason = if score >= 100.0 {
            "extreme-amount"
        } else if score >= 50.0 {
            "very-high-amount"
        } else {
            "high-amount"
        };
        (score, reason)
    }

    fn velocity_subscore(&self, request: &ActionRequest) -> (f64, &'static str) {
        let cap = self.config.counter_cap;
        let per_hour = clamp_counter(request.context.tx_per_hour, cap);
        let per_day = clamp_counter(request.context.tx_per_day, cap);
        let hourly = threshold_score(per_hour, &self.config.tx_per_hour);
        let daily = threshold_score(per_day, &self.config.tx_per_day);

        let reason = if per_hour >= self.config.tx_per_hour.burst {
            "tx-burst"
        } else if per_hour > self.config.tx_per_hour.elevated {
            "high-velocity"
        } else if per_day >= self.config.tx_per_day.burst {
            "daily-limit-exceeded"
        } else if per_day > self.config.tx_per_day.elevated {
            "active-user"
        } else {
            "low-velocity"
        };
        (hourly.max(daily), reason)
    }
}

fn validate_amount(request: &ActionRequest) -> Result<()> {
    if let Some(coin) = &request.amount {
        if coin.denom.trim().is_empty() {
            return Err(AutopilotError::invalid("amount denom must not be empty"));
        }
        if coin.amount <= 0 {
            return Err(AutopilotError::invalid(format!(
                "amount must be positive, got {}",
                coin.amount
            )));
        }
    }
    Ok(())
}

/// Out-of-range counters are clamped, never rejected.
fn clamp_counter(value: f64, cap: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, cap.max(0.0))
}

/// Linear 0..50 below `elevated`, 50..100 between `elevated` and `burst`.
fn threshold_score(count: f64, t: &VelocityThresholds) -> f64 {
    if t.elevated <= 0.0 {
        return if count > 0.0 { 100.0 } else { 0.0 };
    }
    if count <= t.elevated {
        return 50.0 * count / t.elevated;
    }
    let span = t.burst - t.elevated;
    if span <= 0.0 {
        return 100.0;
    }
    (50.0 + 50.0 * (count - t.elevated) / span).min(100.0)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
