//! Target allocation across yield strategies for a vault.
//!
//! The decision model is a closed set of variants ([`Model`]) dispatched by
//! `match`. Each variant turns the valid arms of a [`MarketSignals`] snapshot
//! into raw weights; everything after that (allocation cap, normalization,
//! basis-point legs, plan metrics) is shared.

mod bandit;
mod markowitz;
mod rl;

use crate::config::RebalanceConfig;
use crate::error::{AutopilotError, Result};
use crate::types::Strategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tolerance on the weight sum.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Basis points in a fully allocated vault.
pub const TOTAL_BPS: u32 = 10_000;

/// Weight given to each strategy added to meet the diversification minimum.
pub const DIVERSIFICATION_WEIGHT: f64 = 0.01;

/// Weights below one basis point do not count as a held strategy.
const HELD_WEIGHT: f64 = 1e-4;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model {
    Bandit,
    #[default]
    Rl,
    Markowitz,
}

impl Model {
    pub fn all() -> &'static [Model] {
        &[Model::Bandit, Model::Rl, Model::Markowitz]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Model::Bandit => "bandit",
            Model::Rl => "rl",
            Model::Markowitz => "markowitz",
        }
    }

    /// Raw weights for the valid arms of `signals`, summing to 1.
    ///
    /// Fails with `InsufficientSignals` when fewer than two strategies carry a
    /// usable APR. Strategies without one never appear in the result.
    pub fn evaluate(
        self,
        signals: &MarketSignals,
        risk_tolerance: u8,
        config: &RebalanceConfig,
    ) -> Result<BTreeMap<Strategy, f64>> {
        let arms = signals.valid_arms();
        if arms.len() < 2 {
            return Err(AutopilotError::InsufficientSignals { valid: arms.len() });
        }
        let tolerance = f64::from(risk_tolerance.min(100));
        let raw = match self {
            Model::Bandit => bandit::evaluate(&arms, signals, tolerance, &config.bandit),
            Model::Rl => rl::evaluate(&arms, signals, tolerance, &config.rl),
            Model::Markowitz => markowitz::evaluate(&arms, signals, &config.markowitz),
        };
        let weights = normalize(raw);
        Ok(arms.iter().map(|a| a.strategy).zip(weights).collect())
    }

    fn confidence_adjustment(self) -> f64 {
        match self {
            Model::Bandit => -10.0,
            Model::Rl => 5.0,
            Model::Markowitz => 0.0,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Model {
    type Err = AutopilotError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "bandit" => Ok(Model::Bandit),
            "rl" => Ok(Model::Rl),
            "markowitz" => Ok(Model::Markowitz),
            _ => Err(AutopilotError::invalid(format!(
                "unknown model '{s}': expected bandit, rl or markowitz"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// MarketSignals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSignals {
    /// Denom to quote price.
    #[serde(default)]
    pub prices: BTreeMap<String, f64>,
    /// Annualized rate per strategy; `null` marks a strategy with no data.
    #[serde(default)]
    pub apr: BTreeMap<Strategy, Option<f64>>,
    /// Aggregate market risk indicator, 0-100.
    #[serde(default)]
    pub risk: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volatility: BTreeMap<Strategy, f64>,
    /// How many times each strategy's APR has been observed; drives the
    /// bandit's exploration bonus.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub observations: BTreeMap<Strategy, u32>,
}

/// A strategy whose APR is usable for allocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Arm {
    pub strategy: Strategy,
    pub apr: f64,
}

impl MarketSignals {
    pub fn with_apr(mut self, strategy: Strategy, apr: f64) -> Self {
        self.apr.insert(strategy, Some(apr));
        self
    }

    /// Strategies with a present, finite, non-negative APR, in strategy order.
    pub(crate) fn valid_arms(&self) -> Vec<Arm> {
        self.apr
            .iter()
            .filter_map(|(&strategy, apr)| match apr {
                Some(v) if v.is_finite() && *v >= 0.0 => Some(Arm { strategy, apr: *v }),
                _ => None,
            })
            .collect()
    }

    pub fn valid_strategy_count(&self) -> usize {
        self.valid_arms().len()
    }

    /// Market risk clamped to 0-100; a missing or NaN indicator counts as neutral.
    pub fn market_risk(&self) -> f64 {
        if self.risk.is_nan() {
            return 50.0;
        }
        self.risk.clamp(0.0, 100.0)
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    /// Largest weight any single strategy may hold, as a fraction of 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_single_allocation: Option<f64>,
    /// Fewest strategies the plan must hold. Falls back to
    /// `rebalance.min_diversification`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_diversification: Option<usize>,
}

// ---------------------------------------------------------------------------
// AllocationPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub strategy: Strategy,
    pub target_bps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPlan {
    pub vault_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub model: Model,
    pub risk_tolerance: u8,
    pub weights: BTreeMap<Strategy, f64>,
    pub legs: Vec<Leg>,
    /// Weighted APR of the allocation.
    pub expected_return: f64,
    /// 0-100.
    pub estimated_risk: f64,
    /// 0-100.
    pub confidence: u8,
}

impl AllocationPlan {
    pub fn weight_of(&self, strategy: Strategy) -> f64 {
        self.weights.get(&strategy).copied().unwrap_or(0.0)
    }

    pub fn target_bps(&self, strategy: Strategy) -> u32 {
        self.legs
            .iter()
            .find(|l| l.strategy == strategy)
            .map_or(0, |l| l.target_bps)
    }

    /// Largest per-strategy move, in basis points, from `current` to this
    /// plan. Strategies missing on either side count as zero.
    pub fn max_shift_bps(&self, current: &BTreeMap<Strategy, u32>) -> u32 {
        self.legs
            .iter()
            .map(|l| l.strategy)
            .chain(current.keys().copied())
            .map(|s| {
                let from = current.get(&s).copied().unwrap_or(0);
                self.target_bps(s).abs_diff(from)
            })
            .max()
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Rebalancer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Rebalancer {
    config: RebalanceConfig,
}

impl Rebalancer {
    pub fn new(config: RebalanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RebalanceConfig {
        &self.config
    }

    pub fn rebalance(
        &self,
        vault_id: &str,
        signals: &MarketSignals,
        risk_tolerance: u8,
        model: Model,
    ) -> Result<AllocationPlan> {
        self.rebalance_with(vault_id, signals, risk_tolerance, model, &Constraints::default())
    }

    pub fn rebalance_with(
        &self,
        vault_id: &str,
        signals: &MarketSignals,
        risk_tolerance: u8,
        model: Model,
        constraints: &Constraints,
    ) -> Result<AllocationPlan> {
        if vault_id.trim().is_empty() {
            return Err(AutopilotError::invalid("vault id must not be empty"));
        }
        if risk_tolerance > 100 {
            return Err(AutopilotError::invalid(format!(
                "risk tolerance must be 0-100, got {risk_tolerance}"
            )));
        }
        let cap = constraints
            .max_single_allocation
            .unwrap_or(self.config.max_single_allocation);
        if !(cap > 0.0 && cap <= 1.0) {
            return Err(AutopilotError::invalid(format!(
                "max single allocation must be in (0, 1], got {cap}"
            )));
        }

        let min_diversification = constraints
            .min_diversification
            .unwrap_or(self.config.min_diversification);

        let evaluated = model.evaluate(signals, risk_tolerance, &self.config)?;
        let strategies: Vec<Strategy> = evaluated.keys().copied().collect();
        let mut weights: Vec<f64> = evaluated.values().copied().collect();
        let clipped = apply_cap(&mut weights, cap);
        let weights = normalize(weights);

        let aprs: BTreeMap<Strategy, f64> = signals
            .valid_arms()
            .into_iter()
            .map(|a| (a.strategy, a.apr))
            .collect();
        let weights = diversify(&strategies, weights, &aprs, min_diversification);
        assert_normalized(&weights);
        let expected_return: f64 = strategies
            .iter()
            .zip(&weights)
            .map(|(s, w)| w * aprs[s])
            .sum();
        let risk_multiplier = 0.5 + signals.market_risk() / 200.0;
        let estimated_risk: f64 = strategies
            .iter()
            .zip(&weights)
            .map(|(s, w)| w * self.config.base_risk(*s) * risk_multiplier)
            .sum::<f64>()
            .clamp(0.0, 100.0);

        let legs = to_legs(&strategies, &weights);
        Ok(AllocationPlan {
            vault_id: vault_id.to_string(),
            request_id: None,
            model,
            risk_tolerance,
            weights: strategies.into_iter().zip(weights).collect(),
            legs,
            expected_return,
            estimated_risk,
            confidence: confidence(&aprs, model, clipped),
        })
    }

    /// Run every model on the same snapshot.
    pub fn compare(
        &self,
        vault_id: &str,
        signals: &MarketSignals,
        risk_tolerance: u8,
        constraints: &Constraints,
    ) -> Result<Vec<AllocationPlan>> {
        Model::all()
            .iter()
            .map(|&m| self.rebalance_with(vault_id, signals, risk_tolerance, m, constraints))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Shared weight arithmetic
// ---------------------------------------------------------------------------

/// Scale non-negative scores to sum to 1; degenerate input becomes equal weights.
pub(crate) fn normalize(mut weights: Vec<f64>) -> Vec<f64> {
    for w in weights.iter_mut() {
        if !w.is_finite() || *w < 0.0 {
            *w = 0.0;
        }
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        let n = weights.len().max(1) as f64;
        return vec![1.0 / n; weights.len()];
    }
    weights.into_iter().map(|w| w / sum).collect()
}

/// Water-fill: clip every weight to `cap` and hand the excess to the arms still
/// below it. A cap too small to reach a full allocation is raised to `1/n`.
/// Returns whether any weight was clipped.
fn apply_cap(weights: &mut [f64], cap: f64) -> bool {
    let n = weights.len();
    if n == 0 {
        return false;
    }
    let cap = cap.max(1.0 / n as f64);
    let clipped = weights.iter().any(|w| *w > cap + 1e-12);
    for _ in 0..=n {
        let mut excess = 0.0;
        for w in weights.iter_mut() {
            if *w > cap {
                excess += *w - cap;
                *w = cap;
            }
        }
        if excess <= f64::EPSILON {
            return clipped;
        }
        let free: Vec<usize> = (0..n).filter(|&i| weights[i] < cap - 1e-12).collect();
        if free.is_empty() {
            return clipped;
        }
        let free_sum: f64 = free.iter().map(|&i| weights[i]).sum();
        for &i in &free {
            let share = if free_sum > 0.0 {
                weights[i] / free_sum
            } else {
                1.0 / free.len() as f64
            };
            weights[i] += excess * share;
        }
    }
    clipped
}

/// Give unheld yielding strategies, best APR first, a
/// [`DIVERSIFICATION_WEIGHT`] each until `min` strategies are held, scaling
/// the rest down to make room. Stops early when no yielding strategy is left.
fn diversify(
    strategies: &[Strategy],
    mut weights: Vec<f64>,
    aprs: &BTreeMap<Strategy, f64>,
    min: usize,
) -> Vec<f64> {
    let held = weights.iter().filter(|w| **w >= HELD_WEIGHT).count();
    if held >= min {
        return weights;
    }
    let mut candidates: Vec<usize> = (0..strategies.len())
        .filter(|&i| weights[i] < HELD_WEIGHT)
        .filter(|&i| aprs.get(&strategies[i]).is_some_and(|apr| *apr > 0.0))
        .collect();
    candidates.sort_by(|&a, &b| {
        let ra = aprs.get(&strategies[a]).copied().unwrap_or(0.0);
        let rb = aprs.get(&strategies[b]).copied().unwrap_or(0.0);
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(min - held);
    if candidates.is_empty() {
        return weights;
    }

    let added = DIVERSIFICATION_WEIGHT * candidates.len() as f64;
    let rest: f64 = (0..weights.len())
        .filter(|i| !candidates.contains(i))
        .map(|i| weights[i])
        .sum();
    if rest <= 0.0 {
        return weights;
    }
    let scale = (1.0 - added) / rest;
    for (i, w) in weights.iter_mut().enumerate() {
        *w = if candidates.contains(&i) {
            DIVERSIFICATION_WEIGHT
        } else {
            *w * scale
        };
    }
    weights
}

/// A weight vector that fails here is a bug in a model, not bad input.
fn assert_normalized(weights: &[f64]) {
    assert!(
        weights.iter().all(|w| w.is_finite() && *w >= 0.0),
        "allocation produced a negative or non-finite weight: {weights:?}"
    );
    let sum: f64 = weights.iter().sum();
    assert!(
        (sum - 1.0).abs() <= WEIGHT_EPSILON,
        "allocation weights sum to {sum}, expected 1"
    );
}

/// Largest-remainder rounding to basis points; always sums to `TOTAL_BPS`.
fn to_legs(strategies: &[Strategy], weights: &[f64]) -> Vec<Leg> {
    let exact: Vec<f64> = weights.iter().map(|w| w * f64::from(TOTAL_BPS)).collect();
    let mut bps: Vec<u32> = exact.iter().map(|e| e.floor() as u32).collect();
    let assigned: u32 = bps.iter().sum();
    let mut order: Vec<usize> = (0..exact.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });
    for &i in order.iter().take(TOTAL_BPS.saturating_sub(assigned) as usize) {
        bps[i] += 1;
    }
    strategies
        .iter()
        .zip(bps)
        .filter(|(_, b)| *b > 0)
        .map(|(&strategy, target_bps)| Leg {
            strategy,
            target_bps,
        })
        .collect()
}

/// Wider APR spread means the ranking is less likely to be noise. A plan the
/// cap had to clip loses 15 points, down to a floor of 20.
fn confidence(aprs: &BTreeMap<Strategy, f64>, model: Model, clipped: bool) -> u8 {
    let max = aprs.values().copied().fold(f64::MIN, f64::max);
    let min = aprs.values().copied().fold(f64::MAX, f64::min);
    let base = (50.0 + (max - min) * 100.0).min(90.0);
    let mut value = base + model.confidence_adjustment();
    if clipped {
        value = (value - 15.0).max(20.0);
    }
    value.clamp(0.0, 100.0).round() as u8
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn scenario_signals() -> MarketSignals {
        MarketSignals {
            prices: BTreeMap::from([
                ("SEI".to_string(), 0.45),
                ("USDC".to_string(), 1.0),
                ("ATOM".to_string(), 8.2),
            ]),
            risk: 35.0,
            ..MarketSignals::default()
        }
        .with_apr(Strategy::Staking, 0.12)
        .with_apr(Strategy::Lending, 0.08)
        .with_apr(Strategy::Lp, 0.15)
        .with_apr(Strategy::PerpsHedge, 0.18)
    }

    fn assert_invariants(plan: &AllocationPlan) {
        let sum: f64 = plan.weights.values().sum();
        assert!((sum - 1.0).abs() <= WEIGHT_EPSILON, "sum = {sum}");
        assert!(plan.weights.values().all(|w| *w >= 0.0));
        let bps: u32 = plan.legs.iter().map(|l| l.target_bps).sum();
        assert_eq!(bps, TOTAL_BPS);
    }

    #[test]
    fn bandit_scenario_favors_highest_apr() {
        let plan = Rebalancer::default()
            .rebalance("vault-1", &scenario_signals(), 35, Model::Bandit)
            .unwrap();
        assert_invariants(&plan);
        assert_eq!(plan.weights.len(), 4);
        assert!(plan.weight_of(Strategy::PerpsHedge) >= plan.weight_of(Strategy::Staking));
        assert_eq!(plan.model, Model::Bandit);
    }

    #[test]
    fn rl_and_bandit_both_normalized() {
        let rebalancer = Rebalancer::default();
        let signals = scenario_signals();
        let bandit = rebalancer.rebalance("v", &signals, 35, Model::Bandit).unwrap();
        let rl = rebalancer.rebalance("v", &signals, 35, Model::Rl).unwrap();
        assert_invariants(&bandit);
        assert_invariants(&rl);
    }

    #[test]
    fn every_model_normalized_across_tolerances() {
        let rebalancer = Rebalancer::default();
        let signals = scenario_signals();
        for &model in Model::all() {
            for tolerance in [0u8, 1, 25, 50, 75, 99, 100] {
                let plan = rebalancer.rebalance("v", &signals, tolerance, model).unwrap();
                assert_invariants(&plan);
            }
        }
    }

    #[test]
    fn single_valid_apr_is_insufficient() {
        let signals = MarketSignals::default()
            .with_apr(Strategy::Staking, 0.12);
        for &model in Model::all() {
            let err = Rebalancer::default()
                .rebalance("v", &signals, 50, model)
                .unwrap_err();
            assert!(matches!(err, AutopilotError::InsufficientSignals { valid: 1 }));
        }
    }

    #[test]
    fn null_and_negative_apr_are_excluded() {
        let mut signals = scenario_signals();
        signals.apr.insert(Strategy::Lp, None);
        signals.apr.insert(Strategy::Lending, Some(-0.02));
        let plan = Rebalancer::default()
            .rebalance("v", &signals, 50, Model::Bandit)
            .unwrap();
        assert_invariants(&plan);
        assert!(!plan.weights.contains_key(&Strategy::Lp));
        assert!(!plan.weights.contains_key(&Strategy::Lending));
        assert!(plan.legs.iter().all(|l| l.strategy != Strategy::Lp));
    }

    #[test]
    fn null_apr_deserializes_as_missing() {
        let json = r#"{"prices": {}, "apr": {"Staking": 0.1, "LP": null, "PerpsHedge": 0.2}, "risk": 10}"#;
        let signals: MarketSignals = serde_json::from_str(json).unwrap();
        assert_eq!(signals.valid_strategy_count(), 2);
    }

    #[test]
    fn cap_redistributes_excess() {
        let rebalancer = Rebalancer::default();
        let constraints = Constraints {
            max_single_allocation: Some(0.4),
            ..Constraints::default()
        };
        let plan = rebalancer
            .rebalance_with("v", &scenario_signals(), 100, Model::Rl, &constraints)
            .unwrap();
        assert_invariants(&plan);
        assert!(plan.weights.values().all(|w| *w <= 0.4 + WEIGHT_EPSILON));
    }

    #[test]
    fn clipped_plan_loses_confidence() {
        let rebalancer = Rebalancer::default();
        let free = rebalancer
            .rebalance("v", &scenario_signals(), 100, Model::Rl)
            .unwrap();
        // spread 0.10 gives 60, plus 5 for rl
        assert_eq!(free.confidence, 65);

        let capped = Constraints {
            max_single_allocation: Some(0.4),
            ..Constraints::default()
        };
        let plan = rebalancer
            .rebalance_with("v", &scenario_signals(), 100, Model::Rl, &capped)
            .unwrap();
        assert_eq!(plan.confidence, 50);
    }

    #[test]
    fn confidence_penalty_has_floor() {
        let flat = BTreeMap::from([(Strategy::Staking, 0.05), (Strategy::Lending, 0.05)]);
        assert_eq!(confidence(&flat, Model::Bandit, false), 40);
        assert_eq!(confidence(&flat, Model::Bandit, true), 25);
        assert_eq!(confidence(&BTreeMap::new(), Model::Bandit, true), 20);
    }

    #[test]
    fn concentrated_plan_is_diversified() {
        // rl at full tolerance puts everything on the best APR
        let plan = Rebalancer::default()
            .rebalance("v", &scenario_signals(), 100, Model::Rl)
            .unwrap();
        assert_invariants(&plan);
        assert_eq!(plan.target_bps(Strategy::PerpsHedge), 9900);
        assert_eq!(plan.target_bps(Strategy::Lp), 100);
        assert_eq!(plan.legs.len(), 2);

        let three = Constraints {
            min_diversification: Some(3),
            ..Constraints::default()
        };
        let plan = Rebalancer::default()
            .rebalance_with("v", &scenario_signals(), 100, Model::Rl, &three)
            .unwrap();
        assert_invariants(&plan);
        assert_eq!(plan.target_bps(Strategy::PerpsHedge), 9800);
        assert_eq!(plan.target_bps(Strategy::Lp), 100);
        assert_eq!(plan.target_bps(Strategy::Staking), 100);

        let none = Constraints {
            min_diversification: Some(1),
            ..Constraints::default()
        };
        let plan = Rebalancer::default()
            .rebalance_with("v", &scenario_signals(), 100, Model::Rl, &none)
            .unwrap();
        assert_eq!(plan.legs.len(), 1);
    }

    #[test]
    fn diversification_skips_zero_apr() {
        let strategies = [Strategy::Staking, Strategy::Lending, Strategy::Lp];
        let aprs = BTreeMap::from([
            (Strategy::Staking, 0.1),
            (Strategy::Lending, 0.0),
            (Strategy::Lp, 0.0),
        ]);
        let w = diversify(&strategies, vec![1.0, 0.0, 0.0], &aprs, 2);
        assert_eq!(w, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn max_shift_covers_both_sides() {
        let plan = Rebalancer::default()
            .rebalance("v", &scenario_signals(), 100, Model::Rl)
            .unwrap();
        let current = BTreeMap::from([(Strategy::PerpsHedge, 9500), (Strategy::Staking, 500)]);
        // Staking 500 -> 0 and PerpsHedge 9500 -> 9900
        assert_eq!(plan.max_shift_bps(&current), 500);
        let moved = BTreeMap::from([(Strategy::Lending, 10_000)]);
        assert_eq!(plan.max_shift_bps(&moved), 10_000);
        assert_eq!(plan.max_shift_bps(&BTreeMap::new()), 9900);
    }

    #[test]
    fn infeasible_cap_is_raised_to_equal_split() {
        let constraints = Constraints {
            max_single_allocation: Some(0.1),
            ..Constraints::default()
        };
        let plan = Rebalancer::default()
            .rebalance_with("v", &scenario_signals(), 80, Model::Bandit, &constraints)
            .unwrap();
        assert_invariants(&plan);
        for w in plan.weights.values() {
            assert!((w - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let rebalancer = Rebalancer::default();
        let signals = scenario_signals();
        assert!(matches!(
            rebalancer.rebalance("v", &signals, 101, Model::Rl).unwrap_err(),
            AutopilotError::InvalidInput(_)
        ));
        assert!(matches!(
            rebalancer.rebalance("", &signals, 50, Model::Rl).unwrap_err(),
            AutopilotError::InvalidInput(_)
        ));
        let bad_cap = Constraints {
            max_single_allocation: Some(1.5),
            ..Constraints::default()
        };
        assert!(rebalancer
            .rebalance_with("v", &signals, 50, Model::Rl, &bad_cap)
            .is_err());
    }

    #[test]
    fn compare_returns_one_plan_per_model() {
        let plans = Rebalancer::default()
            .compare("v", &scenario_signals(), 50, &Constraints::default())
            .unwrap();
        assert_eq!(plans.len(), Model::all().len());
        for plan in &plans {
            assert_invariants(plan);
        }
    }

    #[test]
    fn plan_metrics_are_bounded() {
        let plan = Rebalancer::default()
            .rebalance("v", &scenario_signals(), 50, Model::Markowitz)
            .unwrap();
        assert!(plan.expected_return >= 0.08 && plan.expected_return <= 0.18);
        assert!((0.0..=100.0).contains(&plan.estimated_risk));
        assert!(plan.confidence <= 100);
    }

    #[test]
    fn legs_round_to_exact_total() {
        let strategies = [Strategy::Staking, Strategy::Lending, Strategy::Lp];
        let weights = [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];
        let legs = to_legs(&strategies, &weights);
        let total: u32 = legs.iter().map(|l| l.target_bps).sum();
        assert_eq!(total, TOTAL_BPS);
        assert!(legs.iter().all(|l| l.target_bps == 3333 || l.target_bps == 3334));
    }

    #[test]
    fn normalize_degenerate_input_is_equal() {
        assert_eq!(normalize(vec![0.0, 0.0]), vec![0.5, 0.5]);
        assert_eq!(normalize(vec![f64::NAN, 1.0]), vec![0.0, 1.0]);
    }

    #[test]
    fn model_parse_rejects_unknown() {
        assert_eq!("bandit".parse::<Model>().unwrap(), Model::Bandit);
        assert!(matches!(
            "lstm".parse::<Model>().unwrap_err(),
            AutopilotError::InvalidInput(_)
        ));
    }
}
