use super::{Arm, MarketSignals};
use crate::config::BanditConfig;

/// Upper-confidence-bound allocation.
///
/// Each strategy is an arm scored `apr + exploration / observations`, the
/// bonus scaled by risk tolerance. Arms with a positive APR keep a floor weight
/// so the vault never fully abandons a yielding strategy; the rest of the mass
/// follows the adjusted scores.
pub(super) fn evaluate(
    arms: &[Arm],
    signals: &MarketSignals,
    tolerance: f64,
    config: &BanditConfig,
) -> Vec<f64> {
    let scale = tolerance / 100.0;
    let exploration = config.exploration.max(0.0);
    let adjusted: Vec<f64> = arms
        .iter()
        .map(|arm| {
            let pulls = signals
                .observations
                .get(&arm.strategy)
                .copied()
                .unwrap_or(config.default_observations)
                .max(1);
            arm.apr + exploration / f64::from(pulls) * scale
        })
        .collect();

    let total: f64 = adjusted.iter().sum();
    if total <= 0.0 {
        return vec![1.0 / arms.len() as f64; arms.len()];
    }

    let yielding = arms.iter().filter(|a| a.apr > 0.0).count();
    let floor = if yielding == 0 {
        0.0
    } else {
        config.floor_weight.clamp(0.0, 1.0 / yielding as f64)
    };
    let remaining = 1.0 - floor * yielding as f64;

    arms.iter()
        .zip(&adjusted)
        .map(|(arm, score)| {
            let base = if arm.apr > 0.0 { floor } else { 0.0 };
            base + remaining * score / total
        })
        .collect()
}
