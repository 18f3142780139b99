use super::{Arm, MarketSignals};
use crate::config::MarkowitzConfig;

/// Volatility-penalized APR, allocated proportionally.
///
/// Each arm scores `apr - min(volatility * market_risk / 100, max_penalty)`.
/// Risk tolerance does not enter the score; the cap and diversification
/// constraints bound how far the result concentrates.
pub(super) fn evaluate(arms: &[Arm], signals: &MarketSignals, config: &MarkowitzConfig) -> Vec<f64> {
    let market_risk = signals.market_risk() / 100.0;
    arms.iter()
        .map(|arm| {
            let volatility = signals
                .volatility
                .get(&arm.strategy)
                .copied()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(config.default_volatility);
            let penalty = (volatility * market_risk).min(config.max_penalty);
            (arm.apr - penalty).max(0.0)
        })
        .collect()
}
