use super::{Arm, MarketSignals};
use crate::config::RlConfig;

/// Below this temperature the softmax is replaced by an argmax.
const MIN_TEMPERATURE: f64 = 1e-9;

/// Single-step policy evaluation.
///
/// The state is the APR vector plus the market risk scalar; a linear value
/// function with per-strategy coefficients maps it to a preference per arm,
/// and a softmax turns preferences into weights. Temperature falls as risk
/// tolerance rises, so a tolerant vault concentrates on the best strategy and
/// a cautious one spreads toward equal weights.
pub(super) fn evaluate(
    arms: &[Arm],
    signals: &MarketSignals,
    tolerance: f64,
    config: &RlConfig,
) -> Vec<f64> {
    let market_risk = signals.market_risk() / 100.0;
    let values: Vec<f64> = arms
        .iter()
        .map(|arm| {
            let c = config.coefficients_for(arm.strategy);
            c.bias + c.apr * arm.apr - c.risk * market_risk
        })
        .collect();

    let temperature = config.max_temperature.max(0.0) * (100.0 - tolerance) / 100.0;
    softmax(&values, temperature)
}

fn softmax(values: &[f64], temperature: f64) -> Vec<f64> {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if temperature < MIN_TEMPERATURE {
        let winners = values.iter().filter(|v| (max - **v).abs() <= 1e-12).count();
        return values
            .iter()
            .map(|v| {
                if (max - v).abs() <= 1e-12 {
                    1.0 / winners as f64
                } else {
                    0.0
                }
            })
            .collect();
    }
    let exps: Vec<f64> = values
        .iter()
        .map(|v| ((v - max) / temperature).exp())
        .collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
