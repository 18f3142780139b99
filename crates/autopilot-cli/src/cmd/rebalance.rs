use super::{load_valid_config, read_json};
use crate::output::{print_json, print_table};
use anyhow::Context;
use autopilot_core::rebalance::{AllocationPlan, Constraints, MarketSignals, Model, Rebalancer};
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct RebalanceArgs {
    /// Vault id
    #[arg(long)]
    pub vault: String,
    /// MarketSignals JSON file ("-" reads stdin)
    #[arg(long)]
    pub signals: PathBuf,
    /// Risk tolerance 0-100 (default from config)
    #[arg(long)]
    pub tolerance: Option<u8>,
    /// Largest weight any one strategy may hold, 0-1
    #[arg(long)]
    pub max_single_allocation: Option<f64>,
    /// Fewest strategies the plan must hold (default from config)
    #[arg(long)]
    pub min_diversification: Option<usize>,
}

struct Inputs {
    rebalancer: Rebalancer,
    signals: MarketSignals,
    tolerance: u8,
    constraints: Constraints,
}

fn inputs(config: Option<&Path>, args: &RebalanceArgs) -> anyhow::Result<Inputs> {
    let config = load_valid_config(config)?;
    let signals: MarketSignals =
        read_json(Some(args.signals.as_path())).context("failed to read market signals")?;
    Ok(Inputs {
        tolerance: args
            .tolerance
            .unwrap_or(config.rebalance.default_risk_tolerance),
        rebalancer: Rebalancer::new(config.rebalance),
        signals,
        constraints: Constraints {
            max_single_allocation: args.max_single_allocation,
            min_diversification: args.min_diversification,
        },
    })
}

pub fn run(
    config: Option<&Path>,
    args: &RebalanceArgs,
    model: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let inputs = inputs(config, args)?;
    let model = match model {
        Some(m) => m.parse::<Model>()?,
        None => inputs.rebalancer.config().default_model,
    };
    let plan = inputs.rebalancer.rebalance_with(
        &args.vault,
        &inputs.signals,
        inputs.tolerance,
        model,
        &inputs.constraints,
    )?;

    if json {
        return print_json(&plan);
    }
    print_plan(&plan);
    Ok(())
}

pub fn compare(config: Option<&Path>, args: &RebalanceArgs, json: bool) -> anyhow::Result<()> {
    let inputs = inputs(config, args)?;
    let plans = inputs.rebalancer.compare(
        &args.vault,
        &inputs.signals,
        inputs.tolerance,
        &inputs.constraints,
    )?;

    if json {
        return print_json(&plans);
    }
    let rows = plans
        .iter()
        .map(|p| {
            vec![
                p.model.to_string(),
                format!("{:.2}%", p.expected_return * 100.0),
                format!("{:.1}", p.estimated_risk),
                p.confidence.to_string(),
                p.legs
                    .iter()
                    .map(|l| format!("{}={}", l.strategy, l.target_bps))
                    .collect::<Vec<_>>()
                    .join(" "),
            ]
        })
        .collect();
    print_table(&["MODEL", "RETURN", "RISK", "CONFIDENCE", "LEGS (bps)"], rows);
    Ok(())
}

fn print_plan(plan: &AllocationPlan) {
    println!(
        "{} via {}: expected return {:.2}%, risk {:.1}, confidence {}",
        plan.vault_id,
        plan.model,
        plan.expected_return * 100.0,
        plan.estimated_risk,
        plan.confidence
    );
    let rows = plan
        .legs
        .iter()
        .map(|l| {
            vec![
                l.strategy.to_string(),
                format!("{:.4}", plan.weight_of(l.strategy)),
                l.target_bps.to_string(),
            ]
        })
        .collect();
    print_table(&["STRATEGY", "WEIGHT", "BPS"], rows);
}
