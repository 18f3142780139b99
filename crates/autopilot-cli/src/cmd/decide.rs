use super::{load_valid_config, read_json};
use crate::output::print_json;
use autopilot_core::orchestrator::{Orchestrator, Outcome, VaultContext};
use autopilot_core::rebalance::Rebalancer;
use autopilot_core::risk::RiskScorer;
use autopilot_core::schedule::SchedulePlanner;
use autopilot_core::types::{ActionRequest, Urgency};
use chrono::Utc;
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecideInput {
    request: ActionRequest,
    urgency: String,
    gas_ceiling: u64,
    #[serde(default)]
    vault: Option<VaultContext>,
}

pub fn run(config: Option<&Path>, input: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_valid_config(config)?;
    let input: DecideInput = read_json(input)?;
    let urgency: Urgency = input.urgency.parse()?;

    let orchestrator = Orchestrator::new(
        SchedulePlanner::new(config.schedule, RiskScorer::new(config.risk)),
        Rebalancer::new(config.rebalance),
    );
    let plan = orchestrator.decide(
        &input.request,
        urgency,
        input.gas_ceiling,
        input.vault.as_ref(),
        Utc::now(),
    )?;

    if json {
        return print_json(&plan);
    }

    match plan.outcome {
        Outcome::Execute => {
            let at = plan
                .schedule
                .earliest_execution
                .map(|t| t.to_rfc3339())
                .unwrap_or_default();
            println!("{} {}: execute at {at}", plan.request_id, plan.action);
        }
        Outcome::Deferred | Outcome::Ineligible => println!(
            "{} {}: {} ({})",
            plan.request_id,
            plan.action,
            plan.outcome,
            plan.reason.as_deref().unwrap_or("-")
        ),
    }
    if let Some(allocation) = &plan.allocation {
        for leg in &allocation.legs {
            println!("  {} {} bps", leg.strategy, leg.target_bps);
        }
    }
    Ok(())
}
