use super::{load_valid_config, read_json};
use crate::output::print_json;
use autopilot_core::risk::RiskScorer;
use autopilot_core::schedule::SchedulePlanner;
use autopilot_core::types::{ActionRequest, Urgency};
use chrono::Utc;
use std::path::Path;

pub fn run(
    config: Option<&Path>,
    input: Option<&Path>,
    urgency: &str,
    gas_ceiling: u64,
    cadence_secs: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let urgency: Urgency = urgency.parse()?;
    let config = load_valid_config(config)?;
    let planner = SchedulePlanner::new(config.schedule, RiskScorer::new(config.risk));
    let request: ActionRequest = read_json(input)?;

    let plan = planner.plan_with_cadence(&request, urgency, gas_ceiling, Utc::now(), cadence_secs)?;

    if json {
        return print_json(&plan);
    }

    match (plan.earliest_execution, plan.reason) {
        (Some(at), _) => println!(
            "{} {}: eligible at {} (gas {} / {})",
            plan.request_id,
            plan.action,
            at.to_rfc3339(),
            plan.gas_estimate,
            plan.gas_ceiling
        ),
        (None, reason) => println!(
            "{} {}: ineligible ({})",
            plan.request_id,
            plan.action,
            reason.map(|r| r.as_str()).unwrap_or("unknown")
        ),
    }
    println!(
        "risk: {:.2} ({}, {})",
        plan.risk.value, plan.risk.band, plan.risk.recommendation
    );
    Ok(())
}
