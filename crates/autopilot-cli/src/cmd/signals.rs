use super::load_valid_config;
use crate::output::{print_json, print_table};
use anyhow::anyhow;
use autopilot_server::gateway::ChainGateway;
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand, Debug)]
pub enum SignalsSubcommand {
    /// Fetch prices, APR and vault state for one vault
    Fetch {
        /// Vault id
        #[arg(long)]
        vault: String,
        /// Gateway base URL (default: gateway.base_url from config)
        #[arg(long)]
        url: Option<String>,
    },
}

pub fn run(config: Option<&Path>, subcmd: SignalsSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SignalsSubcommand::Fetch { vault, url } => fetch(config, &vault, url.as_deref(), json),
    }
}

fn fetch(config: Option<&Path>, vault: &str, url: Option<&str>, json: bool) -> anyhow::Result<()> {
    let config = load_valid_config(config)?;
    let base_url = url
        .map(str::to_string)
        .or_else(|| config.gateway.base_url.clone())
        .ok_or_else(|| anyhow!("no gateway URL: pass --url or set gateway.base_url"))?;
    let gateway = ChainGateway::new(&base_url, &config.gateway)?;

    let rt = tokio::runtime::Runtime::new()?;
    let snapshot = rt.block_on(gateway.fetch_signals(vault, chrono::Utc::now()))?;

    if json {
        return print_json(&snapshot);
    }

    let risk = snapshot.vault(vault).map_or(0.0, |v| v.risk);
    println!(
        "{vault}: market risk {risk:.1}, fetched {}",
        snapshot.fetched_at.to_rfc3339()
    );
    let rows = snapshot
        .apr
        .iter()
        .map(|(strategy, apr)| {
            vec![
                strategy.to_string(),
                apr.map(|a| format!("{:.2}%", a * 100.0))
                    .unwrap_or_else(|| "n/a".to_string()),
            ]
        })
        .collect();
    print_table(&["STRATEGY", "APR"], rows);
    Ok(())
}
