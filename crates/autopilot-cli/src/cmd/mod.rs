pub mod config;
pub mod decide;
pub mod plan;
pub mod rebalance;
pub mod score;
pub mod serve;
pub mod signals;

use anyhow::Context;
use autopilot_core::config::{Config, WarnLevel};
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;

/// Load the resolved config file, or defaults when none was found.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    Config::load_or_default(path).with_context(|| match path {
        Some(p) => format!("failed to load config {}", p.display()),
        None => "failed to load built-in config".to_string(),
    })
}

/// Like [`load_config`], but refuses a config with validation errors. Every
/// command that runs the engine goes through here.
pub fn load_valid_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = load_config(path)?;
    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !errors.is_empty() {
        anyhow::bail!(
            "config has errors (run `autopilot config validate`):\n  {}",
            errors.join("\n  ")
        );
    }
    Ok(config)
}

/// Read a JSON document from `path`, or stdin when `path` is `None` or `-`.
pub fn read_json<T: DeserializeOwned>(path: Option<&Path>) -> anyhow::Result<T> {
    let data = match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read {}", p.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&data).context("input is not a valid request")
}
