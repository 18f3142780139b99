use super::load_config;
use crate::output::print_json;
use anyhow::Context;
use autopilot_core::config::{Config, WarnLevel, CONFIG_FILE};
use clap::Subcommand;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a config file with every default spelled out
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective config
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// `explicit` is the `--config` flag as given; `resolved` is the file found
/// for reading, if any.
pub fn run(
    explicit: Option<&Path>,
    resolved: Option<&Path>,
    subcmd: ConfigSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init { force } => {
            let target = explicit
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
            init(&target, force, json)
        }
        ConfigSubcommand::Show => show(resolved, json),
        ConfigSubcommand::Validate => validate(resolved, json),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(path: &Path, force: bool, json: bool) -> anyhow::Result<()> {
    let config = Config::default();
    let written = if force {
        config.save(path).map(|_| true)
    } else {
        config.save_if_missing(path)
    }
    .with_context(|| format!("failed to write {}", path.display()))?;
    if !written {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }

    if json {
        print_json(&serde_json::json!({ "path": path }))?;
    } else {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(path)?;
    if json {
        return print_json(&config);
    }
    match path {
        Some(p) => println!("# {}", p.display()),
        None => println!("# built-in defaults"),
    }
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
