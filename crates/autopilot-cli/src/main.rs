mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, signals::SignalsSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "autopilot",
    about = "Decision engine for automated vault actions: risk, scheduling and rebalancing",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: nearest autopilot.yaml, else built-in defaults)
    #[arg(long, global = true, env = "AUTOPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score the risk of one ActionRequest, or an array of them
    Score {
        /// JSON file to read ("-" or omitted reads stdin)
        input: Option<PathBuf>,
    },

    /// Decide whether and when an action may run
    Plan {
        /// ActionRequest JSON file ("-" or omitted reads stdin)
        input: Option<PathBuf>,
        /// low, normal or high
        #[arg(long, default_value = "normal")]
        urgency: String,
        /// Maximum gas the caller will pay
        #[arg(long)]
        gas_ceiling: u64,
        /// Batch cadence in seconds for low urgency (default from config)
        #[arg(long)]
        cadence_secs: Option<u64>,
    },

    /// Compute a target allocation for a vault
    Rebalance {
        #[command(flatten)]
        args: cmd::rebalance::RebalanceArgs,
        /// bandit, rl or markowitz (default from config)
        #[arg(long)]
        model: Option<String>,
    },

    /// Run every model on the same signals
    Compare {
        #[command(flatten)]
        args: cmd::rebalance::RebalanceArgs,
    },

    /// Schedule a request and attach an allocation for rebalances
    Decide {
        /// JSON file with {request, urgency, gasCeiling, vault?} ("-" or omitted reads stdin)
        input: Option<PathBuf>,
    },

    /// Fetch market signals from the chain data gateway
    Signals {
        #[command(subcommand)]
        subcommand: SignalsSubcommand,
    },

    /// Create, show and validate the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Run the HTTP API
    Serve {
        /// Port to listen on (default from config; 0 = OS-assigned)
        #[arg(long, env = "AUTOPILOT_PORT")]
        port: Option<u16>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = root::resolve_config(cli.config.as_deref());
    let config_path = config_path.as_deref();

    let result = match cli.command {
        Commands::Score { input } => cmd::score::run(config_path, input.as_deref(), cli.json),
        Commands::Plan {
            input,
            urgency,
            gas_ceiling,
            cadence_secs,
        } => cmd::plan::run(
            config_path,
            input.as_deref(),
            &urgency,
            gas_ceiling,
            cadence_secs,
            cli.json,
        ),
        Commands::Rebalance { args, model } => {
            cmd::rebalance::run(config_path, &args, model.as_deref(), cli.json)
        }
        Commands::Compare { args } => cmd::rebalance::compare(config_path, &args, cli.json),
        Commands::Decide { input } => cmd::decide::run(config_path, input.as_deref(), cli.json),
        Commands::Signals { subcommand } => cmd::signals::run(config_path, subcommand, cli.json),
        Commands::Config { subcommand } => {
            cmd::config::run(cli.config.as_deref(), config_path, subcommand, cli.json)
        }
        Commands::Serve { port } => cmd::serve::run(config_path, port),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
