mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::covenants::CovenantSubcommand;
use cmd::thresholds::ThresholdSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sentinel",
    about = "Decision engine for portfolio company risk signals — covenants, runway, forecasts, concentration, volatility",
    version,
    propagate_version = true
)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a historical dataset through the engine and write calibration reports
    Replay {
        /// Input CSV (exporter, year, product, tradevalue, tradeshare, expgrowth)
        #[arg(long)]
        data: PathBuf,

        /// Directory to write the three report artifacts into
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// How many lead-time entries to keep in the report
        #[arg(long, default_value = "10")]
        top: usize,

        /// Threshold overrides (YAML); defaults apply when omitted
        #[arg(long, env = "SENTINEL_THRESHOLDS")]
        thresholds: Option<PathBuf>,
    },

    /// List the action playbooks the engine can recommend
    Catalog {
        /// Show only the playbook for this trigger key
        #[arg(long)]
        trigger: Option<String>,
    },

    /// Evaluate covenant definitions against reported metrics
    Covenants {
        #[command(subcommand)]
        subcommand: CovenantSubcommand,
    },

    /// Inspect signal thresholds
    Thresholds {
        #[command(subcommand)]
        subcommand: ThresholdSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Replay {
            data,
            out,
            top,
            thresholds,
        } => cmd::replay::run(&data, &out, top, thresholds.as_deref(), cli.json),
        Commands::Catalog { trigger } => cmd::catalog::run(trigger.as_deref(), cli.json),
        Commands::Covenants { subcommand } => cmd::covenants::run(subcommand, cli.json),
        Commands::Thresholds { subcommand } => cmd::thresholds::run(subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
