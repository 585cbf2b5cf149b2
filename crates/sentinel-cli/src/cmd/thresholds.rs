use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use sentinel_core::thresholds::ThresholdSet;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum ThresholdSubcommand {
    /// Show the effective threshold set
    Show {
        /// Threshold overrides (YAML); defaults apply when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Write the default threshold set to a YAML file
    Init {
        /// Destination path
        #[arg(long, default_value = "thresholds.yaml")]
        file: PathBuf,
    },
}

pub fn run(subcmd: ThresholdSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ThresholdSubcommand::Show { file } => show(file.as_deref(), json),
        ThresholdSubcommand::Init { file } => init(&file),
    }
}

fn show(file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let thresholds = match file {
        Some(path) => ThresholdSet::load(path)
            .with_context(|| format!("load thresholds from {}", path.display()))?,
        None => ThresholdSet::default(),
    };

    if json {
        return print_json(&thresholds);
    }

    let rows = vec![
        vec![
            "concentration_pct".to_string(),
            format!("{:.1}", thresholds.concentration_pct),
            "Revenue share that triggers concentration review".to_string(),
        ],
        vec![
            "forecast_warning".to_string(),
            format!("{:.2}", thresholds.forecast_warning),
            "Fractional miss that triggers a warning".to_string(),
        ],
        vec![
            "forecast_critical".to_string(),
            format!("{:.2}", thresholds.forecast_critical),
            "Fractional miss that triggers escalated review".to_string(),
        ],
        vec![
            "liquidity_runway_months".to_string(),
            format!("{:.1}", thresholds.liquidity_runway_months),
            "Runway below which liquidity is critical".to_string(),
        ],
        vec![
            "volatility_spike_ratio".to_string(),
            format!("{:.1}", thresholds.volatility_spike_ratio),
            "Current/historical volatility ratio that fires".to_string(),
        ],
    ];
    print_table(&["THRESHOLD", "VALUE", "MEANING"], rows);
    Ok(())
}

fn init(file: &Path) -> anyhow::Result<()> {
    ThresholdSet::default()
        .save(file)
        .with_context(|| format!("write thresholds to {}", file.display()))?;
    println!("Wrote defaults to {}", file.display());
    Ok(())
}
