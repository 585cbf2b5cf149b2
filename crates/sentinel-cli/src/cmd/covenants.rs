use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use sentinel_core::covenant::{default_covenants, evaluate_covenants, Covenant};
use sentinel_core::engine::{DecisionEngine, EvalContext};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum CovenantSubcommand {
    /// Evaluate covenants against a metrics file and emit any decision
    Check {
        /// Reported metrics (YAML map of metric name to value)
        #[arg(long)]
        metrics: PathBuf,

        /// Covenant definitions (YAML list); built-in defaults when omitted
        #[arg(long)]
        covenants: Option<PathBuf>,

        /// Company identifier used on the emitted decision
        #[arg(long, default_value = "portfolio-co")]
        company: String,
    },

    /// List covenant definitions without evaluating them
    List {
        /// Covenant definitions (YAML list); built-in defaults when omitted
        #[arg(long)]
        covenants: Option<PathBuf>,
    },
}

pub fn run(subcmd: CovenantSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        CovenantSubcommand::Check {
            metrics,
            covenants,
            company,
        } => check(&metrics, covenants.as_deref(), &company, json),
        CovenantSubcommand::List { covenants } => list(covenants.as_deref(), json),
    }
}

fn load_covenants(path: Option<&Path>) -> anyhow::Result<Vec<Covenant>> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("read covenant definitions {}", path.display()))?;
            serde_yaml::from_str(&raw)
                .with_context(|| format!("parse covenant definitions {}", path.display()))
        }
        None => Ok(default_covenants()),
    }
}

fn check(
    metrics_path: &Path,
    covenants_path: Option<&Path>,
    company: &str,
    json: bool,
) -> anyhow::Result<()> {
    let raw = fs::read_to_string(metrics_path)
        .with_context(|| format!("read metrics {}", metrics_path.display()))?;
    let metrics: BTreeMap<String, f64> = serde_yaml::from_str(&raw)
        .with_context(|| format!("parse metrics {}", metrics_path.display()))?;
    let covenants = load_covenants(covenants_path)?;

    let engine = DecisionEngine::new();
    let decision =
        engine.process_covenant_breach(company, company, &metrics, &covenants, &EvalContext::default())?;

    match decision {
        Some(decision) if json => print_json(&decision)?,
        Some(decision) => {
            println!("{} [{}]", decision.triggered_by, decision.severity);
            println!();
            for line in &decision.why_now {
                println!("  why: {line}");
            }
            for action in &decision.recommended_actions {
                println!("  {action}");
            }
            let breaches = evaluate_covenants(&metrics, &covenants);
            println!();
            let rows = breaches
                .iter()
                .map(|b| {
                    vec![
                        b.covenant_name.clone(),
                        b.metric_name.clone(),
                        format!("{:.2}", b.threshold_value),
                        format!("{:.2}", b.actual_value),
                        format!("{:.2}", b.delta),
                    ]
                })
                .collect();
            print_table(&["COVENANT", "METRIC", "THRESHOLD", "ACTUAL", "DELTA"], rows);
        }
        None if json => print_json(&serde_json::json!({ "breaches": [] }))?,
        None => println!("All covenants in compliance."),
    }
    Ok(())
}

fn list(covenants_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let covenants = load_covenants(covenants_path)?;
    if json {
        return print_json(&covenants);
    }
    let rows = covenants
        .iter()
        .map(|c| {
            vec![
                c.id.clone(),
                c.name.clone(),
                c.metric.clone(),
                format!("{:.2}", c.threshold),
                c.direction.as_str().to_string(),
                c.grace_period_days.to_string(),
            ]
        })
        .collect();
    print_table(
        &["ID", "NAME", "METRIC", "THRESHOLD", "DIRECTION", "GRACE DAYS"],
        rows,
    );
    Ok(())
}
