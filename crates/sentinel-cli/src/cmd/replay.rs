use crate::output::{print_json, print_table};
use anyhow::Context;
use sentinel_core::replay::{run_calibration, HistoricalRecord, KnownEvents};
use sentinel_core::thresholds::ThresholdSet;
use std::fs;
use std::path::Path;
use tracing::warn;

pub fn run(
    data: &Path,
    out: &Path,
    top: usize,
    thresholds_path: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let thresholds = match thresholds_path {
        Some(path) => ThresholdSet::load(path)
            .with_context(|| format!("load thresholds from {}", path.display()))?,
        None => ThresholdSet::default(),
    };

    let records = load_records(data)?;
    anyhow::ensure!(!records.is_empty(), "no usable rows in {}", data.display());

    let output = run_calibration(&records, &thresholds, &KnownEvents::standard(), top)?;

    fs::create_dir_all(out)
        .with_context(|| format!("create output directory {}", out.display()))?;
    write_report(&out.join("historical_insights.json"), &output.simulation)?;
    write_report(&out.join("lead_time_analysis.json"), &output.lead_time)?;
    write_report(&out.join("precision_analysis.json"), &output.precision)?;

    if json {
        return print_json(&output.simulation.simulation_summary);
    }

    let summary = &output.simulation.simulation_summary;
    println!("Period analyzed:   {}", summary.period_analyzed);
    println!("Datapoints:        {}", summary.total_datapoints);
    println!("Decisions fired:   {}", summary.total_decisions_fired);
    println!(
        "Calibration:       {} ({})",
        output.precision.status,
        if output.recalibrated {
            "thresholds tightened, second epoch reported"
        } else {
            "baseline thresholds held"
        }
    );
    println!();

    let rows = output
        .precision
        .calibration_matrix
        .iter()
        .map(|row| {
            vec![
                row.signal.clone(),
                row.fired.to_string(),
                row.confirmed.to_string(),
                format!("{:.2}", row.false_positive_rate),
                row.trust_level.clone(),
            ]
        })
        .collect();
    print_table(&["SIGNAL", "FIRED", "CONFIRMED", "FPR", "TRUST"], rows);

    println!();
    println!("Reports written to {}", out.display());
    Ok(())
}

/// Rows that fail to parse are skipped with a warning; a single bad
/// line must not abort a multi-decade replay.
fn load_records(path: &Path) -> anyhow::Result<Vec<HistoricalRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("open dataset {}", path.display()))?;

    let mut records = Vec::new();
    for (line, result) in reader.deserialize::<HistoricalRecord>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => warn!(line = line + 2, "skipping malformed row: {e}"),
        }
    }
    Ok(records)
}

fn write_report<T: serde::Serialize>(path: &Path, report: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("write report {}", path.display()))
}
