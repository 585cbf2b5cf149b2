#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sentinel() -> Command {
    Command::cargo_bin("sentinel").unwrap()
}

const FIXTURE_CSV: &str = "\
exporter,year,product,tradevalue,tradeshare,expgrowth
NGA,2000,oil,1000000,0.70,-0.30
ARG,1999,beef,1000000,0.45,-0.05
BOL,1982,tin,2000000,0.80,-0.40
not,a,valid,row,,
";

// ---------------------------------------------------------------------------
// sentinel replay
// ---------------------------------------------------------------------------

#[test]
fn replay_writes_three_reports() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("trade.csv");
    std::fs::write(&data, FIXTURE_CSV).unwrap();

    sentinel()
        .arg("replay")
        .arg("--data")
        .arg(&data)
        .arg("--out")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Decisions fired"));

    assert!(dir.path().join("historical_insights.json").exists());
    assert!(dir.path().join("lead_time_analysis.json").exists());
    assert!(dir.path().join("precision_analysis.json").exists());

    let insights =
        std::fs::read_to_string(dir.path().join("historical_insights.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&insights).unwrap();
    assert!(parsed["simulation_summary"]["total_decisions_fired"]
        .as_u64()
        .is_some());
}

#[test]
fn replay_skips_malformed_rows() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("trade.csv");
    std::fs::write(&data, FIXTURE_CSV).unwrap();

    // The fixture has one garbage row; the run must still succeed and
    // count only the three parseable datapoints.
    sentinel()
        .arg("--json")
        .arg("replay")
        .arg("--data")
        .arg(&data)
        .arg("--out")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total_datapoints\": 3"));
}

#[test]
fn replay_missing_file_fails_with_context() {
    let dir = TempDir::new().unwrap();
    sentinel()
        .arg("replay")
        .arg("--data")
        .arg(dir.path().join("absent.csv"))
        .arg("--out")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

// ---------------------------------------------------------------------------
// sentinel catalog
// ---------------------------------------------------------------------------

#[test]
fn catalog_lists_all_playbooks() {
    sentinel()
        .arg("catalog")
        .assert()
        .success()
        .stdout(predicate::str::contains("ebitda_covenant_breach"))
        .stdout(predicate::str::contains("cash_runway_3mo"));
}

#[test]
fn catalog_single_trigger_shows_steps() {
    sentinel()
        .arg("catalog")
        .arg("--trigger")
        .arg("cash_runway_3mo")
        .assert()
        .success()
        .stdout(predicate::str::contains("MEETING: Emergency Board meeting"));
}

#[test]
fn catalog_unknown_trigger_fails() {
    sentinel()
        .arg("catalog")
        .arg("--trigger")
        .arg("nonexistent")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown trigger"));
}

// ---------------------------------------------------------------------------
// sentinel covenants
// ---------------------------------------------------------------------------

#[test]
fn covenants_check_reports_breach() {
    let dir = TempDir::new().unwrap();
    let metrics = dir.path().join("metrics.yaml");
    std::fs::write(&metrics, "EBITDA: 4000000\nDebt/EBITDA: 3.0\n").unwrap();

    sentinel()
        .arg("--json")
        .arg("covenants")
        .arg("check")
        .arg("--metrics")
        .arg(&metrics)
        .assert()
        .success()
        .stdout(predicate::str::contains("covenant_breach"));
}

#[test]
fn covenants_check_clean_metrics() {
    let dir = TempDir::new().unwrap();
    let metrics = dir.path().join("metrics.yaml");
    std::fs::write(&metrics, "EBITDA: 6000000\nDebt/EBITDA: 3.0\n").unwrap();

    sentinel()
        .arg("covenants")
        .arg("check")
        .arg("--metrics")
        .arg(&metrics)
        .assert()
        .success()
        .stdout(predicate::str::contains("in compliance"));
}

#[test]
fn covenants_list_shows_defaults() {
    sentinel()
        .arg("covenants")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("EBITDA Minimum"))
        .stdout(predicate::str::contains("Leverage Ratio Max"));
}

// ---------------------------------------------------------------------------
// sentinel thresholds
// ---------------------------------------------------------------------------

#[test]
fn thresholds_show_defaults() {
    sentinel()
        .arg("thresholds")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("concentration_pct"))
        .stdout(predicate::str::contains("40.0"));
}

#[test]
fn thresholds_init_then_show_roundtrip() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("thresholds.yaml");

    sentinel()
        .arg("thresholds")
        .arg("init")
        .arg("--file")
        .arg(&file)
        .assert()
        .success();

    sentinel()
        .arg("--json")
        .arg("thresholds")
        .arg("show")
        .arg("--file")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"concentration_pct\": 40.0"));
}
