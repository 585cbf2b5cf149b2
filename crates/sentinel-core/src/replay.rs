use crate::decision::Decision;
use crate::engine::{DecisionEngine, EvalContext};
use crate::error::Result;
use crate::thresholds::ThresholdSet;
use crate::types::Severity;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

// ---------------------------------------------------------------------------
// HistoricalRecord
// ---------------------------------------------------------------------------

/// One row of the historical replay dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalRecord {
    #[serde(default)]
    pub exporter: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub product: String,
    #[serde(default, alias = "tradevalue")]
    pub trade_value: f64,
    /// Share of exports in this product, as a 0-1 fraction.
    #[serde(default, alias = "tradeshare")]
    pub trade_share: f64,
    /// Year-over-year export growth, fractional.
    #[serde(default, alias = "expgrowth")]
    pub export_growth: f64,
}

// ---------------------------------------------------------------------------
// KnownEvents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KnownEvent {
    pub name: String,
    pub date: NaiveDate,
}

/// Ground-truth table of (entity, year) -> real-world event, used for
/// lead-time measurement and precision analysis.
#[derive(Debug, Clone, Default)]
pub struct KnownEvents {
    events: BTreeMap<(String, i32), KnownEvent>,
}

impl KnownEvents {
    pub fn standard() -> Self {
        let mut table = Self::default();
        for (entity, year, name, date) in [
            ("BOL", 1982, "Sovereign Default Declaration", (1982, 3, 15)),
            ("BOL", 1983, "Sovereign Default Declaration", (1983, 3, 15)),
            ("NGA", 2000, "Debt Restructuring Agreement", (2000, 12, 13)),
            ("NPL", 1995, "Political Instability Crisis", (1995, 6, 1)),
            ("PNG", 1986, "Commodity Price Collapse", (1986, 9, 1)),
            ("USA", 2008, "Lehman Brothers Bankruptcy", (2008, 9, 15)),
            ("CHN", 2008, "Global Trade Collapse", (2008, 11, 1)),
            ("DEU", 2008, "Eurozone Recession", (2008, 10, 1)),
        ] {
            if let Some(date) = NaiveDate::from_ymd_opt(date.0, date.1, date.2) {
                table.insert(entity, year, name, date);
            }
        }
        table
    }

    pub fn insert(&mut self, entity: &str, year: i32, name: &str, date: NaiveDate) {
        self.events.insert(
            (entity.to_string(), year),
            KnownEvent {
                name: name.to_string(),
                date,
            },
        );
    }

    pub fn get(&self, entity: &str, year: i32) -> Option<&KnownEvent> {
        self.events.get(&(entity.to_string(), year))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Epoch output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub period_analyzed: String,
    pub total_datapoints: usize,
    pub total_decisions_fired: usize,
    /// Keyed by upper-case severity name.
    pub breakdown_by_severity: BTreeMap<String, usize>,
    pub signal_breakdown: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineInsight {
    pub year: i32,
    pub exporter: String,
    pub signal: String,
    pub insight: String,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadTimeEntry {
    pub decision_id: String,
    pub signal: String,
    pub entity: String,
    pub first_fired: NaiveDate,
    pub real_world_event: String,
    pub event_date: NaiveDate,
    pub lead_time_days: i64,
    pub severity: String,
}

#[derive(Debug, Clone)]
pub struct EpochOutcome {
    pub decisions: Vec<Decision>,
    pub summary: SummaryCounts,
    pub timeline_insights: Vec<TimelineInsight>,
    pub lead_times: Vec<LeadTimeEntry>,
}

// Lead times down to a small negative are kept in the report: a signal
// firing just after the dated record boundary is tolerated as noise.
const LEAD_TIME_FLOOR_DAYS: i64 = -30;
// But confirmation credit requires the event inside a forward window.
const CONFIRMATION_WINDOW_DAYS: i64 = 365;
const FPR_TOLERANCE: f64 = 0.20;
const MAX_TIMELINE_INSIGHTS: usize = 10;
const MAX_DETAILED_DECISIONS: usize = 100;

// ---------------------------------------------------------------------------
// run_epoch
// ---------------------------------------------------------------------------

/// One full pass over the dataset under a fixed threshold set.
///
/// Records are processed sorted by (exporter, product, year): the
/// deterioration context depends on the strictly prior record within
/// the same key, so ordering is a correctness requirement.
pub fn run_epoch(
    records: &[HistoricalRecord],
    thresholds: &ThresholdSet,
    events: &KnownEvents,
) -> Result<EpochOutcome> {
    let mut sorted: Vec<&HistoricalRecord> = records.iter().collect();
    sorted.sort_by(|a, b| {
        (&a.exporter, &a.product, a.year).cmp(&(&b.exporter, &b.product, b.year))
    });

    let engine = DecisionEngine::new();
    let mut decisions = Vec::new();
    let mut timeline_insights = Vec::new();
    let mut lead_times = Vec::new();
    let mut breakdown_by_severity: BTreeMap<String, usize> = Severity::all()
        .iter()
        .map(|s| (s.as_str().to_uppercase(), 0))
        .collect();
    let mut signal_breakdown: BTreeMap<String, usize> = BTreeMap::new();

    let mut previous: BTreeMap<(String, String), &HistoricalRecord> = BTreeMap::new();

    let (mut min_year, mut max_year) = (i32::MAX, i32::MIN);

    for record in sorted {
        min_year = min_year.min(record.year);
        max_year = max_year.max(record.year);

        let key = (record.exporter.clone(), record.product.clone());
        let prev = previous.get(&key).copied();

        let ctx = EvalContext {
            entity_name: Some(format!(
                "{} - Product {}",
                record.exporter, record.product
            )),
            previous_concentration: Some(prev.map(|p| p.trade_share).unwrap_or(0.0)),
            consecutive_misses: Some(u32::from(
                prev.is_some_and(|p| p.export_growth < 0.0),
            )),
            market_down: record.export_growth < -0.20,
            revenue_impact: Some(record.trade_value),
            ..Default::default()
        };

        let mut fired = Vec::new();

        // Concentration risk.
        if record.trade_share * 100.0 > thresholds.concentration_pct {
            if let Some(d) = engine.process_risk_concentration(
                &record.exporter,
                &record.exporter,
                "product",
                record.trade_share * 100.0,
                thresholds.concentration_pct,
                &ctx,
            )? {
                fired.push(d);
            }
        }

        // Forecast miss: any export contraction is a miss against a
        // flat forecast.
        if record.export_growth < 0.0 {
            if let Some(d) = engine.process_forecast_miss(
                &record.exporter,
                &record.exporter,
                "exports",
                0.0,
                record.export_growth * 100.0,
                thresholds,
                &ctx,
            )? {
                fired.push(d);
            }
        }

        // Liquidity proxy: heavy concentration combined with a sharp
        // contraction.
        if record.trade_share > 0.60 && record.export_growth < -0.25 {
            let liquidity_ctx = EvalContext {
                previous_runway_months: Some(5.0),
                ..ctx.clone()
            };
            if let Some(d) = engine.process_cash_runway(
                &record.exporter,
                &record.exporter,
                record.trade_value * 0.1,
                record.trade_value * 0.05,
                thresholds,
                &liquidity_ctx,
            )? {
                fired.push(d);
            }
        }

        for mut decision in fired {
            let severity_key = decision.severity.as_str().to_uppercase();
            *breakdown_by_severity.entry(severity_key.clone()).or_default() += 1;
            *signal_breakdown
                .entry(decision.signal.as_str().to_string())
                .or_default() += 1;

            // Lead-time measurement against ground truth.
            if let (Some(event), Some(fired_date)) = (
                events.get(&record.exporter, record.year),
                NaiveDate::from_ymd_opt(record.year, 6, 1),
            ) {
                let lead_days = (event.date - fired_date).num_days();
                if lead_days >= LEAD_TIME_FLOOR_DAYS {
                    decision.first_triggered_date = to_utc(fired_date);
                    decision.related_event_date = to_utc(event.date);
                    decision.calculated_lead_days = Some(lead_days);
                    lead_times.push(LeadTimeEntry {
                        decision_id: decision.decision_id.clone(),
                        signal: decision.signal.as_str().to_string(),
                        entity: record.exporter.clone(),
                        first_fired: fired_date,
                        real_world_event: event.name.clone(),
                        event_date: event.date,
                        lead_time_days: lead_days,
                        severity: severity_key.clone(),
                    });
                }
            }

            if decision.severity == Severity::Critical
                && timeline_insights.len() < MAX_TIMELINE_INSIGHTS
            {
                timeline_insights.push(TimelineInsight {
                    year: record.year,
                    exporter: record.exporter.clone(),
                    signal: decision.signal.as_str().to_string(),
                    insight: format!(
                        "{} hit with {} in {}.",
                        record.exporter,
                        decision.signal.as_str(),
                        record.year
                    ),
                    actions: decision.recommended_actions.clone(),
                });
            }

            decisions.push(decision);
        }

        previous.insert(key, record);
    }

    let period_analyzed = if records.is_empty() {
        "n/a".to_string()
    } else {
        format!("{min_year}-{max_year}")
    };

    Ok(EpochOutcome {
        summary: SummaryCounts {
            period_analyzed,
            total_datapoints: records.len(),
            total_decisions_fired: decisions.len(),
            breakdown_by_severity,
            signal_breakdown,
        },
        decisions,
        timeline_insights,
        lead_times,
    })
}

fn to_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

// ---------------------------------------------------------------------------
// Precision analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecisionRow {
    pub signal: String,
    pub fired: usize,
    pub confirmed: usize,
    pub false_positive_rate: f64,
    pub trust_level: String,
    pub recommended_action: String,
}

/// Per-signal false-positive analysis over an epoch. A signal is
/// confirmed when a ground-truth event landed inside the forward
/// confirmation window; report-floor negatives do not count.
pub fn analyze_precision(outcome: &EpochOutcome) -> Vec<PrecisionRow> {
    let mut confirmed_by_signal: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in &outcome.lead_times {
        if (0..=CONFIRMATION_WINDOW_DAYS).contains(&entry.lead_time_days) {
            *confirmed_by_signal.entry(entry.signal.as_str()).or_default() += 1;
        }
    }

    let mut rows = Vec::new();
    for (signal, &fired) in &outcome.summary.signal_breakdown {
        if fired == 0 {
            continue;
        }
        let confirmed = confirmed_by_signal.get(signal.as_str()).copied().unwrap_or(0);
        let fpr = 1.0 - (confirmed as f64 / fired as f64);
        let fpr = (fpr * 100.0).round() / 100.0;
        let needs_calibration = fpr > FPR_TOLERANCE;
        rows.push(PrecisionRow {
            signal: signal.clone(),
            fired,
            confirmed,
            false_positive_rate: fpr,
            trust_level: if needs_calibration {
                "NEEDS CALIBRATION".to_string()
            } else {
                "HIGH TRUST".to_string()
            },
            recommended_action: if needs_calibration {
                "Tighten Thresholds".to_string()
            } else {
                "None".to_string()
            },
        });
    }
    rows
}

// ---------------------------------------------------------------------------
// Calibration (two-epoch protocol)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub simulation_summary: SummaryCounts,
    pub key_findings: Vec<TimelineInsight>,
    pub detailed_decisions: Vec<Decision>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeadTimeReport {
    pub description: String,
    pub generated_at: DateTime<Utc>,
    pub top_lead_times: Vec<LeadTimeEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrecisionReport {
    pub description: String,
    pub generated_at: DateTime<Utc>,
    pub calibration_matrix: Vec<PrecisionRow>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct CalibrationOutput {
    pub simulation: SimulationReport,
    pub lead_time: LeadTimeReport,
    pub precision: PrecisionReport,
    /// Thresholds in effect for the reported epoch.
    pub final_thresholds: ThresholdSet,
    pub recalibrated: bool,
}

/// Replay the dataset under the given baseline thresholds, measure
/// per-signal precision against ground truth, and re-run under
/// adjusted thresholds if any signal's false-positive rate exceeds
/// tolerance. The second epoch's decisions become the reported output;
/// the first epoch's precision rows remain the audit trail explaining
/// why recalibration occurred.
pub fn run_calibration(
    records: &[HistoricalRecord],
    baseline: &ThresholdSet,
    events: &KnownEvents,
    top_n: usize,
) -> Result<CalibrationOutput> {
    let epoch1 = run_epoch(records, baseline, events)?;
    let precision_rows = analyze_precision(&epoch1);

    let mut thresholds = baseline.clone();
    let mut recalibrated = false;
    for row in &precision_rows {
        if row.trust_level != "NEEDS CALIBRATION" {
            continue;
        }
        recalibrated = true;
        match row.signal.as_str() {
            "forecast_miss" => thresholds.tighten_forecast(),
            "risk_concentration" => thresholds.tighten_concentration(),
            _ => {}
        }
    }

    let reported = if recalibrated {
        info!(?thresholds, "false-positive tolerance exceeded; re-running under adjusted thresholds");
        run_epoch(records, &thresholds, events)?
    } else {
        epoch1
    };

    let mut top_lead_times = reported.lead_times.clone();
    top_lead_times.sort_by(|a, b| b.lead_time_days.cmp(&a.lead_time_days));
    top_lead_times.truncate(top_n);

    let mut detailed = reported.decisions;
    detailed.truncate(MAX_DETAILED_DECISIONS);

    let now = Utc::now();
    Ok(CalibrationOutput {
        simulation: SimulationReport {
            simulation_summary: reported.summary,
            key_findings: reported.timeline_insights,
            detailed_decisions: detailed,
        },
        lead_time: LeadTimeReport {
            description: "Lead Time Analysis vs Real-World Events".to_string(),
            generated_at: now,
            top_lead_times,
        },
        precision: PrecisionReport {
            description: "Precision Analysis & Calibration Recommendations".to_string(),
            generated_at: now,
            calibration_matrix: precision_rows,
            status: if recalibrated {
                "CALIBRATED".to_string()
            } else {
                "OPTIMAL".to_string()
            },
        },
        final_thresholds: thresholds,
        recalibrated,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(
        exporter: &str,
        year: i32,
        product: &str,
        value: f64,
        share: f64,
        growth: f64,
    ) -> HistoricalRecord {
        HistoricalRecord {
            exporter: exporter.to_string(),
            year,
            product: product.to_string(),
            trade_value: value,
            trade_share: share,
            export_growth: growth,
        }
    }

    #[test]
    fn epoch_fires_expected_signals() {
        // Heavy concentration + sharp contraction trips all three
        // replay triggers.
        let records = vec![rec("NGA", 2000, "oil", 1_000_000.0, 0.70, -0.30)];
        let outcome =
            run_epoch(&records, &ThresholdSet::default(), &KnownEvents::standard()).unwrap();

        assert_eq!(outcome.summary.total_decisions_fired, 3);
        assert_eq!(outcome.summary.signal_breakdown["risk_concentration"], 1);
        assert_eq!(outcome.summary.signal_breakdown["forecast_miss"], 1);
        assert_eq!(outcome.summary.signal_breakdown["cash_runway"], 1);
        // trade_value*0.1 / trade_value*0.05 = 2 months runway.
        assert_eq!(outcome.summary.breakdown_by_severity["CRITICAL"], 1);
        assert_eq!(outcome.summary.breakdown_by_severity["HIGH"], 2);
    }

    #[test]
    fn lead_times_measured_against_ground_truth() {
        let records = vec![rec("NGA", 2000, "oil", 1_000_000.0, 0.70, -0.30)];
        let outcome =
            run_epoch(&records, &ThresholdSet::default(), &KnownEvents::standard()).unwrap();

        // Event 2000-12-13 vs simulated firing 2000-06-01: 195 days.
        assert_eq!(outcome.lead_times.len(), 3);
        assert!(outcome.lead_times.iter().all(|e| e.lead_time_days == 195));
        assert!(outcome
            .lead_times
            .iter()
            .all(|e| e.real_world_event == "Debt Restructuring Agreement"));
        // Lead-time fields were stamped onto the decisions too.
        assert!(outcome
            .decisions
            .iter()
            .all(|d| d.calculated_lead_days == Some(195)));
    }

    #[test]
    fn lead_time_floor_drops_early_events() {
        // BOL's 1982 default predates the simulated June firing by 78
        // days, past the -30 day floor.
        let records = vec![rec("BOL", 1982, "tin", 1_000_000.0, 0.70, -0.30)];
        let outcome =
            run_epoch(&records, &ThresholdSet::default(), &KnownEvents::standard()).unwrap();
        assert_eq!(outcome.summary.total_decisions_fired, 3);
        assert!(outcome.lead_times.is_empty());
    }

    #[test]
    fn deterioration_context_uses_prior_record_in_key() {
        let records = vec![
            rec("ARG", 1999, "beef", 1_000_000.0, 0.45, -0.05),
            rec("ARG", 2000, "beef", 1_000_000.0, 0.50, -0.08),
        ];
        let outcome =
            run_epoch(&records, &ThresholdSet::default(), &KnownEvents::standard()).unwrap();
        // Second record sees the first as context: consecutive miss.
        let second_year_miss = outcome
            .decisions
            .iter()
            .find(|d| {
                d.signal.as_str() == "forecast_miss" && d.context["consecutive_misses"] == 1.0
            });
        assert!(second_year_miss.is_some());
    }

    #[test]
    fn confirmed_signals_are_high_trust() {
        let records = vec![rec("NGA", 2000, "oil", 1_000_000.0, 0.70, -0.30)];
        let outcome =
            run_epoch(&records, &ThresholdSet::default(), &KnownEvents::standard()).unwrap();
        let rows = analyze_precision(&outcome);
        assert_eq!(rows.len(), 3);
        for row in rows {
            assert_eq!(row.confirmed, 1);
            assert_eq!(row.false_positive_rate, 0.0);
            assert_eq!(row.trust_level, "HIGH TRUST");
            assert_eq!(row.recommended_action, "None");
        }
    }

    #[test]
    fn unconfirmed_signals_need_calibration() {
        // No ground-truth event for ARG: every firing is a false
        // positive.
        let records = vec![rec("ARG", 1999, "beef", 1_000_000.0, 0.45, -0.05)];
        let outcome =
            run_epoch(&records, &ThresholdSet::default(), &KnownEvents::standard()).unwrap();
        let rows = analyze_precision(&outcome);
        assert!(!rows.is_empty());
        for row in rows {
            assert_eq!(row.false_positive_rate, 1.0);
            assert_eq!(row.trust_level, "NEEDS CALIBRATION");
        }
    }

    #[test]
    fn calibration_reruns_under_tightened_thresholds() {
        let records = vec![rec("ARG", 1999, "beef", 1_000_000.0, 0.45, -0.05)];
        let output = run_calibration(
            &records,
            &ThresholdSet::default(),
            &KnownEvents::standard(),
            10,
        )
        .unwrap();

        assert!(output.recalibrated);
        assert_eq!(output.precision.status, "CALIBRATED");
        assert_eq!(output.final_thresholds.concentration_pct, 50.0);
        assert_eq!(output.final_thresholds.forecast_warning, 0.20);
        // Epoch 2: 45% concentration no longer clears the 50% cutoff,
        // so only the forecast miss remains.
        assert_eq!(output.simulation.simulation_summary.total_decisions_fired, 1);
        assert_eq!(
            output.simulation.simulation_summary.signal_breakdown["forecast_miss"],
            1
        );
        // The audit trail still shows epoch 1's firing counts.
        let concentration_row = output
            .precision
            .calibration_matrix
            .iter()
            .find(|r| r.signal == "risk_concentration")
            .unwrap();
        assert_eq!(concentration_row.fired, 1);
    }

    #[test]
    fn confirmed_run_is_not_recalibrated() {
        let records = vec![rec("NGA", 2000, "oil", 1_000_000.0, 0.70, -0.30)];
        let output = run_calibration(
            &records,
            &ThresholdSet::default(),
            &KnownEvents::standard(),
            10,
        )
        .unwrap();
        assert!(!output.recalibrated);
        assert_eq!(output.precision.status, "OPTIMAL");
        assert_eq!(output.final_thresholds, ThresholdSet::default());
    }

    #[test]
    fn calibration_is_deterministic() {
        let records = vec![
            rec("NGA", 2000, "oil", 1_000_000.0, 0.70, -0.30),
            rec("ARG", 1999, "beef", 1_000_000.0, 0.45, -0.05),
            rec("BOL", 1982, "tin", 2_000_000.0, 0.80, -0.40),
        ];
        let first = run_calibration(
            &records,
            &ThresholdSet::default(),
            &KnownEvents::standard(),
            10,
        )
        .unwrap();
        let second = run_calibration(
            &records,
            &ThresholdSet::default(),
            &KnownEvents::standard(),
            10,
        )
        .unwrap();
        assert_eq!(
            first.simulation.simulation_summary.total_decisions_fired,
            second.simulation.simulation_summary.total_decisions_fired
        );
        assert_eq!(
            first.simulation.simulation_summary.breakdown_by_severity,
            second.simulation.simulation_summary.breakdown_by_severity
        );
        assert_eq!(
            first.simulation.simulation_summary.signal_breakdown,
            second.simulation.simulation_summary.signal_breakdown
        );
    }

    #[test]
    fn top_lead_times_sorted_descending() {
        let records = vec![
            rec("NGA", 2000, "oil", 1_000_000.0, 0.70, -0.30),
            rec("CHN", 2008, "elec", 1_000_000.0, 0.70, -0.30),
        ];
        let output = run_calibration(
            &records,
            &ThresholdSet::default(),
            &KnownEvents::standard(),
            10,
        )
        .unwrap();
        let leads: Vec<i64> = output
            .lead_time
            .top_lead_times
            .iter()
            .map(|e| e.lead_time_days)
            .collect();
        let mut sorted = leads.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(leads, sorted);
    }

    #[test]
    fn empty_dataset_is_empty_report() {
        let output = run_calibration(
            &[],
            &ThresholdSet::default(),
            &KnownEvents::standard(),
            10,
        )
        .unwrap();
        assert_eq!(output.simulation.simulation_summary.total_decisions_fired, 0);
        assert!(output.precision.calibration_matrix.is_empty());
        assert_eq!(output.precision.status, "OPTIMAL");
    }

    #[test]
    fn missing_event_table_degrades_gracefully() {
        let records = vec![rec("NGA", 2000, "oil", 1_000_000.0, 0.70, -0.30)];
        let output =
            run_calibration(&records, &ThresholdSet::default(), &KnownEvents::default(), 10)
                .unwrap();
        // Decisions still fire; lead-time reporting is simply empty and
        // everything reads as unconfirmed.
        assert!(output.lead_time.top_lead_times.is_empty());
        assert!(output.recalibrated);
    }
}
