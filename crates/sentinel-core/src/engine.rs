use crate::actions::{ActionCatalog, TemplateContext, format_dollars};
use crate::confidence::{ConfidenceAssessment, ConfidenceInputs, assess_confidence};
use crate::covenant::{Covenant, evaluate_covenants};
use crate::decision::{Decision, DecisionDraft};
use crate::error::Result;
use crate::precedent::PrecedentTable;
use crate::severity::{SeverityInputs, bucket_severity, severity_score};
use crate::thresholds::ThresholdSet;
use crate::types::{Severity, Signal};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

// ---------------------------------------------------------------------------
// EvalContext
// ---------------------------------------------------------------------------

/// Optional evaluation context supplied alongside a processor's domain
/// inputs. Every field has a documented default; absent fields fall
/// back per processor.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub entity_name: Option<String>,
    pub recurrence_count: Option<u32>,
    pub days_since_last_breach: Option<u32>,
    pub cash_runway_months: Option<f64>,
    pub market_volatility_index: Option<f64>,
    pub previous_runway_months: Option<f64>,
    pub consecutive_misses: Option<u32>,
    pub previous_concentration: Option<f64>,
    pub revenue_impact: Option<f64>,
    pub data_completeness: Option<f64>,
    pub data_freshness_days: Option<u32>,
    pub historical_precision: Option<f64>,
    pub signal_agreement: Option<u32>,
    pub market_correlation: Option<f64>,
    pub spike_duration_days: Option<u32>,
    /// Was the forecast behind a miss formally approved/backtested?
    pub forecast_validated: bool,
    pub market_down: bool,
}

// ---------------------------------------------------------------------------
// DecisionEngine
// ---------------------------------------------------------------------------

/// Orchestrates covenant checks, scoring, and playbook resolution into
/// decisions. Scoring is pure; the only shared mutable state is the
/// append-only decision history, serialized behind a mutex so the
/// engine can be driven from concurrent request handlers.
pub struct DecisionEngine {
    catalog: ActionCatalog,
    precedents: PrecedentTable,
    history: Mutex<Vec<Decision>>,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self {
            catalog: ActionCatalog::standard(),
            precedents: PrecedentTable::standard(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of every decision produced by this engine instance.
    pub fn history(&self) -> Vec<Decision> {
        self.lock_history().clone()
    }

    pub fn decision_count(&self) -> usize {
        self.lock_history().len()
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, Vec<Decision>> {
        // A poisoned lock only means a panicking thread held it; the
        // Vec itself is still usable.
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, decision: Decision) -> Decision {
        self.lock_history().push(decision.clone());
        decision
    }

    /// Attach a precedent-based projection to critical decisions whose
    /// condition maps to a known precedent cohort.
    fn attach_counterfactual(&self, decision: &mut Decision) {
        if decision.severity != Severity::Critical {
            return;
        }
        let key = match decision.signal {
            Signal::CashRunway => "cash_runway_3mo",
            Signal::ForecastMiss => "forecast_miss_30pct",
            _ => return,
        };
        decision.counterfactual = self.precedents.counterfactual_for(key);
    }

    // -----------------------------------------------------------------------
    // Covenant breach
    // -----------------------------------------------------------------------

    pub fn process_covenant_breach(
        &self,
        company_id: &str,
        company_name: &str,
        metrics: &BTreeMap<String, f64>,
        covenants: &[Covenant],
        ctx: &EvalContext,
    ) -> Result<Option<Decision>> {
        let breaches = evaluate_covenants(metrics, covenants);
        let Some(breach) = breaches
            .into_iter()
            .max_by(|a, b| a.delta.abs().total_cmp(&b.delta.abs()))
        else {
            return Ok(None);
        };

        let recurrence = ctx.recurrence_count.unwrap_or(1);
        let runway = ctx.cash_runway_months.unwrap_or(12.0);
        let volatility = ctx.market_volatility_index.unwrap_or(15.0);

        let score = severity_score(&SeverityInputs {
            breach_size: (breach.delta / breach.threshold_value).abs(),
            recurrence_count: recurrence,
            days_since_last: ctx.days_since_last_breach.unwrap_or(999),
            cash_runway_months: runway,
            market_volatility_index: volatility,
        });
        let severity = bucket_severity(score);

        // Trigger selection keys off the breached metric name.
        let trigger = if breach.metric_name.contains("EBITDA") {
            Some("ebitda_covenant_breach")
        } else if breach.metric_name.contains("Debt") {
            Some("debt_covenant_breach")
        } else {
            None
        };

        let template_ctx = TemplateContext {
            company_name: Some(company_name.to_string()),
            breach_amount: Some(breach.delta),
        };
        let mut actions: Vec<String> = trigger
            .map(|t| self.catalog.resolve(t, &template_ctx))
            .unwrap_or_default()
            .iter()
            .map(|s| s.formatted())
            .collect();
        if actions.is_empty() {
            actions.push("NOTIFY: Immediate review required (No template found)".to_string());
        }

        let confidence = assess_confidence(&ConfidenceInputs {
            data_completeness: ctx.data_completeness.unwrap_or(85.0),
            data_freshness_days: ctx.data_freshness_days.unwrap_or(7),
            model_validated: true,
            signal_agreement_count: ctx.signal_agreement.unwrap_or(2),
            historical_precision: ctx.historical_precision.unwrap_or(0.75),
        });

        let mut why_now = Vec::new();
        if recurrence > 1 {
            why_now.push(format!("Consecutive breach #{recurrence}"));
        }
        if runway < 6.0 {
            why_now.push(format!("Cash runway < {runway:.1} months"));
        }
        if volatility > 30.0 {
            why_now.push("Market volatility spike".to_string());
        }
        why_now.push(format!(
            "Breach of {} by {}",
            breach.covenant_name,
            format_dollars(breach.delta.abs())
        ));

        debug!(company = company_id, trigger = %breach.covenant_id, score, "covenant breach fired");

        let mut decision = Decision::create(DecisionDraft {
            signal: Signal::CovenantBreach,
            context: BTreeMap::from([
                ("threshold".to_string(), breach.threshold_value),
                ("actual".to_string(), breach.actual_value),
                ("delta".to_string(), breach.delta),
                ("severity_score".to_string(), score),
            ]),
            severity,
            why_now,
            recommended_actions: actions,
            confidence: confidence.score,
            triggered_by: breach.covenant_id.clone(),
            metadata: base_metadata(company_name, &confidence, [(
                "breach_details".to_string(),
                serde_json::to_value(&breach)?,
            )]),
        })?;
        self.attach_counterfactual(&mut decision);
        Ok(Some(self.record(decision)))
    }

    // -----------------------------------------------------------------------
    // Cash runway
    // -----------------------------------------------------------------------

    /// Fires at the 12/6-month tiers and at the configured critical
    /// runway cutoff. Zero or negative burn never fires: the company
    /// is not consuming cash.
    pub fn process_cash_runway(
        &self,
        company_id: &str,
        company_name: &str,
        cash_balance: f64,
        monthly_burn: f64,
        thresholds: &ThresholdSet,
        ctx: &EvalContext,
    ) -> Result<Option<Decision>> {
        if monthly_burn <= 0.0 {
            return Ok(None);
        }

        let runway = cash_balance / monthly_burn;
        if runway > 12.0 {
            return Ok(None);
        }

        let mut why_now = Vec::new();
        let (severity, trigger) = if runway < thresholds.liquidity_runway_months {
            why_now.push(format!("Cash runway: {runway:.1} months - CRITICAL"));
            (Severity::Critical, "cash_runway_3mo")
        } else if runway < 6.0 {
            why_now.push(format!("Cash runway: {runway:.1} months - ACTION REQUIRED"));
            (Severity::High, "cash_runway_6mo")
        } else {
            why_now.push(format!("Cash runway: {runway:.1} months - MONITOR"));
            (Severity::Medium, "cash_runway_12mo")
        };

        // Month-over-month deterioration of 20% or more is its own
        // justification.
        let prev_runway = ctx.previous_runway_months.unwrap_or(runway + 1.0);
        let mut deterioration_pct = 0.0;
        if runway < prev_runway * 0.8 {
            deterioration_pct = (prev_runway - runway) / prev_runway * 100.0;
            why_now.push(format!(
                "Deteriorated from {prev_runway:.1} months ({deterioration_pct:.0}%)"
            ));
        }

        let template_ctx = TemplateContext {
            company_name: Some(company_name.to_string()),
            breach_amount: None,
        };
        let mut actions: Vec<String> = self
            .catalog
            .resolve(trigger, &template_ctx)
            .iter()
            .map(|s| s.formatted())
            .collect();
        if actions.is_empty() {
            actions.push(format!(
                "NOTIFY: Review Cash Position (Runway {runway:.1}m)"
            ));
        }

        // Cash data is usually reliable.
        let confidence = assess_confidence(&ConfidenceInputs {
            data_completeness: 95.0,
            data_freshness_days: ctx.data_freshness_days.unwrap_or(7),
            model_validated: true,
            signal_agreement_count: 2,
            historical_precision: 0.85,
        });

        debug!(company = company_id, runway, trigger, "cash runway fired");

        let mut decision = Decision::create(DecisionDraft {
            signal: Signal::CashRunway,
            context: BTreeMap::from([
                ("cash_balance".to_string(), cash_balance),
                ("monthly_burn".to_string(), monthly_burn),
                ("runway_months".to_string(), runway),
                ("previous_runway".to_string(), prev_runway),
                ("deterioration_pct".to_string(), deterioration_pct),
            ]),
            severity,
            why_now,
            recommended_actions: actions,
            confidence: confidence.score,
            triggered_by: trigger.to_string(),
            metadata: base_metadata(company_name, &confidence, []),
        })?;
        self.attach_counterfactual(&mut decision);
        Ok(Some(self.record(decision)))
    }

    // -----------------------------------------------------------------------
    // Forecast miss
    // -----------------------------------------------------------------------

    /// Only underperformance matters: a beat or an on-target quarter
    /// never fires.
    pub fn process_forecast_miss(
        &self,
        company_id: &str,
        company_name: &str,
        metric: &str,
        forecast: f64,
        actual: f64,
        thresholds: &ThresholdSet,
        ctx: &EvalContext,
    ) -> Result<Option<Decision>> {
        if actual == 0.0 {
            return Ok(None);
        }

        let variance_pct = if forecast.abs() < 1e-9 {
            // A zero forecast with a negative actual is a full miss.
            if actual < 0.0 { -100.0 } else { 0.0 }
        } else {
            (actual - forecast) / forecast.abs() * 100.0
        };

        if variance_pct >= 0.0 {
            return Ok(None);
        }

        let abs_variance = variance_pct.abs() / 100.0;
        let (severity, trigger) = if abs_variance >= thresholds.forecast_critical {
            (Severity::High, "forecast_miss_critical")
        } else if abs_variance >= thresholds.forecast_warning {
            (Severity::Medium, "forecast_miss_warning")
        } else {
            return Ok(None);
        };

        let mut why_now = vec![
            format!("{} miss: {variance_pct:.1}% vs forecast", metric.to_uppercase()),
            format!(
                "Actual: {} vs Forecast: {}",
                format_dollars(actual),
                format_dollars(forecast)
            ),
        ];
        let consecutive = ctx.consecutive_misses.unwrap_or(0);
        if consecutive > 0 {
            why_now.push(format!("Consecutive misses: {consecutive} quarters"));
        }

        let template_ctx = TemplateContext {
            company_name: Some(company_name.to_string()),
            breach_amount: None,
        };
        let mut actions: Vec<String> = self
            .catalog
            .resolve(trigger, &template_ctx)
            .iter()
            .map(|s| s.formatted())
            .collect();
        if actions.is_empty() {
            actions.push(format!("NOTIFY: Review {metric} forecast variance"));
        }

        let confidence = assess_confidence(&ConfidenceInputs {
            data_completeness: ctx.data_completeness.unwrap_or(90.0),
            data_freshness_days: ctx.data_freshness_days.unwrap_or(7),
            model_validated: ctx.forecast_validated,
            signal_agreement_count: 1,
            historical_precision: ctx.historical_precision.unwrap_or(0.70),
        });

        debug!(company = company_id, variance_pct, trigger, "forecast miss fired");

        let mut decision = Decision::create(DecisionDraft {
            signal: Signal::ForecastMiss,
            context: BTreeMap::from([
                ("forecast".to_string(), forecast),
                ("actual".to_string(), actual),
                ("variance_pct".to_string(), variance_pct),
                ("abs_variance".to_string(), abs_variance),
                ("consecutive_misses".to_string(), f64::from(consecutive)),
            ]),
            severity,
            why_now,
            recommended_actions: actions,
            confidence: confidence.score,
            triggered_by: trigger.to_string(),
            metadata: base_metadata(company_name, &confidence, [(
                "metric".to_string(),
                Value::String(metric.to_string()),
            )]),
        })?;
        self.attach_counterfactual(&mut decision);
        Ok(Some(self.record(decision)))
    }

    // -----------------------------------------------------------------------
    // Risk concentration
    // -----------------------------------------------------------------------

    pub fn process_risk_concentration(
        &self,
        company_id: &str,
        company_name: &str,
        concentration_type: &str,
        concentration_pct: f64,
        threshold_pct: f64,
        ctx: &EvalContext,
    ) -> Result<Option<Decision>> {
        if concentration_pct < threshold_pct {
            return Ok(None);
        }

        let (severity, trigger) = if concentration_pct >= 60.0 {
            (Severity::High, "risk_concentration_critical")
        } else {
            (Severity::Medium, "risk_concentration_warning")
        };

        let entity_name = ctx
            .entity_name
            .clone()
            .unwrap_or_else(|| format!("Top {concentration_type}"));

        let mut why_now = vec![
            format!(
                "{} concentration: {concentration_pct:.1}%",
                capitalize(concentration_type)
            ),
            format!("Threshold: {threshold_pct}%"),
            format!("Entity: {entity_name}"),
        ];
        let prev = ctx.previous_concentration.unwrap_or(0.0);
        if concentration_pct > prev {
            why_now.push(format!("Increased from {prev:.1}%"));
        }

        let template_ctx = TemplateContext {
            company_name: Some(company_name.to_string()),
            breach_amount: None,
        };
        let mut actions: Vec<String> = self
            .catalog
            .resolve(trigger, &template_ctx)
            .iter()
            .map(|s| s.formatted())
            .collect();
        if actions.is_empty() {
            actions.push(format!("NOTIFY: Review {concentration_type} concentration"));
        }

        // Concentration data is often quarterly and unmodelled.
        let confidence = assess_confidence(&ConfidenceInputs {
            data_completeness: ctx.data_completeness.unwrap_or(75.0),
            data_freshness_days: ctx.data_freshness_days.unwrap_or(90),
            model_validated: false,
            signal_agreement_count: 1,
            historical_precision: 0.80,
        });

        debug!(company = company_id, concentration_pct, trigger, "concentration fired");

        let mut decision = Decision::create(DecisionDraft {
            signal: Signal::RiskConcentration,
            context: BTreeMap::from([
                ("concentration_pct".to_string(), concentration_pct),
                ("threshold_pct".to_string(), threshold_pct),
                ("previous_concentration".to_string(), prev),
                ("revenue_impact".to_string(), ctx.revenue_impact.unwrap_or(0.0)),
            ]),
            severity,
            why_now,
            recommended_actions: actions,
            confidence: confidence.score,
            triggered_by: trigger.to_string(),
            metadata: base_metadata(company_name, &confidence, [
                (
                    "concentration_type".to_string(),
                    Value::String(concentration_type.to_string()),
                ),
                ("entity_name".to_string(), Value::String(entity_name)),
            ]),
        })?;
        self.attach_counterfactual(&mut decision);
        Ok(Some(self.record(decision)))
    }

    // -----------------------------------------------------------------------
    // Volatility spike
    // -----------------------------------------------------------------------

    /// Fires when volatility exceeds the configured multiple of its
    /// historical average. Zero or negative historical average never
    /// fires: there is no baseline to spike against.
    pub fn process_volatility_spike(
        &self,
        company_id: &str,
        company_name: &str,
        current_volatility: f64,
        historical_average: f64,
        thresholds: &ThresholdSet,
        ctx: &EvalContext,
    ) -> Result<Option<Decision>> {
        if historical_average <= 0.0 {
            return Ok(None);
        }

        let spike_threshold = thresholds.volatility_spike_ratio;
        let ratio = current_volatility / historical_average;
        if ratio < spike_threshold {
            return Ok(None);
        }

        let (severity, trigger) = if ratio >= 3.0 {
            (Severity::High, "volatility_spike_critical")
        } else {
            (Severity::Medium, "volatility_spike_warning")
        };

        let duration = ctx.spike_duration_days.unwrap_or(1);
        let mut why_now = vec![
            format!("Volatility spike: {ratio:.1}x normal"),
            format!(
                "Current: {:.1}% vs Normal: {:.1}%",
                current_volatility * 100.0,
                historical_average * 100.0
            ),
            format!("Duration: {duration} days"),
        ];
        if ctx.market_down {
            why_now.push("Market in downtrend - amplifying impact".to_string());
        }

        let template_ctx = TemplateContext {
            company_name: Some(company_name.to_string()),
            breach_amount: None,
        };
        let mut actions: Vec<String> = self
            .catalog
            .resolve(trigger, &template_ctx)
            .iter()
            .map(|s| s.formatted())
            .collect();
        if actions.is_empty() {
            actions.push("NOTIFY: Monitor Volatility".to_string());
        }

        // Market data is real-time and well validated.
        let confidence = assess_confidence(&ConfidenceInputs {
            data_completeness: 100.0,
            data_freshness_days: 0,
            model_validated: true,
            signal_agreement_count: 2,
            historical_precision: 0.95,
        });

        debug!(company = company_id, ratio, trigger, "volatility spike fired");

        let mut decision = Decision::create(DecisionDraft {
            signal: Signal::VolatilitySpike,
            context: BTreeMap::from([
                ("current_volatility".to_string(), current_volatility),
                ("historical_average".to_string(), historical_average),
                ("volatility_ratio".to_string(), ratio),
                ("spike_threshold".to_string(), spike_threshold),
                (
                    "market_correlation".to_string(),
                    ctx.market_correlation.unwrap_or(0.0),
                ),
            ]),
            severity,
            why_now,
            recommended_actions: actions,
            confidence: confidence.score,
            triggered_by: trigger.to_string(),
            metadata: base_metadata(company_name, &confidence, [(
                "spike_duration_days".to_string(),
                json!(duration),
            )]),
        })?;
        self.attach_counterfactual(&mut decision);
        Ok(Some(self.record(decision)))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn base_metadata<const N: usize>(
    company_name: &str,
    confidence: &ConfidenceAssessment,
    extra: [(String, Value); N],
) -> BTreeMap<String, Value> {
    let mut metadata = BTreeMap::from([
        (
            "company_name".to_string(),
            Value::String(company_name.to_string()),
        ),
        (
            "confidence_breakdown".to_string(),
            json!(confidence.breakdown),
        ),
        (
            "confidence_warnings".to_string(),
            json!(confidence.warnings),
        ),
    ]);
    metadata.extend(extra);
    metadata
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
