use crate::types::ActionKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// ActionStep
// ---------------------------------------------------------------------------

/// One ordered remediation step. Immutable: template substitution
/// produces a new instance via `with_description`, never a mutation of
/// the shared template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub kind: ActionKind,
    /// May contain `{{company}}` / `{{amount}}` placeholder tokens.
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_hours: Option<u32>,
    pub required_role: String,
}

impl ActionStep {
    fn new(
        kind: ActionKind,
        description: &str,
        target: &str,
        deadline_hours: u32,
        required_role: &str,
    ) -> Self {
        Self {
            kind,
            description: description.to_string(),
            target: Some(target.to_string()),
            deadline_hours: Some(deadline_hours),
            required_role: required_role.to_string(),
        }
    }

    pub fn with_description(&self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self.clone()
        }
    }

    /// Line format used in a decision's recommended-action list,
    /// e.g. "NOTIFY: Notify Debt committee within 24 hours".
    pub fn formatted(&self) -> String {
        format!("{}: {}", self.kind.tag(), self.description)
    }
}

// ---------------------------------------------------------------------------
// TemplateContext
// ---------------------------------------------------------------------------

/// Company-specific values substituted into playbook templates at
/// resolution time. Tokens without a value are left verbatim.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub company_name: Option<String>,
    pub breach_amount: Option<f64>,
}

// ---------------------------------------------------------------------------
// ActionCatalog
// ---------------------------------------------------------------------------

/// Read-only lookup table of pre-approved remediation playbooks, keyed
/// by trigger string. Constructed once at startup and injected where
/// needed; the playbooks are an audited artifact and must be preserved
/// exactly.
#[derive(Debug, Clone)]
pub struct ActionCatalog {
    templates: BTreeMap<String, Vec<ActionStep>>,
}

impl ActionCatalog {
    /// The standard 13-trigger catalogue.
    pub fn standard() -> Self {
        use ActionKind::*;
        let mut templates: BTreeMap<String, Vec<ActionStep>> = BTreeMap::new();

        // Covenant breaches
        templates.insert(
            "ebitda_covenant_breach".to_string(),
            vec![
                ActionStep::new(Notify, "Notify Debt committee within 24 hours", "Debt Committee", 24, "VP"),
                ActionStep::new(Action, "Freeze non-essential capex immediately", "CAPEX Budget", 0, "CFO"),
                ActionStep::new(Analysis, "Run downside LBO case with 20% haircut", "LBO Model", 48, "Associate"),
                ActionStep::new(Meeting, "Schedule lender discussion within 7 days", "Lenders", 168, "Partner"),
            ],
        );
        templates.insert(
            "debt_covenant_breach".to_string(),
            vec![
                ActionStep::new(Notify, "Notify General counsel for waiver documentation", "General Counsel", 24, "VP"),
                ActionStep::new(Analysis, "Model debt restructuring scenarios", "Debt Model", 48, "Associate"),
                ActionStep::new(Action, "Prepare equity cure analysis", "Equity Cure Model", 72, "Associate"),
                ActionStep::new(Meeting, "Board special committee review", "Board", 168, "Partner"),
            ],
        );
        templates.insert(
            "capital_call".to_string(),
            vec![
                ActionStep::new(Prepare, "Prepare capital call notice for {{company}}", "LP Communications", 48, "Partner"),
                ActionStep::new(Analysis, "Size equity cure requirement of {{amount}}", "Equity Cure Model", 24, "Associate"),
                ActionStep::new(Notify, "Notify limited partners of pending call", "LPs", 72, "Partner"),
            ],
        );
        templates.insert(
            "deleveraging_plan".to_string(),
            vec![
                ActionStep::new(Analysis, "Model paydown schedule to return inside covenant", "Debt Model", 48, "Associate"),
                ActionStep::new(Action, "Identify non-core assets for disposal at {{company}}", "Asset Register", 168, "CFO"),
                ActionStep::new(Meeting, "Lender consent discussion on amended schedule", "Lenders", 168, "Partner"),
            ],
        );

        // Forecast miss
        templates.insert(
            "forecast_miss_warning".to_string(),
            vec![
                ActionStep::new(Analysis, "Investigate root cause (market vs execution)", "Variance Report", 48, "Associate"),
                ActionStep::new(Review, "Management forecast credibility score", "Forecast Model", 24, "VP"),
                ActionStep::new(Adjust, "Portfolio valuation marks -5%", "Valuation Model", 24, "Associate"),
                ActionStep::new(Notify, "Monitor next quarter closely for pattern", "Watchlist", 168, "Associate"),
            ],
        );
        templates.insert(
            "forecast_miss_critical".to_string(),
            vec![
                ActionStep::new(Analysis, "Deep dive on operational breakdown", "Ops Review", 48, "Director"),
                ActionStep::new(Meeting, "Emergency management review", "Management", 24, "Partner"),
                ActionStep::new(Adjust, "Portfolio valuation marks -15%", "Valuation Model", 24, "VP"),
                ActionStep::new(Update, "Investor quarterly letter with explanation", "LPs", 72, "Partner"),
                ActionStep::new(Action, "Consider management changes if pattern continues", "Board", 168, "Partner"),
            ],
        );

        // Risk concentration
        templates.insert(
            "risk_concentration_warning".to_string(),
            vec![
                ActionStep::new(Analysis, "Customer/supplier diversification scenarios", "Risk Model", 48, "Associate"),
                ActionStep::new(Negotiate, "Long-term agreement with key entity", "Key Customer", 168, "CEO"),
                ActionStep::new(Action, "Business development pipeline acceleration", "Sales Team", 72, "CRO"),
                ActionStep::new(Hedge, "Credit insurance on key receivables", "Insurance Broker", 72, "CFO"),
            ],
        );
        templates.insert(
            "risk_concentration_critical".to_string(),
            vec![
                ActionStep::new(Analysis, "Stress test losing key entity", "Downside Model", 24, "Associate"),
                ActionStep::new(Action, "Immediate diversification efforts", "Sales Strategy", 24, "CRO"),
                ActionStep::new(Hedge, "Maximum available insurance coverage", "Insurance Broker", 48, "CFO"),
                ActionStep::new(Meeting, "Special committee review of concentration risk", "Board", 72, "Partner"),
                ActionStep::new(Prepare, "Strategy: Acquisition of competitor to diversify", "M&A Pipeline", 168, "VP"),
            ],
        );

        // Volatility spike
        templates.insert(
            "volatility_spike_warning".to_string(),
            vec![
                ActionStep::new(Analysis, "Stress test portfolio at 2x current volatility", "Risk Model", 24, "Analyst"),
                ActionStep::new(Action, "Increase cash position by 10%", "Treasury", 48, "CFO"),
                ActionStep::new(Hedge, "Review put option coverage on public positions", "Hedge Book", 24, "Trader"),
                ActionStep::new(Notify, "Daily risk reporting for 30 days", "Risk Committee", 24, "Risk Officer"),
            ],
        );
        templates.insert(
            "volatility_spike_critical".to_string(),
            vec![
                ActionStep::new(Analysis, "Maximum loss scenario at 3x volatility", "Stress Test", 4, "Risk Officer"),
                ActionStep::new(Action, "Increase cash position by 25%", "Treasury", 24, "CFO"),
                ActionStep::new(Hedge, "Execute downside protection trades", "Trading Desk", 2, "Trader"),
                ActionStep::new(Notify, "Intraday risk reporting", "Risk Committee", 4, "Risk Officer"),
                ActionStep::new(Update, "Investor update on risk management", "Investors", 24, "Partner"),
            ],
        );

        // Cash runway
        templates.insert(
            "cash_runway_12mo".to_string(),
            vec![
                ActionStep::new(Analysis, "12-month cash flow forecast update", "CF Model", 48, "Associate"),
                ActionStep::new(Prepare, "Equity/debt financing options analysis", "Capital Markets", 72, "VP"),
                ActionStep::new(Action, "Review discretionary spending", "Budget", 48, "CFO"),
                ActionStep::new(Notify, "Monitor Monthly cash position", "Management", 168, "Associate"),
            ],
        );
        templates.insert(
            "cash_runway_6mo".to_string(),
            vec![
                ActionStep::new(Analysis, "6-month cash flow forecast with sensitivities", "CF Model", 24, "Associate"),
                ActionStep::new(Contact, "Banking relationships for bridge financing", "Lenders", 48, "CFO"),
                ActionStep::new(Action, "Freeze non-essential hires and capex", "HR/Finance", 0, "CEO"),
                ActionStep::new(Prepare, "Prepare liquidity contingency plan", "Board", 48, "VP"),
            ],
        );
        templates.insert(
            "cash_runway_3mo".to_string(),
            vec![
                ActionStep::new(Analysis, "13-week cash flow forecast", "CF Model", 4, "Associate"),
                ActionStep::new(Action, "Activate revolving credit facility", "Treasury", 24, "CFO"),
                ActionStep::new(Negotiate, "Extend payables, accelerate receivables", "Vendors/Clients", 48, "CFO"),
                ActionStep::new(Meeting, "Emergency Board meeting within 48 hours", "Board", 24, "Chairman"),
                ActionStep::new(Analysis, "Options: Distressed financing or sale process", "Strategic Review", 48, "Partner"),
            ],
        );

        Self { templates }
    }

    pub fn triggers(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Resolve the pre-approved playbook for a trigger, substituting
    /// company-specific values into the step descriptions.
    ///
    /// An unknown trigger resolves to an empty list; callers must supply
    /// a generic fallback before constructing a decision.
    pub fn resolve(&self, trigger: &str, ctx: &TemplateContext) -> Vec<ActionStep> {
        let Some(steps) = self.templates.get(trigger) else {
            return Vec::new();
        };

        steps
            .iter()
            .map(|step| {
                let mut desc = step.description.clone();
                if let Some(company) = &ctx.company_name {
                    desc = desc.replace("{{company}}", company);
                }
                if let Some(amount) = ctx.breach_amount {
                    desc = desc.replace("{{amount}}", &format_dollars(amount));
                }
                step.with_description(desc)
            })
            .collect()
    }
}

/// "$1,234,567" with thousands separators, sign-aware.
pub fn format_dollars(amount: f64) -> String {
    let rounded = amount.abs().round() as u64;
    let digits = rounded.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if amount < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
