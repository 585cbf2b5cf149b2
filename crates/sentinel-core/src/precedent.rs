use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// PrecedentOutcome
// ---------------------------------------------------------------------------

/// One historical outcome with its observed frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrecedentOutcome {
    pub outcome: String,
    /// Fraction of precedent cases that ended this way.
    pub probability: f64,
}

/// Probability-weighted outcome list for a coarse signal/severity
/// combination, sourced from a precedent study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Precedent {
    /// Most-likely outcome first.
    pub outcomes: Vec<PrecedentOutcome>,
    pub data_source: String,
}

// ---------------------------------------------------------------------------
// Counterfactual
// ---------------------------------------------------------------------------

/// Advisory projection attached to a critical decision: what tends to
/// happen when this condition goes unaddressed. Never a scoring input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counterfactual {
    pub summary: String,
    pub most_likely: PrecedentOutcome,
    pub all_outcomes: Vec<PrecedentOutcome>,
    pub source: String,
    pub time_horizon: String,
}

impl Counterfactual {
    pub fn from_precedent(precedent: &Precedent) -> Option<Self> {
        let most_likely = precedent.outcomes.first()?.clone();
        Some(Self {
            summary: "If unaddressed, historical data suggests:".to_string(),
            most_likely,
            all_outcomes: precedent.outcomes.clone(),
            source: precedent.data_source.clone(),
            time_horizon: "6-12 months".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// PrecedentTable
// ---------------------------------------------------------------------------

/// Static lookup of precedents by coarse condition key. Built once at
/// startup and injected; read-only thereafter.
#[derive(Debug, Clone)]
pub struct PrecedentTable {
    precedents: BTreeMap<String, Precedent>,
}

impl PrecedentTable {
    pub fn standard() -> Self {
        let mut precedents = BTreeMap::new();

        precedents.insert(
            "cash_runway_3mo".to_string(),
            Precedent {
                outcomes: vec![
                    PrecedentOutcome {
                        outcome: "Emergency bridge financing at punitive terms".to_string(),
                        probability: 0.45,
                    },
                    PrecedentOutcome {
                        outcome: "Distressed sale process initiated".to_string(),
                        probability: 0.30,
                    },
                    PrecedentOutcome {
                        outcome: "Insolvency filing within two quarters".to_string(),
                        probability: 0.25,
                    },
                ],
                data_source: "Portfolio precedent study, sub-3-month runway cohort".to_string(),
            },
        );

        precedents.insert(
            "forecast_miss_30pct".to_string(),
            Precedent {
                outcomes: vec![
                    PrecedentOutcome {
                        outcome: "Further guidance cut the following quarter".to_string(),
                        probability: 0.50,
                    },
                    PrecedentOutcome {
                        outcome: "Management change within twelve months".to_string(),
                        probability: 0.30,
                    },
                    PrecedentOutcome {
                        outcome: "Recovery to plan without intervention".to_string(),
                        probability: 0.20,
                    },
                ],
                data_source: "Portfolio precedent study, >30% miss cohort".to_string(),
            },
        );

        Self { precedents }
    }

    pub fn get(&self, key: &str) -> Option<&Precedent> {
        self.precedents.get(key)
    }

    pub fn counterfactual_for(&self, key: &str) -> Option<Counterfactual> {
        self.get(key).and_then(Counterfactual::from_precedent)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
