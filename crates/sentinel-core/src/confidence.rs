use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ConfidenceRating
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceRating {
    Low,
    Moderate,
    High,
}

impl ConfidenceRating {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfidenceRating::Low => "Low",
            ConfidenceRating::Moderate => "Moderate",
            ConfidenceRating::High => "High",
        }
    }
}

impl fmt::Display for ConfidenceRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConfidenceAssessment
// ---------------------------------------------------------------------------

/// How trustworthy a decision is, based on data quality rather than
/// outcome correctness. The breakdown map exists for explainability:
/// every component's contribution is visible to the reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    /// Weighted sum in [0, 1].
    pub score: f64,
    pub rating: ConfidenceRating,
    pub breakdown: BTreeMap<String, f64>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceInputs {
    /// Percentage of required data points available (0-100).
    pub data_completeness: f64,
    /// Days since the latest data point.
    pub data_freshness_days: u32,
    /// Has the model behind this signal been backtested?
    pub model_validated: bool,
    /// How many independent signals agree.
    pub signal_agreement_count: u32,
    /// Historical precision of this signal type (0.0-1.0).
    pub historical_precision: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Compute a 0-1 confidence score from objective data-quality factors.
///
/// Component weights: completeness 0.30, freshness 0.25, validation
/// 0.20, agreement 0.15, precision 0.10 — summing to 1.0 at maximum.
pub fn assess_confidence(inputs: &ConfidenceInputs) -> ConfidenceAssessment {
    let mut warnings = Vec::new();

    let completeness = (inputs.data_completeness.min(100.0) / 100.0) * 0.30;

    let freshness = if inputs.data_freshness_days <= 7 {
        0.25
    } else if inputs.data_freshness_days <= 30 {
        0.20
    } else if inputs.data_freshness_days <= 90 {
        warnings.push(format!(
            "Data is {} days old (stale).",
            inputs.data_freshness_days
        ));
        0.10
    } else {
        warnings.push(format!(
            "Data is {} days old (very stale).",
            inputs.data_freshness_days
        ));
        0.05
    };

    let validation = if inputs.model_validated {
        0.20
    } else {
        warnings.push("Model has not been backtested.".to_string());
        0.05
    };

    // Contribution caps at 3 agreeing signals.
    let agreement = (f64::from(inputs.signal_agreement_count.min(3)) / 3.0) * 0.15;
    if inputs.signal_agreement_count < 2 {
        warnings.push("Low signal agreement (isolated signal).".to_string());
    }

    let precision = inputs.historical_precision.min(1.0) * 0.10;

    let score = round2(completeness + freshness + validation + agreement + precision);

    let rating = if score < 0.6 {
        warnings
            .push("Decision based on partial/weak data. Verify with primary sources.".to_string());
        ConfidenceRating::Low
    } else if score < 0.8 {
        warnings.push("Moderate confidence. Consider additional validation.".to_string());
        ConfidenceRating::Moderate
    } else {
        ConfidenceRating::High
    };

    let breakdown = BTreeMap::from([
        ("completeness".to_string(), round2(completeness)),
        ("freshness".to_string(), round2(freshness)),
        ("validation".to_string(), round2(validation)),
        ("agreement".to_string(), round2(agreement)),
        ("precision".to_string(), round2(precision)),
    ]);

    ConfidenceAssessment {
        score,
        rating,
        breakdown,
        warnings,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
