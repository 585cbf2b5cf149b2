use crate::error::SentinelError;
use crate::types::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which side of the threshold constitutes a breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Breach when the metric rises above the threshold.
    Above,
    /// Breach when the metric falls below the threshold.
    Below,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "above" => Ok(Direction::Above),
            "below" => Ok(Direction::Below),
            _ => Err(SentinelError::InvalidDirection(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Covenant
// ---------------------------------------------------------------------------

/// A single lending-covenant rule. Immutable value type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Covenant {
    pub id: String,
    pub name: String,
    /// Metric key to look up in the input map, e.g. "EBITDA".
    pub metric: String,
    pub threshold: f64,
    pub direction: Direction,
    pub grace_period_days: u32,
    /// Trigger keys used to resolve remediation playbooks.
    pub action_triggers: Vec<String>,
}

// ---------------------------------------------------------------------------
// CovenantBreach
// ---------------------------------------------------------------------------

/// Derived record of a covenant violation. Severity at this layer is
/// always critical; the real bucketing happens downstream from the
/// breach magnitude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovenantBreach {
    pub breach_id: String,
    pub covenant_id: String,
    pub covenant_name: String,
    pub metric_name: String,
    pub threshold_value: f64,
    pub actual_value: f64,
    /// Signed actual - threshold.
    pub delta: f64,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Check current metrics against a list of company-specific covenants.
///
/// A covenant whose metric is absent from `metrics` is skipped, not
/// reported as a breach or an error. Tolerance of missing data is a
/// deliberate policy here.
pub fn evaluate_covenants(
    metrics: &BTreeMap<String, f64>,
    covenants: &[Covenant],
) -> Vec<CovenantBreach> {
    let mut breaches = Vec::new();

    for covenant in covenants {
        let Some(&current) = metrics.get(&covenant.metric) else {
            continue;
        };

        let is_breach = match covenant.direction {
            Direction::Below => current < covenant.threshold,
            Direction::Above => current > covenant.threshold,
        };

        if is_breach {
            breaches.push(CovenantBreach {
                breach_id: Uuid::new_v4().to_string(),
                covenant_id: covenant.id.clone(),
                covenant_name: covenant.name.clone(),
                metric_name: covenant.metric.clone(),
                threshold_value: covenant.threshold,
                actual_value: current,
                delta: current - covenant.threshold,
                severity: Severity::Critical,
                detected_at: Utc::now(),
            });
        }
    }

    breaches
}

/// Default covenant set used by demos and tests.
pub fn default_covenants() -> Vec<Covenant> {
    vec![
        Covenant {
            id: "defs_1".to_string(),
            name: "EBITDA Minimum".to_string(),
            metric: "EBITDA".to_string(),
            threshold: 5_000_000.0,
            direction: Direction::Below,
            grace_period_days: 30,
            action_triggers: vec!["ebitda_covenant_breach".to_string()],
        },
        Covenant {
            id: "defs_2".to_string(),
            name: "Leverage Ratio Max".to_string(),
            metric: "Debt/EBITDA".to_string(),
            threshold: 4.5,
            direction: Direction::Above,
            grace_period_days: 15,
            action_triggers: vec!["debt_covenant_breach".to_string()],
        },
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
