use crate::error::{Result, SentinelError};
use crate::precedent::Counterfactual;
use crate::types::{DecisionState, Severity, Signal};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// StateTransition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub timestamp: DateTime<Utc>,
    pub from: DecisionState,
    pub to: DecisionState,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// DecisionDraft
// ---------------------------------------------------------------------------

/// Everything a signal processor supplies when constructing a decision.
/// Identifier, timestamp, and lifecycle fields are assigned at creation.
#[derive(Debug, Clone)]
pub struct DecisionDraft {
    pub signal: Signal,
    pub context: BTreeMap<String, f64>,
    pub severity: Severity,
    pub why_now: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub confidence: f64,
    pub triggered_by: String,
    pub metadata: BTreeMap<String, Value>,
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// The central entity: an actionable, explainable decision produced by
/// a signal processor. Write-once except for lifecycle state, which
/// moves only through `transition_to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: String,
    pub signal: Signal,
    /// Numeric metric-name -> value snapshot at trigger time.
    pub context: BTreeMap<String, f64>,
    pub severity: Severity,
    /// Ordered human-readable justifications.
    pub why_now: Vec<String>,
    /// Formatted action lines resolved from the playbook catalog.
    pub recommended_actions: Vec<String>,
    /// Data-quality confidence in [0, 1].
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    /// Rule or trigger key that fired.
    pub triggered_by: String,
    /// Confidence breakdown, warnings, and domain-specific extras.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,

    // Lead-time analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_triggered_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_event_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_lead_days: Option<i64>,

    // Lifecycle.
    pub state: DecisionState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state_history: Vec<StateTransition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterfactual: Option<Counterfactual>,

    /// Sign-off hash recorded at acknowledgement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledgement_hash: Option<String>,
}

impl Decision {
    /// Construct a validated decision. A confidence outside [0, 1] or
    /// an empty action list is a defect in the calling processor, not a
    /// recoverable runtime condition.
    pub(crate) fn create(draft: DecisionDraft) -> Result<Self> {
        if !(0.0..=1.0).contains(&draft.confidence) {
            return Err(SentinelError::InvalidDecision(format!(
                "confidence must be between 0 and 1, got {}",
                draft.confidence
            )));
        }
        if draft.recommended_actions.is_empty() {
            return Err(SentinelError::InvalidDecision(
                "must have at least one recommended action".to_string(),
            ));
        }

        Ok(Self {
            decision_id: Uuid::new_v4().to_string(),
            signal: draft.signal,
            context: draft.context,
            severity: draft.severity,
            why_now: draft.why_now,
            recommended_actions: draft.recommended_actions,
            confidence: draft.confidence,
            timestamp: Utc::now(),
            triggered_by: draft.triggered_by,
            metadata: draft.metadata,
            first_triggered_date: None,
            related_event_date: None,
            calculated_lead_days: None,
            state: DecisionState::Active,
            state_history: Vec::new(),
            counterfactual: None,
            acknowledgement_hash: None,
        })
    }

    /// Apply a lifecycle transition, appending to the state history.
    /// Terminal states cannot be left.
    pub fn transition_to(
        &mut self,
        to: DecisionState,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.state.is_terminal() {
            return Err(SentinelError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
                reason: "state is terminal".to_string(),
            });
        }
        if self.state == to {
            return Err(SentinelError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
                reason: "already in target state".to_string(),
            });
        }

        self.state_history.push(StateTransition {
            timestamp: now,
            from: self.state,
            to,
            reason: reason.into(),
        });
        self.state = to;
        Ok(())
    }

    /// Record an operator sign-off: moves to acknowledged and stores
    /// the accountability hash.
    pub fn acknowledge(
        &mut self,
        hash: impl Into<String>,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.transition_to(DecisionState::Acknowledged, reason, now)?;
        self.acknowledgement_hash = Some(hash.into());
        Ok(())
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_days()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
