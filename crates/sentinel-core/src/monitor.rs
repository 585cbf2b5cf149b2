use crate::decision::Decision;
use crate::error::Result;
use crate::types::{DecisionState, Severity, Signal};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

// ---------------------------------------------------------------------------
// LifecycleMonitor
// ---------------------------------------------------------------------------

/// Re-evaluates standing decisions against fresh metrics and the clock.
/// Rules are checked in order and at most one transition is applied per
/// reassessment.
#[derive(Debug, Default)]
pub struct LifecycleMonitor;

impl LifecycleMonitor {
    pub fn new() -> Self {
        Self
    }

    /// Apply at most one lifecycle rule to the decision. Returns the
    /// new state if a transition was applied.
    pub fn reassess(
        &self,
        decision: &mut Decision,
        current_metrics: &BTreeMap<String, f64>,
        now: DateTime<Utc>,
    ) -> Result<Option<DecisionState>> {
        if decision.state.is_terminal() {
            return Ok(None);
        }

        if condition_improved(decision, current_metrics) {
            decision.transition_to(
                DecisionState::Resolved,
                "Condition improved past threshold",
                now,
            )?;
            debug!(id = %decision.decision_id, "decision resolved: condition improved");
            return Ok(Some(DecisionState::Resolved));
        }

        let age_days = decision.age_days(now);

        if decision.severity == Severity::Critical
            && decision.state == DecisionState::Active
            && age_days > 7
        {
            decision.transition_to(
                DecisionState::Escalated,
                "Critical decision ignored for 7+ days",
                now,
            )?;
            debug!(id = %decision.decision_id, age_days, "decision escalated");
            return Ok(Some(DecisionState::Escalated));
        }

        if decision.severity == Severity::Medium && age_days > 30 {
            decision.transition_to(
                DecisionState::Resolved,
                "Medium severity stale after 30 days",
                now,
            )?;
            debug!(id = %decision.decision_id, age_days, "decision resolved: stale");
            return Ok(Some(DecisionState::Resolved));
        }

        Ok(None)
    }
}

/// Has the signal's underlying condition moved back inside its original
/// threshold? Missing metrics are treated as "no evidence of
/// improvement".
fn condition_improved(decision: &Decision, current: &BTreeMap<String, f64>) -> bool {
    match decision.signal {
        Signal::CashRunway => current
            .get("runway_months")
            .is_some_and(|&runway| runway > 12.0),
        Signal::ForecastMiss => current
            .get("variance_pct")
            .is_some_and(|&variance| variance >= 0.0),
        Signal::RiskConcentration => match decision.context.get("threshold_pct") {
            Some(&threshold) => current
                .get("concentration_pct")
                .is_some_and(|&pct| pct < threshold),
            None => false,
        },
        Signal::VolatilitySpike => match decision.context.get("spike_threshold") {
            Some(&threshold) => current
                .get("volatility_ratio")
                .is_some_and(|&ratio| ratio < threshold),
            None => false,
        },
        Signal::CovenantBreach => covenant_back_in_compliance(decision, current),
        Signal::LiquidityEvent | Signal::CustomerConcentration => false,
    }
}

/// The original breach direction is recoverable from the recorded
/// delta's sign: negative delta means a below-threshold breach.
fn covenant_back_in_compliance(decision: &Decision, current: &BTreeMap<String, f64>) -> bool {
    let (Some(&threshold), Some(&delta)) = (
        decision.context.get("threshold"),
        decision.context.get("delta"),
    ) else {
        return false;
    };

    let Some(metric_name) = decision
        .metadata
        .get("breach_details")
        .and_then(|v| v.get("metric_name"))
        .and_then(|v| v.as_str())
    else {
        return false;
    };

    let Some(&value) = current.get(metric_name) else {
        return false;
    };

    if delta < 0.0 {
        value >= threshold
    } else {
        value <= threshold
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionDraft;
    use chrono::Duration;
    use serde_json::json;

    fn make_decision(signal: Signal, severity: Severity, age_days: i64) -> Decision {
        let mut decision = Decision::create(DecisionDraft {
            signal,
            context: BTreeMap::from([
                ("threshold_pct".to_string(), 40.0),
                ("spike_threshold".to_string(), 2.0),
            ]),
            severity,
            why_now: vec!["test condition".to_string()],
            recommended_actions: vec!["NOTIFY: review".to_string()],
            confidence: 0.8,
            triggered_by: "test_trigger".to_string(),
            metadata: BTreeMap::new(),
        })
        .unwrap();
        decision.timestamp = Utc::now() - Duration::days(age_days);
        decision
    }

    #[test]
    fn critical_ignored_eight_days_escalates() {
        let monitor = LifecycleMonitor::new();
        let mut decision = make_decision(Signal::CashRunway, Severity::Critical, 8);
        let applied = monitor
            .reassess(&mut decision, &BTreeMap::new(), Utc::now())
            .unwrap();
        assert_eq!(applied, Some(DecisionState::Escalated));
        assert_eq!(decision.state, DecisionState::Escalated);
        assert_eq!(
            decision.state_history[0].reason,
            "Critical decision ignored for 7+ days"
        );
    }

    #[test]
    fn critical_within_seven_days_holds() {
        let monitor = LifecycleMonitor::new();
        let mut decision = make_decision(Signal::CashRunway, Severity::Critical, 6);
        let applied = monitor
            .reassess(&mut decision, &BTreeMap::new(), Utc::now())
            .unwrap();
        assert!(applied.is_none());
        assert_eq!(decision.state, DecisionState::Active);
    }

    #[test]
    fn medium_stale_after_thirty_one_days() {
        let monitor = LifecycleMonitor::new();
        let mut decision = make_decision(Signal::RiskConcentration, Severity::Medium, 31);
        let applied = monitor
            .reassess(&mut decision, &BTreeMap::new(), Utc::now())
            .unwrap();
        assert_eq!(applied, Some(DecisionState::Resolved));
        assert_eq!(
            decision.state_history[0].reason,
            "Medium severity stale after 30 days"
        );
    }

    #[test]
    fn improved_runway_resolves_first() {
        let monitor = LifecycleMonitor::new();
        // Critical and old enough to escalate, but the condition has
        // improved: the resolve rule wins because it is checked first.
        let mut decision = make_decision(Signal::CashRunway, Severity::Critical, 10);
        let metrics = BTreeMap::from([("runway_months".to_string(), 14.0)]);
        let applied = monitor.reassess(&mut decision, &metrics, Utc::now()).unwrap();
        assert_eq!(applied, Some(DecisionState::Resolved));
        assert_eq!(
            decision.state_history[0].reason,
            "Condition improved past threshold"
        );
    }

    #[test]
    fn concentration_back_below_threshold_resolves() {
        let monitor = LifecycleMonitor::new();
        let mut decision = make_decision(Signal::RiskConcentration, Severity::High, 1);
        let metrics = BTreeMap::from([("concentration_pct".to_string(), 35.0)]);
        let applied = monitor.reassess(&mut decision, &metrics, Utc::now()).unwrap();
        assert_eq!(applied, Some(DecisionState::Resolved));
    }

    #[test]
    fn forecast_back_on_plan_resolves() {
        let monitor = LifecycleMonitor::new();
        let mut decision = make_decision(Signal::ForecastMiss, Severity::Medium, 1);
        let metrics = BTreeMap::from([("variance_pct".to_string(), 2.0)]);
        let applied = monitor.reassess(&mut decision, &metrics, Utc::now()).unwrap();
        assert_eq!(applied, Some(DecisionState::Resolved));
    }

    #[test]
    fn covenant_back_in_compliance_resolves() {
        let monitor = LifecycleMonitor::new();
        let mut decision = make_decision(Signal::CovenantBreach, Severity::High, 1);
        decision
            .context
            .insert("threshold".to_string(), 5_000_000.0);
        decision.context.insert("delta".to_string(), -1_000_000.0);
        decision.metadata.insert(
            "breach_details".to_string(),
            json!({"metric_name": "EBITDA"}),
        );
        let metrics = BTreeMap::from([("EBITDA".to_string(), 5_500_000.0)]);
        let applied = monitor.reassess(&mut decision, &metrics, Utc::now()).unwrap();
        assert_eq!(applied, Some(DecisionState::Resolved));
    }

    #[test]
    fn missing_metrics_are_not_improvement() {
        let monitor = LifecycleMonitor::new();
        let mut decision = make_decision(Signal::CashRunway, Severity::High, 1);
        let applied = monitor
            .reassess(&mut decision, &BTreeMap::new(), Utc::now())
            .unwrap();
        assert!(applied.is_none());
    }

    #[test]
    fn terminal_decision_left_alone() {
        let monitor = LifecycleMonitor::new();
        let mut decision = make_decision(Signal::CashRunway, Severity::Critical, 40);
        decision
            .transition_to(DecisionState::Overridden, "manual override", Utc::now())
            .unwrap();
        let applied = monitor
            .reassess(&mut decision, &BTreeMap::new(), Utc::now())
            .unwrap();
        assert!(applied.is_none());
        assert_eq!(decision.state_history.len(), 1);
    }

    #[test]
    fn one_transition_per_reassessment() {
        let monitor = LifecycleMonitor::new();
        let mut decision = make_decision(Signal::ForecastMiss, Severity::Medium, 45);
        let metrics = BTreeMap::from([("variance_pct".to_string(), 5.0)]);
        // Both "improved" and "stale" match; only the first rule fires.
        monitor.reassess(&mut decision, &metrics, Utc::now()).unwrap();
        assert_eq!(decision.state_history.len(), 1);
        assert_eq!(
            decision.state_history[0].reason,
            "Condition improved past threshold"
        );
    }
}
