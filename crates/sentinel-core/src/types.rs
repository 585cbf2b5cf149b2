use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    CovenantBreach,
    CashRunway,
    ForecastMiss,
    RiskConcentration,
    VolatilitySpike,
    // Reserved for future processors.
    LiquidityEvent,
    CustomerConcentration,
}

impl Signal {
    pub fn all() -> &'static [Signal] {
        &[
            Signal::CovenantBreach,
            Signal::CashRunway,
            Signal::ForecastMiss,
            Signal::RiskConcentration,
            Signal::VolatilitySpike,
            Signal::LiquidityEvent,
            Signal::CustomerConcentration,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Signal::CovenantBreach => "covenant_breach",
            Signal::CashRunway => "cash_runway",
            Signal::ForecastMiss => "forecast_miss",
            Signal::RiskConcentration => "risk_concentration",
            Signal::VolatilitySpike => "volatility_spike",
            Signal::LiquidityEvent => "liquidity_event",
            Signal::CustomerConcentration => "customer_concentration",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Signal {
    type Err = crate::error::SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "covenant_breach" => Ok(Signal::CovenantBreach),
            "cash_runway" => Ok(Signal::CashRunway),
            "forecast_miss" => Ok(Signal::ForecastMiss),
            "risk_concentration" => Ok(Signal::RiskConcentration),
            "volatility_spike" => Ok(Signal::VolatilitySpike),
            "liquidity_event" => Ok(Signal::LiquidityEvent),
            "customer_concentration" => Ok(Signal::CustomerConcentration),
            _ => Err(crate::error::SentinelError::InvalidSignal(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::error::SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(crate::error::SentinelError::InvalidSeverity(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// DecisionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionState {
    Active,
    Acknowledged,
    Resolved,
    Overridden,
    Escalated,
}

impl DecisionState {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionState::Active => "active",
            DecisionState::Acknowledged => "acknowledged",
            DecisionState::Resolved => "resolved",
            DecisionState::Overridden => "overridden",
            DecisionState::Escalated => "escalated",
        }
    }

    /// Active is the only state the lifecycle monitor can move out of.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DecisionState::Resolved | DecisionState::Overridden | DecisionState::Escalated
        )
    }
}

impl fmt::Display for DecisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DecisionState {
    type Err = crate::error::SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DecisionState::Active),
            "acknowledged" => Ok(DecisionState::Acknowledged),
            "resolved" => Ok(DecisionState::Resolved),
            "overridden" => Ok(DecisionState::Overridden),
            "escalated" => Ok(DecisionState::Escalated),
            _ => Err(crate::error::SentinelError::InvalidState(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Notify,
    Action,
    Analysis,
    Meeting,
    Negotiate,
    Review,
    Hedge,
    Contact,
    Prepare,
    Schedule,
    Adjust,
    Update,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Notify => "notify",
            ActionKind::Action => "action",
            ActionKind::Analysis => "analysis",
            ActionKind::Meeting => "meeting",
            ActionKind::Negotiate => "negotiate",
            ActionKind::Review => "review",
            ActionKind::Hedge => "hedge",
            ActionKind::Contact => "contact",
            ActionKind::Prepare => "prepare",
            ActionKind::Schedule => "schedule",
            ActionKind::Adjust => "adjust",
            ActionKind::Update => "update",
        }
    }

    /// Upper-cased tag used when formatting a step into a decision's
    /// recommended-action line, e.g. "NOTIFY: ...".
    pub fn tag(self) -> String {
        self.as_str().to_uppercase()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn signal_roundtrip() {
        for signal in Signal::all() {
            let parsed = Signal::from_str(signal.as_str()).unwrap();
            assert_eq!(*signal, parsed);
        }
    }

    #[test]
    fn severity_roundtrip() {
        for sev in Severity::all() {
            let parsed = Severity::from_str(sev.as_str()).unwrap();
            assert_eq!(*sev, parsed);
        }
    }

    #[test]
    fn unknown_signal_rejected() {
        assert!(Signal::from_str("margin_call").is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(DecisionState::Resolved.is_terminal());
        assert!(DecisionState::Overridden.is_terminal());
        assert!(DecisionState::Escalated.is_terminal());
        assert!(!DecisionState::Active.is_terminal());
        assert!(!DecisionState::Acknowledged.is_terminal());
    }

    #[test]
    fn signal_serde_snake_case() {
        let json = serde_json::to_string(&Signal::CovenantBreach).unwrap();
        assert_eq!(json, "\"covenant_breach\"");
        let parsed: Signal = serde_json::from_str("\"risk_concentration\"").unwrap();
        assert_eq!(parsed, Signal::RiskConcentration);
    }

    #[test]
    fn action_kind_tag() {
        assert_eq!(ActionKind::Notify.tag(), "NOTIFY");
        assert_eq!(ActionKind::Hedge.tag(), "HEDGE");
    }
}
