use crate::types::Severity;

// Weights for the five sub-scores; together they reach exactly 100.
const W_MAGNITUDE: f64 = 0.35;
const W_RECURRENCE: f64 = 0.25;
const W_LIQUIDITY: f64 = 0.20;
const W_VOLATILITY: f64 = 0.15;
const W_TREND: f64 = 0.05;

/// Inputs to the generic severity scorer.
#[derive(Debug, Clone, Copy)]
pub struct SeverityInputs {
    /// Breach distance as a fraction of the threshold, e.g. 0.15 for 15%.
    pub breach_size: f64,
    /// How many times this condition has fired.
    pub recurrence_count: u32,
    /// Days since the same condition last fired.
    pub days_since_last: u32,
    /// Company liquidity context, in months of runway.
    pub cash_runway_months: f64,
    /// VIX-like 0-100 market volatility index.
    pub market_volatility_index: f64,
}

/// Compute a 0-100 severity score as a fixed weighted sum of five step
/// functions. The step boundaries are load-bearing: calibration
/// expectations depend on them, so they must not drift.
pub fn severity_score(inputs: &SeverityInputs) -> f64 {
    // Magnitude: <=10% -> 25, <=30% -> 60, <=50% -> 85, else 100.
    let raw_mag = if inputs.breach_size <= 0.10 {
        25.0
    } else if inputs.breach_size <= 0.30 {
        60.0
    } else if inputs.breach_size <= 0.50 {
        85.0
    } else {
        100.0
    };

    // Recurrence: 25 per occurrence, clamped at 4.
    let raw_recur = f64::from(inputs.recurrence_count.min(4)) * 25.0;

    // Liquidity: >=12mo -> 0, >=6mo -> 40, >=3mo -> 70, else 100.
    let raw_liq = if inputs.cash_runway_months >= 12.0 {
        0.0
    } else if inputs.cash_runway_months >= 6.0 {
        40.0
    } else if inputs.cash_runway_months >= 3.0 {
        70.0
    } else {
        100.0
    };

    // Volatility: <20 -> 0, <35 -> 50, else 100.
    let raw_vol = if inputs.market_volatility_index < 20.0 {
        0.0
    } else if inputs.market_volatility_index < 35.0 {
        50.0
    } else {
        100.0
    };

    // Trend: a recent repeat is a bad trend.
    let raw_trend = if inputs.days_since_last < 90 && inputs.recurrence_count > 1 {
        100.0
    } else {
        0.0
    };

    let total = raw_mag * W_MAGNITUDE
        + raw_recur * W_RECURRENCE
        + raw_liq * W_LIQUIDITY
        + raw_vol * W_VOLATILITY
        + raw_trend * W_TREND;

    ((total * 100.0).round() / 100.0).min(100.0)
}

/// Convert a 0-100 score to a severity level.
pub fn bucket_severity(score: f64) -> Severity {
    if score < 30.0 {
        Severity::Low
    } else if score < 50.0 {
        Severity::Medium
    } else if score < 80.0 {
        Severity::High
    } else {
        Severity::Critical
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> SeverityInputs {
        SeverityInputs {
            breach_size: 0.05,
            recurrence_count: 1,
            days_since_last: 999,
            cash_runway_months: 12.0,
            market_volatility_index: 15.0,
        }
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(bucket_severity(0.0), Severity::Low);
        assert_eq!(bucket_severity(29.99), Severity::Low);
        assert_eq!(bucket_severity(30.0), Severity::Medium);
        assert_eq!(bucket_severity(49.99), Severity::Medium);
        assert_eq!(bucket_severity(50.0), Severity::High);
        assert_eq!(bucket_severity(79.99), Severity::High);
        assert_eq!(bucket_severity(80.0), Severity::Critical);
        assert_eq!(bucket_severity(100.0), Severity::Critical);
    }

    #[test]
    fn bucket_is_monotonic() {
        let mut last = Severity::Low;
        for s in 0..=100 {
            let b = bucket_severity(f64::from(s));
            assert!(b >= last);
            last = b;
        }
    }

    #[test]
    fn quiet_inputs_score_low() {
        // 25*0.35 + 25*0.25 = 15.0
        let score = severity_score(&base_inputs());
        assert!((score - 15.0).abs() < 1e-9);
        assert_eq!(bucket_severity(score), Severity::Low);
    }

    #[test]
    fn worked_example_medium() {
        // 20% breach, second occurrence, 5 months runway, calm market:
        // 0.35*60 + 0.25*50 + 0.20*70 + 0.15*0 + 0.05*0 = 47.5
        let inputs = SeverityInputs {
            breach_size: 0.20,
            recurrence_count: 2,
            days_since_last: 999,
            cash_runway_months: 5.0,
            market_volatility_index: 15.0,
        };
        let score = severity_score(&inputs);
        assert!((score - 47.5).abs() < 1e-9);
        assert_eq!(bucket_severity(score), Severity::Medium);
    }

    #[test]
    fn elevated_volatility_lifts_to_high() {
        // Same as the medium case but volatility index 25 adds
        // 0.15*50 = 7.5, landing at 55.0.
        let inputs = SeverityInputs {
            breach_size: 0.20,
            recurrence_count: 2,
            days_since_last: 999,
            cash_runway_months: 5.0,
            market_volatility_index: 25.0,
        };
        let score = severity_score(&inputs);
        assert!((score - 55.0).abs() < 1e-9);
        assert_eq!(bucket_severity(score), Severity::High);
    }

    #[test]
    fn worst_case_caps_at_100() {
        let inputs = SeverityInputs {
            breach_size: 0.90,
            recurrence_count: 10,
            days_since_last: 5,
            cash_runway_months: 1.0,
            market_volatility_index: 60.0,
        };
        let score = severity_score(&inputs);
        assert!((score - 100.0).abs() < 1e-9);
        assert_eq!(bucket_severity(score), Severity::Critical);
    }

    #[test]
    fn trend_requires_recurrence_and_recency() {
        let mut inputs = base_inputs();
        inputs.days_since_last = 30;
        inputs.recurrence_count = 1;
        // Recent but first occurrence: no trend contribution.
        let without = severity_score(&inputs);
        inputs.recurrence_count = 2;
        let with = severity_score(&inputs);
        // Jump covers recurrence (25 -> 50 raw) plus trend (0 -> 100 raw).
        assert!((with - without - (25.0 * 0.25 + 100.0 * 0.05)).abs() < 1e-9);
    }

    #[test]
    fn magnitude_step_edges() {
        let mut inputs = base_inputs();
        for (size, raw) in [(0.10, 25.0), (0.30, 60.0), (0.50, 85.0), (0.51, 100.0)] {
            inputs.breach_size = size;
            let expected = raw * 0.35 + 25.0 * 0.25;
            assert!((severity_score(&inputs) - expected).abs() < 1e-9);
        }
    }
}
