use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ThresholdSet
// ---------------------------------------------------------------------------

/// Tunable decision boundaries. Read-only input to the signal
/// processors; only the calibration harness adjusts them, and only
/// between epochs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    /// Concentration percentage above which the risk processor fires.
    #[serde(default = "default_concentration")]
    pub concentration_pct: f64,
    /// Forecast-variance fraction for the warning tier.
    #[serde(default = "default_forecast_warning")]
    pub forecast_warning: f64,
    /// Forecast-variance fraction for the critical tier.
    #[serde(default = "default_forecast_critical")]
    pub forecast_critical: f64,
    /// Runway months under which liquidity is critical.
    #[serde(default = "default_liquidity_runway")]
    pub liquidity_runway_months: f64,
    /// Current/historical volatility ratio that counts as a spike.
    #[serde(default = "default_spike_ratio")]
    pub volatility_spike_ratio: f64,
}

fn default_concentration() -> f64 {
    40.0
}
fn default_forecast_warning() -> f64 {
    0.10
}
fn default_forecast_critical() -> f64 {
    0.20
}
fn default_liquidity_runway() -> f64 {
    3.0
}
fn default_spike_ratio() -> f64 {
    2.0
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            concentration_pct: default_concentration(),
            forecast_warning: default_forecast_warning(),
            forecast_critical: default_forecast_critical(),
            liquidity_runway_months: default_liquidity_runway(),
            volatility_spike_ratio: default_spike_ratio(),
        }
    }
}

impl ThresholdSet {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Fixed recalibration applied when the forecast-miss signal shows
    /// an excessive false-positive rate: double both cutoffs.
    pub fn tighten_forecast(&mut self) {
        self.forecast_warning = 0.20;
        self.forecast_critical = 0.30;
    }

    /// Fixed recalibration for an over-firing concentration signal.
    pub fn tighten_concentration(&mut self) {
        self.concentration_pct = 50.0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
