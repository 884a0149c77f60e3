//! Multiplier Curve
//!
//! Maps accumulated round progress to the current multiplier:
//!
//! ```text
//! progress += dt * rate
//! multiplier = e^(growth * progress)
//! ```
//!
//! The multiplier is recomputed from `progress` every tick rather than
//! compounded from the previous value, so tick jitter never accumulates
//! drift. `f(0) = 1` and `f` is strictly increasing for `growth > 0`.

use std::time::Duration;

use serde::{Serialize, Deserialize};

/// Configuration for the curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveConfig {
    /// Progress units accumulated per second of round time.
    pub rate: f64,
    /// Seconds for the curve to reach the median crash point.
    pub median_seconds: f64,
    /// Progress between recorded plot points.
    pub plot_step: f64,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            median_seconds: 8.0,
            plot_step: 0.05,
        }
    }
}

/// Per-round curve state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiplierCurve {
    progress: f64,
    rate: f64,
    growth: f64,
}

impl MultiplierCurve {
    /// Create a curve with explicit rate and growth constant.
    pub fn new(rate: f64, growth: f64) -> Self {
        Self {
            progress: 0.0,
            rate,
            growth,
        }
    }

    /// Create a curve that reaches `median_multiplier` after
    /// `config.median_seconds` of round time.
    pub fn calibrated(config: &CurveConfig, median_multiplier: f64) -> Self {
        let target = median_multiplier.max(1.0 + f64::EPSILON).ln();
        let growth = target / (config.median_seconds * config.rate);
        Self::new(config.rate, growth)
    }

    /// The curve function itself.
    #[inline]
    pub fn multiplier_at(&self, progress: f64) -> f64 {
        (self.growth * progress.max(0.0)).exp()
    }

    /// Advance by `dt` and return the new multiplier.
    pub fn advance(&mut self, dt: Duration) -> f64 {
        self.progress += dt.as_secs_f64() * self.rate;
        self.multiplier()
    }

    /// Multiplier at the current progress.
    #[inline]
    pub fn multiplier(&self) -> f64 {
        self.multiplier_at(self.progress)
    }

    /// Accumulated progress.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Round time needed to reach `multiplier` from the start.
    pub fn time_to_reach(&self, multiplier: f64) -> Duration {
        if multiplier <= 1.0 {
            return Duration::ZERO;
        }
        let progress = multiplier.ln() / self.growth;
        Duration::from_secs_f64(progress / self.rate)
    }

    /// Back to the start of a round.
    pub fn reset(&mut self) {
        self.progress = 0.0;
    }
}
