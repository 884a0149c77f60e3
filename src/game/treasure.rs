//! Treasure Markers
//!
//! Per-round bonus thresholds. Each marker is a base multiplier jittered
//! uniformly within `±jitter / 2`, rounded to two places, sorted ascending.
//! Markers are drawn independently of the crash point.

use serde::{Serialize, Deserialize};

use crate::core::precision::{round_to, MULTIPLIER_PLACES};
use crate::core::rng::RandomSource;

/// One marker definition.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    /// Centre multiplier.
    pub base: f64,
    /// Full width of the uniform jitter window.
    pub jitter: f64,
}

/// Configuration for treasure markers and the bonus they unlock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreasureConfig {
    /// Marker definitions, in any order.
    pub markers: Vec<MarkerSpec>,
    /// Bonus fraction added to a payout that qualifies (0.25 = +25%).
    pub bonus_rate: f64,
}

impl Default for TreasureConfig {
    fn default() -> Self {
        Self {
            markers: vec![
                MarkerSpec { base: 3.0, jitter: 0.5 },
                MarkerSpec { base: 5.0, jitter: 1.0 },
                MarkerSpec { base: 10.0, jitter: 2.0 },
            ],
            bonus_rate: 0.25,
        }
    }
}

/// Draws the markers for a round.
#[derive(Clone, Debug, Default)]
pub struct TreasureMarkerGenerator {
    config: TreasureConfig,
}

impl TreasureMarkerGenerator {
    /// Create a generator.
    pub fn new(config: TreasureConfig) -> Self {
        Self { config }
    }

    /// Bonus fraction for qualifying ejects.
    pub fn bonus_rate(&self) -> f64 {
        self.config.bonus_rate
    }

    /// Draw one marker per definition, sorted ascending.
    ///
    /// Consumes exactly one sample per definition, in definition order.
    pub fn generate<R: RandomSource>(&self, rng: &mut R) -> Vec<f64> {
        let mut markers: Vec<f64> = self
            .config
            .markers
            .iter()
            .map(|spec| {
                let offset = (rng.next_f64() - 0.5) * spec.jitter;
                round_to(spec.base + offset, MULTIPLIER_PLACES)
            })
            .collect();

        markers.sort_by(f64::total_cmp);
        markers
    }
}
