//! Crash Point Generation
//!
//! Maps one uniform sample to the round's hidden target multiplier.
//! Pure: same sample, same crash point.

use serde::{Serialize, Deserialize};

use crate::core::precision::round_to;
use crate::core::rng::RandomSource;

/// Configuration for crash point generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashConfig {
    /// Divisor applied to fair odds; must be > 1.
    pub house_edge: f64,
    /// Lowest crash point a round can resolve at.
    pub floor: f64,
    /// Take the square root of the sample first (raises the median).
    pub sqrt_bias: bool,
    /// Decimal places the crash point is rounded to.
    pub precision: u32,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            house_edge: 1.03,
            floor: 1.01,
            sqrt_bias: true,
            precision: 2,
        }
    }
}

/// Derives crash points from uniform samples.
#[derive(Clone, Debug)]
pub struct CrashPointGenerator {
    config: CrashConfig,
}

impl CrashPointGenerator {
    /// Create a generator.
    pub fn new(config: CrashConfig) -> Self {
        Self { config }
    }

    /// Generator configuration.
    pub fn config(&self) -> &CrashConfig {
        &self.config
    }

    /// Crash point for `sample` in `[0, 1)`.
    ///
    /// `1 / (1 - r) / house_edge`, rounded, never below the floor. Samples
    /// outside the unit interval are clamped; a sample of exactly 1 would
    /// divide by zero, so it is pulled just below.
    pub fn generate(&self, sample: f64) -> f64 {
        let sample = if sample.is_nan() {
            0.0
        } else {
            sample.clamp(0.0, 1.0 - f64::EPSILON)
        };
        let r = if self.config.sqrt_bias { sample.sqrt() } else { sample };
        // sqrt can round up to 1.0 for samples a hair below it
        let r = r.min(1.0 - f64::EPSILON);

        let raw = 1.0 / (1.0 - r) / self.config.house_edge;
        round_to(raw, self.config.precision).max(self.config.floor)
    }

    /// Draw a sample and generate.
    pub fn draw<R: RandomSource>(&self, rng: &mut R) -> f64 {
        self.generate(rng.next_f64())
    }

    /// Median crash point.
    ///
    /// `generate` is non-decreasing in the sample, so the median of the
    /// distribution is the crash point at sample 0.5.
    pub fn median(&self) -> f64 {
        self.generate(0.5)
    }

    /// The sample that yields `crash_point` (before rounding).
    ///
    /// Handy for replay tooling and for scripting rounds in tests.
    pub fn sample_for(&self, crash_point: f64) -> f64 {
        let r = (1.0 - 1.0 / (crash_point * self.config.house_edge)).max(0.0);
        if self.config.sqrt_bias { r * r } else { r }
    }
}

impl Default for CrashPointGenerator {
    fn default() -> Self {
        Self::new(CrashConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_sample_hits_floor() {
        let gen = CrashPointGenerator::default();
        // 1 / 1 / 1.03 = 0.97 -> floored
        assert_eq!(gen.generate(0.0), 1.01);
    }

    #[test]
    fn test_known_values() {
        let gen = CrashPointGenerator::default();
        // r = sqrt(0.25) = 0.5 -> 2 / 1.03 = 1.9417...
        assert_eq!(gen.generate(0.25), 1.94);
        // r = 0.9 -> 10 / 1.03 = 9.708...
        assert_eq!(gen.generate(0.81), 9.71);
    }

    #[test]
    fn test_unbiased_variant() {
        let gen = CrashPointGenerator::new(CrashConfig {
            sqrt_bias: false,
            floor: 1.0,
            ..CrashConfig::default()
        });
        assert_eq!(gen.generate(0.5), 1.94);
        assert_eq!(gen.generate(0.0), 1.0);
    }

    #[test]
    fn test_sample_near_one_is_finite() {
        let gen = CrashPointGenerator::default();
        let crash = gen.generate(1.0);
        assert!(crash.is_finite());
        assert!(crash > 1000.0);
    }

    #[test]
    fn test_sample_for_roundtrip() {
        let gen = CrashPointGenerator::default();
        for target in [1.2, 2.0, 3.41, 12.5] {
            assert_eq!(gen.generate(gen.sample_for(target)), target);
        }
    }

    #[test]
    fn test_median() {
        let gen = CrashPointGenerator::default();
        // sqrt(0.5) = 0.7071 -> 3.4142 / 1.03 = 3.3147
        assert_eq!(gen.median(), 3.31);
    }

    proptest! {
        #[test]
        fn prop_never_below_floor(sample in 0.0f64..1.0) {
            let gen = CrashPointGenerator::default();
            prop_assert!(gen.generate(sample) >= 1.01);
        }

        #[test]
        fn prop_monotonic_in_sample(a in 0.0f64..1.0, b in 0.0f64..1.0) {
            let gen = CrashPointGenerator::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(gen.generate(lo) <= gen.generate(hi));
        }

        #[test]
        fn prop_two_decimal_grid(sample in 0.0f64..0.999) {
            let gen = CrashPointGenerator::default();
            let crash = gen.generate(sample);
            prop_assert!(((crash * 100.0).round() - crash * 100.0).abs() < 1e-6);
        }
    }
}
