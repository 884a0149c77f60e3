//! Engine Configuration
//!
//! JSON-loadable settings. Every field has a default so a partial file (or
//! no file) is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::game::state::Variant;
use crate::game::tick::GameConfig;

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path given.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// File is not valid JSON for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// Value must be strictly positive.
    #[error("{field} must be > 0 (got {value})")]
    NonPositive {
        /// Offending field.
        field: &'static str,
        /// Value found.
        value: f64,
    },
    /// Value outside its allowed range.
    #[error("{field} out of range: {reason}")]
    OutOfRange {
        /// Offending field.
        field: &'static str,
        /// What is wrong.
        reason: String,
    },
}

/// When betting closes and the round launches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// Placing a bet (or skipping) closes betting; the curve starts
    /// `delay_ms` later.
    OnBet {
        /// Launch delay.
        delay_ms: u64,
    },
    /// Betting closes `window_ms` after it opens, bet or no bet.
    Timed {
        /// Betting window.
        window_ms: u64,
        /// Launch delay.
        delay_ms: u64,
    },
}

impl LaunchMode {
    /// Default for a presentation flow: chart launches half a second after
    /// the bet, terminal runs a five second pre-dive.
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Chart => LaunchMode::OnBet { delay_ms: 500 },
            Variant::Terminal => LaunchMode::OnBet { delay_ms: 5000 },
        }
    }

    /// Time between closing bets and starting the curve.
    pub fn launch_delay(self) -> Duration {
        match self {
            LaunchMode::OnBet { delay_ms } | LaunchMode::Timed { delay_ms, .. } => {
                Duration::from_millis(delay_ms)
            }
        }
    }

    /// Betting window, if timed.
    pub fn betting_window(self) -> Option<Duration> {
        match self {
            LaunchMode::OnBet { .. } => None,
            LaunchMode::Timed { window_ms, .. } => Some(Duration::from_millis(window_ms)),
        }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Starting credits.
    pub initial_balance: f64,
    /// RNG seed; random when absent.
    pub seed: Option<u64>,
    /// Presentation flow.
    pub variant: Variant,
    /// Launch trigger; defaults from the variant when absent.
    pub launch: Option<LaunchMode>,
    /// Delay between crash and reopening bets.
    pub post_round_delay_ms: u64,
    /// Curve tick period.
    pub tick_interval_ms: u64,
    /// Curve time between round-update events.
    pub round_update_interval_ms: u64,
    /// Feed channel capacity.
    pub feed_capacity: usize,
    /// Round rules.
    #[serde(flatten)]
    pub game: GameConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_balance: 1000.0,
            seed: None,
            variant: Variant::Chart,
            launch: None,
            post_round_delay_ms: 4000,
            tick_interval_ms: 50,
            round_update_interval_ms: 1000,
            feed_capacity: 1024,
            game: GameConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Parse and validate JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Effective launch mode.
    pub fn launch_mode(&self) -> LaunchMode {
        self.launch.unwrap_or_else(|| LaunchMode::for_variant(self.variant))
    }

    /// Curve tick period.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Curve time between round updates.
    pub fn round_update_interval(&self) -> Duration {
        Duration::from_millis(self.round_update_interval_ms)
    }

    /// Delay between crash and the next betting phase.
    pub fn post_round_delay(&self) -> Duration {
        Duration::from_millis(self.post_round_delay_ms)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("initial_balance", self.initial_balance)?;
        ensure_positive("tick_interval_ms", self.tick_interval_ms as f64)?;
        ensure_positive("round_update_interval_ms", self.round_update_interval_ms as f64)?;
        ensure_positive("feed_capacity", self.feed_capacity as f64)?;
        ensure_positive("history_capacity", self.game.history_capacity as f64)?;

        let crash = &self.game.crash;
        if crash.house_edge.is_nan() || crash.house_edge <= 1.0 {
            return Err(out_of_range("house_edge", format!("{} must exceed 1.0", crash.house_edge)));
        }
        if !crash.floor.is_finite() || crash.floor < 1.0 {
            return Err(out_of_range("floor", format!("{} is not a finite value >= 1.0", crash.floor)));
        }
        if crash.precision > MAX_PRECISION {
            return Err(out_of_range(
                "precision",
                format!("{} exceeds {} decimal places", crash.precision, MAX_PRECISION),
            ));
        }

        ensure_positive("curve.rate", self.game.curve.rate)?;
        ensure_positive("curve.median_seconds", self.game.curve.median_seconds)?;
        ensure_positive("curve.plot_step", self.game.curve.plot_step)?;

        let treasure = &self.game.treasure;
        if treasure.bonus_rate < 0.0 {
            return Err(out_of_range("bonus_rate", "must not be negative".into()));
        }
        for marker in &treasure.markers {
            if marker.base - marker.jitter / 2.0 <= 1.0 || marker.jitter < 0.0 {
                return Err(out_of_range(
                    "markers",
                    format!("{} ± {} can fall to or below 1.0", marker.base, marker.jitter / 2.0),
                ));
            }
        }

        let npc = &self.game.npc;
        if npc.min_count > npc.max_count {
            return Err(out_of_range("npc.min_count", "exceeds max_count".into()));
        }
        if !(0.0..=1.0).contains(&npc.auto_eject_probability) {
            return Err(out_of_range("npc.auto_eject_probability", "must be within [0, 1]".into()));
        }
        if npc.auto_eject_min <= 1.0 || npc.auto_eject_max <= npc.auto_eject_min {
            return Err(out_of_range(
                "npc.auto_eject_min",
                "range must be non-empty and above 1.0".into(),
            ));
        }
        Ok(())
    }
}

/// Most decimal places a crash point may be rounded to.
const MAX_PRECISION: u32 = 8;

fn ensure_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

fn out_of_range(field: &'static str, reason: String) -> ConfigError {
    ConfigError::OutOfRange { field, reason }
}
