//! NPC Simulation
//!
//! Ambient bot participants. Rosters are drawn once per round from the
//! engine RNG; NPCs never touch the player's balance, the crash point or
//! the treasure markers.

use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::core::precision::{floor_to, MULTIPLIER_PLACES};
use crate::core::rng::RandomSource;
use crate::game::state::{Npc, Wager};

/// Configuration for NPC rosters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcConfig {
    /// Identity pool; each round picks distinct names from it.
    pub names: Vec<String>,
    /// Fewest NPCs per round.
    pub min_count: u32,
    /// Most NPCs per round.
    pub max_count: u32,
    /// Bet size used when the player is observing.
    pub default_player_bet: f64,
    /// NPC stakes fall in `[bet / 2, bet / 2 + bet * bet_spread)`.
    pub bet_spread: f64,
    /// Chance an NPC registers an auto-eject.
    pub auto_eject_probability: f64,
    /// Lower bound of the auto-eject threshold.
    pub auto_eject_min: f64,
    /// Upper bound (exclusive) of the auto-eject threshold.
    pub auto_eject_max: f64,
    /// Fraction of the launch window over which announcements are spread.
    pub announce_spread: f64,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            names: ["Walrus", "Orca", "Narwhal", "Beluga", "Dolphin", "Seal", "Marlin"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            min_count: 2,
            max_count: 4,
            default_player_bet: 50.0,
            bet_spread: 4.0,
            auto_eject_probability: 0.6,
            auto_eject_min: 1.5,
            auto_eject_max: 6.5,
            announce_spread: 0.8,
        }
    }
}

/// Draws NPC rosters.
#[derive(Clone, Debug, Default)]
pub struct NpcSimulator {
    config: NpcConfig,
}

impl NpcSimulator {
    /// Create a simulator.
    pub fn new(config: NpcConfig) -> Self {
        Self { config }
    }

    /// Draw this round's roster, in registration order.
    ///
    /// Stakes scale with `player_bet` (or the configured default when the
    /// player is observing).
    pub fn generate<R: RandomSource>(&self, rng: &mut R, player_bet: Option<f64>) -> Vec<Npc> {
        let pool = self.config.names.len() as u32;
        let max = self.config.max_count.min(pool);
        let min = self.config.min_count.min(max);
        let count = rng.next_int_range(min, max) as usize;

        let mut names = self.config.names.clone();
        rng.shuffle(&mut names);

        let base = player_bet.unwrap_or(self.config.default_player_bet).max(1.0);

        names
            .into_iter()
            .take(count)
            .map(|name| {
                let amount = (rng.next_f64() * base * self.config.bet_spread + base / 2.0)
                    .floor()
                    .max(1.0);
                let auto_eject = rng
                    .next_bool(self.config.auto_eject_probability)
                    .then(|| {
                        let t = rng.next_f64_range(self.config.auto_eject_min, self.config.auto_eject_max);
                        floor_to(t, MULTIPLIER_PLACES)
                    });
                Npc {
                    name,
                    wager: Wager::new(amount, auto_eject),
                }
            })
            .collect()
    }

    /// Delay before an NPC's "readies" announcement within a launch window.
    pub fn announce_delay<R: RandomSource>(&self, rng: &mut R, window: Duration) -> Duration {
        window.mul_f64(rng.next_f64() * self.config.announce_spread.clamp(0.0, 1.0))
    }
}
