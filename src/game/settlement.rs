//! Settlement
//!
//! Eject payouts, treasure bonuses and crash finalization.
//!
//! ```text
//! payout = stake * m                      (no marker passed, or m < highest passed)
//! payout = stake * m * (1 + bonus_rate)   (m >= highest passed marker)
//! ```
//!
//! Ejects are idempotent: a second eject on a settled wager is a no-op so
//! duplicate triggers within one tick can never pay twice.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::core::precision::{floor_to, MULTIPLIER_PLACES};
use crate::game::error::CommandError;
use crate::game::history::HistoryLedger;
use crate::game::state::{Balance, Round, RoundPhase, Seat, Table};

/// Outcome of one eject.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    /// Who ejected.
    pub seat: Seat,
    /// Stake that was riding.
    pub stake: f64,
    /// Multiplier locked in.
    pub multiplier: f64,
    /// `stake * multiplier`.
    pub base_payout: f64,
    /// Treasure bonus on top of the base payout.
    pub bonus: f64,
    /// Total credited (player) or notionally won (NPC).
    pub payout: f64,
    /// Triggered by an auto-eject threshold.
    pub auto: bool,
}

/// Post-crash summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrashReport {
    /// Round that crashed.
    pub round_id: u64,
    /// Revealed crash point.
    pub crash_point: f64,
    /// Player's stake lost, if they had an unsettled bet.
    pub forfeited: Option<f64>,
    /// Did the player have a bet at all?
    pub had_bet: bool,
    /// NPC name and eject multiplier (None = lost), in registration order.
    pub npc_outcomes: Vec<(String, Option<f64>)>,
}

/// Computes and applies payouts.
#[derive(Clone, Debug)]
pub struct SettlementEngine {
    bonus_rate: f64,
}

impl SettlementEngine {
    /// Create an engine with the given treasure bonus fraction.
    pub fn new(bonus_rate: f64) -> Self {
        Self { bonus_rate }
    }

    /// Bonus fraction.
    pub fn bonus_rate(&self) -> f64 {
        self.bonus_rate
    }

    /// `(base, bonus)` for a stake ejected at `multiplier`.
    pub fn payout(&self, stake: f64, multiplier: f64, highest_passed: Option<f64>) -> (f64, f64) {
        let base = stake * multiplier;
        let bonus = match highest_passed {
            Some(marker) if multiplier >= marker => base * self.bonus_rate,
            _ => 0.0,
        };
        (base, bonus)
    }

    /// Eject `seat` at the round's current multiplier.
    ///
    /// Returns `Ok(None)` if the wager was already settled.
    pub fn eject(
        &self,
        round: &Round,
        table: &mut Table,
        balance: &mut Balance,
        seat: Seat,
    ) -> Result<Option<Settlement>, CommandError> {
        let multiplier = floor_to(round.current_multiplier, MULTIPLIER_PLACES);
        self.settle(round, table, balance, seat, multiplier, false)
    }

    /// Settle every wager whose auto-eject threshold the curve has reached.
    ///
    /// The player is evaluated before NPCs, NPCs in registration order.
    /// Each wager settles at its own threshold.
    pub fn auto_eject_sweep(
        &self,
        round: &Round,
        table: &mut Table,
        balance: &mut Balance,
    ) -> Vec<Settlement> {
        let current = round.current_multiplier;
        let seats = std::iter::once(Seat::Player).chain((0..table.npcs.len()).map(Seat::Npc));

        let mut settled = Vec::new();
        for seat in seats {
            let threshold = match table.wager_mut(seat) {
                Some(w) if w.auto_eject_due(current) => w.auto_eject,
                _ => None,
            };
            let Some(threshold) = threshold else { continue };

            match self.settle(round, table, balance, seat, threshold, true) {
                Ok(Some(s)) => settled.push(s),
                Ok(None) => {}
                Err(e) => warn!(round = round.id, ?seat, "auto-eject skipped: {}", e),
            }
        }
        settled
    }

    fn settle(
        &self,
        round: &Round,
        table: &mut Table,
        balance: &mut Balance,
        seat: Seat,
        multiplier: f64,
        auto: bool,
    ) -> Result<Option<Settlement>, CommandError> {
        if round.phase != RoundPhase::InProgress {
            return Err(CommandError::RoundNotInProgress);
        }
        let wager = table.wager_mut(seat).ok_or(CommandError::NoActiveBet)?;
        if wager.ejected {
            return Ok(None);
        }

        let (base, bonus) = self.payout(wager.amount, multiplier, round.highest_passed_marker());
        let stake = wager.amount;
        wager.mark_ejected(multiplier);

        let payout = base + bonus;
        if seat == Seat::Player {
            balance.credit(payout);
        }
        debug!(round = round.id, ?seat, multiplier, payout, bonus, auto, "ejected");

        Ok(Some(Settlement {
            seat,
            stake,
            multiplier,
            base_payout: base,
            bonus,
            payout,
            auto,
        }))
    }

    /// Close a round at its crash point.
    ///
    /// Unsettled wagers forfeit. The crash point is recorded in history,
    /// stamped `recorded_at`. Returns `None` if the round was already
    /// finalized.
    pub fn finalize_crash(
        &self,
        round: &mut Round,
        table: &Table,
        history: &mut HistoryLedger,
        recorded_at: DateTime<Utc>,
    ) -> Option<CrashReport> {
        if round.phase == RoundPhase::Ended {
            warn!(round = round.id, "finalize_crash called twice; ignoring");
            return None;
        }

        let crash_point = round.crash_point();
        round.phase = RoundPhase::Ended;
        round.current_multiplier = round.current_multiplier.max(crash_point);
        history.record(round.id, crash_point, recorded_at);

        let forfeited = table.bet.as_ref().filter(|b| !b.ejected).map(|b| b.amount);
        let npc_outcomes = table
            .npcs
            .iter()
            .map(|n| (n.name.clone(), n.wager.eject_multiplier))
            .collect();

        Some(CrashReport {
            round_id: round.id,
            crash_point,
            forfeited,
            had_bet: table.bet.is_some(),
            npc_outcomes,
        })
    }
}
