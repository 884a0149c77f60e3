//! Game State Definitions
//!
//! Round, wager, NPC and balance types. The round state machine is the only
//! writer; everything else reads.

use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::core::hash::{Commitment, Reveal, commit_crash_point};
use crate::game::curve::MultiplierCurve;
use crate::game::error::CommandError;
use crate::game::history::HistoryLedger;

// =============================================================================
// PHASE
// =============================================================================

/// Which front-end flow the engine is presenting.
///
/// Both flows share one state machine; they differ in phase labels and in
/// the default delay between closing bets and starting the curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Graphical curve view.
    #[default]
    Chart,
    /// Command-driven terminal view.
    Terminal,
}

/// Current phase of the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Accepting bets; no round exists yet.
    #[default]
    Betting,
    /// Betting closed, round generated, curve not started.
    Launching,
    /// Curve advancing.
    InProgress,
    /// Crashed and settled; waiting out the post-round delay.
    Ended,
}

impl RoundPhase {
    /// Phase name as the given flow presents it.
    pub fn label(self, variant: Variant) -> &'static str {
        match (variant, self) {
            (Variant::Chart, RoundPhase::Betting) => "BETTING",
            (Variant::Chart, RoundPhase::Launching) => "LAUNCHING",
            (Variant::Chart, RoundPhase::InProgress) => "IN_PROGRESS",
            (Variant::Chart, RoundPhase::Ended) => "ENDED",
            (Variant::Terminal, RoundPhase::Betting) => "AWAITING_COMMAND",
            (Variant::Terminal, RoundPhase::Launching) => "PRE_DIVE",
            (Variant::Terminal, RoundPhase::InProgress) => "DIVING",
            (Variant::Terminal, RoundPhase::Ended) => "POST_DIVE",
        }
    }
}

// =============================================================================
// WAGERS
// =============================================================================

/// Stake plus ejection state, shared by the player's bet and NPC bets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    /// Stake (> 0).
    pub amount: f64,
    /// Threshold at which to eject automatically (> 1.0).
    pub auto_eject: Option<f64>,
    /// Has this wager been settled by an eject?
    pub ejected: bool,
    /// Multiplier locked in at eject. Set once.
    pub eject_multiplier: Option<f64>,
}

impl Wager {
    /// Create an unsettled wager.
    pub fn new(amount: f64, auto_eject: Option<f64>) -> Self {
        Self {
            amount,
            auto_eject,
            ejected: false,
            eject_multiplier: None,
        }
    }

    /// Is the auto-eject threshold reached at `multiplier`?
    pub fn auto_eject_due(&self, multiplier: f64) -> bool {
        !self.ejected && self.auto_eject.is_some_and(|t| multiplier >= t)
    }

    /// Lock in `multiplier`. Returns false if already ejected.
    pub(crate) fn mark_ejected(&mut self, multiplier: f64) -> bool {
        if self.ejected {
            return false;
        }
        self.ejected = true;
        self.eject_multiplier = Some(multiplier);
        true
    }
}

/// The player's bet.
pub type Bet = Wager;

/// A simulated participant. Cosmetic only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    /// Display name.
    pub name: String,
    /// The NPC's wager.
    pub wager: Wager,
}

/// Identifies who a settlement belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Seat {
    /// The human participant.
    Player,
    /// NPC by registration index.
    Npc(usize),
}

/// Player bet and NPC roster for the current round.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Player's bet, if any.
    pub bet: Option<Bet>,
    /// NPCs in registration order.
    pub npcs: Vec<Npc>,
}

impl Table {
    /// Drop the bet and roster.
    pub fn clear(&mut self) {
        self.bet = None;
        self.npcs.clear();
    }

    /// Wager at `seat`.
    pub fn wager_mut(&mut self, seat: Seat) -> Option<&mut Wager> {
        match seat {
            Seat::Player => self.bet.as_mut(),
            Seat::Npc(i) => self.npcs.get_mut(i).map(|n| &mut n.wager),
        }
    }
}

// =============================================================================
// BALANCE
// =============================================================================

/// The player's credit balance. Never negative.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Balance(f64);

impl Balance {
    /// Create a balance; negative input is clamped to zero.
    pub fn new(amount: f64) -> Self {
        Self(amount.max(0.0))
    }

    /// Current credits.
    #[inline]
    pub fn amount(&self) -> f64 {
        self.0
    }

    /// Remove `amount`, refusing to go negative.
    pub fn debit(&mut self, amount: f64) -> Result<(), CommandError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(CommandError::InvalidBetAmount);
        }
        if amount > self.0 {
            return Err(CommandError::InsufficientBalance {
                requested: amount,
                available: self.0,
            });
        }
        self.0 -= amount;
        Ok(())
    }

    /// Add a non-negative amount.
    pub fn credit(&mut self, amount: f64) {
        if amount > 0.0 && amount.is_finite() {
            self.0 += amount;
        }
    }
}

// =============================================================================
// ROUND
// =============================================================================

/// One sample of the curve for charting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    /// Curve progress.
    pub progress: f64,
    /// Multiplier at that progress.
    pub multiplier: f64,
}

/// One cycle of curve advance, crash and settlement.
///
/// Not serializable: the crash point must not leave the engine before the
/// round ends. Presentation goes through the feed snapshot instead.
#[derive(Clone, Debug)]
pub struct Round {
    /// Monotonic round identifier.
    pub id: u64,
    /// Launching, InProgress or Ended.
    pub phase: RoundPhase,
    /// Hidden target; fixed at creation.
    crash_point: f64,
    /// Salt for the published commitment.
    salt: u64,
    /// Published commitment to the crash point.
    pub commitment: Commitment,
    /// Bonus thresholds, ascending.
    pub treasure_markers: Vec<f64>,
    /// Markers reached so far, ascending.
    pub passed_markers: Vec<f64>,
    /// Sampled curve, oldest first.
    pub plot_points: Vec<PlotPoint>,
    /// Curve state.
    pub curve: MultiplierCurve,
    /// Curve time elapsed.
    pub elapsed: Duration,
    /// Current multiplier; non-decreasing while in progress.
    pub current_multiplier: f64,
    /// Scheduler clock when the round was created.
    pub started_at: Duration,
    /// Ticks processed.
    pub tick: u32,
}

impl Round {
    /// Create a round in the `Launching` phase.
    pub fn new(
        id: u64,
        crash_point: f64,
        salt: u64,
        treasure_markers: Vec<f64>,
        curve: MultiplierCurve,
        started_at: Duration,
    ) -> Self {
        Self {
            id,
            phase: RoundPhase::Launching,
            crash_point,
            salt,
            commitment: commit_crash_point(id, crash_point, salt),
            treasure_markers,
            passed_markers: Vec::new(),
            plot_points: Vec::new(),
            curve,
            elapsed: Duration::ZERO,
            current_multiplier: 1.0,
            started_at,
            tick: 0,
        }
    }

    /// The crash point, only once the round has ended.
    pub fn revealed_crash_point(&self) -> Option<f64> {
        (self.phase == RoundPhase::Ended).then_some(self.crash_point)
    }

    /// Commitment opening, only once the round has ended.
    pub fn reveal(&self) -> Option<Reveal> {
        (self.phase == RoundPhase::Ended).then_some(Reveal {
            round_id: self.id,
            crash_point: self.crash_point,
            salt: self.salt,
        })
    }

    /// Engine-internal access to the hidden target.
    pub(crate) fn crash_point(&self) -> f64 {
        self.crash_point
    }

    /// Highest marker passed so far.
    pub fn highest_passed_marker(&self) -> Option<f64> {
        self.passed_markers.last().copied()
    }

    /// Append the current curve position once progress has moved more
    /// than `step` past the last point. Returns true if a point was added.
    pub fn record_plot(&mut self, step: f64) -> bool {
        let progress = self.curve.progress();
        let due = self
            .plot_points
            .last()
            .map_or(true, |last| progress - last.progress > step);
        if due {
            self.plot_points.push(PlotPoint {
                progress,
                multiplier: self.current_multiplier,
            });
        }
        due
    }

    /// Record every marker at or below `multiplier` not yet passed.
    /// Returns the newly passed markers.
    pub fn pass_markers(&mut self, multiplier: f64) -> Vec<f64> {
        let newly: Vec<f64> = self
            .treasure_markers
            .iter()
            .copied()
            .filter(|m| *m <= multiplier && !self.passed_markers.contains(m))
            .collect();
        self.passed_markers.extend(newly.iter().copied());
        newly
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// Everything the engine mutates across rounds.
#[derive(Clone, Debug)]
pub struct GameState {
    /// Player credits.
    pub balance: Balance,
    /// Bet and NPC roster.
    pub table: Table,
    /// Current round (Launching, InProgress or Ended).
    pub round: Option<Round>,
    /// Recent crash points.
    pub history: HistoryLedger,
    /// Id for the next round created.
    pub next_round_id: u64,
}

impl GameState {
    /// Fresh state with a starting balance.
    pub fn new(initial_balance: f64, history_capacity: usize) -> Self {
        Self {
            balance: Balance::new(initial_balance),
            table: Table::default(),
            round: None,
            history: HistoryLedger::new(history_capacity),
            next_round_id: 1,
        }
    }

    /// Id of the current round, if any.
    pub fn round_id(&self) -> Option<u64> {
        self.round.as_ref().map(|r| r.id)
    }

    /// Discard the finished round and its bets.
    pub fn clear_round(&mut self) {
        self.round = None;
        self.table.clear();
    }
}
