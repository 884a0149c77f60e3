//! Authoritative Round Tick
//!
//! Round creation and the per-tick sequence:
//!
//! 1. advance the curve
//! 2. crash check (settles and ends the round), else sample the plot
//! 3. record treasure markers reached
//! 4. auto-eject sweep (player first, then NPCs in order)
//!
//! Checking the crash before the sweep keeps every eject strictly below the
//! crash point.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{error, info, warn};

use crate::core::rng::RandomSource;
use crate::game::crash_point::{CrashConfig, CrashPointGenerator};
use crate::game::curve::{CurveConfig, MultiplierCurve};
use crate::game::events::{EventKind, GameEvent, GameEventData};
use crate::game::history::HISTORY_CAPACITY;
use crate::game::npc::{NpcConfig, NpcSimulator};
use crate::game::settlement::{CrashReport, Settlement, SettlementEngine};
use crate::game::state::{GameState, Round, RoundPhase, Seat, Table};
use crate::game::treasure::{TreasureConfig, TreasureMarkerGenerator};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Ejects settled this tick
    pub settlements: Vec<Settlement>,
    /// Set when the round crashed this tick
    pub crashed: Option<CrashReport>,
}

/// Configuration for round generation and settlement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Crash point distribution
    pub crash: CrashConfig,
    /// Curve shape
    pub curve: CurveConfig,
    /// Treasure markers and bonus
    pub treasure: TreasureConfig,
    /// NPC rosters
    pub npc: NpcConfig,
    /// History entries kept
    pub history_capacity: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            crash: CrashConfig::default(),
            curve: CurveConfig::default(),
            treasure: TreasureConfig::default(),
            npc: NpcConfig::default(),
            history_capacity: HISTORY_CAPACITY,
        }
    }
}

/// Generators and settlement built from a [`GameConfig`].
#[derive(Clone, Debug)]
pub struct RoundRules {
    /// Crash point generator
    pub crash: CrashPointGenerator,
    /// Treasure marker generator
    pub treasure: TreasureMarkerGenerator,
    /// NPC roster generator
    pub npc: NpcSimulator,
    /// Payout rules
    pub settlement: SettlementEngine,
    /// Curve template; each round gets a fresh copy
    pub curve: MultiplierCurve,
    /// Progress between plot points
    pub plot_step: f64,
}

impl RoundRules {
    /// Build from configuration. The curve is calibrated against the
    /// generator's median crash point.
    pub fn new(config: &GameConfig) -> Self {
        let crash = CrashPointGenerator::new(config.crash.clone());
        let curve = MultiplierCurve::calibrated(&config.curve, crash.median());
        Self {
            treasure: TreasureMarkerGenerator::new(config.treasure.clone()),
            npc: NpcSimulator::new(config.npc.clone()),
            settlement: SettlementEngine::new(config.treasure.bonus_rate),
            crash,
            curve,
            plot_step: config.curve.plot_step,
        }
    }
}

/// Close betting and generate the next round.
///
/// Draw order is fixed: crash point, markers, NPC roster, commitment salt.
/// The round starts in `Launching`.
pub fn create_round<R: RandomSource>(
    state: &mut GameState,
    rules: &RoundRules,
    rng: &mut R,
    now: Duration,
) -> u64 {
    let id = state.next_round_id;
    state.next_round_id += 1;

    let crash_point = rules.crash.draw(rng);
    let markers = rules.treasure.generate(rng);
    let player_bet = state.table.bet.as_ref().map(|b| b.amount);
    state.table.npcs = rules.npc.generate(rng, player_bet);
    let salt = (rng.next_f64() * u64::MAX as f64) as u64;

    let round = Round::new(id, crash_point, salt, markers, rules.curve.clone(), now);
    info!(
        round = id,
        commitment = %round.commitment.to_hex(),
        npcs = state.table.npcs.len(),
        "round created"
    );
    state.round = Some(round);
    id
}

/// Run one tick of `dt` curve time. `now` stamps the history entry if the
/// round crashes.
pub fn tick(
    state: &mut GameState,
    rules: &RoundRules,
    dt: Duration,
    now: DateTime<Utc>,
) -> TickResult {
    let mut result = TickResult::default();

    let GameState { round, table, balance, history, .. } = state;
    let Some(round) = round.as_mut() else {
        error!("tick fired with no active round; skipping");
        return result;
    };
    if round.phase != RoundPhase::InProgress {
        warn!(round = round.id, phase = ?round.phase, "tick outside InProgress; skipping");
        return result;
    }

    // 1. Advance curve
    round.tick += 1;
    round.elapsed += dt;
    let candidate = round.curve.advance(dt).max(round.current_multiplier);

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(round = round.id, tick = round.tick, multiplier = candidate, "tick");

    // 2. Crash check
    if candidate >= round.crash_point() {
        if let Some(report) = rules.settlement.finalize_crash(round, table, history, now) {
            info!(round = report.round_id, crash_point = report.crash_point, "round crashed");
            result.events.extend(crash_events(round, &report));
            result.crashed = Some(report);
        }
        return result;
    }
    round.current_multiplier = candidate;
    round.record_plot(rules.plot_step);

    // 3. Treasure markers
    for marker in round.pass_markers(candidate) {
        result.events.push(GameEvent::marker_passed(round.id, marker));
    }

    // 4. Auto-eject sweep
    let settled = rules.settlement.auto_eject_sweep(round, table, balance);
    for s in &settled {
        result.events.push(ejected_event(round.id, table, s));
    }
    result.settlements = settled;

    result
}

/// Feed event for a settlement.
pub fn ejected_event(round_id: u64, table: &Table, s: &Settlement) -> GameEvent {
    let name = match s.seat {
        Seat::Player => "You".to_string(),
        Seat::Npc(i) => table.npcs.get(i).map(|n| n.name.clone()).unwrap_or_default(),
    };
    GameEvent::ejected(round_id, s.seat, name, s.multiplier, s.payout, s.bonus, s.auto)
}

/// Post-round report events.
fn crash_events(round: &Round, report: &CrashReport) -> Vec<GameEvent> {
    let id = Some(report.round_id);
    let salt = round.reveal().map(|r| r.salt).unwrap_or_default();

    let mut events = vec![GameEvent::crashed(report.round_id, report.crash_point, salt)];

    if let Some(amount) = report.forfeited {
        events.push(GameEvent::new(EventKind::Error, id, GameEventData::StakeForfeited { amount }));
    } else if !report.had_bet {
        events.push(GameEvent::new(EventKind::Info, id, GameEventData::Observed));
    }

    for (name, eject_multiplier) in &report.npc_outcomes {
        let kind = if eject_multiplier.is_some() { EventKind::Success } else { EventKind::Warning };
        events.push(GameEvent::new(
            kind,
            id,
            GameEventData::NpcOutcome {
                name: name.clone(),
                eject_multiplier: *eject_multiplier,
            },
        ));
    }
    events
}
