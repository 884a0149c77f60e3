//! Round State Machine
//!
//! Owns the phase lifecycle and every timer it schedules:
//!
//! ```text
//! Betting ──bet/skip/window──▶ Launching ──delay──▶ InProgress ──crash──▶ Ended
//!    ▲                                                                     │
//!    └──────────────────────────── post-round delay ◀──────────────────────┘
//! ```
//!
//! Each phase records the tokens of the timers it armed. Leaving the phase,
//! or tearing the engine down, cancels them. A timer whose token the current
//! phase does not hold is stale and is ignored.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::core::precision::depth_metres;
use crate::core::rng::{derive_seed, DeterministicRng, RandomSource};
use crate::engine::command::{Command, CommandOutcome};
use crate::engine::config::{ConfigError, EngineConfig, LaunchMode};
use crate::engine::feed::{EngineView, EventFeed, FeedHandle};
use crate::engine::scheduler::{Fired, Scheduler, TimerTask, TimerToken, TimerWheel};
use crate::game::error::CommandError;
use crate::game::events::{EventKind, GameEvent, GameEventData};
use crate::game::settlement::Settlement;
use crate::game::state::{GameState, RoundPhase, Seat, Wager};
use crate::game::tick::{create_round, ejected_event, tick, RoundRules};

/// Timers armed by the current phase.
#[derive(Debug, Default)]
struct PhaseTimers {
    close_betting: Option<TimerToken>,
    start_curve: Option<TimerToken>,
    tick: Option<TimerToken>,
    next_round: Option<TimerToken>,
    announcements: Vec<TimerToken>,
}

impl PhaseTimers {
    /// Is `fired` one of ours?
    fn owns(&self, fired: &Fired) -> bool {
        let token = Some(fired.token);
        match fired.task {
            TimerTask::CloseBetting => self.close_betting == token,
            TimerTask::StartCurve => self.start_curve == token,
            TimerTask::Tick => self.tick == token,
            TimerTask::NextRound => self.next_round == token,
            TimerTask::NpcAnnounce(_) => self.announcements.contains(&fired.token),
        }
    }

    /// Take every token.
    fn drain(&mut self) -> Vec<TimerToken> {
        let mut tokens: Vec<TimerToken> = [
            self.close_betting.take(),
            self.start_curve.take(),
            self.tick.take(),
            self.next_round.take(),
        ]
        .into_iter()
        .flatten()
        .collect();
        tokens.append(&mut self.announcements);
        tokens
    }
}

/// The round lifecycle for one participant.
pub struct RoundStateMachine<R: RandomSource = DeterministicRng, S: Scheduler = TimerWheel> {
    config: EngineConfig,
    rules: RoundRules,
    state: GameState,
    rng: R,
    scheduler: S,
    feed: EventFeed,
    timers: PhaseTimers,
    /// Curve time at which the next round update is due.
    next_update: Duration,
    started: bool,
    torn_down: bool,
}

impl RoundStateMachine {
    /// Create an engine with a seeded RNG and a virtual-clock scheduler.
    ///
    /// Without a configured seed one is derived from the wall clock and
    /// logged so the session can be replayed.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let seed = config.seed.unwrap_or_else(|| {
            let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
            derive_seed(&nanos.to_le_bytes())
        });
        info!(seed, "engine seeded");
        Self::with_parts(config, DeterministicRng::new(seed), TimerWheel::new())
    }
}

impl<R: RandomSource, S: Scheduler> RoundStateMachine<R, S> {
    /// Create an engine from an explicit RNG and scheduler.
    ///
    /// Betting is open on return, but nothing has been published yet;
    /// subscribe, then call [`start`](Self::start) for the opening events.
    pub fn with_parts(config: EngineConfig, rng: R, scheduler: S) -> Result<Self, ConfigError> {
        config.validate()?;

        let rules = RoundRules::new(&config.game);
        let state = GameState::new(config.initial_balance, config.game.history_capacity);
        let feed = EventFeed::new(config.variant, config.feed_capacity);

        let mut machine = Self {
            config,
            rules,
            state,
            rng,
            scheduler,
            feed,
            timers: PhaseTimers::default(),
            next_update: Duration::ZERO,
            started: false,
            torn_down: false,
        };

        machine.open_betting();
        machine.refresh_view();
        Ok(machine)
    }

    /// Publish the welcome and the first betting prompt. Only the first
    /// call publishes.
    pub fn start(&mut self) {
        if self.started || self.torn_down {
            return;
        }
        self.started = true;

        let balance = self.state.balance.amount();
        self.publish(GameEvent::new(EventKind::System, None, GameEventData::Welcome { balance }));
        if self.phase() == RoundPhase::Betting {
            self.publish(GameEvent::new(EventKind::System, None, GameEventData::BettingOpened { balance }));
        }
        info!(balance, "engine started");
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Stake `amount`, optionally with an auto-eject threshold.
    ///
    /// Only in `Betting`. Under on-bet launch the round launches at once.
    pub fn place_bet(&mut self, amount: f64, auto_eject: Option<f64>) -> Result<(), CommandError> {
        let result = self.try_place_bet(amount, auto_eject);
        self.finish(result)
    }

    fn try_place_bet(&mut self, amount: f64, auto_eject: Option<f64>) -> Result<(), CommandError> {
        if self.torn_down || self.phase() != RoundPhase::Betting {
            return Err(CommandError::BettingClosed);
        }
        if self.state.table.bet.is_some() {
            return Err(CommandError::BetAlreadyPlaced);
        }
        if let Some(threshold) = auto_eject {
            if !threshold.is_finite() || threshold <= 1.0 {
                return Err(CommandError::InvalidAutoEjectThreshold(format!("{:.2}x", threshold)));
            }
        }
        self.state.balance.debit(amount)?;
        self.state.table.bet = Some(Wager::new(amount, auto_eject));

        info!(amount, ?auto_eject, balance = self.state.balance.amount(), "bet placed");
        self.publish(GameEvent::new(
            EventKind::Success,
            None,
            GameEventData::BetPlaced { amount, auto_eject },
        ));

        if let LaunchMode::OnBet { .. } = self.config.launch_mode() {
            self.launch();
        }
        Ok(())
    }

    /// Eject the player's bet at the current multiplier.
    pub fn eject(&mut self) -> Result<Settlement, CommandError> {
        let result = self.try_eject();
        self.finish(result)
    }

    fn try_eject(&mut self) -> Result<Settlement, CommandError> {
        let GameState { round, table, balance, .. } = &mut self.state;
        let round = match round.as_ref() {
            Some(r) if r.phase == RoundPhase::InProgress => r,
            _ => return Err(CommandError::RoundNotInProgress),
        };
        match table.bet.as_ref() {
            None => return Err(CommandError::NoActiveBet),
            Some(bet) if bet.ejected => return Err(CommandError::AlreadyEjected),
            Some(_) => {}
        }

        let settlement = self
            .rules
            .settlement
            .eject(round, table, balance, Seat::Player)?
            .ok_or(CommandError::AlreadyEjected)?;

        info!(
            round = round.id,
            multiplier = settlement.multiplier,
            payout = settlement.payout,
            "player ejected"
        );
        let event = ejected_event(round.id, table, &settlement);
        self.publish(event);
        Ok(settlement)
    }

    /// Report the balance.
    pub fn balance(&mut self) -> f64 {
        let balance = self.state.balance.amount();
        self.publish(GameEvent::new(EventKind::Info, None, GameEventData::BalanceReport { balance }));
        balance
    }

    /// Refund any pending stake and launch the next round now, as an
    /// observer. Returns the refunded stake.
    pub fn skip(&mut self) -> Result<Option<f64>, CommandError> {
        let result = self.try_skip();
        self.finish(result)
    }

    fn try_skip(&mut self) -> Result<Option<f64>, CommandError> {
        if self.torn_down || self.phase() != RoundPhase::Betting {
            return Err(CommandError::BettingClosed);
        }
        let refunded = self.state.table.bet.take().map(|bet| {
            self.state.balance.credit(bet.amount);
            bet.amount
        });

        info!(?refunded, "skipped");
        self.publish(GameEvent::new(EventKind::Info, None, GameEventData::Skipped { refunded }));
        self.launch();
        Ok(refunded)
    }

    /// List the command grammar.
    pub fn help(&mut self) {
        self.publish(GameEvent::new(EventKind::Info, None, GameEventData::Help));
    }

    /// Run a parsed command.
    pub fn execute(&mut self, command: Command) -> Result<CommandOutcome, CommandError> {
        match command {
            Command::Bet { amount, auto_eject } => {
                self.place_bet(amount, auto_eject).map(|_| CommandOutcome::BetPlaced)
            }
            Command::Eject => self.eject().map(CommandOutcome::Ejected),
            Command::Balance => Ok(CommandOutcome::Balance(self.balance())),
            Command::Skip => self.skip().map(|refunded| CommandOutcome::Skipped { refunded }),
            Command::Help => {
                self.help();
                Ok(CommandOutcome::Help)
            }
        }
    }

    /// Publish the raw input as a player event.
    pub fn echo(&mut self, input: &str) {
        self.publish(GameEvent::new(
            EventKind::Player,
            None,
            GameEventData::CommandEcho { input: input.to_string() },
        ));
    }

    /// Report a rejected command on the feed and hand the error back.
    pub fn reject(&mut self, err: CommandError) -> CommandError {
        warn!(phase = ?self.phase(), "command rejected: {}", err);
        self.publish(GameEvent::rejected(err.to_string()));
        err
    }

    fn finish<T>(&mut self, result: Result<T, CommandError>) -> Result<T, CommandError> {
        let result = result.map_err(|e| self.reject(e));
        self.refresh_view();
        result
    }

    // =========================================================================
    // TIME
    // =========================================================================

    /// Move the clock forward, firing every timer that comes due in order.
    pub fn advance(&mut self, elapsed: Duration) {
        if self.torn_down {
            return;
        }
        let until = self.scheduler.now() + elapsed;
        while let Some(fired) = self.scheduler.pop_due(until) {
            self.on_timer(fired);
        }
        self.scheduler.advance_to(until);
        self.refresh_view();
    }

    /// Cancel every outstanding timer. Further `advance` calls do nothing
    /// and bets are refused.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.cancel_all();
        self.torn_down = true;
        info!(round = ?self.state.round_id(), "engine torn down");
    }

    fn on_timer(&mut self, fired: Fired) {
        if !self.timers.owns(&fired) {
            warn!(timer = fired.token.id(), task = ?fired.task, "stale timer ignored");
            return;
        }
        match fired.task {
            TimerTask::CloseBetting => {
                self.timers.close_betting = None;
                if self.phase() == RoundPhase::Betting {
                    self.launch();
                } else {
                    warn!(phase = ?self.phase(), "betting window closed outside Betting");
                }
            }
            TimerTask::NpcAnnounce(index) => {
                self.timers.announcements.retain(|t| *t != fired.token);
                self.announce_npc(index);
            }
            TimerTask::StartCurve => {
                self.timers.start_curve = None;
                self.start_curve();
            }
            TimerTask::Tick => self.on_tick(),
            TimerTask::NextRound => {
                self.timers.next_round = None;
                self.enter_betting();
            }
        }
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Enter `Betting`: discard the finished round and reopen bets.
    fn enter_betting(&mut self) {
        let from = self.phase();
        let round_id = self.state.round_id();
        self.open_betting();

        if from != RoundPhase::Betting {
            self.publish(GameEvent::phase_changed(round_id, from, RoundPhase::Betting));
        }
        let balance = self.state.balance.amount();
        self.publish(GameEvent::new(EventKind::System, None, GameEventData::BettingOpened { balance }));
        debug!(balance, "betting open");
    }

    /// Clear the round and arm the betting window, without publishing.
    fn open_betting(&mut self) {
        self.cancel_all();
        self.state.clear_round();
        if let Some(window) = self.config.launch_mode().betting_window() {
            self.timers.close_betting = Some(self.scheduler.schedule(window, TimerTask::CloseBetting));
        }
    }

    /// `Betting → Launching`: generate the round and arm the launch timers.
    fn launch(&mut self) {
        if let Some(token) = self.timers.close_betting.take() {
            self.scheduler.cancel(token);
        }

        let now = self.scheduler.now();
        let round_id = create_round(&mut self.state, &self.rules, &mut self.rng, now);
        let delay = self.config.launch_mode().launch_delay();
        let observing = self.state.table.bet.is_none();

        let (commitment, treasure_markers) = match self.state.round.as_ref() {
            Some(round) => (round.commitment.to_hex(), round.treasure_markers.clone()),
            None => {
                error!(round = round_id, "round missing right after creation");
                return;
            }
        };

        self.publish(GameEvent::phase_changed(Some(round_id), RoundPhase::Betting, RoundPhase::Launching));
        self.publish(GameEvent::new(
            EventKind::Info,
            Some(round_id),
            GameEventData::RoundLaunched {
                round_id,
                commitment,
                treasure_markers,
                launch_delay_ms: delay.as_millis() as u64,
                observing,
            },
        ));

        // Announcements are armed first so ties with StartCurve fire before it
        for index in 0..self.state.table.npcs.len() {
            let at = self.rules.npc.announce_delay(&mut self.rng, delay);
            let token = self.scheduler.schedule(at, TimerTask::NpcAnnounce(index));
            self.timers.announcements.push(token);
        }
        self.timers.start_curve = Some(self.scheduler.schedule(delay, TimerTask::StartCurve));
        info!(round = round_id, observing, delay_ms = delay.as_millis() as u64, "round launched");
    }

    fn announce_npc(&mut self, index: usize) {
        let round_id = self.state.round_id();
        let Some(npc) = self.state.table.npcs.get(index) else {
            warn!(index, "announcement for unknown NPC");
            return;
        };
        let data = GameEventData::NpcReady {
            name: npc.name.clone(),
            amount: npc.wager.amount,
            auto_eject: npc.wager.auto_eject,
        };
        self.publish(GameEvent::new(EventKind::System, round_id, data));
    }

    /// `Launching → InProgress`: start the curve and the tick loop.
    fn start_curve(&mut self) {
        for token in std::mem::take(&mut self.timers.announcements) {
            self.scheduler.cancel(token);
        }

        let Some(round) = self.state.round.as_mut() else {
            error!("launch timer fired with no round; skipping");
            return;
        };
        if round.phase != RoundPhase::Launching {
            warn!(round = round.id, phase = ?round.phase, "launch timer fired outside Launching");
            return;
        }
        round.phase = RoundPhase::InProgress;
        round.curve.reset();
        round.current_multiplier = 1.0;
        round.elapsed = Duration::ZERO;
        let round_id = round.id;

        self.next_update = self.config.round_update_interval();
        self.timers.tick = Some(
            self.scheduler
                .schedule_every(self.config.tick_interval(), TimerTask::Tick),
        );

        self.publish(GameEvent::phase_changed(Some(round_id), RoundPhase::Launching, RoundPhase::InProgress));
        self.publish(GameEvent::new(EventKind::Warning, Some(round_id), GameEventData::RoundStarted { round_id }));
        info!(round = round_id, "curve started");
    }

    /// One curve tick; on crash, `InProgress → Ended`.
    fn on_tick(&mut self) {
        let result = tick(&mut self.state, &self.rules, self.config.tick_interval(), Utc::now());
        for event in result.events {
            self.publish(event);
        }

        if let Some(report) = result.crashed {
            if let Some(token) = self.timers.tick.take() {
                self.scheduler.cancel(token);
            }
            self.publish(GameEvent::phase_changed(
                Some(report.round_id),
                RoundPhase::InProgress,
                RoundPhase::Ended,
            ));
            self.timers.next_round = Some(
                self.scheduler
                    .schedule(self.config.post_round_delay(), TimerTask::NextRound),
            );
            info!(
                round = report.round_id,
                crash_point = report.crash_point,
                balance = self.state.balance.amount(),
                "round ended"
            );
            return;
        }

        let update = self.state.round.as_ref().and_then(|round| {
            (round.phase == RoundPhase::InProgress && round.elapsed >= self.next_update)
                .then(|| (round.id, round.current_multiplier, round.elapsed))
        });
        if let Some((round_id, multiplier, elapsed)) = update {
            // At most one update per tick, then skip every boundary already passed
            let interval = self.config.round_update_interval();
            while self.next_update <= elapsed {
                self.next_update += interval;
            }
            self.publish(GameEvent::round_update(round_id, multiplier, elapsed.as_millis() as u64));
        }
    }

    fn cancel_all(&mut self) {
        for token in self.timers.drain() {
            self.scheduler.cancel(token);
        }
    }

    fn publish(&mut self, event: GameEvent) {
        self.feed.publish(event);
    }

    fn refresh_view(&self) {
        self.feed.update_view(self.snapshot());
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.state
            .round
            .as_ref()
            .map_or(RoundPhase::Betting, |round| round.phase)
    }

    /// Current phase as the configured flow names it.
    pub fn phase_label(&self) -> &'static str {
        self.phase().label(self.config.variant)
    }

    /// Read-only snapshot for renderers.
    pub fn snapshot(&self) -> EngineView {
        let round = self.state.round.as_ref();
        let current_multiplier = round.map_or(1.0, |r| r.current_multiplier);
        let bet = self.state.table.bet.as_ref();

        EngineView {
            phase: self.phase(),
            phase_label: self.phase_label().to_string(),
            round_id: round.map(|r| r.id),
            current_multiplier,
            depth: depth_metres(current_multiplier),
            elapsed_ms: round.map_or(0, |r| r.elapsed.as_millis() as u64),
            treasure_markers: round.map(|r| r.treasure_markers.clone()).unwrap_or_default(),
            passed_markers: round.map(|r| r.passed_markers.clone()).unwrap_or_default(),
            plot_points: round.map(|r| r.plot_points.clone()).unwrap_or_default(),
            history: self.state.history.to_vec(),
            balance: self.state.balance.amount(),
            stake: bet.map(|b| b.amount),
            eject_multiplier: bet.and_then(|b| b.eject_multiplier),
        }
    }

    /// Engine state, read-only.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Configuration in force.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scheduler clock.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// Armed timers.
    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    /// Has the engine been torn down?
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Handle for subscribing from other tasks.
    pub fn feed(&self) -> FeedHandle {
        self.feed.handle()
    }

    /// Event receiver.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<GameEvent> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::SequenceRng;
    use crate::game::crash_point::CrashPointGenerator;
    use crate::game::treasure::{MarkerSpec, TreasureConfig};
    use tokio::sync::broadcast::Receiver;

    const STEP: Duration = Duration::from_millis(100);

    fn chart_config() -> EngineConfig {
        EngineConfig { seed: Some(7), ..EngineConfig::default() }
    }

    /// Machine whose first round crashes at `crash`.
    fn scripted(config: EngineConfig, crash: f64) -> RoundStateMachine<SequenceRng> {
        let sample = CrashPointGenerator::new(config.game.crash.clone()).sample_for(crash);
        let rng = SequenceRng::new(99).with_samples(&[sample]);
        RoundStateMachine::with_parts(config, rng, TimerWheel::new()).unwrap()
    }

    fn drain(rx: &mut Receiver<GameEvent>) -> Vec<GameEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn run_until<R: RandomSource, S: Scheduler>(
        machine: &mut RoundStateMachine<R, S>,
        phase: RoundPhase,
    ) {
        for _ in 0..100_000 {
            if machine.phase() == phase {
                return;
            }
            machine.advance(STEP);
        }
        panic!("never reached {:?}", phase);
    }

    #[test]
    fn test_welcome_and_betting_open() {
        let mut machine = scripted(chart_config(), 2.0);
        assert_eq!(machine.phase(), RoundPhase::Betting);
        assert_eq!(machine.snapshot().balance, 1000.0);
        assert_eq!(machine.pending_timers(), 0);

        let mut rx = machine.subscribe();
        machine.start();
        machine.start();

        let events = drain(&mut rx);
        let data: Vec<GameEventData> = events.into_iter().map(|e| e.data).collect();
        assert_eq!(
            data,
            vec![
                GameEventData::Welcome { balance: 1000.0 },
                GameEventData::BettingOpened { balance: 1000.0 },
            ]
        );
    }

    #[test]
    fn test_timed_window_armed_before_start() {
        let mut config = chart_config();
        config.launch = Some(LaunchMode::Timed { window_ms: 3000, delay_ms: 0 });
        let machine = scripted(config, 2.0);
        assert_eq!(machine.pending_timers(), 1);
    }

    #[test]
    fn test_auto_eject_example() {
        let mut machine = scripted(chart_config(), 3.41);
        machine.place_bet(100.0, Some(2.0)).unwrap();
        assert_eq!(machine.phase(), RoundPhase::Launching);
        assert_eq!(machine.snapshot().balance, 900.0);

        run_until(&mut machine, RoundPhase::Ended);

        let view = machine.snapshot();
        assert_eq!(view.balance, 1100.0);
        assert_eq!(view.eject_multiplier, Some(2.0));
        assert_eq!(view.current_multiplier, 3.41);
        assert_eq!(view.history[0].crash_point, 3.41);
    }

    #[test]
    fn test_forfeit_example() {
        let mut machine = scripted(chart_config(), 1.2);
        let mut rx = machine.subscribe();
        machine.place_bet(50.0, None).unwrap();

        run_until(&mut machine, RoundPhase::Ended);

        assert_eq!(machine.snapshot().balance, 950.0);
        assert_eq!(machine.snapshot().history[0].crash_point, 1.2);
        assert!(drain(&mut rx)
            .iter()
            .any(|e| e.data == GameEventData::StakeForfeited { amount: 50.0 }));
    }

    #[test]
    fn test_treasure_bonus_example() {
        let mut config = chart_config();
        config.game.treasure = TreasureConfig {
            markers: vec![MarkerSpec { base: 3.0, jitter: 0.0 }],
            bonus_rate: 0.25,
        };
        let mut machine = scripted(config, 8.0);
        machine.place_bet(100.0, None).unwrap();

        while machine.snapshot().current_multiplier < 3.5 {
            machine.advance(Duration::from_millis(50));
        }
        assert_eq!(machine.snapshot().passed_markers, vec![3.0]);

        let settlement = machine.eject().unwrap();
        assert!(settlement.multiplier >= 3.5);
        let expected = 100.0 * settlement.multiplier * 1.25;
        assert!((settlement.payout - expected).abs() < 1e-9);
        assert!((machine.snapshot().balance - (900.0 + expected)).abs() < 1e-9);
    }

    #[test]
    fn test_eject_twice_settles_once() {
        let mut machine = scripted(chart_config(), 5.0);
        machine.place_bet(100.0, None).unwrap();
        run_until(&mut machine, RoundPhase::InProgress);
        machine.advance(Duration::from_secs(2));

        let first = machine.eject().unwrap();
        let balance = machine.snapshot().balance;
        assert_eq!(machine.eject(), Err(CommandError::AlreadyEjected));
        assert_eq!(machine.snapshot().balance, balance);
        assert_eq!(machine.snapshot().eject_multiplier, Some(first.multiplier));
    }

    #[test]
    fn test_eject_rejections() {
        let mut machine = scripted(chart_config(), 5.0);
        assert_eq!(machine.eject(), Err(CommandError::RoundNotInProgress));

        machine.place_bet(10.0, None).unwrap();
        assert_eq!(machine.phase(), RoundPhase::Launching);
        assert_eq!(machine.eject(), Err(CommandError::RoundNotInProgress));

        let mut observer = scripted(chart_config(), 5.0);
        observer.skip().unwrap();
        run_until(&mut observer, RoundPhase::InProgress);
        assert_eq!(observer.eject(), Err(CommandError::NoActiveBet));
    }

    #[test]
    fn test_bet_rejections_leave_state_unchanged() {
        let mut machine = scripted(chart_config(), 5.0);
        let mut rx = machine.subscribe();

        assert_eq!(machine.place_bet(0.0, None), Err(CommandError::InvalidBetAmount));
        assert!(matches!(
            machine.place_bet(5000.0, None),
            Err(CommandError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            machine.place_bet(10.0, Some(1.0)),
            Err(CommandError::InvalidAutoEjectThreshold(_))
        ));
        assert_eq!(machine.phase(), RoundPhase::Betting);
        assert_eq!(machine.snapshot().balance, 1000.0);

        let errors = drain(&mut rx).iter().filter(|e| e.kind == EventKind::Error).count();
        assert_eq!(errors, 3);

        machine.place_bet(10.0, None).unwrap();
        assert_eq!(machine.place_bet(10.0, None), Err(CommandError::BettingClosed));
        assert_eq!(machine.snapshot().balance, 990.0);
    }

    #[test]
    fn test_timed_window_and_skip_refund() {
        let mut config = chart_config();
        config.launch = Some(LaunchMode::Timed { window_ms: 10_000, delay_ms: 1000 });
        let mut machine = scripted(config, 2.0);

        machine.place_bet(100.0, None).unwrap();
        assert_eq!(machine.phase(), RoundPhase::Betting);
        assert_eq!(machine.place_bet(20.0, None), Err(CommandError::BetAlreadyPlaced));

        assert_eq!(machine.skip(), Ok(Some(100.0)));
        assert_eq!(machine.snapshot().balance, 1000.0);
        assert_eq!(machine.phase(), RoundPhase::Launching);
        assert_eq!(machine.snapshot().stake, None);
        assert_eq!(machine.skip(), Err(CommandError::BettingClosed));
    }

    #[test]
    fn test_timed_window_launches_without_bet() {
        let mut config = chart_config();
        config.launch = Some(LaunchMode::Timed { window_ms: 3000, delay_ms: 0 });
        let mut machine = scripted(config, 2.0);

        machine.advance(Duration::from_millis(2999));
        assert_eq!(machine.phase(), RoundPhase::Betting);
        machine.advance(Duration::from_millis(1));
        assert_eq!(machine.phase(), RoundPhase::InProgress);
    }

    #[test]
    fn test_full_cycle_resets_round() {
        let mut machine = scripted(chart_config(), 1.5);
        let mut rx = machine.subscribe();
        machine.place_bet(10.0, Some(1.2)).unwrap();

        run_until(&mut machine, RoundPhase::Ended);
        machine.advance(Duration::from_millis(3900));
        assert_eq!(machine.phase(), RoundPhase::Ended);
        machine.advance(Duration::from_millis(100));
        assert_eq!(machine.phase(), RoundPhase::Betting);

        let view = machine.snapshot();
        assert_eq!(view.current_multiplier, 1.0);
        assert_eq!(view.stake, None);
        assert!(view.passed_markers.is_empty());
        assert!(view.plot_points.is_empty());
        assert_eq!(machine.pending_timers(), 0);

        let events = drain(&mut rx);
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert!(seqs.windows(2).all(|w| w[1] == w[0] + 1));
        assert!(events.iter().any(|e| matches!(e.data, GameEventData::BettingOpened { .. })));
    }

    #[test]
    fn test_plot_grows_then_clears_on_next_round() {
        let mut machine = scripted(chart_config(), 3.0);
        machine.place_bet(10.0, None).unwrap();
        run_until(&mut machine, RoundPhase::InProgress);

        machine.advance(Duration::from_secs(1));
        let early = machine.snapshot().plot_points.len();
        assert!(early > 0);
        machine.advance(Duration::from_secs(1));
        assert!(machine.snapshot().plot_points.len() > early);

        run_until(&mut machine, RoundPhase::Ended);
        assert!(!machine.snapshot().plot_points.is_empty());
        run_until(&mut machine, RoundPhase::Betting);
        assert!(machine.snapshot().plot_points.is_empty());
    }

    #[test]
    fn test_npc_announcements_before_curve() {
        let config = EngineConfig::from_json(r#"{ "variant": "terminal", "seed": 3 }"#).unwrap();
        let mut machine = scripted(config, 4.0);
        let mut rx = machine.subscribe();
        machine.place_bet(100.0, None).unwrap();
        let npcs = machine.state().table.npcs.len();

        run_until(&mut machine, RoundPhase::InProgress);
        let events = drain(&mut rx);
        let ready = events
            .iter()
            .filter(|e| matches!(e.data, GameEventData::NpcReady { .. }))
            .count();
        assert_eq!(ready, npcs);

        let started = events
            .iter()
            .position(|e| matches!(e.data, GameEventData::RoundStarted { .. }))
            .unwrap();
        assert!(events[started..]
            .iter()
            .all(|e| !matches!(e.data, GameEventData::NpcReady { .. })));
    }

    #[test]
    fn test_round_updates_every_interval() {
        let mut machine = scripted(chart_config(), 50.0);
        let mut rx = machine.subscribe();
        machine.skip().unwrap();
        run_until(&mut machine, RoundPhase::InProgress);
        drain(&mut rx);

        machine.advance(Duration::from_millis(5000));
        let updates: Vec<u64> = drain(&mut rx)
            .iter()
            .filter_map(|e| match e.data {
                GameEventData::RoundUpdate { elapsed_ms, .. } => Some(elapsed_ms),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec![1000, 2000, 3000, 4000, 5000]);
    }

    #[test]
    fn test_round_updates_keep_pace_with_coarse_ticks() {
        let mut config = chart_config();
        config.tick_interval_ms = 2500;
        let mut machine = scripted(config, 50.0);
        let mut rx = machine.subscribe();
        machine.skip().unwrap();
        run_until(&mut machine, RoundPhase::InProgress);
        drain(&mut rx);

        machine.advance(Duration::from_millis(10_000));
        let updates: Vec<u64> = drain(&mut rx)
            .iter()
            .filter_map(|e| match e.data {
                GameEventData::RoundUpdate { elapsed_ms, .. } => Some(elapsed_ms),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec![2500, 5000, 7500, 10_000]);

        let elapsed = machine.state().round.as_ref().unwrap().elapsed;
        assert!(machine.next_update > elapsed);
        assert_eq!(machine.next_update, Duration::from_millis(11_000));
    }

    #[test]
    fn test_teardown_cancels_timers() {
        let mut machine = scripted(chart_config(), 5.0);
        machine.place_bet(100.0, None).unwrap();
        assert!(machine.pending_timers() > 0);

        machine.teardown();
        assert_eq!(machine.pending_timers(), 0);
        machine.advance(Duration::from_secs(60));
        assert_eq!(machine.phase(), RoundPhase::Launching);
        assert_eq!(machine.place_bet(1.0, None), Err(CommandError::BettingClosed));
    }

    /// Scheduler that ignores cancellation, so superseded timers still fire.
    struct LeakyWheel(TimerWheel);

    impl Scheduler for LeakyWheel {
        fn now(&self) -> Duration {
            self.0.now()
        }
        fn schedule(&mut self, delay: Duration, task: TimerTask) -> TimerToken {
            self.0.schedule(delay, task)
        }
        fn schedule_every(&mut self, period: Duration, task: TimerTask) -> TimerToken {
            self.0.schedule_every(period, task)
        }
        fn cancel(&mut self, _token: TimerToken) -> bool {
            false
        }
        fn pop_due(&mut self, until: Duration) -> Option<Fired> {
            self.0.pop_due(until)
        }
        fn advance_to(&mut self, until: Duration) {
            self.0.advance_to(until)
        }
        fn pending(&self) -> usize {
            self.0.pending()
        }
    }

    #[test]
    fn test_stale_timers_ignored() {
        let config = chart_config();
        let sample = CrashPointGenerator::default().sample_for(1.3);
        let rng = SequenceRng::new(5).with_samples(&[sample]);
        let mut machine = RoundStateMachine::with_parts(config, rng, LeakyWheel(TimerWheel::new())).unwrap();
        let mut rx = machine.subscribe();

        machine.place_bet(10.0, None).unwrap();
        run_until(&mut machine, RoundPhase::Ended);
        run_until(&mut machine, RoundPhase::Betting);

        // The old tick timer keeps firing but never touches the idle engine
        machine.advance(Duration::from_secs(5));
        assert_eq!(machine.phase(), RoundPhase::Betting);
        assert_eq!(machine.state().history.len(), 1);
        assert_eq!(machine.snapshot().balance, 990.0);

        let crashes = drain(&mut rx)
            .iter()
            .filter(|e| matches!(e.data, GameEventData::Crashed { .. }))
            .count();
        assert_eq!(crashes, 1);
    }

    #[test]
    fn test_ejects_always_below_crash_and_history_bounded() {
        let mut machine = RoundStateMachine::new(chart_config()).unwrap();
        let mut rx = machine.subscribe();
        let mut crash = None;

        for round in 0..20 {
            let threshold = 1.1 + (round % 5) as f64 * 0.6;
            machine.place_bet(1.0, Some(threshold)).unwrap();
            run_until(&mut machine, RoundPhase::Ended);
            run_until(&mut machine, RoundPhase::Betting);

            let events = drain(&mut rx);
            for e in &events {
                if let GameEventData::Crashed { crash_point, .. } = e.data {
                    crash = Some(crash_point);
                }
            }
            let crash = crash.unwrap();
            for e in &events {
                if let GameEventData::Ejected { multiplier, .. } = e.data {
                    assert!(multiplier < crash);
                }
            }
            assert!(machine.snapshot().balance >= 0.0);
        }

        let history = machine.snapshot().history;
        assert_eq!(history.len(), 15);
        let ids: Vec<u64> = history.iter().map(|h| h.id).collect();
        assert_eq!(ids, (6..=20).rev().collect::<Vec<_>>());
    }
}
