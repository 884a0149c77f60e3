//! Presentation Feed
//!
//! Two read-only surfaces for renderers:
//!
//! - a `broadcast` channel of [`GameEvent`]s, numbered in publish order
//! - a `watch` snapshot of the engine ([`EngineView`]), replaced after every
//!   state change
//!
//! Renderers never mutate the engine through either. [`describe`] turns an
//! event into the stock narration for a given flow.

use serde::{Serialize, Deserialize};
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::core::precision::depth_metres;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::history::HistoryEntry;
use crate::game::state::{PlotPoint, RoundPhase, Seat, Variant};

/// Read-only engine snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineView {
    /// Current phase.
    pub phase: RoundPhase,
    /// Phase as the configured flow names it.
    pub phase_label: String,
    /// Round in flight, if any.
    pub round_id: Option<u64>,
    /// Current multiplier (1.0 outside a round).
    pub current_multiplier: f64,
    /// Current multiplier as depth in metres.
    pub depth: u32,
    /// Curve time elapsed in milliseconds.
    pub elapsed_ms: u64,
    /// This round's treasure markers.
    pub treasure_markers: Vec<f64>,
    /// Markers reached so far.
    pub passed_markers: Vec<f64>,
    /// Curve samples for charting.
    pub plot_points: Vec<PlotPoint>,
    /// Recent crash points, newest first.
    pub history: Vec<HistoryEntry>,
    /// Player credits.
    pub balance: f64,
    /// Player stake riding this round.
    pub stake: Option<f64>,
    /// Multiplier the player ejected at.
    pub eject_multiplier: Option<f64>,
}

/// Cloneable subscription point for other tasks.
#[derive(Clone, Debug)]
pub struct FeedHandle {
    events: broadcast::Sender<GameEvent>,
    view: watch::Receiver<EngineView>,
    variant: Variant,
}

impl FeedHandle {
    /// New event receiver; sees events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Snapshot receiver.
    pub fn view(&self) -> watch::Receiver<EngineView> {
        self.view.clone()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> EngineView {
        self.view.borrow().clone()
    }

    /// Narrate an event for this engine's flow.
    pub fn describe(&self, event: &GameEvent) -> String {
        describe(event, self.variant)
    }
}

/// Engine side of the feed.
#[derive(Debug)]
pub struct EventFeed {
    variant: Variant,
    next_seq: u64,
    events: broadcast::Sender<GameEvent>,
    view: watch::Sender<EngineView>,
}

impl EventFeed {
    /// Create a feed buffering up to `capacity` events per slow receiver.
    pub fn new(variant: Variant, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        let (view, _) = watch::channel(EngineView::default());
        Self {
            variant,
            next_seq: 0,
            events,
            view,
        }
    }

    /// Number and send an event. Returns its sequence number.
    pub fn publish(&mut self, mut event: GameEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        event.seq = seq;
        debug!(seq, kind = event.kind.as_str(), "{}", describe(&event, self.variant));
        // No receivers is fine
        let _ = self.events.send(event);
        seq
    }

    /// Replace the snapshot.
    pub fn update_view(&self, view: EngineView) {
        self.view.send_replace(view);
    }

    /// Events published so far.
    pub fn published(&self) -> u64 {
        self.next_seq
    }

    /// New event receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> EngineView {
        self.view.borrow().clone()
    }

    /// Handle for other tasks.
    pub fn handle(&self) -> FeedHandle {
        FeedHandle {
            events: self.events.clone(),
            view: self.view.subscribe(),
            variant: self.variant,
        }
    }

    /// Flow this feed narrates for.
    pub fn variant(&self) -> Variant {
        self.variant
    }
}

// =============================================================================
// NARRATION
// =============================================================================

/// Ambient line for a depth band, if any.
pub fn flavor_text(depth: u32) -> Option<&'static str> {
    match depth {
        251..=299 => Some("Passing a bioluminescent squid."),
        601..=649 => Some("You hear the hull groan under the immense pressure."),
        1201..=1299 => Some("Entering the abyssal zone..."),
        _ => None,
    }
}

/// Multiplier in the flow's units: `2.50x` on the chart, `250m` in the
/// terminal.
pub fn position(multiplier: f64, variant: Variant) -> String {
    match variant {
        Variant::Chart => format!("{:.2}x", multiplier),
        Variant::Terminal => format!("{}m", depth_metres(multiplier)),
    }
}

/// Command reference lines.
pub const HELP_LINES: &[&str] = &[
    "--- Available Commands ---",
    "bet <amount> - Place a bet.",
    "bet <amount> <depth>m - Bet with auto-eject at a depth (e.g., bet 100 250m).",
    "bet <amount> <multiplier>x - Bet with auto-eject at a multiplier (e.g., bet 100 2.5x).",
    "eject - Eject during a dive.",
    "balance - Check your current credits.",
    "skip - Skip this dive and launch the next one now.",
    "help - Show this list.",
];

/// Stock narration for an event.
pub fn describe(event: &GameEvent, variant: Variant) -> String {
    let at = |m: f64| position(m, variant);

    match &event.data {
        GameEventData::Welcome { balance } => format!(
            "Welcome to Dive Control. Your starting balance is {} credits. Type 'help' for commands.",
            balance
        ),
        GameEventData::CommandEcho { input } => format!("> {}", input),
        GameEventData::CommandRejected { message } => message.clone(),
        GameEventData::Help => HELP_LINES.join("\n"),
        GameEventData::BalanceReport { balance } => {
            format!("Current Balance: {:.2} credits.", balance)
        }
        GameEventData::BetPlaced { amount, auto_eject: Some(t) } => {
            format!("Bet placed: {} credits with auto-eject at {}.", amount, at(*t))
        }
        GameEventData::BetPlaced { amount, auto_eject: None } => {
            format!("Bet placed: {} credits.", amount)
        }
        GameEventData::Skipped { refunded: Some(amount) } => {
            format!("Skipping this dive. Your bet of {} credits has been refunded.", amount)
        }
        GameEventData::Skipped { refunded: None } => "Skipping this dive.".to_string(),
        GameEventData::PhaseChanged { from, to } => {
            format!("{} -> {}", from.label(variant), to.label(variant))
        }
        GameEventData::RoundLaunched { round_id, commitment, treasure_markers, launch_delay_ms, observing } => {
            let markers: Vec<String> = treasure_markers.iter().map(|m| at(*m)).collect();
            let mut lines = vec![
                format!(
                    "Commencing pre-dive checks for dive #{}. Launch in {:.1}s.",
                    round_id,
                    *launch_delay_ms as f64 / 1000.0
                ),
                format!("Structural failure point committed: {}", commitment),
                format!("Treasure markers located at: {}.", markers.join(", ")),
            ];
            if *observing {
                lines.push("You have not placed a bet for this dive. Observing only.".to_string());
            }
            lines.join("\n")
        }
        GameEventData::NpcReady { name, amount, auto_eject: Some(t) } => {
            format!("{} readies {} credits for {}.", name, amount, at(*t))
        }
        GameEventData::NpcReady { name, amount, auto_eject: None } => {
            format!("{} readies {} credits.", name, amount)
        }
        GameEventData::RoundStarted { .. } => "Dive! Dive! Dive! Sealing the bay doors.".to_string(),
        GameEventData::RoundUpdate { multiplier, .. } => {
            let depth = depth_metres(*multiplier);
            let status = format!("Depth: {}m ({:.2}x)", depth, multiplier);
            match flavor_text(depth) {
                Some(flavor) => format!("{}\n{}", flavor, status),
                None => status,
            }
        }
        GameEventData::MarkerPassed { marker } => format!(
            "** TREASURE MARKER PASSED: {}! All future ejects from this dive will receive a bonus! **",
            at(*marker)
        ),
        GameEventData::Ejected { seat: Seat::Player, multiplier, payout, bonus, .. } => {
            let mut line = format!(
                "Ejection successful at {}! You secured {:.2} credits!",
                at(*multiplier),
                payout
            );
            if *bonus > 0.0 {
                line.push_str(&format!(" (includes {:.2} credit treasure bonus)", bonus));
            }
            line
        }
        GameEventData::Ejected { name, multiplier, .. } => {
            format!("{} has ejected at {}!", name, at(*multiplier))
        }
        GameEventData::Crashed { crash_point, salt, .. } => format!(
            "WARNING! HULL INTEGRITY FAILING!\nHULL BREACH AT {}m ({:.2}x)! Failure point revealed (salt {:016x}).",
            depth_metres(*crash_point),
            crash_point,
            salt
        ),
        GameEventData::StakeForfeited { amount } => {
            format!("Your pod failed to launch. Your {} credit bet is lost.", amount)
        }
        GameEventData::Observed => "You were observing this dive. No bet was lost.".to_string(),
        GameEventData::NpcOutcome { name, eject_multiplier: Some(m) } => {
            format!("{} ejected safely at {:.2}x.", name, m)
        }
        GameEventData::NpcOutcome { name, eject_multiplier: None } => {
            format!("{} was lost in the breach.", name)
        }
        GameEventData::BettingOpened { .. } => {
            "--- Preparing for next dive... You may place your bet. ---".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::EventKind;

    #[test]
    fn test_publish_assigns_sequence() {
        let mut feed = EventFeed::new(Variant::Chart, 16);
        let mut rx = feed.subscribe();

        feed.publish(GameEvent::rejected("first"));
        feed.publish(GameEvent::rejected("second"));

        assert_eq!(rx.try_recv().unwrap().seq, 0);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.seq, 1);
        assert_eq!(second.kind, EventKind::Error);
        assert_eq!(feed.published(), 2);
    }

    #[test]
    fn test_publish_without_receivers() {
        let mut feed = EventFeed::new(Variant::Chart, 4);
        for _ in 0..10 {
            feed.publish(GameEvent::rejected("nobody listening"));
        }
        assert_eq!(feed.published(), 10);
    }

    #[test]
    fn test_view_replaced() {
        let feed = EventFeed::new(Variant::Terminal, 4);
        let handle = feed.handle();
        feed.update_view(EngineView { balance: 950.0, depth: 120, ..EngineView::default() });
        assert_eq!(handle.snapshot().balance, 950.0);
        assert_eq!(handle.snapshot().depth, 120);
    }

    #[test]
    fn test_flavor_bands() {
        assert_eq!(flavor_text(250), None);
        assert!(flavor_text(275).is_some());
        assert!(flavor_text(620).is_some());
        assert!(flavor_text(1250).unwrap().contains("abyssal"));
        assert_eq!(flavor_text(1300), None);
    }

    #[test]
    fn test_describe_by_variant() {
        let event = GameEvent::marker_passed(1, 3.05);
        assert!(describe(&event, Variant::Terminal).contains("305m"));
        assert!(describe(&event, Variant::Chart).contains("3.05x"));

        let update = GameEvent::round_update(1, 2.7, 5000);
        let text = describe(&update, Variant::Chart);
        assert!(text.starts_with("Passing a bioluminescent squid."));
        assert!(text.ends_with("Depth: 270m (2.70x)"));
    }

    #[test]
    fn test_describe_player_eject_with_bonus() {
        let event = GameEvent::ejected(1, Seat::Player, "You".into(), 3.5, 437.5, 87.5, false);
        assert_eq!(
            describe(&event, Variant::Terminal),
            "Ejection successful at 350m! You secured 437.50 credits! (includes 87.50 credit treasure bonus)"
        );
    }
}
