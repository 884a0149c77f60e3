//! Game Events
//!
//! Discrete narrative events pushed to the presentation feed. Each carries a
//! category tag renderers use for styling and structured data renderers can
//! format however they like; `engine::feed::describe` gives the stock text.

use serde::{Serialize, Deserialize};

use crate::game::state::{RoundPhase, Seat};

/// Severity / category of an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// Engine housekeeping.
    System,
    /// Echo of participant input.
    Player,
    /// Something went the participant's way.
    Success,
    /// Rejected command.
    Error,
    /// Danger or loss.
    Warning,
    /// Neutral information.
    Info,
    /// Periodic multiplier update.
    RoundUpdate,
}

impl EventKind {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::System => "system",
            EventKind::Player => "player",
            EventKind::Success => "success",
            EventKind::Error => "error",
            EventKind::Warning => "warning",
            EventKind::Info => "info",
            EventKind::RoundUpdate => "round-update",
        }
    }
}

/// Event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEventData {
    /// Engine started.
    Welcome {
        balance: f64,
    },

    /// Raw command text as typed.
    CommandEcho {
        input: String,
    },

    /// Command rejected; state unchanged.
    CommandRejected {
        message: String,
    },

    /// Grammar listing.
    Help,

    /// Balance query answer.
    BalanceReport {
        balance: f64,
    },

    /// Stake debited.
    BetPlaced {
        amount: f64,
        auto_eject: Option<f64>,
    },

    /// Player skipped; any pending stake refunded.
    Skipped {
        refunded: Option<f64>,
    },

    /// Phase transition.
    PhaseChanged {
        from: RoundPhase,
        to: RoundPhase,
    },

    /// Betting closed, round generated.
    RoundLaunched {
        round_id: u64,
        commitment: String,
        treasure_markers: Vec<f64>,
        launch_delay_ms: u64,
        observing: bool,
    },

    /// NPC announcement.
    NpcReady {
        name: String,
        amount: f64,
        auto_eject: Option<f64>,
    },

    /// Curve started.
    RoundStarted {
        round_id: u64,
    },

    /// Periodic progress.
    RoundUpdate {
        round_id: u64,
        multiplier: f64,
        elapsed_ms: u64,
    },

    /// Curve reached a treasure marker.
    MarkerPassed {
        marker: f64,
    },

    /// A participant locked in a payout.
    Ejected {
        seat: Seat,
        name: String,
        multiplier: f64,
        payout: f64,
        bonus: f64,
        auto: bool,
    },

    /// Curve reached the crash point.
    Crashed {
        round_id: u64,
        crash_point: f64,
        salt: u64,
    },

    /// Player's unsettled stake lost.
    StakeForfeited {
        amount: f64,
    },

    /// Player had no bet this round.
    Observed,

    /// NPC fate in the post-round report.
    NpcOutcome {
        name: String,
        eject_multiplier: Option<f64>,
    },

    /// Betting reopened.
    BettingOpened {
        balance: f64,
    },
}

/// A feed event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Position in the feed (assigned on publish).
    pub seq: u64,
    /// Round the event belongs to, if any.
    pub round_id: Option<u64>,
    /// Category tag.
    pub kind: EventKind,
    /// Event data.
    pub data: GameEventData,
}

impl GameEvent {
    /// Create an event; `seq` is filled in by the feed.
    pub fn new(kind: EventKind, round_id: Option<u64>, data: GameEventData) -> Self {
        Self {
            seq: 0,
            round_id,
            kind,
            data,
        }
    }

    /// Create an ejected event.
    pub fn ejected(
        round_id: u64,
        seat: Seat,
        name: String,
        multiplier: f64,
        payout: f64,
        bonus: f64,
        auto: bool,
    ) -> Self {
        Self::new(
            EventKind::Success,
            Some(round_id),
            GameEventData::Ejected { seat, name, multiplier, payout, bonus, auto },
        )
    }

    /// Create a marker passed event.
    pub fn marker_passed(round_id: u64, marker: f64) -> Self {
        Self::new(EventKind::Success, Some(round_id), GameEventData::MarkerPassed { marker })
    }

    /// Create a crashed event.
    pub fn crashed(round_id: u64, crash_point: f64, salt: u64) -> Self {
        Self::new(
            EventKind::Error,
            Some(round_id),
            GameEventData::Crashed { round_id, crash_point, salt },
        )
    }

    /// Create a round update event.
    pub fn round_update(round_id: u64, multiplier: f64, elapsed_ms: u64) -> Self {
        Self::new(
            EventKind::RoundUpdate,
            Some(round_id),
            GameEventData::RoundUpdate { round_id, multiplier, elapsed_ms },
        )
    }

    /// Create a rejected command event.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, None, GameEventData::CommandRejected { message: message.into() })
    }

    /// Create a phase change event.
    pub fn phase_changed(round_id: Option<u64>, from: RoundPhase, to: RoundPhase) -> Self {
        Self::new(EventKind::System, round_id, GameEventData::PhaseChanged { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(EventKind::RoundUpdate.as_str(), "round-update");
        assert_eq!(
            serde_json::to_string(&EventKind::RoundUpdate).unwrap(),
            "\"round-update\""
        );
    }

    #[test]
    fn test_event_json_shape() {
        let event = GameEvent::marker_passed(4, 3.05);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "success");
        assert_eq!(json["data"]["type"], "marker_passed");
        assert_eq!(json["data"]["marker"], 3.05);
        assert_eq!(json["round_id"], 4);
    }
}
