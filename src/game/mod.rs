//! Game Logic Module
//!
//! Round rules. Deterministic given the RNG; no clocks, no I/O.
//!
//! ## Module Structure
//!
//! - `crash_point`: Crash point distribution
//! - `curve`: Multiplier as a function of elapsed round time
//! - `treasure`: Per-round bonus thresholds
//! - `npc`: Simulated participants
//! - `state`: Round, wager, balance and phase types
//! - `settlement`: Payouts, ejects and crash finalization
//! - `history`: Recent crash points
//! - `tick`: Round creation and the authoritative per-tick sequence
//! - `events`: Feed events
//! - `error`: Command errors

pub mod crash_point;
pub mod curve;
pub mod treasure;
pub mod npc;
pub mod state;
pub mod settlement;
pub mod history;
pub mod tick;
pub mod events;
pub mod error;

// Re-export key types
pub use crash_point::{CrashConfig, CrashPointGenerator};
pub use curve::{CurveConfig, MultiplierCurve};
pub use treasure::{TreasureConfig, TreasureMarkerGenerator};
pub use npc::{NpcConfig, NpcSimulator};
pub use state::{Balance, Bet, GameState, Npc, PlotPoint, Round, RoundPhase, Seat, Table, Variant, Wager};
pub use settlement::{CrashReport, Settlement, SettlementEngine};
pub use history::{HistoryEntry, HistoryLedger, HISTORY_CAPACITY};
pub use tick::{GameConfig, RoundRules, TickResult};
pub use events::{EventKind, GameEvent, GameEventData};
pub use error::CommandError;
