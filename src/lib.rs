//! # Dive Control
//!
//! Round-based crash wager engine. Each round hides a target multiplier,
//! runs a rising curve, lets the player (and simulated NPCs) eject for a
//! payout before the curve reaches the target, and settles when it does.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       DIVE CONTROL                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Deterministic primitives                │
//! │  ├── rng.rs        - Xorshift128+ PRNG, scripted samples     │
//! │  ├── hash.rs       - Crash point commitment                  │
//! │  └── precision.rs  - Two-place rounding, depth conversion    │
//! │                                                              │
//! │  game/             - Round rules (deterministic)             │
//! │  ├── crash_point.rs- Hidden target distribution              │
//! │  ├── curve.rs      - Multiplier curve                        │
//! │  ├── treasure.rs   - Bonus markers                           │
//! │  ├── npc.rs        - Simulated participants                  │
//! │  ├── settlement.rs - Ejects, payouts, crash finalization     │
//! │  ├── tick.rs       - Per-tick sequence                       │
//! │  └── history.rs    - Recent crash points                     │
//! │                                                              │
//! │  engine/           - Lifecycle and presentation              │
//! │  ├── scheduler.rs  - Cancellable timers                      │
//! │  ├── machine.rs    - Round state machine                     │
//! │  ├── command.rs    - Text command grammar                    │
//! │  ├── feed.rs       - Event channel and snapshots             │
//! │  └── driver.rs     - Tokio runtime driver                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! `core/` and `game/` read no clocks and perform no I/O. All randomness
//! comes from an injected [`RandomSource`], and the state machine runs on a
//! virtual clock, so a seed plus a sequence of commands and `advance` calls
//! reproduces every round exactly. The only wall-clock value, the history
//! timestamp, is handed in by the engine.
//!
//! ```
//! use std::time::Duration;
//! use dive_control::{EngineConfig, RoundPhase, RoundStateMachine};
//!
//! let config = EngineConfig { seed: Some(1), ..EngineConfig::default() };
//! let mut engine = RoundStateMachine::new(config).unwrap();
//! let mut events = engine.subscribe();
//! engine.start();
//! assert!(events.try_recv().is_ok());
//!
//! engine.place_bet(100.0, Some(1.5)).unwrap();
//! assert_eq!(engine.phase(), RoundPhase::Launching);
//!
//! engine.advance(Duration::from_secs(1));
//! assert_ne!(engine.phase(), RoundPhase::Betting);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod engine;

// Re-export commonly used types
pub use crate::core::rng::{DeterministicRng, RandomSource, SequenceRng};
pub use game::{CommandError, GameEvent, GameEventData, EventKind, RoundPhase, Variant};
pub use engine::{
    describe, spawn_engine, CommandInterpreter, EngineConfig, EngineView, RoundStateMachine,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
