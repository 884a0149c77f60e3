//! Engine Module
//!
//! Timer-driven lifecycle and the surfaces renderers attach to. Unlike
//! `game/`, this layer owns clocks, channels and tasks.
//!
//! - `scheduler`: Cancellable virtual-clock timers
//! - `machine`: Round state machine
//! - `command`: Text command grammar
//! - `feed`: Event channel, snapshot and narration
//! - `config`: Engine configuration
//! - `driver`: Tokio task running a machine

pub mod scheduler;
pub mod machine;
pub mod command;
pub mod feed;
pub mod config;
pub mod driver;

pub use scheduler::{Scheduler, TimerTask, TimerToken, TimerWheel};
pub use machine::RoundStateMachine;
pub use command::{Command, CommandInterpreter, CommandOutcome};
pub use feed::{describe, EngineView, EventFeed, FeedHandle};
pub use config::{ConfigError, EngineConfig, LaunchMode};
pub use driver::{spawn_engine, DriverError, EngineClient, EngineHandle};
