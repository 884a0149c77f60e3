//! Async Engine Driver
//!
//! Runs one [`RoundStateMachine`] on its own tokio task. The task owns the
//! machine outright; everything else talks to it through channels:
//!
//! - commands over `mpsc`, each answered on a `oneshot`
//! - events and snapshots through the feed
//! - a `broadcast` shutdown signal
//!
//! The scheduler clock is advanced by real elapsed time on every interval
//! tick. On exit the machine is torn down, cancelling its timers.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::core::rng::RandomSource;
use crate::engine::command::{CommandInterpreter, CommandOutcome};
use crate::engine::feed::{EngineView, FeedHandle};
use crate::engine::machine::RoundStateMachine;
use crate::engine::scheduler::Scheduler;
use crate::game::error::CommandError;
use crate::game::events::GameEvent;

/// Pending commands the task will queue.
const COMMAND_BACKLOG: usize = 64;

/// Driver errors.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The engine task has stopped.
    #[error("engine stopped")]
    Stopped,
    /// The command was rejected.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The engine task panicked or was aborted.
    #[error("engine task failed: {0}")]
    Join(#[from] JoinError),
}

struct LineRequest {
    line: String,
    reply: oneshot::Sender<Result<Option<CommandOutcome>, CommandError>>,
}

/// Cloneable command sender.
#[derive(Clone, Debug)]
pub struct EngineClient {
    commands: mpsc::Sender<LineRequest>,
    feed: FeedHandle,
}

impl EngineClient {
    /// Send one command line and wait for its result.
    pub async fn send_line(&self, line: impl Into<String>) -> Result<Option<CommandOutcome>, DriverError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(LineRequest { line: line.into(), reply })
            .await
            .map_err(|_| DriverError::Stopped)?;
        let outcome = response.await.map_err(|_| DriverError::Stopped)?;
        Ok(outcome?)
    }

    /// New event receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.feed.subscribe()
    }

    /// Latest engine snapshot.
    pub fn snapshot(&self) -> EngineView {
        self.feed.snapshot()
    }

    /// Feed handle, for narration.
    pub fn feed(&self) -> &FeedHandle {
        &self.feed
    }
}

/// Owner's handle on a running engine.
#[derive(Debug)]
pub struct EngineHandle {
    client: EngineClient,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// A command sender that can be moved to other tasks.
    pub fn client(&self) -> EngineClient {
        self.client.clone()
    }

    /// Signal the engine to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Wait for the engine task to finish.
    pub async fn join(self) -> Result<(), DriverError> {
        self.task.await?;
        Ok(())
    }
}

/// Start `machine` and spawn it on the current tokio runtime.
///
/// Receivers taken from the machine beforehand see the welcome events.
pub fn spawn_engine<R, S>(mut machine: RoundStateMachine<R, S>) -> EngineHandle
where
    R: RandomSource + 'static,
    S: Scheduler + 'static,
{
    let (commands, command_rx) = mpsc::channel(COMMAND_BACKLOG);
    let (shutdown, shutdown_rx) = broadcast::channel(1);
    let feed = machine.feed();
    machine.start();

    let task = tokio::spawn(run_engine(machine, command_rx, shutdown_rx));

    EngineHandle {
        client: EngineClient { commands, feed },
        shutdown,
        task,
    }
}

async fn run_engine<R: RandomSource, S: Scheduler>(
    mut machine: RoundStateMachine<R, S>,
    mut commands: mpsc::Receiver<LineRequest>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let interpreter = CommandInterpreter::new();
    let mut ticker = interval(machine.config().tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = Instant::now();

    info!(variant = ?machine.config().variant, "engine running");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                machine.advance(now - last);
                last = now;
            }
            request = commands.recv() => {
                let Some(LineRequest { line, reply }) = request else {
                    debug!("all clients gone");
                    break;
                };
                let outcome = interpreter.run(&mut machine, &line);
                if reply.send(outcome).is_err() {
                    warn!(line = %line, "client dropped before reply");
                }
            }
            _ = shutdown.recv() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    machine.teardown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::engine::config::{EngineConfig, LaunchMode};
    use crate::game::events::GameEventData;

    fn fast_config() -> EngineConfig {
        EngineConfig {
            seed: Some(21),
            launch: Some(LaunchMode::OnBet { delay_ms: 0 }),
            tick_interval_ms: 10,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_early_subscriber_sees_welcome() {
        let machine = RoundStateMachine::new(fast_config()).unwrap();
        let mut rx = machine.feed().subscribe();
        let handle = spawn_engine(machine);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.data, GameEventData::Welcome { balance: 1000.0 });
        let second = rx.recv().await.unwrap();
        assert_eq!(second.data, GameEventData::BettingOpened { balance: 1000.0 });

        handle.shutdown();
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_round_trip() {
        let handle = spawn_engine(RoundStateMachine::new(fast_config()).unwrap());
        let client = handle.client();

        let outcome = client.send_line("balance").await.unwrap();
        assert_eq!(outcome, Some(CommandOutcome::Balance(1000.0)));

        let err = client.send_line("bet 5000").await.unwrap_err();
        assert!(matches!(err, DriverError::Command(CommandError::InsufficientBalance { .. })));

        assert_eq!(client.send_line("").await.unwrap(), None);

        handle.shutdown();
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_round_starts_on_bet() {
        let handle = spawn_engine(RoundStateMachine::new(fast_config()).unwrap());
        let client = handle.client();
        let mut rx = client.subscribe();

        client.send_line("bet 10").await.unwrap();
        assert_eq!(client.snapshot().balance, 990.0);

        let started = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(event) if matches!(event.data, GameEventData::RoundStarted { .. }) => break,
                    Ok(_) => continue,
                    Err(e) => panic!("feed closed: {e}"),
                }
            }
        })
        .await;
        assert!(started.is_ok());

        handle.shutdown();
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_stopped_engine_refuses_commands() {
        let handle = spawn_engine(RoundStateMachine::new(fast_config()).unwrap());
        let client = handle.client();

        handle.shutdown();
        handle.join().await.unwrap();

        assert!(matches!(client.send_line("help").await, Err(DriverError::Stopped)));
    }
}
