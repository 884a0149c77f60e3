//! Command Interpreter
//!
//! Minimal text grammar for the terminal flow:
//!
//! ```text
//! bet <amount> [<depth>m | <multiplier>x]
//! eject
//! balance
//! skip
//! help
//! ```
//!
//! Depth is the multiplier in metres (`250m` = 2.50x). Thresholds must
//! exceed 100 m / 1.00x.

use std::str::FromStr;

use crate::core::rng::RandomSource;
use crate::engine::machine::RoundStateMachine;
use crate::engine::scheduler::Scheduler;
use crate::game::error::CommandError;
use crate::game::settlement::Settlement;

const BET_USAGE: &str = "bet <amount> [<depth>m | <multiplier>x]";

/// A parsed command.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Stake with optional auto-eject multiplier.
    Bet {
        /// Stake.
        amount: f64,
        /// Auto-eject multiplier.
        auto_eject: Option<f64>,
    },
    /// Eject now.
    Eject,
    /// Report balance.
    Balance,
    /// Skip to the next round.
    Skip,
    /// List commands.
    Help,
}

/// What a successful command did.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    /// Stake debited.
    BetPlaced,
    /// Player settled.
    Ejected(Settlement),
    /// Current balance.
    Balance(f64),
    /// Round skipped; pending stake refunded.
    Skipped {
        /// Refunded stake.
        refunded: Option<f64>,
    },
    /// Help listed.
    Help,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(action) = words.next() else {
            return Err(CommandError::UnknownCommand(String::new()));
        };

        match action.to_ascii_lowercase().as_str() {
            "bet" => {
                let amount = words.next().ok_or(CommandError::MissingArgument(BET_USAGE))?;
                let amount = parse_amount(amount)?;
                let auto_eject = words.next().map(parse_threshold).transpose()?;
                Ok(Command::Bet { amount, auto_eject })
            }
            "eject" => Ok(Command::Eject),
            "balance" => Ok(Command::Balance),
            "skip" => Ok(Command::Skip),
            "help" => Ok(Command::Help),
            _ => Err(CommandError::UnknownCommand(action.to_string())),
        }
    }
}

fn parse_amount(word: &str) -> Result<f64, CommandError> {
    match word.parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => Ok(amount),
        _ => Err(CommandError::InvalidBetAmount),
    }
}

/// `250m` or `2.5x` to a multiplier.
fn parse_threshold(word: &str) -> Result<f64, CommandError> {
    let invalid = || CommandError::InvalidAutoEjectThreshold(word.to_string());
    let lower = word.to_ascii_lowercase();

    let multiplier = if let Some(depth) = lower.strip_suffix('m') {
        let depth: f64 = depth.parse().map_err(|_| invalid())?;
        if !(depth.is_finite() && depth > 100.0) {
            return Err(invalid());
        }
        depth / 100.0
    } else if let Some(mult) = lower.strip_suffix('x') {
        let mult: f64 = mult.parse().map_err(|_| invalid())?;
        if !(mult.is_finite() && mult > 1.0) {
            return Err(invalid());
        }
        mult
    } else {
        return Err(invalid());
    };
    Ok(multiplier)
}

/// Feeds text commands to a state machine.
///
/// Every non-blank line is echoed to the feed before it is parsed; parse
/// failures are reported on the feed like any other rejection.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandInterpreter;

impl CommandInterpreter {
    /// Create an interpreter.
    pub fn new() -> Self {
        Self
    }

    /// Run one line. Blank input does nothing and returns `Ok(None)`.
    pub fn run<R: RandomSource, S: Scheduler>(
        &self,
        machine: &mut RoundStateMachine<R, S>,
        line: &str,
    ) -> Result<Option<CommandOutcome>, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        machine.echo(line);

        let command = line.parse::<Command>().map_err(|e| machine.reject(e))?;
        machine.execute(command).map(Some)
    }
}
