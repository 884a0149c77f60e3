//! Command Errors
//!
//! Every user-facing failure. All are recoverable: the rejected command
//! leaves engine state untouched and the error is reported on the feed.

/// Errors returned by engine commands.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// Stake is not a positive, finite number.
    #[error("Invalid bet amount. Usage: bet <amount> [<depth>m | <multiplier>x]")]
    InvalidBetAmount,

    /// Stake exceeds the balance.
    #[error("Insufficient balance: requested {requested:.2}, available {available:.2}")]
    InsufficientBalance {
        /// Requested stake.
        requested: f64,
        /// Balance at the time of the request.
        available: f64,
    },

    /// Bet or skip attempted outside the betting phase.
    #[error("Betting is currently closed. Please wait for the next round.")]
    BettingClosed,

    /// A bet is already waiting for launch.
    #[error("A bet is already placed for this round.")]
    BetAlreadyPlaced,

    /// Eject attempted with no bet this round.
    #[error("You have no active bet.")]
    NoActiveBet,

    /// Eject attempted after the bet was already settled.
    #[error("You have already ejected.")]
    AlreadyEjected,

    /// Eject attempted while the curve is not running.
    #[error("Cannot eject. No round is in progress.")]
    RoundNotInProgress,

    /// Auto-eject threshold malformed or not above the minimum.
    #[error("Invalid auto-eject threshold '{0}'. Use a depth above 100m (e.g. 250m) or a multiplier above 1.00x (e.g. 2.5x).")]
    InvalidAutoEjectThreshold(String),

    /// Command is missing a required argument.
    #[error("Missing argument. Usage: {0}")]
    MissingArgument(&'static str),

    /// Command word not recognised.
    #[error("Unknown command: \"{0}\". Type 'help' for a list of commands.")]
    UnknownCommand(String),
}
