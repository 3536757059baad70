/// Startup errors. Anything here aborts before the first round.
/// Game-rule violations (cheats, starvation, fights) are never errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read map {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("map is empty")]
    Empty,
    #[error("row {row} has width {found}, expected {expected}")]
    Ragged { row: usize, expected: usize, found: usize },
    #[error("unknown symbol {symbol:?} at row {row}, column {col}")]
    UnknownSymbol { row: usize, col: usize, symbol: char },
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("no player found in the dedalus")]
    NoPlayer,
    #[error("no exit found in the dedalus")]
    NoExit,
    #[error("unknown AI {0:?} (known: {})", crate::domain::ai::POLICY_NAMES.join(", "))]
    UnknownPolicy(String),
    #[error("bad config file {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
    #[error("cannot open player view {}: {source}", path.display())]
    PlayerView {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot open log file {}: {source}", path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that stops the program.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("terminal error: {0}")]
    Terminal(#[from] std::io::Error),
}
