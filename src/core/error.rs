//! Error taxonomy for session automation
//!
//! Every public operation fails with one of five kinds:
//! - `Connection` - transport or handshake failure
//! - `Timeout` - a keyboard wait passed its deadline
//! - `Parse` - a key sequence or text could not be turned into host bytes
//! - `Configuration` - unknown or malformed code page, bad settings
//! - `State` - operation attempted outside its lifecycle state

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::transport::TransportError;

/// Phase a keyboard waiter was in when it gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitPhase {
    /// Waiting for the host to inhibit input after a submission
    AwaitingLock,
    /// Waiting for the host to enable input again
    AwaitingUnlock,
}

impl fmt::Display for WaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingLock => write!(f, "keyboard lock"),
            Self::AwaitingUnlock => write!(f, "keyboard unlock"),
        }
    }
}

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    /// Transport or handshake failure
    #[error("Connection error: {0}")]
    Connection(#[from] TransportError),

    /// Wait deadline elapsed
    #[error("Timed out waiting for {phase} after {elapsed:?} (requested {requested:?})")]
    Timeout {
        /// Phase the waiter was in
        phase: WaitPhase,
        /// Timeout the caller asked for
        requested: Duration,
        /// Time actually spent waiting
        elapsed: Duration,
    },

    /// Unrecognised token in a key sequence or unencodable text
    #[error("Parse error at position {position}: {reason} '{token}'")]
    Parse {
        /// Offending token
        token: String,
        /// Character offset in the input
        position: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Unknown or malformed code page, invalid settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation not valid in the current lifecycle state
    #[error("Invalid state: {0}")]
    State(String),
}

impl Error {
    /// Configuration error for a code page id nobody registered
    pub fn unknown_codepage(id: &str) -> Self {
        Self::Configuration(format!("Unknown code page '{id}'"))
    }

    /// State error for an operation that needs a live connection
    pub fn not_connected(operation: &str) -> Self {
        Self::State(format!("{operation} requires a connected session"))
    }

    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Timeout { .. } => "timeout",
            Self::Parse { .. } => "parse",
            Self::Configuration(_) => "configuration",
            Self::State(_) => "state",
        }
    }
}

/// Crate result alias
pub type Result<T> = std::result::Result<T, Error>;
