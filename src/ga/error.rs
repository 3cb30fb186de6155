//! Engine error types.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal engine errors.
///
/// Rejected evaluations are not errors; they are retried with fresh
/// candidates. Everything here terminates the current call and propagates
/// out of [`solve`](crate::ga::Engine::solve).
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or contradictory callbacks, or out-of-range numeric options.
    #[error("configuration error: {0}")]
    Config(String),

    /// An operation was driven in a mode that does not support it.
    #[error("mode violation: {0}")]
    ModeViolation(String),

    /// Degenerate numerical input, e.g. a singular extreme-objective system.
    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(String),

    /// A broken internal invariant; indicates a bug in the engine or in a
    /// user callback's contract.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a mode-violation error.
    pub fn mode(msg: impl Into<String>) -> Self {
        Error::ModeViolation(msg.into())
    }

    /// Creates a numerical-degeneracy error.
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Error::NumericalDegeneracy(msg.into())
    }

    /// Creates an invariant-violation error.
    pub fn invariant(msg: impl Into<String>) -> Self {
        Error::InvariantViolation(msg.into())
    }
}
