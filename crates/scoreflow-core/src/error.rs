//! Error types for ScoreFlow

use thiserror::Error;

/// Main error type for ScoreFlow operations.
///
/// Every variant is fatal for the session that produced it: the network
/// never retries or silently corrects, because a partially drained tuple
/// graph cannot be repaired in place.
#[derive(Debug, Error)]
pub enum ScoreFlowError {
    /// The external caller's notification discipline is broken:
    /// update/retract of a fact that was never inserted (or already
    /// retracted), or a double insert of the same fact identity.
    #[error("Structural error: {0}")]
    Structural(String),

    /// The session aborted a previous drain and must be discarded.
    #[error("Corrupted session: {0}")]
    CorruptedSession(String),

    /// The incrementally maintained score diverged from a from-scratch
    /// recomputation. Indicates a defect in node incremental logic.
    #[error("Score corruption: {0}")]
    ScoreCorruption(String),

    /// The compiled topology is invalid (dangling stream, arity mismatch,
    /// constraint without a scorer).
    #[error("Topology error: {0}")]
    Topology(String),

    /// Internal error (should not occur in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for ScoreFlow operations
pub type Result<T> = std::result::Result<T, ScoreFlowError>;
