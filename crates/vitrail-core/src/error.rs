//! Error types for vitrail-core.

use std::io;

/// Error type for vitrail-core operations.
#[derive(Debug, thiserror::Error)]
pub enum VitrailError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Terminal operation failed.
    #[error("terminal error: {0}")]
    Terminal(String),

    /// Element tree invariant violation.
    #[error("tree error: {0}")]
    Tree(String),

    /// Rendering failed.
    #[error("render error: {0}")]
    Render(String),

    /// Engine scheduling error.
    #[error("engine error: {0}")]
    Engine(String),
}

/// Result type alias for vitrail-core operations.
pub type Result<T> = std::result::Result<T, VitrailError>;

/// Failure raised by an event-handler or memory-task job.
///
/// Jobs report failure as a value instead of unwinding; the dispatcher logs
/// the job id together with this message and moves on.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct JobError(pub String);

impl JobError {
    /// Create a job error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
