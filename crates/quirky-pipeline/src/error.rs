use thiserror::Error;

/// Fatal pipeline conditions. Anything recoverable (a bad event, a dead
/// viewer) is handled inside the broadcaster and never surfaces here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The queue holds more than its capacity. Indicates a locking bug.
    #[error("queue invariant violated: {len} events in a queue of capacity {capacity}")]
    QueueInvariantViolation { len: usize, capacity: usize },

    #[error("pipeline task failed: {0}")]
    TaskFailed(String),
}

/// Why a push to a single viewer failed. Only ever logged.
#[derive(Debug, Error)]
pub enum ViewerPushError {
    #[error("viewer connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("push timed out after {ms}ms")]
    Timeout { ms: u64 },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
