use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or running a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A stage was constructed with an invalid configuration
    #[error("invalid stage configuration: {0}")]
    Config(String),

    /// A processor or handler callback failed; the offending item is dropped
    #[error("processing failed: {0}")]
    Process(String),

    /// A completion wait gave up before the sink finished draining
    #[error("timed out waiting for pipeline completion")]
    WaitTimeout,

    /// The completion signal was dropped before it fired
    #[error("completion signal dropped before firing")]
    Disconnected,
}
