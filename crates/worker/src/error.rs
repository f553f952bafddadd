/// Errors from a runner invocation.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("{0} must be set")]
    MissingVar(&'static str),

    #[error("Invalid {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },

    /// The indexing command could not be started.
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The callback transport failed on every attempt.
    #[error("Callback request failed after {attempts} attempts: {source}")]
    CallbackTransport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    /// The coordinator answered with a non-2xx status.
    #[error("Callback rejected ({status}): {body}")]
    CallbackRejected { status: u16, body: String },
}
