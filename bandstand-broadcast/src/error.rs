use thiserror::Error;

/// Errors from fetching the broadcast command document.
///
/// Every variant is recoverable by doing nothing: the poller treats each as
/// "no new command" and the next tick tries again.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// The command source could not be reached.
    #[error("Broadcast fetch failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The command source answered with a non-success status.
    #[error("Broadcast source returned status {status}")]
    Status { status: reqwest::StatusCode },

    /// The command document did not parse.
    #[error("Malformed broadcast document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Convenience type alias for Results with `BroadcastError`.
pub type Result<T> = std::result::Result<T, BroadcastError>;
