//! Segment fetch error type.

/// Error returned by a single segment fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// The shared cancellation signal stopped the transfer.
    #[error("cancelled")]
    Cancelled,
    /// Transport-specific failure (e.g. a scripted transport in tests).
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
