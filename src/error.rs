use thiserror::Error;

/// Errors surfaced by notify strategies, transports and channels.
///
/// Every failure is reported to the direct caller of the operation that
/// produced it. Nothing in this crate retries.
#[derive(Error, Debug)]
pub enum BusError {
    /// No response matching the query arrived within the configured window.
    ///
    /// The message text is part of the public contract.
    #[error("Query timed out")]
    Timeout,

    /// The local replier registry has no handler for the query name.
    #[error("no replier registered for query: {0}")]
    MissingHandler(String),

    /// The broadcast transport could not be created or used.
    #[error("transport error: {0}")]
    Transport(String),

    /// A post or subscription was attempted on a closed transport.
    #[error("transport closed: {0}")]
    TransportClosed(String),

    /// JSON encoding or decoding of a payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A replier ran but reported a failure of its own.
    #[error("replier failed: {0}")]
    Replier(String),
}

impl BusError {
    /// Build a [`BusError::Replier`] from anything printable.
    ///
    /// Convenience for handlers that want to bail out with a message.
    pub fn replier(msg: impl std::fmt::Display) -> Self {
        BusError::Replier(msg.to_string())
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BusError>;
