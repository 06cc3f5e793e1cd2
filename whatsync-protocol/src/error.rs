//! Error handling for the synchronization core
//!
//! Nothing in this taxonomy is fatal to the process: every failure is
//! scoped to one conversation or message and leaves the rest of the state
//! usable. Channel payloads the client cannot parse are not errors at all;
//! they are dropped before reaching the reconciler.

use thiserror::Error;

/// Result type for synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while synchronizing chat state
#[derive(Error, Debug)]
pub enum SyncError {
    /// A load of accounts, conversations or messages failed
    ///
    /// Recovered locally by leaving prior state intact and surfacing a
    /// transient warning.
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// An outbound send was rejected or never reached the API
    ///
    /// Recovered by marking the optimistic message failed; never retried
    /// automatically.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The push channel could not be subscribed
    ///
    /// Non-fatal; the core degrades to poll-only operation.
    #[error("Push subscription failed: {0}")]
    SubscriptionFailed(String),

    /// A channel payload was structurally unusable
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Configuration is invalid or missing
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (config files, sockets owned by transports)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Create a fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        SyncError::FetchFailed(msg.into())
    }

    /// Create a send error
    pub fn send(msg: impl Into<String>) -> Self {
        SyncError::SendFailed(msg.into())
    }

    /// Create a subscription error
    pub fn subscription(msg: impl Into<String>) -> Self {
        SyncError::SubscriptionFailed(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        SyncError::Configuration(msg.into())
    }

    /// Whether retrying the operation later might succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::FetchFailed(_)
                | SyncError::SendFailed(_)
                | SyncError::SubscriptionFailed(_)
                | SyncError::Io(_)
        )
    }

    /// Simplified message suitable for a notification or status line
    pub fn user_message(&self) -> String {
        match self {
            SyncError::FetchFailed(_) => {
                "Could not refresh conversations. Showing the last known state.".to_string()
            }
            SyncError::SendFailed(msg) => format!("Message not sent: {}", msg),
            SyncError::SubscriptionFailed(_) => {
                "Live updates unavailable. Falling back to periodic refresh.".to_string()
            }
            SyncError::MalformedPayload(msg) => format!("Ignored unreadable update: {}", msg),
            SyncError::Configuration(msg) => format!("Configuration error: {}", msg),
            SyncError::Json(e) => format!("Data format error: {}", e),
            SyncError::Io(e) => format!("I/O error: {}", e),
        }
    }
}
