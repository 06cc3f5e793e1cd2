//! whatsync protocol layer
//!
//! Payload types, normalization and transport contracts for the whatsync
//! chat synchronization core. The companion `whatsync-core` crate hosts the
//! state engine that consumes these types.

pub mod client;
pub mod events;
pub mod payload;
pub mod types;

mod error;

pub use client::{ChatTransport, PushSubscription};
pub use error::{Result, SyncError};
pub use events::SyncEvent;
pub use payload::{normalize, normalize_message};
pub use types::{
    Account, AccountState, ConversationSummary, Direction, Message, MessageKind, MessageStatus,
};

/// Graph API version the upstream webhook payloads are shaped against
pub const GRAPH_API_VERSION: &str = "v22.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_api_version() {
        assert_eq!(GRAPH_API_VERSION, "v22.0");
    }
}
