//! Normalized channel events
//!
//! Both channel adapters translate their raw payloads into `SyncEvent`s,
//! the one currency the reconciler consumes. Push and poll deliver the same
//! event type so the merge rules never need to know which channel a change
//! came from.

use crate::types::{ConversationSummary, Message, MessageStatus};

/// A normalized update from one of the two channels
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A single new or updated message (push channel)
    Message {
        /// Account the message belongs to
        account_id: String,
        /// Conversation the message belongs to
        conversation_id: String,
        /// The message payload
        message: Message,
    },

    /// A delivery status change for one message (push channel)
    Status {
        /// Conversation hint when the payload carries one
        conversation_id: Option<String>,
        /// Identifier of the affected message
        message_id: String,
        /// New delivery status
        status: MessageStatus,
        /// Failure reason when status is `Failed`
        error_message: Option<String>,
    },

    /// Full conversation-summary list for an account (poll channel)
    ConversationsSnapshot {
        /// Account the snapshot was scoped to
        account_id: String,
        /// Summaries in server order
        conversations: Vec<ConversationSummary>,
    },

    /// Full ordered message list for one conversation (poll channel)
    MessagesSnapshot {
        /// Account the snapshot was scoped to
        account_id: String,
        /// Conversation the snapshot was scoped to
        conversation_id: String,
        /// Messages oldest-first
        messages: Vec<Message>,
    },

    /// A channel failed to produce its payload; prior state stays intact
    ChannelError {
        /// Human-readable failure description
        message: String,
    },
}

impl SyncEvent {
    /// Account this event is scoped to, if any
    pub fn account_id(&self) -> Option<&str> {
        match self {
            SyncEvent::Message { account_id, .. } => Some(account_id),
            SyncEvent::ConversationsSnapshot { account_id, .. } => Some(account_id),
            SyncEvent::MessagesSnapshot { account_id, .. } => Some(account_id),
            _ => None,
        }
    }

    /// Conversation this event is scoped to, if any
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            SyncEvent::Message {
                conversation_id, ..
            } => Some(conversation_id),
            SyncEvent::Status {
                conversation_id, ..
            } => conversation_id.as_deref(),
            SyncEvent::MessagesSnapshot {
                conversation_id, ..
            } => Some(conversation_id),
            _ => None,
        }
    }

    /// Whether this event replaces state wholesale rather than patching it
    pub fn is_snapshot(&self) -> bool {
        matches!(
            self,
            SyncEvent::ConversationsSnapshot { .. } | SyncEvent::MessagesSnapshot { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, MessageKind};

    fn message(id: &str) -> Message {
        Message {
            id: id.to_string(),
            conversation_id: "c1".to_string(),
            direction: Direction::Inbound,
            kind: MessageKind::Text,
            body: "hi".to_string(),
            media_url: None,
            timestamp: 1_700_000_000_000,
            status: MessageStatus::Delivered,
            error_message: None,
        }
    }

    #[test]
    fn test_scoping_accessors() {
        let event = SyncEvent::Message {
            account_id: "a1".to_string(),
            conversation_id: "c1".to_string(),
            message: message("m1"),
        };
        assert_eq!(event.account_id(), Some("a1"));
        assert_eq!(event.conversation_id(), Some("c1"));
        assert!(!event.is_snapshot());

        let status = SyncEvent::Status {
            conversation_id: None,
            message_id: "m1".to_string(),
            status: MessageStatus::Read,
            error_message: None,
        };
        assert_eq!(status.account_id(), None);
        assert_eq!(status.conversation_id(), None);
    }

    #[test]
    fn test_snapshot_classification() {
        let snapshot = SyncEvent::MessagesSnapshot {
            account_id: "a1".to_string(),
            conversation_id: "c1".to_string(),
            messages: vec![message("m1")],
        };
        assert!(snapshot.is_snapshot());
        assert_eq!(snapshot.conversation_id(), Some("c1"));

        let error = SyncEvent::ChannelError {
            message: "poll failed".to_string(),
        };
        assert!(!error.is_snapshot());
        assert_eq!(error.account_id(), None);
    }
}
