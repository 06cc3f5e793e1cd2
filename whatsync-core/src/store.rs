//! Message store
//!
//! Ordered, deduplicated message collections, one per conversation. The
//! store is where the two channels' overlapping updates meet, so every
//! mutation is idempotent and order-tolerant:
//!
//! - a message id appears at most once per conversation, no matter how many
//!   times push and poll both deliver it
//! - status patches follow the monotonic ladder on [`MessageStatus`]; a
//!   stale regression is silently discarded rather than rejected
//! - a message whose timestamp predates the current tail is inserted at its
//!   temporal position, tolerating pushes that arrive after a poll snapshot
//!   already delivered newer context
//!
//! Mutations report whether anything visible changed so the caller can skip
//! redundant change notifications.

use std::collections::HashMap;

use tracing::debug;
use whatsync_protocol::{Message, MessageStatus};

/// Per-conversation ordered message collections
#[derive(Debug, Default)]
pub struct MessageStore {
    conversations: HashMap<String, Vec<Message>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge one message
    ///
    /// Unknown conversation ids auto-create an empty list; this store never
    /// fails on unexpected input. Returns whether a visible change occurred.
    pub fn upsert(&mut self, conversation_id: &str, message: Message) -> bool {
        let list = self
            .conversations
            .entry(conversation_id.to_string())
            .or_default();

        if let Some(existing) = list.iter_mut().find(|m| m.id == message.id) {
            return merge(existing, &message);
        }

        let at = insertion_index(list, message.timestamp);
        list.insert(at, message);
        true
    }

    /// Apply a full poll snapshot for one conversation
    ///
    /// The snapshot is folded in as a sequence of upserts, so anything the
    /// push channel already delivered wins under the same merge rules. When
    /// the snapshot's length and final message id match the current list,
    /// the whole call short-circuits as "nothing new".
    pub fn replace_snapshot(&mut self, conversation_id: &str, messages: Vec<Message>) -> bool {
        let current = self.list(conversation_id);
        if current.len() == messages.len() {
            let unchanged = match (current.last(), messages.last()) {
                (Some(a), Some(b)) => a.id == b.id,
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                debug!(
                    "Snapshot for {} matches current state, skipping",
                    conversation_id
                );
                return false;
            }
        }

        let mut changed = false;
        for message in messages {
            changed |= self.upsert(conversation_id, message);
        }
        changed
    }

    /// Patch one message's delivery status by id
    ///
    /// With a conversation hint only that list is searched; otherwise every
    /// loaded conversation is. Returns the owning conversation id when the
    /// patch was accepted, `None` when the message is not loaded or the
    /// patch would regress.
    pub fn patch_status(
        &mut self,
        conversation_id: Option<&str>,
        message_id: &str,
        status: MessageStatus,
        error_message: Option<String>,
    ) -> Option<String> {
        let keys: Vec<String> = match conversation_id {
            Some(id) => vec![id.to_string()],
            None => self.conversations.keys().cloned().collect(),
        };

        for key in keys {
            let Some(list) = self.conversations.get_mut(&key) else {
                continue;
            };
            let Some(message) = list.iter_mut().find(|m| m.id == message_id) else {
                continue;
            };
            if !message.status.accepts(status) {
                debug!(
                    "Discarding stale status {} for message {} (currently {})",
                    status.as_str(),
                    message_id,
                    message.status.as_str()
                );
                return None;
            }
            message.status = status;
            if status == MessageStatus::Failed {
                message.error_message = error_message;
            }
            return Some(key);
        }
        None
    }

    /// Swap an optimistic entry for its server-confirmed replacement
    ///
    /// Removal and insertion happen in one mutation so no reader ever
    /// observes both the temporary and the confirmed message.
    pub fn replace_message(
        &mut self,
        conversation_id: &str,
        old_id: &str,
        message: Message,
    ) -> bool {
        let list = self
            .conversations
            .entry(conversation_id.to_string())
            .or_default();
        let before = list.len();
        list.retain(|m| m.id != old_id);
        let removed = list.len() != before;
        // Re-run the insert path so dedup and ordering still hold
        self.upsert(conversation_id, message) || removed
    }

    /// Messages for one conversation, oldest first
    pub fn list(&self, conversation_id: &str) -> &[Message] {
        self.conversations
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether a message id is currently loaded in a conversation
    pub fn contains(&self, conversation_id: &str, message_id: &str) -> bool {
        self.list(conversation_id).iter().any(|m| m.id == message_id)
    }
}

/// Merge an incoming copy of an already-present message
fn merge(existing: &mut Message, incoming: &Message) -> bool {
    let mut changed = false;

    if existing.status.accepts(incoming.status) {
        existing.status = incoming.status;
        if incoming.status == MessageStatus::Failed {
            existing.error_message = incoming.error_message.clone();
        }
        changed = true;
    }

    // Fill gaps a thinner payload left behind; never overwrite content
    if existing.body.is_empty() && !incoming.body.is_empty() {
        existing.body = incoming.body.clone();
        changed = true;
    }
    if existing.media_url.is_none() && incoming.media_url.is_some() {
        existing.media_url = incoming.media_url.clone();
        changed = true;
    }

    changed
}

/// Index at which a message with `timestamp` belongs
///
/// Appends by default; walks back only past entries with strictly later
/// timestamps, preserving arrival order among equal timestamps.
fn insertion_index(list: &[Message], timestamp: i64) -> usize {
    let mut idx = list.len();
    while idx > 0 && list[idx - 1].timestamp > timestamp {
        idx -= 1;
    }
    idx
}
