//! Reconciler
//!
//! Central merge point for every source of truth: push events, poll
//! snapshots and locally originated actions all land here and are applied
//! to the message store and conversation index under one set of precedence
//! rules. The reconciler itself is synchronous; the session layer serializes
//! access to it, which is the only locking this core needs.
//!
//! Precedence is not enforced by sequencing but by the stores' merge rules:
//! push and local writes always survive concurrently arriving poll
//! snapshots because snapshots can only union in messages (never remove)
//! and can never regress a delivery status.

use tokio::sync::mpsc;
use tracing::{debug, warn};
use whatsync_protocol::{
    ConversationSummary, Direction, Message, MessageStatus, Result, SyncEvent,
};

use crate::index::{ConversationIndex, SummaryPatch};
use crate::store::MessageStore;

/// Notification that some visible state changed
///
/// The rendering layer treats these as cheap invalidation hints; the actual
/// data is read back through the engine's accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    /// The conversation list (order, previews or unread counts) changed
    ConversationsChanged,
    /// The message list of one conversation changed
    MessagesChanged {
        /// Conversation whose list changed
        conversation_id: String,
    },
    /// A recoverable failure worth a transient user-visible notice
    TransientWarning {
        /// Human-readable description
        message: String,
    },
}

/// The (account, conversation) pair currently in focus
#[derive(Debug, Clone, Default)]
pub struct Selection {
    account_id: Option<String>,
    conversation_id: Option<String>,
}

impl Selection {
    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    fn is_account(&self, account_id: &str) -> bool {
        self.account_id.as_deref() == Some(account_id)
    }

    fn is_active(&self, conversation_id: &str) -> bool {
        self.conversation_id.as_deref() == Some(conversation_id)
    }
}

/// Merge core applying events from both channels and local actions
pub struct Reconciler {
    store: MessageStore,
    index: ConversationIndex,
    selection: Selection,
    preview_length: usize,
    change_tx: mpsc::UnboundedSender<StateChange>,
}

impl Reconciler {
    pub fn new(preview_length: usize, change_tx: mpsc::UnboundedSender<StateChange>) -> Self {
        Self {
            store: MessageStore::new(),
            index: ConversationIndex::new(),
            selection: Selection::default(),
            preview_length,
            change_tx,
        }
    }

    /// Dispatch one normalized channel event
    pub fn on_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Message {
                account_id,
                conversation_id,
                message,
            } => self.on_push_message(&account_id, &conversation_id, message),
            SyncEvent::Status {
                conversation_id,
                message_id,
                status,
                error_message,
            } => self.on_status_update(conversation_id.as_deref(), &message_id, status, error_message),
            SyncEvent::ConversationsSnapshot {
                account_id,
                conversations,
            } => self.on_conversations_snapshot(&account_id, conversations),
            SyncEvent::MessagesSnapshot {
                account_id,
                conversation_id,
                messages,
            } => self.on_messages_snapshot(&account_id, &conversation_id, messages),
            SyncEvent::ChannelError { message } => self.warn_transient(message),
        }
    }

    /// A single message arrived on the push channel
    pub fn on_push_message(&mut self, account_id: &str, conversation_id: &str, message: Message) {
        if !self.selection.is_account(account_id) {
            debug!(
                "Ignoring push message for unselected account {}",
                account_id
            );
            return;
        }

        let active = self.selection.is_active(conversation_id);
        let inbound = message.direction == Direction::Inbound;
        let patch = SummaryPatch {
            account_id: Some(account_id.to_string()),
            last_message_at: Some(message.timestamp),
            last_message_preview: Some(message.preview(self.preview_length)),
            ..Default::default()
        };

        if self.store.upsert(conversation_id, message) {
            self.emit(StateChange::MessagesChanged {
                conversation_id: conversation_id.to_string(),
            });
        }

        // The list stays current even when the conversation is not focused
        let mut index_changed = self.index.apply_summary_patch(conversation_id, patch);
        if !active && inbound {
            self.index.increment_unread(conversation_id);
            index_changed = true;
        }
        if index_changed {
            self.emit(StateChange::ConversationsChanged);
        }
    }

    /// A delivery status update arrived on the push channel
    ///
    /// Updates for conversations that are not loaded are dropped; the next
    /// poll snapshot for those conversations carries the settled status.
    pub fn on_status_update(
        &mut self,
        conversation_id: Option<&str>,
        message_id: &str,
        status: MessageStatus,
        error_message: Option<String>,
    ) {
        match self
            .store
            .patch_status(conversation_id, message_id, status, error_message)
        {
            Some(owner) => self.emit(StateChange::MessagesChanged {
                conversation_id: owner,
            }),
            None => debug!(
                "Dropping status update for unloaded or settled message {}",
                message_id
            ),
        }
    }

    /// A conversation-summary snapshot arrived on the poll channel
    pub fn on_conversations_snapshot(
        &mut self,
        account_id: &str,
        conversations: Vec<ConversationSummary>,
    ) {
        if !self.selection.is_account(account_id) {
            debug!("Dropping conversation snapshot for stale account scope");
            return;
        }

        let mut changed = false;
        for summary in conversations {
            let mut patch = SummaryPatch::from_summary(&summary);
            if self.selection.is_active(&summary.id) {
                // The active conversation is being viewed; snapshot unread
                // counts are trusted only for the others
                patch.unread_count = Some(0);
            }
            changed |= self.index.apply_summary_patch(&summary.id, patch);
        }
        if changed {
            self.emit(StateChange::ConversationsChanged);
        }
    }

    /// A message-list snapshot arrived on the poll channel
    pub fn on_messages_snapshot(
        &mut self,
        account_id: &str,
        conversation_id: &str,
        messages: Vec<Message>,
    ) {
        if !self.selection.is_account(account_id) || !self.selection.is_active(conversation_id) {
            debug!(
                "Dropping message snapshot for stale scope {}",
                conversation_id
            );
            return;
        }

        if self.store.replace_snapshot(conversation_id, messages) {
            self.emit(StateChange::MessagesChanged {
                conversation_id: conversation_id.to_string(),
            });
        }
    }

    /// Create the optimistic entry for a local send
    ///
    /// Returns the pending message; the caller performs the outbound call
    /// and reports back through [`complete_send`](Self::complete_send).
    pub fn begin_send(&mut self, conversation_id: &str, body: &str) -> Message {
        let optimistic = Message::pending(conversation_id, body);

        self.store.upsert(conversation_id, optimistic.clone());
        self.emit(StateChange::MessagesChanged {
            conversation_id: conversation_id.to_string(),
        });

        let patch = SummaryPatch {
            account_id: self.selection.account_id.clone(),
            last_message_at: Some(optimistic.timestamp),
            last_message_preview: Some(optimistic.preview(self.preview_length)),
            ..Default::default()
        };
        if self.index.apply_summary_patch(conversation_id, patch) {
            self.emit(StateChange::ConversationsChanged);
        }

        optimistic
    }

    /// Settle an optimistic send with the transport's outcome
    ///
    /// On success the optimistic entry is swapped for the server-confirmed
    /// message in a single store mutation; the two may carry different
    /// identifiers. On failure the optimistic entry is forced to `Failed`
    /// with the reason attached, which is terminal.
    pub fn complete_send(
        &mut self,
        conversation_id: &str,
        temp_id: &str,
        outcome: Result<Message>,
    ) -> Result<Message> {
        match outcome {
            Ok(confirmed) => {
                if self
                    .store
                    .replace_message(conversation_id, temp_id, confirmed.clone())
                {
                    self.emit(StateChange::MessagesChanged {
                        conversation_id: conversation_id.to_string(),
                    });
                }
                let patch = SummaryPatch {
                    account_id: self.selection.account_id.clone(),
                    last_message_at: Some(confirmed.timestamp),
                    last_message_preview: Some(confirmed.preview(self.preview_length)),
                    ..Default::default()
                };
                if self.index.apply_summary_patch(conversation_id, patch) {
                    self.emit(StateChange::ConversationsChanged);
                }
                Ok(confirmed)
            }
            Err(e) => {
                warn!("Send to {} failed: {}", conversation_id, e);
                self.store.patch_status(
                    Some(conversation_id),
                    temp_id,
                    MessageStatus::Failed,
                    Some(e.to_string()),
                );
                self.emit(StateChange::MessagesChanged {
                    conversation_id: conversation_id.to_string(),
                });
                Err(e)
            }
        }
    }

    /// The mark-as-read call succeeded; zero the local counter
    pub fn mark_read_confirmed(&mut self, conversation_id: &str) {
        if self.index.clear_unread(conversation_id) {
            self.emit(StateChange::ConversationsChanged);
        }
    }

    /// Switch the selected account; the open conversation is dropped
    pub fn set_account(&mut self, account_id: &str) {
        self.selection = Selection {
            account_id: Some(account_id.to_string()),
            conversation_id: None,
        };
    }

    /// Focus a conversation and zero its unread counter
    pub fn activate(&mut self, conversation_id: &str) {
        self.selection.conversation_id = Some(conversation_id.to_string());
        if self.index.clear_unread(conversation_id) {
            self.emit(StateChange::ConversationsChanged);
        }
    }

    /// Surface a recovered failure without touching any state
    pub fn warn_transient(&mut self, message: String) {
        self.emit(StateChange::TransientWarning { message });
    }

    /// Current focus
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Messages of one conversation, oldest first
    pub fn messages(&self, conversation_id: &str) -> &[Message] {
        self.store.list(conversation_id)
    }

    /// Conversation summaries for the selected account, most recent first
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        match self.selection.account_id() {
            Some(account_id) => self
                .index
                .list()
                .filter(|s| s.account_id == account_id)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// One conversation's summary, if known
    pub fn conversation(&self, conversation_id: &str) -> Option<&ConversationSummary> {
        self.index.get(conversation_id)
    }

    fn emit(&self, change: StateChange) {
        // The rendering side may have gone away; that is not our problem
        let _ = self.change_tx.send(change);
    }
}
