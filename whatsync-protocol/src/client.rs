//! Transport collaborator contract
//!
//! The synchronization core is transport-agnostic: everything that touches
//! the network is behind `ChatTransport`. A production implementation talks
//! to the Cloud API over HTTP and a bus/websocket for push; tests provide a
//! scripted in-memory implementation.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;
use crate::types::{Account, ConversationSummary, Message};

/// Abstract connection to the chat backend
///
/// All calls are asynchronous and may fail independently; failures are
/// scoped to a single conversation or message and never poison the core's
/// state. Implementations must be shareable across tasks.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Fetch all business accounts visible to this client
    async fn fetch_accounts(&self) -> Result<Vec<Account>>;

    /// Fetch conversation summaries, optionally scoped to one account
    async fn fetch_conversations(
        &self,
        account_id: Option<&str>,
    ) -> Result<Vec<ConversationSummary>>;

    /// Fetch the full ordered message list for one conversation
    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// Send a text message; the returned message carries the server id
    async fn send_message(&self, conversation_id: &str, body: &str) -> Result<Message>;

    /// Mark every inbound message in the conversation as read
    async fn mark_as_read(&self, conversation_id: &str) -> Result<()>;

    /// Look up or create the conversation for a phone number
    async fn get_or_create_conversation(
        &self,
        account_id: &str,
        phone_number: &str,
    ) -> Result<String>;

    /// Subscribe to the per-account push feed
    ///
    /// Raw payloads are delivered on `raw_tx` as they arrive; the caller
    /// normalizes them. The subscription stays live until canceled.
    async fn subscribe_push(
        &self,
        account_id: &str,
        raw_tx: mpsc::UnboundedSender<serde_json::Value>,
    ) -> Result<PushSubscription>;
}

/// Handle for an active push subscription
///
/// Owns the shutdown signal for whatever task feeds the raw payload
/// channel. Dropping the handle without calling [`cancel`](Self::cancel)
/// leaves the feed running; scope changes must cancel explicitly.
pub struct PushSubscription {
    account_id: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PushSubscription {
    /// Create a handle from a shutdown sender and an optional feed task
    pub fn new(
        account_id: impl Into<String>,
        shutdown_tx: Option<oneshot::Sender<()>>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            shutdown_tx,
            task,
        }
    }

    /// Account this subscription is scoped to
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Tear the subscription down
    ///
    /// Signals the feed task to stop and aborts it if it does not own a
    /// shutdown receiver.
    pub fn cancel(mut self) {
        debug!("Canceling push subscription for account {}", self.account_id);
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        } else if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for PushSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushSubscription")
            .field("account_id", &self.account_id)
            .finish()
    }
}
