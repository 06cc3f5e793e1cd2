//! Session controller
//!
//! `SyncEngine` is the outward face of the core: it owns the reconciler
//! behind a single lock, the dispatcher task that drains channel events,
//! and the lifecycle of the push subscription and poll timer. Channel scope
//! follows the active (account, conversation) selection; switching either
//! tears the old scope down before the new one starts.
//!
//! All reconciliation happens on one logical thread: adapter events are
//! applied by the dispatcher, local actions by the caller's task, both
//! serialized through the reconciler's write lock. Transport calls happen
//! outside the lock so a slow network response never stalls merging, and
//! their completions re-enter as ordinary mutations subject to the same
//! rules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use whatsync_protocol::{
    Account, ChatTransport, ConversationSummary, Message, Result, SyncError, SyncEvent,
};

use crate::channel::{PollChannel, PollScope, PushChannel};
use crate::config::SyncConfig;
use crate::reconciler::{Reconciler, StateChange};

/// Orchestrates the reconciler, channel adapters and session selection
pub struct SyncEngine {
    transport: Arc<dyn ChatTransport>,
    config: SyncConfig,
    state: Arc<RwLock<Reconciler>>,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
    dispatcher: Option<JoinHandle<()>>,
    poll: Option<PollChannel>,
    push: Option<PushChannel>,
    push_available: bool,
    sends_in_flight: Arc<AtomicUsize>,
    change_rx: Option<mpsc::UnboundedReceiver<StateChange>>,
}

impl SyncEngine {
    /// Create an engine; no channels run until [`start`](Self::start)
    pub fn new(transport: Arc<dyn ChatTransport>, config: SyncConfig) -> Self {
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SyncEvent>();

        let state = Arc::new(RwLock::new(Reconciler::new(
            config.preview_length,
            change_tx,
        )));

        let dispatcher = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                while let Some(event) = event_rx.recv().await {
                    state.write().await.on_event(event);
                }
                debug!("Event dispatcher stopped");
            }
        });

        Self {
            transport,
            config,
            state,
            event_tx,
            dispatcher: Some(dispatcher),
            poll: None,
            push: None,
            push_available: false,
            sends_in_flight: Arc::new(AtomicUsize::new(0)),
            change_rx: Some(change_rx),
        }
    }

    /// Take the change-notification receiver (once)
    pub fn changes(&mut self) -> Option<mpsc::UnboundedReceiver<StateChange>> {
        self.change_rx.take()
    }

    /// Select an account and bring its channels up
    ///
    /// Cancels any previous account's subscription and poll scope, attempts
    /// the push subscription (failure degrades to poll-only at a tighter
    /// interval), and primes the conversation list.
    pub async fn start(&mut self, account_id: &str) -> Result<()> {
        self.stop_channels();
        self.state.write().await.set_account(account_id);

        if self.config.push_enabled {
            match PushChannel::start(self.transport.as_ref(), account_id, self.event_tx.clone())
                .await
            {
                Ok(push) => {
                    self.push = Some(push);
                    self.push_available = true;
                }
                Err(e) => {
                    warn!("Push unavailable, running poll-only: {}", e);
                }
            }
        }

        // Prime the list immediately rather than waiting a poll interval
        match self
            .transport
            .fetch_conversations(Some(account_id))
            .await
        {
            Ok(conversations) => self
                .state
                .write()
                .await
                .on_conversations_snapshot(account_id, conversations),
            Err(e) => {
                warn!("Initial conversation load failed: {}", e);
                self.state.write().await.warn_transient(e.user_message());
            }
        }

        self.restart_poll(account_id, None);
        info!(
            "Session started for account {} (push: {})",
            account_id, self.push_available
        );
        Ok(())
    }

    /// Focus a conversation: load it, scope polling to it, mark it read
    pub async fn activate_conversation(&mut self, conversation_id: &str) -> Result<()> {
        let account_id = self.active_account()
            .await
            .ok_or_else(|| SyncError::config("no account selected"))?;

        self.state.write().await.activate(conversation_id);

        // Full load, applied with the same merge rules as any poll snapshot
        match self.transport.fetch_messages(conversation_id).await {
            Ok(messages) => {
                self.state
                    .write()
                    .await
                    .on_messages_snapshot(&account_id, conversation_id, messages);
            }
            Err(e) => {
                warn!("Message load for {} failed: {}", conversation_id, e);
                self.state.write().await.warn_transient(e.user_message());
            }
        }

        self.restart_poll(&account_id, Some(conversation_id.to_string()));

        // Activation implies read; a failure here only delays the receipt
        if let Err(e) = self.mark_read(conversation_id).await {
            warn!("Mark-as-read for {} failed: {}", conversation_id, e);
        }
        Ok(())
    }

    /// Open (or start) the conversation with a phone number
    pub async fn open_conversation(&mut self, phone_number: &str) -> Result<String> {
        let account_id = self.active_account()
            .await
            .ok_or_else(|| SyncError::config("no account selected"))?;

        let conversation_id = self
            .transport
            .get_or_create_conversation(&account_id, phone_number)
            .await?;
        self.activate_conversation(&conversation_id).await?;
        Ok(conversation_id)
    }

    /// Send a message with optimistic local echo
    ///
    /// The pending entry appears immediately; the confirmation (or failure)
    /// settles it when the transport call returns. Poll cycles for the
    /// conversation are deferred while the send is in flight.
    pub async fn send_message(&self, conversation_id: &str, body: &str) -> Result<Message> {
        let optimistic = self.state.write().await.begin_send(conversation_id, body);

        self.sends_in_flight.fetch_add(1, Ordering::SeqCst);
        let outcome = self.transport.send_message(conversation_id, body).await;
        self.sends_in_flight.fetch_sub(1, Ordering::SeqCst);

        self.state
            .write()
            .await
            .complete_send(conversation_id, &optimistic.id, outcome)
    }

    /// Mark a conversation read remotely, then clear the local counter
    pub async fn mark_read(&self, conversation_id: &str) -> Result<()> {
        self.transport.mark_as_read(conversation_id).await?;
        self.state.write().await.mark_read_confirmed(conversation_id);
        Ok(())
    }

    /// Accounts visible to this client (pass-through to the transport)
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        self.transport.fetch_accounts().await
    }

    /// Conversation summaries for the active account, most recent first
    pub async fn conversations(&self) -> Vec<ConversationSummary> {
        self.state.read().await.conversations()
    }

    /// Messages of one conversation, oldest first
    pub async fn messages(&self, conversation_id: &str) -> Vec<Message> {
        self.state.read().await.messages(conversation_id).to_vec()
    }

    /// Whether the push channel is currently live
    pub fn push_available(&self) -> bool {
        self.push_available
    }

    /// Tear everything down: poll timer, push subscription, dispatcher
    pub fn dispose(&mut self) {
        self.stop_channels();
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.abort();
        }
        debug!("Sync engine disposed");
    }

    async fn active_account(&self) -> Option<String> {
        self.state
            .read()
            .await
            .selection()
            .account_id()
            .map(str::to_string)
    }

    fn restart_poll(&mut self, account_id: &str, conversation_id: Option<String>) {
        if let Some(poll) = self.poll.take() {
            poll.stop();
        }
        let scope = PollScope {
            account_id: account_id.to_string(),
            conversation_id,
        };
        self.poll = Some(PollChannel::start(
            Arc::clone(&self.transport),
            scope,
            self.config.poll_interval(self.push_available),
            self.event_tx.clone(),
            Arc::clone(&self.sends_in_flight),
        ));
    }

    fn stop_channels(&mut self) {
        if let Some(poll) = self.poll.take() {
            poll.stop();
        }
        if let Some(push) = self.push.take() {
            push.stop();
        }
        self.push_available = false;
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
