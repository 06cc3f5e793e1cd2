//! Poll channel adapter
//!
//! On a fixed interval, fetches the active account's conversation list and
//! the active conversation's messages, emitting each as an independent
//! snapshot event. A cycle that would interleave with an in-flight send for
//! the scoped conversation is skipped entirely, so a stale read can never
//! clobber the optimistic entry the send just created.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use whatsync_protocol::{ChatTransport, SyncEvent};

/// What one poll cycle covers
#[derive(Debug, Clone)]
pub struct PollScope {
    /// Account whose conversation list is refreshed
    pub account_id: String,
    /// Conversation whose message list is refreshed, when one is open
    pub conversation_id: Option<String>,
}

/// Periodic snapshot producer for one scope
///
/// Owns its timer task; the scope is fixed at spawn so completions from a
/// superseded scope identify themselves and can be discarded downstream.
pub struct PollChannel {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollChannel {
    /// Spawn the polling task
    ///
    /// `sends_in_flight` is the count of outbound sends currently awaiting
    /// confirmation; any non-zero value defers the cycle to the next tick.
    pub fn start(
        transport: Arc<dyn ChatTransport>,
        scope: PollScope,
        poll_interval: Duration,
        events: mpsc::UnboundedSender<SyncEvent>,
        sends_in_flight: Arc<AtomicUsize>,
    ) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                "Poll channel started for account {} (every {:?})",
                scope.account_id, poll_interval
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if sends_in_flight.load(Ordering::SeqCst) > 0 {
                            debug!("Send in flight, deferring poll cycle");
                            continue;
                        }
                        poll_once(transport.as_ref(), &scope, &events).await;
                    }
                    _ = &mut shutdown_rx => {
                        debug!("Poll channel for account {} shut down", scope.account_id);
                        break;
                    }
                }
            }
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Stop polling; any in-flight cycle's completion is dropped unused
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for PollChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollChannel").finish()
    }
}

/// One poll cycle: conversation summaries, then the open thread
///
/// The two fetches fail independently; either failure leaves prior state
/// intact and surfaces as a channel error event.
async fn poll_once(
    transport: &dyn ChatTransport,
    scope: &PollScope,
    events: &mpsc::UnboundedSender<SyncEvent>,
) {
    match transport.fetch_conversations(Some(&scope.account_id)).await {
        Ok(conversations) => {
            let _ = events.send(SyncEvent::ConversationsSnapshot {
                account_id: scope.account_id.clone(),
                conversations,
            });
        }
        Err(e) => {
            warn!("Conversation poll failed: {}", e);
            let _ = events.send(SyncEvent::ChannelError {
                message: e.user_message(),
            });
        }
    }

    if let Some(conversation_id) = &scope.conversation_id {
        match transport.fetch_messages(conversation_id).await {
            Ok(messages) => {
                let _ = events.send(SyncEvent::MessagesSnapshot {
                    account_id: scope.account_id.clone(),
                    conversation_id: conversation_id.clone(),
                    messages,
                });
            }
            Err(e) => {
                warn!("Message poll for {} failed: {}", conversation_id, e);
                let _ = events.send(SyncEvent::ChannelError {
                    message: e.user_message(),
                });
            }
        }
    }
}
