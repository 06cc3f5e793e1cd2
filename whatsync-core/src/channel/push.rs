//! Push channel adapter
//!
//! Subscribes to the per-account push feed and normalizes each raw payload
//! into exactly one event, with no buffering or coalescing. Payloads the
//! normalizer rejects are dropped without touching any state; the feed is
//! best-effort by contract.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use whatsync_protocol::{payload, ChatTransport, PushSubscription, Result, SyncEvent};

/// Active push subscription plus its normalizer task
pub struct PushChannel {
    account_id: String,
    subscription: Option<PushSubscription>,
    normalizer: Option<JoinHandle<()>>,
}

impl PushChannel {
    /// Subscribe and start forwarding normalized events
    ///
    /// Fails with `SubscriptionFailed` when the transport cannot subscribe;
    /// callers degrade to poll-only operation in that case.
    pub async fn start(
        transport: &dyn ChatTransport,
        account_id: &str,
        events: mpsc::UnboundedSender<SyncEvent>,
    ) -> Result<Self> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<serde_json::Value>();
        let subscription = transport.subscribe_push(account_id, raw_tx).await?;

        let normalizer = tokio::spawn(async move {
            while let Some(raw) = raw_rx.recv().await {
                match payload::normalize(&raw) {
                    Some(event) => {
                        if events.send(event).is_err() {
                            // Reconciler is gone; nothing left to feed
                            break;
                        }
                    }
                    None => warn!("Dropping unusable push payload"),
                }
            }
            debug!("Push normalizer stopped");
        });

        info!("Push channel started for account {}", account_id);
        Ok(Self {
            account_id: account_id.to_string(),
            subscription: Some(subscription),
            normalizer: Some(normalizer),
        })
    }

    /// Account this channel is scoped to
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Cancel the subscription and stop the normalizer
    pub fn stop(mut self) {
        info!("Push channel stopped for account {}", self.account_id);
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        if let Some(normalizer) = self.normalizer.take() {
            normalizer.abort();
        }
    }
}

impl std::fmt::Debug for PushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushChannel")
            .field("account_id", &self.account_id)
            .finish()
    }
}
