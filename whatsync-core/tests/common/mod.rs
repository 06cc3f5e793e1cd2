#![allow(dead_code)]

//! Shared test support: a scripted in-memory transport
//!
//! `MockTransport` plays the server side of the `ChatTransport` contract.
//! Tests mutate its state to script poll responses, inject raw push
//! payloads, and flip failure switches; it records the calls the engine
//! makes so assertions can check the outbound traffic too.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use whatsync_core::{
    Account, AccountState, ChatTransport, ConversationSummary, Direction, Message, MessageKind,
    MessageStatus, PushSubscription, Result, SyncError,
};

#[derive(Default)]
pub struct MockState {
    pub accounts: Vec<Account>,
    pub conversations: Vec<ConversationSummary>,
    pub messages: HashMap<String, Vec<Message>>,
    pub fail_fetches: bool,
    pub fail_send: Option<String>,
    pub fail_subscribe: bool,
    pub send_delay: Option<Duration>,
    pub mark_read_calls: Vec<String>,
    pub fetch_message_calls: usize,
    pub next_send_id: u64,
}

pub struct MockTransport {
    pub state: Mutex<MockState>,
    pub push_tx: Mutex<Option<mpsc::UnboundedSender<serde_json::Value>>>,
    pub push_canceled: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                next_send_id: 1,
                ..Default::default()
            }),
            push_tx: Mutex::new(None),
            push_canceled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Inject a raw payload as if the push feed delivered it
    pub fn push_raw(&self, raw: serde_json::Value) {
        let guard = self.push_tx.lock().unwrap();
        let tx = guard.as_ref().expect("no push subscription active");
        tx.send(raw).expect("push feed closed");
    }

    pub fn push_new_message(&self, account_id: &str, conversation_id: &str, message: &Message) {
        self.push_raw(serde_json::json!({
            "type": "new_message",
            "account_id": account_id,
            "conversation_id": conversation_id,
            "message": {
                "id": message.id,
                "direction": if message.direction == Direction::Inbound { "incoming" } else { "outgoing" },
                "content": message.body,
                "message_type": "text",
                "timestamp": message.timestamp,
                "status": message.status.as_str(),
            }
        }));
    }

    pub fn push_status(&self, message_id: &str, status: &str) {
        self.push_raw(serde_json::json!({
            "type": "status_update",
            "message_id": message_id,
            "status": status,
        }));
    }

    pub fn was_push_canceled(&self) -> bool {
        self.push_canceled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn fetch_accounts(&self) -> Result<Vec<Account>> {
        let state = self.state.lock().unwrap();
        if state.fail_fetches {
            return Err(SyncError::fetch("scripted failure"));
        }
        Ok(state.accounts.clone())
    }

    async fn fetch_conversations(
        &self,
        account_id: Option<&str>,
    ) -> Result<Vec<ConversationSummary>> {
        let state = self.state.lock().unwrap();
        if state.fail_fetches {
            return Err(SyncError::fetch("scripted failure"));
        }
        Ok(state
            .conversations
            .iter()
            .filter(|c| account_id.is_none() || Some(c.account_id.as_str()) == account_id)
            .cloned()
            .collect())
    }

    async fn fetch_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let mut state = self.state.lock().unwrap();
        state.fetch_message_calls += 1;
        if state.fail_fetches {
            return Err(SyncError::fetch("scripted failure"));
        }
        Ok(state
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, conversation_id: &str, body: &str) -> Result<Message> {
        let delay = self.state.lock().unwrap().send_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if let Some(reason) = &state.fail_send {
            return Err(SyncError::send(reason.clone()));
        }

        let id = state.next_send_id;
        state.next_send_id += 1;
        let confirmed = Message {
            id: format!("srv-{}", id),
            conversation_id: conversation_id.to_string(),
            direction: Direction::Outbound,
            kind: MessageKind::Text,
            body: body.to_string(),
            media_url: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
            status: MessageStatus::Sent,
            error_message: None,
        };
        state
            .messages
            .entry(conversation_id.to_string())
            .or_default()
            .push(confirmed.clone());
        Ok(confirmed)
    }

    async fn mark_as_read(&self, conversation_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.mark_read_calls.push(conversation_id.to_string());
        Ok(())
    }

    async fn get_or_create_conversation(
        &self,
        account_id: &str,
        phone_number: &str,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .conversations
            .iter()
            .find(|c| c.account_id == account_id && c.phone_number == phone_number)
        {
            return Ok(existing.id.clone());
        }
        let id = format!("conv-{}", state.conversations.len() + 1);
        state
            .conversations
            .push(ConversationSummary::new(&id, account_id, phone_number));
        Ok(id)
    }

    async fn subscribe_push(
        &self,
        account_id: &str,
        raw_tx: mpsc::UnboundedSender<serde_json::Value>,
    ) -> Result<PushSubscription> {
        if self.state.lock().unwrap().fail_subscribe {
            return Err(SyncError::subscription("bus unreachable"));
        }

        *self.push_tx.lock().unwrap() = Some(raw_tx);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let canceled = Arc::clone(&self.push_canceled);
        tokio::spawn(async move {
            // A dropped sender is not a cancel; only an explicit one counts
            if shutdown_rx.await.is_ok() {
                canceled.store(true, Ordering::SeqCst);
            }
        });

        Ok(PushSubscription::new(account_id, Some(shutdown_tx), None))
    }
}

pub fn account(id: &str, name: &str) -> Account {
    Account {
        id: id.to_string(),
        name: name.to_string(),
        phone_number_id: format!("pn-{}", id),
        state: AccountState::Connected,
        active: true,
    }
}

pub fn summary(id: &str, account_id: &str, at: i64, unread: u32) -> ConversationSummary {
    ConversationSummary {
        id: id.to_string(),
        account_id: account_id.to_string(),
        display_name: format!("Contact {}", id),
        phone_number: format!("49151{}", id.len()),
        last_message_at: Some(at),
        last_message_preview: "hello".to_string(),
        unread_count: unread,
    }
}

pub fn inbound(id: &str, conversation_id: &str, timestamp: i64) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        direction: Direction::Inbound,
        kind: MessageKind::Text,
        body: format!("msg {}", id),
        media_url: None,
        timestamp,
        status: MessageStatus::Delivered,
        error_message: None,
    }
}
