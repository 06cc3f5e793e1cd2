//! Core domain types for chat synchronization
//!
//! These types model the client-side view of a WhatsApp Business account:
//! accounts, conversation summaries and individual messages. They are the
//! currency exchanged between the channel adapters, the reconciler and the
//! rendering layer.

use serde::{Deserialize, Serialize};

/// Connection state of a business account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountState {
    /// Credentials verified against the API
    Connected,
    /// Not yet verified or last verification failed
    Disconnected,
}

impl AccountState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

/// A WhatsApp Business account
///
/// Owned externally; the core only reads the lifecycle flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier
    pub id: String,

    /// Human-readable account name
    pub name: String,

    /// Phone Number ID registered with the Cloud API
    pub phone_number_id: String,

    /// Connection state
    #[serde(default = "default_account_state")]
    pub state: AccountState,

    /// Whether the account is active
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_account_state() -> AccountState {
    AccountState::Disconnected
}

fn default_true() -> bool {
    true
}

/// Summary of a conversation for list display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation identifier
    pub id: String,

    /// Owning account identifier
    pub account_id: String,

    /// Contact name, falling back to the phone number
    pub display_name: String,

    /// Phone number with country code (no + prefix)
    pub phone_number: String,

    /// Timestamp of the latest message (ms since epoch)
    #[serde(default)]
    pub last_message_at: Option<i64>,

    /// Preview of the latest message body
    #[serde(default)]
    pub last_message_preview: String,

    /// Number of unread inbound messages
    #[serde(default)]
    pub unread_count: u32,
}

impl ConversationSummary {
    /// Create a summary with no message history yet
    pub fn new(id: impl Into<String>, account_id: impl Into<String>, phone_number: impl Into<String>) -> Self {
        let phone_number = phone_number.into();
        Self {
            id: id.into(),
            account_id: account_id.into(),
            display_name: phone_number.clone(),
            phone_number,
            last_message_at: None,
            last_message_preview: String::new(),
            unread_count: 0,
        }
    }
}

/// Message direction relative to the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from the contact
    #[serde(alias = "incoming")]
    Inbound,
    /// Sent by the account
    #[serde(alias = "outgoing")]
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "inbound" | "incoming" => Some(Self::Inbound),
            "outbound" | "outgoing" => Some(Self::Outbound),
            _ => None,
        }
    }
}

/// Delivery status of a message
///
/// Transitions are monotonically non-decreasing along
/// `Pending < Sent < Delivered < Read`. `Failed` is reachable from any
/// non-terminal state and is itself terminal, so a stale delayed update can
/// never resurrect a failed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Created locally, not yet accepted by the API
    Pending,
    /// Accepted by the API
    Sent,
    /// Delivered to the recipient device
    Delivered,
    /// Read by the recipient
    Read,
    /// Send or delivery failed (terminal)
    Failed,
}

impl MessageStatus {
    /// Position on the delivery ladder; `Failed` sits outside it
    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Sent => 1,
            Self::Delivered => 2,
            Self::Read => 3,
            Self::Failed => 4,
        }
    }

    /// Whether no further transitions are accepted from this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Whether a transition to `next` is accepted
    ///
    /// Regressions and repeats are rejected so that applying the same status
    /// event twice is indistinguishable from applying it once.
    pub fn accepts(&self, next: MessageStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Failed {
            return true;
        }
        next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Content kind of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Location,
    Sticker,
    Contacts,
    Reaction,
    /// Anything the client does not know how to render
    Unknown,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
            Self::Location => "location",
            Self::Sticker => "sticker",
            Self::Contacts => "contacts",
            Self::Reaction => "reaction",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "text" => Self::Text,
            "image" => Self::Image,
            "video" => Self::Video,
            "audio" => Self::Audio,
            "document" => Self::Document,
            "location" => Self::Location,
            "sticker" => Self::Sticker,
            "contacts" => Self::Contacts,
            "reaction" => Self::Reaction,
            _ => Self::Unknown,
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier, unique within its conversation
    ///
    /// Locally created messages carry a `tmp-` prefixed id until the server
    /// confirms the send with its own identifier.
    pub id: String,

    /// Owning conversation identifier
    pub conversation_id: String,

    /// Direction relative to the account
    pub direction: Direction,

    /// Content kind
    #[serde(default = "default_kind")]
    pub kind: MessageKind,

    /// Message body or content description
    #[serde(default)]
    pub body: String,

    /// Media identifier or URL for non-text messages
    #[serde(default)]
    pub media_url: Option<String>,

    /// UNIX epoch timestamp in milliseconds
    pub timestamp: i64,

    /// Delivery status
    pub status: MessageStatus,

    /// Failure reason, present only when status is `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

fn default_kind() -> MessageKind {
    MessageKind::Text
}

impl Message {
    /// Create an optimistic outbound message awaiting server confirmation
    pub fn pending(conversation_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: format!("tmp-{}", uuid::Uuid::new_v4()),
            conversation_id: conversation_id.into(),
            direction: Direction::Outbound,
            kind: MessageKind::Text,
            body: body.into(),
            media_url: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
            status: MessageStatus::Pending,
            error_message: None,
        }
    }

    /// Whether this is a locally created entry not yet confirmed
    pub fn is_optimistic(&self) -> bool {
        self.id.starts_with("tmp-")
    }

    /// Truncated body for conversation list previews
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.body.chars().take(max_chars).collect();
        if self.body.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}
