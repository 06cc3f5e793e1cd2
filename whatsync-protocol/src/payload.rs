//! Push notification payloads
//!
//! The push channel delivers per-account notifications mirroring what the
//! server-side webhook forwards onto its bus:
//!
//! ```json
//! {
//!     "type": "new_message",
//!     "account_id": "1",
//!     "conversation_id": "7",
//!     "message": {
//!         "id": "wamid.abc",
//!         "direction": "incoming",
//!         "content": "Hello!",
//!         "message_type": "text",
//!         "timestamp": "2025-06-01T10:15:00",
//!         "status": "delivered",
//!         "phone_number": "4915112345678"
//!     }
//! }
//! ```
//!
//! ```json
//! {
//!     "type": "status_update",
//!     "message_id": "wamid.abc",
//!     "status": "read",
//!     "error_message": null
//! }
//! ```
//!
//! Both channels are best-effort: a payload the client cannot make sense of
//! is dropped without mutating any state, so parsing here never returns an
//! error. Field extraction is deliberately lenient (ids may arrive as
//! numbers or strings, timestamps as epoch milliseconds or ISO text).

use chrono::{NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::events::SyncEvent;
use crate::types::{Direction, Message, MessageKind, MessageStatus};

/// Normalize one raw push payload into at most one event
///
/// Returns `None` for payloads with an unknown `type`, missing required
/// fields, or an unrecognized status string. Exactly one event is produced
/// per accepted payload; there is no buffering or coalescing.
pub fn normalize(raw: &Value) -> Option<SyncEvent> {
    let kind = raw.get("type").and_then(Value::as_str)?;

    match kind {
        "new_message" => normalize_new_message(raw),
        "status_update" => normalize_status_update(raw),
        other => {
            debug!("Ignoring push payload of unknown type: {}", other);
            None
        }
    }
}

fn normalize_new_message(raw: &Value) -> Option<SyncEvent> {
    let account_id = field_as_string(raw, "account_id")?;
    let conversation_id = field_as_string(raw, "conversation_id")?;
    let body = raw.get("message")?;

    let message = normalize_message(&conversation_id, body)?;

    Some(SyncEvent::Message {
        account_id,
        conversation_id,
        message,
    })
}

fn normalize_status_update(raw: &Value) -> Option<SyncEvent> {
    let message_id = field_as_string(raw, "message_id")
        .or_else(|| field_as_string(raw, "whatsapp_message_id"))?;

    let status_str = raw.get("status").and_then(Value::as_str)?;
    let status = match MessageStatus::from_str(status_str) {
        Some(status) => status,
        None => {
            warn!("Dropping status update with unknown status: {}", status_str);
            return None;
        }
    };

    let error_message = raw
        .get("error_message")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(SyncEvent::Status {
        conversation_id: field_as_string(raw, "conversation_id"),
        message_id,
        status,
        error_message,
    })
}

/// Build a `Message` from a raw message object
///
/// Accepts both the pre-rendered shape (a `content` field) and the Cloud API
/// webhook shape, where content lives in a per-kind sub-object.
pub fn normalize_message(conversation_id: &str, raw: &Value) -> Option<Message> {
    let id = field_as_string(raw, "id")?;

    let kind = raw
        .get("message_type")
        .or_else(|| raw.get("type"))
        .and_then(Value::as_str)
        .map(MessageKind::from_str)
        .unwrap_or(MessageKind::Text);

    let direction = raw
        .get("direction")
        .and_then(Value::as_str)
        .and_then(Direction::from_str)
        .unwrap_or(Direction::Inbound);

    let status = raw
        .get("status")
        .and_then(Value::as_str)
        .and_then(MessageStatus::from_str)
        .unwrap_or(MessageStatus::Delivered);

    let (body, media_url) = match raw.get("content").and_then(Value::as_str) {
        Some(content) => (content.to_string(), field_as_string(raw, "media_url")),
        None => extract_content(kind, raw),
    };

    Some(Message {
        id,
        conversation_id: conversation_id.to_string(),
        direction,
        kind,
        body,
        media_url,
        timestamp: parse_timestamp(raw.get("timestamp")),
        status,
        error_message: raw
            .get("error_message")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Extract display content and media id from a Cloud API message object
fn extract_content(kind: MessageKind, raw: &Value) -> (String, Option<String>) {
    match kind {
        MessageKind::Text => {
            let body = raw
                .pointer("/text/body")
                .and_then(Value::as_str)
                .unwrap_or_default();
            (body.to_string(), None)
        }
        MessageKind::Image => (
            nested_str(raw, "image", "caption").unwrap_or_else(|| "[Image]".to_string()),
            nested_str(raw, "image", "id"),
        ),
        MessageKind::Video => (
            nested_str(raw, "video", "caption").unwrap_or_else(|| "[Video]".to_string()),
            nested_str(raw, "video", "id"),
        ),
        MessageKind::Audio => ("[Audio Message]".to_string(), nested_str(raw, "audio", "id")),
        MessageKind::Document => (
            nested_str(raw, "document", "filename").unwrap_or_else(|| "[Document]".to_string()),
            nested_str(raw, "document", "id"),
        ),
        MessageKind::Location => {
            let name = nested_str(raw, "location", "name").unwrap_or_default();
            let lat = raw
                .pointer("/location/latitude")
                .map(Value::to_string)
                .unwrap_or_default();
            let lon = raw
                .pointer("/location/longitude")
                .map(Value::to_string)
                .unwrap_or_default();
            (format!("\u{1F4CD} {} ({}, {})", name, lat, lon), None)
        }
        MessageKind::Reaction => (
            format!(
                "Reaction: {}",
                nested_str(raw, "reaction", "emoji").unwrap_or_default()
            ),
            None,
        ),
        MessageKind::Sticker => ("[Sticker]".to_string(), nested_str(raw, "sticker", "id")),
        MessageKind::Contacts => ("[Contacts]".to_string(), None),
        MessageKind::Unknown => ("[Unsupported message]".to_string(), None),
    }
}

/// Read a field that may arrive as a JSON string or number
fn field_as_string(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn nested_str(raw: &Value, object: &str, key: &str) -> Option<String> {
    raw.get(object)
        .and_then(|o| o.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Parse a timestamp that may be epoch milliseconds or ISO 8601 text
///
/// Falls back to the current time rather than rejecting the payload.
fn parse_timestamp(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_else(now_millis),
        Some(Value::String(s)) => parse_iso_timestamp(s).unwrap_or_else(now_millis),
        _ => now_millis(),
    }
}

fn parse_iso_timestamp(s: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    // The server serializes naive UTC datetimes without an offset
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
