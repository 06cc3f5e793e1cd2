//! whatsync synchronization engine
//!
//! Keeps a client-side view of conversations and their messages consistent
//! when updates arrive from two independent, unordered, partially
//! overlapping sources: a low-latency push feed and a periodic poll, while
//! the user concurrently composes and sends. The merge rules are idempotent
//! and order-tolerant, so no sequencing across channels is required.
//!
//! Entry point is [`SyncEngine`]; everything network-facing hides behind
//! [`whatsync_protocol::ChatTransport`].

pub mod channel;
pub mod config;
pub mod index;
pub mod reconciler;
pub mod session;
pub mod store;

pub use channel::{PollChannel, PollScope, PushChannel};
pub use config::SyncConfig;
pub use index::{ConversationIndex, SummaryPatch};
pub use reconciler::{Reconciler, Selection, StateChange};
pub use session::SyncEngine;
pub use store::MessageStore;

// Re-export the protocol surface so consumers need one import
pub use whatsync_protocol::{
    Account, AccountState, ChatTransport, ConversationSummary, Direction, Message, MessageKind,
    MessageStatus, PushSubscription, Result, SyncError, SyncEvent,
};
