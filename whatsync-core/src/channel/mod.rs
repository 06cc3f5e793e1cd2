//! Channel adapters
//!
//! Two independent producers feed the reconciler: a low-latency push feed
//! and a periodic poll. Each adapter translates its raw payloads into
//! normalized [`SyncEvent`](whatsync_protocol::SyncEvent)s and knows
//! nothing about how they are merged; ordering across the two channels is
//! deliberately unguaranteed.

mod poll;
mod push;

pub use poll::{PollChannel, PollScope};
pub use push::PushChannel;
