//! Conversation index
//!
//! Summary metadata for every known conversation, kept sorted by recency
//! for list display. The index is policy-free bookkeeping: whether an
//! unread increment applies to the currently viewed conversation is decided
//! by the reconciler before calling in here.

use tracing::debug;
use whatsync_protocol::ConversationSummary;

/// Field-wise update for one conversation summary
///
/// Only the populated fields are merged; everything else keeps its stored
/// value. `account_id`/`phone_number` matter on first contact, when the
/// patch creates the summary.
#[derive(Debug, Clone, Default)]
pub struct SummaryPatch {
    pub account_id: Option<String>,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub last_message_at: Option<i64>,
    pub last_message_preview: Option<String>,
    pub unread_count: Option<u32>,
}

impl SummaryPatch {
    /// Patch carrying every field of a full summary (poll snapshot path)
    pub fn from_summary(summary: &ConversationSummary) -> Self {
        Self {
            account_id: Some(summary.account_id.clone()),
            display_name: Some(summary.display_name.clone()),
            phone_number: Some(summary.phone_number.clone()),
            last_message_at: summary.last_message_at,
            last_message_preview: Some(summary.last_message_preview.clone()),
            unread_count: Some(summary.unread_count),
        }
    }
}

/// Conversation summaries sorted descending by last activity
#[derive(Debug, Default)]
pub struct ConversationIndex {
    summaries: Vec<ConversationSummary>,
}

impl ConversationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a patch into a summary, creating it if absent
    ///
    /// A patch whose `last_message_at` is strictly older than the stored
    /// one is stale: a fresher update (usually from the push channel) got
    /// there first, and the stale patch's activity fields (timestamp,
    /// preview, unread count) are discarded. Identity fields still merge.
    /// Re-sorts the index whenever the patch changed anything. Returns
    /// whether a visible change occurred.
    pub fn apply_summary_patch(&mut self, conversation_id: &str, patch: SummaryPatch) -> bool {
        let mut created = false;
        let pos = match self.summaries.iter().position(|s| s.id == conversation_id) {
            Some(pos) => pos,
            None => {
                debug!("Creating summary for new conversation {}", conversation_id);
                let phone = patch.phone_number.clone().unwrap_or_default();
                self.summaries.push(ConversationSummary::new(
                    conversation_id,
                    patch.account_id.clone().unwrap_or_default(),
                    phone,
                ));
                created = true;
                self.summaries.len() - 1
            }
        };
        let summary = &mut self.summaries[pos];

        let stale = matches!(
            (patch.last_message_at, summary.last_message_at),
            (Some(patched), Some(current)) if patched < current
        );
        if stale {
            debug!(
                "Discarding stale activity patch for conversation {}",
                conversation_id
            );
        }

        let mut changed = false;
        if let Some(display_name) = patch.display_name {
            if !display_name.is_empty() && summary.display_name != display_name {
                summary.display_name = display_name;
                changed = true;
            }
        }
        if let Some(phone_number) = patch.phone_number {
            if !phone_number.is_empty() && summary.phone_number != phone_number {
                summary.phone_number = phone_number;
                changed = true;
            }
        }
        if !stale {
            if let Some(at) = patch.last_message_at {
                if summary.last_message_at != Some(at) {
                    summary.last_message_at = Some(at);
                    changed = true;
                }
            }
            if let Some(preview) = patch.last_message_preview {
                if summary.last_message_preview != preview {
                    summary.last_message_preview = preview;
                    changed = true;
                }
            }
            if let Some(unread) = patch.unread_count {
                if summary.unread_count != unread {
                    summary.unread_count = unread;
                    changed = true;
                }
            }
        }

        if created || changed {
            self.resort();
        }
        created || changed
    }

    /// Bump the unread counter for a conversation
    pub fn increment_unread(&mut self, conversation_id: &str) {
        if let Some(summary) = self.get_mut(conversation_id) {
            summary.unread_count += 1;
        }
    }

    /// Reset the unread counter to zero
    pub fn clear_unread(&mut self, conversation_id: &str) -> bool {
        match self.get_mut(conversation_id) {
            Some(summary) if summary.unread_count != 0 => {
                summary.unread_count = 0;
                true
            }
            _ => false,
        }
    }

    /// Summaries in current sort order; restartable, no cursor state
    pub fn list(&self) -> impl Iterator<Item = &ConversationSummary> {
        self.summaries.iter()
    }

    pub fn get(&self, conversation_id: &str) -> Option<&ConversationSummary> {
        self.summaries.iter().find(|s| s.id == conversation_id)
    }

    fn get_mut(&mut self, conversation_id: &str) -> Option<&mut ConversationSummary> {
        self.summaries.iter_mut().find(|s| s.id == conversation_id)
    }

    fn resort(&mut self) {
        // Stable sort keeps ties in prior order; None sorts last
        self.summaries
            .sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
    }
}
