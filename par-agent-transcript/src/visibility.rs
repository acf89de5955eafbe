//! Cutoff-based view of the transcript.
//!
//! "Clear transcript" moves the cutoff forward so history is hidden without
//! being deleted; "new task" resets it to 0 so a resumed task shows its full
//! history again.

use std::collections::BTreeMap;

use crate::entry::TranscriptEntry;
use crate::store::MessageStore;

/// Holds the cutoff marker and the user-originated entries that are shown
/// alongside the agent's transcript.
#[derive(Debug, Clone, Default)]
pub struct VisibilityFilter {
    cutoff: u64,
    local: BTreeMap<u64, TranscriptEntry>,
}

impl VisibilityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cutoff; 0 means nothing is hidden.
    pub fn cutoff(&self) -> u64 {
        self.cutoff
    }

    /// Hide every entry with `timestamp <= cutoff`.
    pub fn set_cutoff(&mut self, timestamp: u64) {
        log::debug!("visibility: cutoff {} -> {timestamp}", self.cutoff);
        self.cutoff = timestamp;
    }

    pub fn reset_cutoff(&mut self) {
        self.set_cutoff(0);
    }

    /// Set the cutoff to the current wall-clock time in milliseconds and
    /// return it.
    pub fn clear_now(&mut self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        self.set_cutoff(now);
        now
    }

    /// Record an entry that originated locally (for example the user's own
    /// prompt, shown before the agent echoes it).
    pub fn push_local_entry(&mut self, entry: TranscriptEntry) {
        self.local.insert(entry.timestamp, entry);
    }

    /// Store and local entries newer than the cutoff, ascending by timestamp.
    ///
    /// On a timestamp collision the store's entry is shown.
    pub fn visible_entries(&self, store: &MessageStore) -> Vec<TranscriptEntry> {
        let mut merged: BTreeMap<u64, &TranscriptEntry> = self
            .local
            .iter()
            .filter(|(ts, _)| **ts > self.cutoff)
            .map(|(&ts, entry)| (ts, entry))
            .collect();
        for entry in store.entries().filter(|e| e.timestamp > self.cutoff) {
            merged.insert(entry.timestamp, entry);
        }
        merged.into_values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Category;

    fn note(ts: u64, text: &str) -> TranscriptEntry {
        TranscriptEntry::notification(ts, Category::Text, text, false)
    }

    fn timestamps(entries: &[TranscriptEntry]) -> Vec<u64> {
        entries.iter().map(|e| e.timestamp).collect()
    }

    #[test]
    fn test_zero_cutoff_shows_everything() {
        let mut store = MessageStore::new();
        store.apply_snapshot(vec![note(1, "a"), note(2, "b")]);
        let filter = VisibilityFilter::new();
        assert_eq!(filter.cutoff(), 0);
        assert_eq!(timestamps(&filter.visible_entries(&store)), vec![1, 2]);
    }

    #[test]
    fn test_cutoff_hides_then_reset_restores() {
        let mut store = MessageStore::new();
        store.apply_snapshot(vec![note(1000, "a"), note(2000, "b")]);
        let mut filter = VisibilityFilter::new();

        filter.set_cutoff(2500);
        assert!(filter.visible_entries(&store).is_empty());

        store.apply_point_update(note(3000, "after clear"));
        assert_eq!(timestamps(&filter.visible_entries(&store)), vec![3000]);

        filter.reset_cutoff();
        assert_eq!(
            timestamps(&filter.visible_entries(&store)),
            vec![1000, 2000, 3000]
        );
    }

    #[test]
    fn test_entry_at_cutoff_is_hidden() {
        let mut store = MessageStore::new();
        store.apply_point_update(note(10, "edge"));
        let mut filter = VisibilityFilter::new();
        filter.set_cutoff(10);
        assert!(filter.visible_entries(&store).is_empty());
    }

    #[test]
    fn test_local_entries_merge_in_timestamp_order() {
        let mut store = MessageStore::new();
        store.apply_snapshot(vec![note(10, "agent a"), note(30, "agent b")]);
        let mut filter = VisibilityFilter::new();
        filter.push_local_entry(TranscriptEntry::notification(
            20,
            Category::UserFeedback,
            "user prompt",
            false,
        ));
        filter.push_local_entry(note(30, "local duplicate"));

        let visible = filter.visible_entries(&store);
        assert_eq!(timestamps(&visible), vec![10, 20, 30]);
        assert_eq!(visible[2].text, "agent b");
    }

    #[test]
    fn test_clear_now_hides_existing_entries() {
        let mut store = MessageStore::new();
        store.apply_point_update(note(1_000, "old"));
        let mut filter = VisibilityFilter::new();
        let cutoff = filter.clear_now();
        assert!(cutoff > 1_000);
        assert!(filter.visible_entries(&store).is_empty());
    }
}
