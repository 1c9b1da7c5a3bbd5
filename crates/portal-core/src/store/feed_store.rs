use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{FeedSnapshot, NotificationEntry, NotificationId};

/// Record of one optimistic read transition, sufficient to undo it exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadReceipt {
    pub id: NotificationId,
    previous_read_at: Option<DateTime<Utc>>,
    /// False when the counter was already zero and nothing was taken off
    decremented: bool,
}

/// In-memory notification feed: ordered entries (most recent first), unread
/// counter and pagination cursor.
///
/// Every operation keeps ids unique, even when the service returns
/// overlapping pages.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    entries: Vec<NotificationEntry>,
    unread_count: u64,
    offset: usize,
    has_more: bool,
    loading: bool,
    error: Option<String>,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Getters =====

    pub fn entries(&self) -> &[NotificationEntry] {
        &self.entries
    }

    pub fn get(&self, id: &NotificationId) -> Option<&NotificationEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    pub fn contains(&self, id: &NotificationId) -> bool {
        self.get(id).is_some()
    }

    pub fn unread_count(&self) -> u64 {
        self.unread_count
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            notifications: self.entries.clone(),
            unread_count: self.unread_count,
            loading: self.loading,
            error: self.error.clone(),
            has_more: self.has_more,
        }
    }

    // ===== Page transitions =====

    /// Replace the feed with a fresh first page and reset the cursor.
    pub fn replace_first_page(&mut self, entries: Vec<NotificationEntry>, limit: usize) {
        let page_len = entries.len();
        let mut seen = HashSet::with_capacity(page_len);
        self.entries = entries
            .into_iter()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
        self.offset = page_len;
        self.has_more = page_len == limit;
    }

    /// Append the next page, skipping ids already present.
    pub fn append_page(&mut self, entries: Vec<NotificationEntry>, limit: usize) {
        let page_len = entries.len();
        let mut seen: HashSet<NotificationId> = self.entries.iter().map(|e| e.id.clone()).collect();
        self.entries
            .extend(entries.into_iter().filter(|e| seen.insert(e.id.clone())));
        self.offset += page_len;
        self.has_more = page_len == limit;
    }

    /// Prepend entries whose ids are not present yet, keeping their order.
    ///
    /// The unread counter grows by the unread entries among those prepended;
    /// it is never decreased here. Returns how many entries were prepended.
    pub fn merge_new(&mut self, entries: Vec<NotificationEntry>) -> usize {
        let mut seen: HashSet<NotificationId> = self.entries.iter().map(|e| e.id.clone()).collect();
        let fresh: Vec<NotificationEntry> = entries
            .into_iter()
            .filter(|e| seen.insert(e.id.clone()))
            .collect();
        if fresh.is_empty() {
            return 0;
        }

        let added = fresh.len();
        let unread = fresh.iter().filter(|e| !e.is_read).count() as u64;
        self.unread_count = self.unread_count.saturating_add(unread);
        self.entries.splice(0..0, fresh);
        added
    }

    // ===== Scalar mutations =====

    pub fn set_unread_count(&mut self, count: u64) {
        self.unread_count = count;
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    // ===== Read state =====

    /// Optimistically mark an entry read.
    ///
    /// Returns `None` without touching the counter when the entry is absent
    /// or already read.
    pub fn apply_read(&mut self, id: &NotificationId, now: DateTime<Utc>) -> Option<ReadReceipt> {
        let entry = self.entries.iter_mut().find(|e| &e.id == id)?;
        if entry.is_read {
            return None;
        }

        let previous_read_at = entry.read_at.replace(now);
        entry.is_read = true;
        let decremented = self.unread_count > 0;
        self.unread_count = self.unread_count.saturating_sub(1);

        Some(ReadReceipt {
            id: id.clone(),
            previous_read_at,
            decremented,
        })
    }

    /// Undo an optimistic read. Only an entry that is still present and read
    /// is reverted; returns whether anything changed.
    pub fn revert_read(&mut self, receipt: &ReadReceipt) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == receipt.id) else {
            return false;
        };
        if !entry.is_read {
            return false;
        }

        entry.is_read = false;
        entry.read_at = receipt.previous_read_at;
        if receipt.decremented {
            self.unread_count = self.unread_count.saturating_add(1);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn entry(id: &str) -> NotificationEntry {
        NotificationEntry::unread(id, json!({ "title": id }))
    }

    fn page(prefix: &str, range: std::ops::Range<usize>) -> Vec<NotificationEntry> {
        range.map(|i| entry(&format!("{prefix}{i}"))).collect()
    }

    fn ids(state: &FeedState) -> Vec<&str> {
        state.entries().iter().map(|e| e.id.as_str()).collect()
    }

    fn assert_unique(state: &FeedState) {
        let unique: HashSet<_> = state.entries().iter().map(|e| &e.id).collect();
        assert_eq!(unique.len(), state.entries().len(), "duplicate ids in feed");
    }

    #[test]
    fn test_first_page_full_sets_has_more() {
        let mut state = FeedState::new();
        state.replace_first_page(page("n", 0..10), 10);
        assert_eq!(state.entries().len(), 10);
        assert_eq!(state.offset(), 10);
        assert!(state.has_more());
    }

    #[test]
    fn test_append_short_page_clears_has_more() {
        let mut state = FeedState::new();
        state.replace_first_page(page("n", 0..10), 10);
        state.append_page(page("n", 10..20), 10);
        assert_eq!(state.entries().len(), 20);
        assert_eq!(state.offset(), 20);
        assert!(state.has_more());

        state.append_page(page("n", 20..27), 10);
        assert_eq!(state.entries().len(), 27);
        assert!(!state.has_more());
    }

    #[test]
    fn test_append_skips_overlapping_ids() {
        let mut state = FeedState::new();
        state.replace_first_page(page("n", 0..3), 3);
        state.append_page(page("n", 2..5), 3);
        assert_eq!(ids(&state), vec!["n0", "n1", "n2", "n3", "n4"]);
        assert_unique(&state);
    }

    #[test]
    fn test_first_page_dedupes_service_duplicates() {
        let mut state = FeedState::new();
        state.replace_first_page(vec![entry("a"), entry("b"), entry("a")], 3);
        assert_eq!(ids(&state), vec!["a", "b"]);
        assert!(state.has_more());
        // The cursor follows the service's page, not the deduped view
        assert_eq!(state.offset(), 3);

        state.append_page(page("n", 0..3), 3);
        assert_eq!(state.offset(), 6);
    }

    #[test]
    fn test_merge_new_prepends_in_order() {
        let mut state = FeedState::new();
        state.replace_first_page(vec![entry("c"), entry("d")], 10);
        state.set_unread_count(1);

        let added = state.merge_new(vec![entry("a"), entry("b"), entry("c")]);
        assert_eq!(added, 2);
        assert_eq!(ids(&state), vec!["a", "b", "c", "d"]);
        assert_eq!(state.unread_count(), 3);
    }

    #[test]
    fn test_merge_new_counts_only_unread_newcomers() {
        let mut state = FeedState::new();
        state.replace_first_page(vec![entry("old")], 10);
        let read = NotificationEntry::read("r", json!(null), Utc::now());
        state.merge_new(vec![read, entry("u"), entry("old")]);
        assert_eq!(state.unread_count(), 1);
        assert_unique(&state);
    }

    #[test]
    fn test_merge_new_with_nothing_new_is_noop() {
        let mut state = FeedState::new();
        state.replace_first_page(vec![entry("a")], 10);
        state.set_unread_count(4);
        assert_eq!(state.merge_new(vec![entry("a")]), 0);
        assert_eq!(state.unread_count(), 4);
        assert_eq!(state.offset(), 1);
    }

    #[test]
    fn test_apply_read_once() {
        let mut state = FeedState::new();
        state.replace_first_page(vec![entry("n42")], 10);
        state.set_unread_count(2);

        let id = NotificationId::new("n42");
        let receipt = state.apply_read(&id, Utc::now());
        assert!(receipt.is_some());
        assert_eq!(state.unread_count(), 1);
        assert!(state.get(&id).unwrap().is_read);
        assert!(state.get(&id).unwrap().read_at.is_some());

        // Second application is a no-op for the counter
        assert!(state.apply_read(&id, Utc::now()).is_none());
        assert_eq!(state.unread_count(), 1);
    }

    #[test]
    fn test_apply_read_unknown_id() {
        let mut state = FeedState::new();
        state.set_unread_count(3);
        assert!(state.apply_read(&NotificationId::new("missing"), Utc::now()).is_none());
        assert_eq!(state.unread_count(), 3);
    }

    #[test]
    fn test_revert_restores_exact_prior_state() {
        let mut state = FeedState::new();
        state.replace_first_page(vec![entry("n1")], 10);
        state.set_unread_count(5);
        let before = state.get(&NotificationId::new("n1")).cloned();

        let receipt = state.apply_read(&NotificationId::new("n1"), Utc::now()).unwrap();
        assert!(state.revert_read(&receipt));
        assert_eq!(state.get(&NotificationId::new("n1")).cloned(), before);
        assert_eq!(state.unread_count(), 5);
    }

    #[test]
    fn test_read_at_zero_count_never_underflows() {
        let mut state = FeedState::new();
        state.replace_first_page(vec![entry("n1")], 10);
        assert_eq!(state.unread_count(), 0);

        let receipt = state.apply_read(&NotificationId::new("n1"), Utc::now()).unwrap();
        assert_eq!(state.unread_count(), 0);
        state.revert_read(&receipt);
        assert_eq!(state.unread_count(), 0);
    }

    #[test]
    fn test_revert_after_entry_replaced_is_noop() {
        let mut state = FeedState::new();
        state.replace_first_page(vec![entry("n1")], 10);
        state.set_unread_count(1);
        let receipt = state.apply_read(&NotificationId::new("n1"), Utc::now()).unwrap();

        // A refetch brought the server's (still unread) copy back
        state.replace_first_page(vec![entry("n1")], 10);
        state.set_unread_count(1);
        assert!(!state.revert_read(&receipt));
        assert_eq!(state.unread_count(), 1);
    }

    #[test]
    fn test_invariants_hold_across_mixed_sequence() {
        let mut state = FeedState::new();
        state.replace_first_page(page("n", 0..10), 10);
        state.merge_new(page("n", 8..14));
        state.append_page(page("n", 5..15), 10);
        let receipt = state.apply_read(&NotificationId::new("n3"), Utc::now());
        state.merge_new(page("m", 0..2));
        if let Some(receipt) = receipt {
            state.revert_read(&receipt);
        }
        assert_unique(&state);
        assert_eq!(&ids(&state)[..2], &["m0", "m1"]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Replace(Vec<NotificationEntry>),
        Append(Vec<NotificationEntry>),
        Merge(Vec<NotificationEntry>),
        /// Apply, check the revert, then optionally apply again
        Read(u8, bool),
        SetCount(u64),
    }

    fn arb_entry() -> impl Strategy<Value = NotificationEntry> {
        (0u8..12, any::<bool>()).prop_map(|(n, read)| {
            let id = format!("n{n}");
            if read {
                NotificationEntry::read(id, json!(null), Utc::now())
            } else {
                NotificationEntry::unread(id, json!(null))
            }
        })
    }

    fn arb_page() -> impl Strategy<Value = Vec<NotificationEntry>> {
        prop::collection::vec(arb_entry(), 0..6)
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            arb_page().prop_map(Op::Replace),
            arb_page().prop_map(Op::Append),
            arb_page().prop_map(Op::Merge),
            (0u8..12, any::<bool>()).prop_map(|(n, keep)| Op::Read(n, keep)),
            (0u64..4).prop_map(Op::SetCount),
        ]
    }

    proptest! {
        /// Ids stay unique across any sequence, and reverting a fresh read
        /// restores the entry and the counter exactly.
        #[test]
        fn prop_ids_unique_and_revert_exact(ops in prop::collection::vec(arb_op(), 0..40)) {
            let mut state = FeedState::new();
            for op in ops {
                match op {
                    Op::Replace(entries) => state.replace_first_page(entries, 5),
                    Op::Append(entries) => state.append_page(entries, 5),
                    Op::Merge(entries) => {
                        state.merge_new(entries);
                    }
                    Op::SetCount(count) => state.set_unread_count(count),
                    Op::Read(n, keep) => {
                        let id = NotificationId::new(format!("n{n}"));
                        let before = state.get(&id).cloned();
                        let count = state.unread_count();
                        match state.apply_read(&id, Utc::now()) {
                            Some(receipt) => {
                                prop_assert!(state.get(&id).map_or(false, |e| e.is_read));
                                prop_assert!(state.revert_read(&receipt));
                                prop_assert_eq!(state.get(&id).cloned(), before);
                                prop_assert_eq!(state.unread_count(), count);
                                if keep {
                                    state.apply_read(&id, Utc::now());
                                }
                            }
                            None => {
                                prop_assert_eq!(state.unread_count(), count);
                            }
                        }
                    }
                }

                let unique: HashSet<_> = state.entries().iter().map(|e| &e.id).collect();
                prop_assert_eq!(unique.len(), state.entries().len());
            }
        }
    }
}
