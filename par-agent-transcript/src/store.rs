//! The authoritative transcript.
//!
//! Snapshots and point updates from the agent process both go through
//! [`MessageStore::accept`]. The acceptance rule orders the values a single
//! timestamp can take by "completeness, then length", so the final state does
//! not depend on the order in which a late snapshot and a completion update
//! arrive:
//!
//! | stored \ incoming | partial              | final                         |
//! |-------------------|----------------------|-------------------------------|
//! | absent            | insert, mark streaming | insert                      |
//! | partial           | replace              | replace, leave streaming set  |
//! | final             | reject               | replace unless strictly shorter |

use std::collections::{BTreeMap, BTreeSet};

use crate::entry::TranscriptEntry;

/// Why an incoming value was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A partial value arrived for an entry that is already finished.
    PartialAfterFinal,
    /// A finished value arrived that is shorter than the finished value held.
    ShorterFinal,
}

/// Result of running the acceptance rule for one incoming value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// First value seen for this timestamp.
    Inserted,
    /// Replaced a value of the same completeness.
    Replaced,
    /// Replaced a partial value with a finished one.
    Completed,
    /// Accepted, but identical to what was already stored.
    Unchanged,
    Rejected(RejectReason),
}

impl Acceptance {
    /// Whether the stored value actually changed.
    pub fn changed(self) -> bool {
        matches!(
            self,
            Acceptance::Inserted | Acceptance::Replaced | Acceptance::Completed
        )
    }
}

/// Description of one successful commit, passed to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreCommit {
    /// Every timestamp whose stored value changed, ascending.
    pub changed: Vec<u64>,
    /// Timestamps that moved from partial to finished, ascending.
    pub completed: Vec<u64>,
    /// Subset of `completed` forced by the orphan-completion pass.
    pub orphan_completed: Vec<u64>,
}

impl StoreCommit {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

type Subscriber = Box<dyn FnMut(&StoreCommit) + Send>;

/// Ordered transcript plus the set of timestamps still streaming.
#[derive(Default)]
pub struct MessageStore {
    entries: BTreeMap<u64, TranscriptEntry>,
    streaming: BTreeSet<u64>,
    subscribers: Vec<Subscriber>,
}

impl std::fmt::Debug for MessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStore")
            .field("entries", &self.entries.len())
            .field("streaming", &self.streaming)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer that runs synchronously after every commit, in
    /// registration order, before `apply_*` returns.
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(&StoreCommit) + Send + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Merge a full snapshot, then run the orphan-completion pass.
    ///
    /// Returns `true` if any stored entry changed.
    pub fn apply_snapshot<I>(&mut self, entries: I) -> bool
    where
        I: IntoIterator<Item = TranscriptEntry>,
    {
        let mut changed = BTreeSet::new();
        let mut completed = BTreeSet::new();
        let mut seen = BTreeSet::new();

        for entry in entries {
            let timestamp = entry.timestamp;
            seen.insert(timestamp);
            match self.accept(entry) {
                Acceptance::Completed => {
                    changed.insert(timestamp);
                    completed.insert(timestamp);
                }
                outcome if outcome.changed() => {
                    changed.insert(timestamp);
                }
                _ => {}
            }
        }

        let orphans = self.complete_orphans(&seen);
        for &timestamp in &orphans {
            changed.insert(timestamp);
            completed.insert(timestamp);
        }

        self.commit(StoreCommit {
            changed: changed.into_iter().collect(),
            completed: completed.into_iter().collect(),
            orphan_completed: orphans,
        })
    }

    /// Merge a single-entry update. Returns `true` if the entry changed.
    pub fn apply_point_update(&mut self, entry: TranscriptEntry) -> bool {
        let timestamp = entry.timestamp;
        let outcome = self.accept(entry);
        if !outcome.changed() {
            return false;
        }
        let completed = if outcome == Acceptance::Completed {
            vec![timestamp]
        } else {
            Vec::new()
        };
        self.commit(StoreCommit {
            changed: vec![timestamp],
            completed,
            orphan_completed: Vec::new(),
        })
    }

    /// Run the acceptance rule for one incoming value and store it if
    /// accepted. Does not notify subscribers.
    pub fn accept(&mut self, incoming: TranscriptEntry) -> Acceptance {
        let timestamp = incoming.timestamp;
        let Some(stored) = self.entries.get_mut(&timestamp) else {
            if incoming.partial {
                self.streaming.insert(timestamp);
            }
            self.entries.insert(timestamp, incoming);
            return Acceptance::Inserted;
        };

        match (stored.partial, incoming.partial) {
            (true, true) => {
                if *stored == incoming {
                    Acceptance::Unchanged
                } else {
                    *stored = incoming;
                    Acceptance::Replaced
                }
            }
            (false, true) => {
                log::debug!("store: rejected partial update for finished entry ts={timestamp}");
                Acceptance::Rejected(RejectReason::PartialAfterFinal)
            }
            (true, false) => {
                *stored = incoming;
                self.streaming.remove(&timestamp);
                Acceptance::Completed
            }
            (false, false) => {
                if incoming.text_len() < stored.text_len() {
                    log::debug!(
                        "store: rejected truncated final update ts={timestamp} ({} < {} chars)",
                        incoming.text_len(),
                        stored.text_len()
                    );
                    Acceptance::Rejected(RejectReason::ShorterFinal)
                } else if *stored == incoming {
                    Acceptance::Unchanged
                } else {
                    *stored = incoming;
                    Acceptance::Replaced
                }
            }
        }
    }

    /// Force completion of action requests left partial while a newer entry
    /// exists in the same snapshot.
    ///
    /// Workaround for a producer that sometimes moves on without emitting the
    /// completion update; without it such an entry blocks approvals forever.
    fn complete_orphans(&mut self, snapshot: &BTreeSet<u64>) -> Vec<u64> {
        let Some(&newest) = snapshot.last() else {
            return Vec::new();
        };

        let mut orphans = Vec::new();
        for &timestamp in snapshot.range(..newest) {
            if let Some(entry) = self.entries.get_mut(&timestamp)
                && entry.is_action_request()
                && entry.partial
            {
                entry.partial = false;
                self.streaming.remove(&timestamp);
                orphans.push(timestamp);
            }
        }

        if !orphans.is_empty() {
            log::info!("store: force-completed orphaned action requests {orphans:?}");
        }
        orphans
    }

    fn commit(&mut self, commit: StoreCommit) -> bool {
        if commit.is_empty() {
            return false;
        }
        for subscriber in self.subscribers.iter_mut() {
            subscriber(&commit);
        }
        true
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn get(&self, timestamp: u64) -> Option<&TranscriptEntry> {
        self.entries.get(&timestamp)
    }

    /// All entries in ascending timestamp order.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &TranscriptEntry> + '_ {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_streaming(&self, timestamp: u64) -> bool {
        self.streaming.contains(&timestamp)
    }

    /// Timestamps currently partial, ascending.
    pub fn streaming(&self) -> impl Iterator<Item = u64> + '_ {
        self.streaming.iter().copied()
    }

    /// The action request with the greatest timestamp, answered or not.
    pub fn latest_action_request(&self) -> Option<&TranscriptEntry> {
        self.entries.values().rev().find(|e| e.is_action_request())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
