//! par-agent-transcript: the agent transcript as the client sees it.
//!
//! The agent process sends two kinds of updates: full snapshots of the
//! transcript it knows about, and point updates addressed to one entry. Both
//! can arrive late or out of order. This crate merges them into a single
//! authoritative, timestamp-ordered transcript.
//!
//! - [`entry`] - [`TranscriptEntry`], [`EntryKind`] and the closed [`Category`] enum
//! - [`store`] - [`MessageStore`] with the acceptance rule and orphan-completion pass
//! - [`visibility`] - [`VisibilityFilter`] for "clear transcript" / "new task"
//!
//! # Example
//!
//! ```
//! use par_agent_transcript::{Category, MessageStore, TranscriptEntry};
//!
//! let mut store = MessageStore::new();
//! store.apply_point_update(TranscriptEntry::notification(1, Category::Text, "Hel", true));
//! store.apply_point_update(TranscriptEntry::notification(1, Category::Text, "Hello", false));
//! // A stale partial arriving after completion is ignored.
//! store.apply_point_update(TranscriptEntry::notification(1, Category::Text, "He", true));
//! assert_eq!(store.get(1).map(|e| e.text.as_str()), Some("Hello"));
//! ```

pub mod entry;
pub mod store;
pub mod visibility;

pub use entry::{Category, EntryKind, TranscriptEntry};
pub use store::{Acceptance, MessageStore, RejectReason, StoreCommit};
pub use visibility::VisibilityFilter;
