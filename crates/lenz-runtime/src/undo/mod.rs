#![forbid(unsafe_code)]

//! Snapshot-based undo/redo for Lenz documents.
//!
//! - [`History`]: a bounded, linear timeline of snapshots with a cursor.
//! - [`HistoryStore`]: one [`History`] per document key.
//!
//! # Invariants
//!
//! 1. A timeline always holds at least one snapshot.
//! 2. Pushing after an undo discards every snapshot newer than the cursor.
//! 3. With a non-zero capacity, the number of snapshots never exceeds it;
//!    the oldest snapshot is evicted first.

mod history;
mod store;

pub use history::{History, HistoryConfig, HistoryError, SnapShot};
pub use store::HistoryStore;
