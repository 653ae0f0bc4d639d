#![forbid(unsafe_code)]

//! Bounded snapshot timeline for undo/redo.
//!
//! This module provides [`History`], a capacity-bounded timeline of
//! immutable [`SnapShot`]s with a cursor marking the current state:
//!
//! - **Capacity limit**: the oldest snapshot is evicted once the timeline
//!   would exceed `capacity`
//! - **Branch handling**: pushing after an undo drops the redo branch
//! - **Deduplication**: pushing a value equal to the current one is a no-op
//!
//! # Invariants
//!
//! 1. There is always at least one snapshot; `oldest()` and `current()`
//!    always exist.
//! 2. `count() <= capacity` after any operation (for a bounded history).
//! 3. `can_undo() == (current != oldest)`, `can_redo() == (current != tail)`.
//! 4. After `push` nothing follows `current`.
//!
//! # Memory Model
//!
//! Snapshots are stored in a `VecDeque` so eviction from the front is
//! O(1). `previous`/`next` links are the neighbouring slots of the cursor.
//!
//! ```text
//! push(v3)                       capacity = 3
//! ┌───────────────────────────────────────────┐
//! │ [v1, v2, v3]        cursor -> v3          │
//! └───────────────────────────────────────────┘
//!
//! undo()
//! ┌───────────────────────────────────────────┐
//! │ [v1, v2, v3]        cursor -> v2          │
//! └───────────────────────────────────────────┘
//!
//! push(v2b)  <-- new branch, drops v3
//! ┌───────────────────────────────────────────┐
//! │ [v1, v2, v2b]       cursor -> v2b         │
//! └───────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;

/// Error returned by [`History::try_undo`] and [`History::try_redo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// The cursor is already at the oldest snapshot.
    #[error("nothing to undo")]
    NothingToUndo,
    /// The cursor is already at the newest snapshot.
    #[error("nothing to redo")]
    NothingToRedo,
}

/// Configuration for a [`History`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Maximum number of snapshots kept (0 = unlimited).
    pub capacity: usize,
    /// Ignore pushes equal to the current snapshot.
    pub dedupe: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            dedupe: true,
        }
    }
}

impl HistoryConfig {
    /// Create a configuration with a custom capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Set whether a push equal to the current snapshot is ignored.
    #[must_use]
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Create unlimited configuration.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    fn limit(&self) -> usize {
        if self.capacity == 0 {
            usize::MAX
        } else {
            self.capacity
        }
    }
}

/// One immutable entry of a [`History`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapShot<T> {
    data: T,
}

impl<T> SnapShot<T> {
    /// The stored state.
    #[must_use]
    pub fn data(&self) -> &T {
        &self.data
    }
}

/// Capacity-bounded undo/redo timeline.
pub struct History<T> {
    /// Snapshots from oldest (front) to newest (back).
    snapshots: VecDeque<SnapShot<T>>,
    /// Index of the current snapshot.
    cursor: usize,
    config: HistoryConfig,
}

impl<T: fmt::Debug> fmt::Debug for History<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("count", &self.snapshots.len())
            .field("cursor", &self.cursor)
            .field("current", self.current().data())
            .field("config", &self.config)
            .finish()
    }
}

impl<T> History<T> {
    /// Create a history holding `data` as its only snapshot, with the
    /// default capacity.
    #[must_use]
    pub fn new(data: T) -> Self {
        Self::with_config(data, HistoryConfig::default())
    }

    /// Create a history with an explicit configuration.
    #[must_use]
    pub fn with_config(data: T, config: HistoryConfig) -> Self {
        let mut snapshots = VecDeque::new();
        snapshots.push_back(SnapShot { data });
        Self {
            snapshots,
            cursor: 0,
            config,
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Push a new snapshot after the current one and make it current.
    ///
    /// Drops the redo branch and evicts the oldest snapshots beyond
    /// capacity. Returns the pushed data.
    pub fn push(&mut self, data: T) -> &T
    where
        T: PartialEq,
    {
        if self.config.dedupe && self.current().data == data {
            return self.current().data();
        }

        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push_back(SnapShot { data });
        self.enforce_limit();
        self.cursor = self.snapshots.len() - 1;
        self.current().data()
    }

    /// Step back one snapshot and return its data.
    ///
    /// With nothing to undo the current data is returned unchanged.
    pub fn undo(&mut self) -> &T {
        if self.can_undo() {
            self.cursor -= 1;
        }
        self.current().data()
    }

    /// Step forward one snapshot and return its data.
    ///
    /// With nothing to redo the current data is returned unchanged.
    pub fn redo(&mut self) -> &T {
        if self.can_redo() {
            self.cursor += 1;
        }
        self.current().data()
    }

    /// Like [`undo`](Self::undo) but reports when there is nothing to undo.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NothingToUndo`] if `!can_undo()`.
    pub fn try_undo(&mut self) -> Result<&T, HistoryError> {
        if !self.can_undo() {
            return Err(HistoryError::NothingToUndo);
        }
        Ok(self.undo())
    }

    /// Like [`redo`](Self::redo) but reports when there is nothing to redo.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::NothingToRedo`] if `!can_redo()`.
    pub fn try_redo(&mut self) -> Result<&T, HistoryError> {
        if !self.can_redo() {
            return Err(HistoryError::NothingToRedo);
        }
        Ok(self.redo())
    }

    /// Check if undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Check if redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    // ========================================================================
    // Info
    // ========================================================================

    /// Number of snapshots from the oldest to the tail.
    #[must_use]
    pub fn count(&self) -> usize {
        self.snapshots.len()
    }

    /// Configured capacity (0 = unlimited).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// The oldest retained snapshot.
    #[must_use]
    pub fn oldest(&self) -> &SnapShot<T> {
        &self.snapshots[0]
    }

    /// The snapshot the cursor points at.
    #[must_use]
    pub fn current(&self) -> &SnapShot<T> {
        &self.snapshots[self.cursor]
    }

    /// The snapshot before the current one.
    #[must_use]
    pub fn previous(&self) -> Option<&SnapShot<T>> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.snapshots.get(i))
    }

    /// The snapshot after the current one.
    #[must_use]
    pub fn next(&self) -> Option<&SnapShot<T>> {
        self.snapshots.get(self.cursor + 1)
    }

    /// Number of snapshots available to redo.
    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.snapshots.len() - self.cursor - 1
    }

    /// Number of snapshots available to undo.
    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.cursor
    }

    /// Iterate snapshots from oldest to newest.
    pub fn snapshots(&self) -> impl Iterator<Item = &SnapShot<T>> {
        self.snapshots.iter()
    }

    /// Get the current configuration.
    #[must_use]
    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Drop the redo branch, keeping the cursor where it is.
    pub fn clear(&mut self) {
        self.snapshots.truncate(self.cursor + 1);
    }

    /// Collapse the history to the current snapshot only.
    pub fn reset(&mut self) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.drain(..self.cursor);
        self.cursor = 0;
    }

    /// Evict oldest snapshots until the capacity holds.
    fn enforce_limit(&mut self) {
        let limit = self.config.limit().max(1);
        let mut evicted = 0usize;
        while self.snapshots.len() > limit {
            self.snapshots.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::trace!(evicted, capacity = limit, "history evicted oldest snapshots");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
