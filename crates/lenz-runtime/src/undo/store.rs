#![forbid(unsafe_code)]

//! Per-resource histories keyed by document identity.
//!
//! The host keeps one [`HistoryStore`] and addresses histories by a string
//! key (typically a file path). Operations on unknown keys return `None`
//! or `false` instead of failing.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::history::{History, HistoryConfig};

/// A map of [`History`] timelines, one per key.
#[derive(Debug)]
pub struct HistoryStore<T> {
    histories: HashMap<String, History<T>>,
    config: HistoryConfig,
}

impl<T> Default for HistoryStore<T> {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl<T> HistoryStore<T> {
    /// Create a store whose histories use `config`.
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            histories: HashMap::new(),
            config,
        }
    }

    /// The history for `key`, created with `initial` if missing.
    pub fn ensure(&mut self, key: &str, initial: T) -> &mut History<T> {
        let config = &self.config;
        self.histories
            .entry(key.to_owned())
            .or_insert_with(|| History::with_config(initial, config.clone()))
    }

    /// Record `data` as the newest state of `key`.
    ///
    /// A missing history is created with `data` as its first snapshot.
    pub fn save(&mut self, key: &str, data: T) -> &T
    where
        T: PartialEq,
    {
        match self.histories.entry(key.to_owned()) {
            Entry::Occupied(entry) => entry.into_mut().push(data),
            Entry::Vacant(entry) => entry
                .insert(History::with_config(data, self.config.clone()))
                .current()
                .data(),
        }
    }

    /// Undo on `key`, returning the now-current data.
    pub fn undo(&mut self, key: &str) -> Option<&T> {
        self.histories.get_mut(key).map(History::undo)
    }

    /// Redo on `key`, returning the now-current data.
    pub fn redo(&mut self, key: &str) -> Option<&T> {
        self.histories.get_mut(key).map(History::redo)
    }

    /// Current data of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&T> {
        self.histories.get(key).map(|h| h.current().data())
    }

    /// Borrow the history of `key`.
    #[must_use]
    pub fn history(&self, key: &str) -> Option<&History<T>> {
        self.histories.get(key)
    }

    /// Forget `key`, returning its history.
    pub fn drop_key(&mut self, key: &str) -> Option<History<T>> {
        let removed = self.histories.remove(key);
        if removed.is_some() {
            tracing::debug!(key, "history dropped");
        }
        removed
    }

    /// Whether `key` has something to undo.
    #[must_use]
    pub fn can_undo(&self, key: &str) -> bool {
        self.histories.get(key).is_some_and(History::can_undo)
    }

    /// Whether `key` has something to redo.
    #[must_use]
    pub fn can_redo(&self, key: &str) -> bool {
        self.histories.get(key).is_some_and(History::can_redo)
    }

    /// Whether a history exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.histories.contains_key(key)
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// Whether no key is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}
