// Store Domain Model - one server's queues and settings

use super::error::{DomainError, Result};
use super::queue::{Queue, QueueKey};
use std::collections::BTreeMap;

/// Language used when nothing is persisted
pub const DEFAULT_LANGUAGE: &str = "en";

/// Per-server settings persisted with the queues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub language: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Language codes look like "en", "vi" or "pt-BR"
pub fn validate_language(code: &str) -> Result<()> {
    let well_formed = (2..=8).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !code.starts_with('-')
        && !code.ends_with('-');
    if well_formed {
        Ok(())
    } else {
        Err(DomainError::ValidationError(format!(
            "invalid language code {:?}",
            code
        )))
    }
}

/// All queues of one server
///
/// `BTreeMap` keeps keys in lexicographic order so encoding is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Store {
    queues: BTreeMap<QueueKey, Queue>,
    pub settings: StoreSettings,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, key: &QueueKey) -> Option<&Queue> {
        self.queues.get(key)
    }

    pub fn contains_key(&self, key: &QueueKey) -> bool {
        self.queues.contains_key(key)
    }

    /// Insert or replace the queue stored under `key`
    pub fn put(&mut self, key: QueueKey, queue: Queue) {
        self.queues.insert(key, queue);
    }

    pub fn remove(&mut self, key: &QueueKey) -> Option<Queue> {
        self.queues.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QueueKey, &Queue)> {
        self.queues.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &QueueKey> {
        self.queues.keys()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.queues.values().map(Queue::len).sum()
    }
}
