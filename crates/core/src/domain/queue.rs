// Queue Domain Model

use super::error::{DomainError, Result};
use super::member::UserId;

/// Maximum key length in characters (platform option limit)
pub const MAX_KEY_CHARS: usize = 100;

/// Queue identifier, case-sensitive and free-form
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueKey(String);

impl QueueKey {
    /// Validate and wrap a raw key
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let invalid = |reason: &str| DomainError::InvalidKey {
            key: raw.clone(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("key is empty"));
        }
        if raw.chars().count() > MAX_KEY_CHARS {
            return Err(invalid("key is too long"));
        }
        if raw.trim() != raw {
            return Err(invalid("key has surrounding whitespace"));
        }
        if raw.chars().any(|c| c.is_control() || c == '`') {
            return Err(invalid("key contains control characters or backticks"));
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for QueueKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered member list, join order, no duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Queue {
    members: Vec<UserId>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted ids, rejecting duplicates
    pub fn from_members(key: &str, members: Vec<UserId>) -> Result<Self> {
        let mut queue = Self::new();
        for id in members {
            if !queue.push(id) {
                return Err(DomainError::DuplicateMember {
                    key: key.to_string(),
                    member: id,
                });
            }
        }
        Ok(queue)
    }

    /// Append if absent. Returns false when already queued.
    pub fn push(&mut self, id: UserId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.members.push(id);
        true
    }

    /// Remove if present
    pub fn remove(&mut self, id: UserId) -> bool {
        match self.members.iter().position(|m| *m == id) {
            Some(idx) => {
                self.members.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Remove and return up to `n` members from the front
    pub fn drain_front(&mut self, n: usize) -> Vec<UserId> {
        let n = n.min(self.members.len());
        self.members.drain(..n).collect()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.members.contains(&id)
    }

    /// 1-based position
    pub fn position(&self, id: UserId) -> Option<usize> {
        self.members.iter().position(|m| *m == id).map(|i| i + 1)
    }

    pub fn members(&self) -> &[UserId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_accepts_free_form() {
        assert!(QueueKey::parse("boss-a").is_ok());
        assert!(QueueKey::parse("Raid Night #3").is_ok());
        assert!(QueueKey::parse("tiếng-việt").is_ok());
    }

    #[test]
    fn test_key_is_case_sensitive() {
        let a = QueueKey::parse("Boss").unwrap();
        let b = QueueKey::parse("boss").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_rejects_malformed() {
        for raw in ["", " boss", "boss ", "bo`ss", "line\nbreak"] {
            let err = QueueKey::parse(raw).unwrap_err();
            assert!(matches!(err, DomainError::InvalidKey { .. }), "{raw:?}");
        }
        assert!(QueueKey::parse("k".repeat(MAX_KEY_CHARS + 1)).is_err());
        assert!(QueueKey::parse("k".repeat(MAX_KEY_CHARS)).is_ok());
    }

    #[test]
    fn test_push_is_idempotent() {
        let mut q = Queue::new();
        assert!(q.push(1));
        assert!(!q.push(1));
        assert_eq!(q.members(), &[1]);
    }

    #[test]
    fn test_rejoin_goes_to_back() {
        let mut q = Queue::new();
        q.push(1);
        q.push(2);
        q.remove(1);
        q.push(1);
        assert_eq!(q.members(), &[2, 1]);
        assert_eq!(q.position(1), Some(2));
        assert_eq!(q.position(3), None);
    }

    #[test]
    fn test_drain_front_caps_at_len() {
        let mut q = Queue::from_members("k", vec![1, 2, 3]).unwrap();
        assert_eq!(q.drain_front(2), vec![1, 2]);
        assert_eq!(q.drain_front(10), vec![3]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_from_members_rejects_duplicates() {
        let err = Queue::from_members("k", vec![1, 2, 1]).unwrap_err();
        assert_eq!(
            err,
            DomainError::DuplicateMember {
                key: "k".to_string(),
                member: 1
            }
        );
    }
}
