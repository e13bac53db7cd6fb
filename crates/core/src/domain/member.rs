// Member Domain Model

use serde::{Deserialize, Serialize};

/// Server (guild) identifier, scopes one Store
pub type ServerId = u64;

/// Stable per-platform account id
pub type UserId = u64;

/// A queue participant
///
/// Only `id` is persisted and compared; `display_name` is rendering metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Member {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            display_name: None,
        }
    }

    pub fn with_name(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: Some(name.into()),
        }
    }

    /// Platform mention syntax
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Member {}

/// Caller privilege for admin-scoped operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin {
            Role::Admin
        } else {
            Role::Member
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_equality_ignores_display_name() {
        assert_eq!(Member::new(7), Member::with_name(7, "Alice"));
        assert_ne!(Member::new(7), Member::new(8));
    }

    #[test]
    fn test_mention() {
        assert_eq!(Member::new(42).mention(), "<@42>");
    }

    #[test]
    fn test_role_from_flag() {
        assert!(Role::from_admin_flag(true).is_admin());
        assert!(!Role::from_admin_flag(false).is_admin());
    }
}
