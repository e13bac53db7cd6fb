// Interaction boundary types (front-end <-> dispatcher)

use crate::domain::{DomainError, Member, ServerId, UserId};
use crate::error::AppError;
use serde::{Deserialize, Serialize};

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Join {
        key: String,
    },
    Leave {
        key: String,
    },
    Kick {
        key: String,
        target: Member,
    },
    KickMany {
        key: String,
        targets: Vec<Member>,
    },
    Reset {
        key: String,
    },
    Create {
        key: String,
    },
    Delete {
        key: String,
    },
    List {
        key: String,
        /// Members to render; all when absent
        #[serde(default)]
        limit: Option<usize>,
    },
    RemoveFront {
        key: String,
        count: usize,
    },
    SetLanguage {
        code: String,
    },
    SetupStorage,
}

impl Action {
    /// Queue key for keyed actions; None for store-level actions
    pub fn key(&self) -> Option<&str> {
        match self {
            Action::Join { key }
            | Action::Leave { key }
            | Action::Kick { key, .. }
            | Action::KickMany { key, .. }
            | Action::Reset { key }
            | Action::Create { key }
            | Action::Delete { key }
            | Action::List { key, .. }
            | Action::RemoveFront { key, .. } => Some(key.as_str()),
            Action::SetLanguage { .. } | Action::SetupStorage => None,
        }
    }

    pub fn requires_admin(&self) -> bool {
        !matches!(
            self,
            Action::Join { .. } | Action::Leave { .. } | Action::List { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Join { .. } => "join",
            Action::Leave { .. } => "leave",
            Action::Kick { .. } => "kick",
            Action::KickMany { .. } => "kick_many",
            Action::Reset { .. } => "reset",
            Action::Create { .. } => "create",
            Action::Delete { .. } => "delete",
            Action::List { .. } => "list",
            Action::RemoveFront { .. } => "remove_front",
            Action::SetLanguage { .. } => "set_language",
            Action::SetupStorage => "setup_storage",
        }
    }
}

/// One UI event, already attributed to a server and an actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRequest {
    pub server: ServerId,
    pub actor: Member,
    /// Front-end's view of the actor's permissions
    #[serde(default)]
    pub is_admin: bool,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    AlreadyJoined,
    NotInQueue,
    InvalidKey,
    /// Any other rejected argument (e.g. a malformed language code)
    InvalidInput,
    Unauthorized,
    PersistenceFailure,
    StorageDrift,
    CorruptRecord,
}

impl Status {
    pub fn from_error(err: &AppError) -> Self {
        match err {
            AppError::Domain(DomainError::InvalidKey { .. }) => Status::InvalidKey,
            AppError::Domain(_) => Status::InvalidInput,
            AppError::Unauthorized(_) => Status::Unauthorized,
            AppError::StorageDrift(_) => Status::StorageDrift,
            AppError::CorruptRecord(_) | AppError::UnsupportedVersion(_) => Status::CorruptRecord,
            AppError::PersistenceFailure(_)
            | AppError::Channel(_)
            | AppError::Serialization(_)
            | AppError::Config(_)
            | AppError::Internal(_) => Status::PersistenceFailure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Status::Success | Status::AlreadyJoined | Status::NotInQueue
        )
    }
}

/// What the front-end renders back to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionResult {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_list: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl InteractionResult {
    pub fn new(status: Status) -> Self {
        Self {
            status,
            position: None,
            removed: Vec::new(),
            rendered_list: None,
            detail: None,
        }
    }

    pub fn success() -> Self {
        Self::new(Status::Success)
    }

    pub fn from_error(err: &AppError) -> Self {
        Self::new(Status::from_error(err)).with_detail(err.to_string())
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_removed(mut self, removed: Vec<UserId>) -> Self {
        self.removed = removed;
        self
    }

    pub fn with_list(mut self, rendered: String) -> Self {
        self.rendered_list = Some(rendered);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_format() {
        let action: Action =
            serde_json::from_str(r#"{"type":"kick","key":"boss-a","target":{"id":5}}"#).unwrap();
        assert_eq!(
            action,
            Action::Kick {
                key: "boss-a".to_string(),
                target: Member::new(5)
            }
        );

        let setup: Action = serde_json::from_str(r#"{"type":"setup_storage"}"#).unwrap();
        assert_eq!(setup.key(), None);
        assert!(setup.requires_admin());
    }

    #[test]
    fn test_member_actions_are_not_admin() {
        let join = Action::Join {
            key: "k".to_string(),
        };
        let list = Action::List {
            key: "k".to_string(),
            limit: None,
        };
        assert!(!join.requires_admin());
        assert!(!list.requires_admin());
        assert!(Action::Reset {
            key: "k".to_string()
        }
        .requires_admin());
    }

    #[test]
    fn test_status_from_error() {
        let invalid = AppError::Domain(DomainError::InvalidKey {
            key: String::new(),
            reason: "empty".to_string(),
        });
        assert_eq!(Status::from_error(&invalid), Status::InvalidKey);
        assert_eq!(
            Status::from_error(&AppError::UnsupportedVersion(2)),
            Status::CorruptRecord
        );
        assert_eq!(
            Status::from_error(&AppError::Internal("x".to_string())),
            Status::PersistenceFailure
        );
    }

    #[test]
    fn test_result_omits_empty_fields() {
        let json = serde_json::to_string(&InteractionResult::success()).unwrap();
        assert_eq!(json, r#"{"status":"success"}"#);
    }
}
