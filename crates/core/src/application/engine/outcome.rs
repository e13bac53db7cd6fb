// Operation outcomes (informational, not errors)

use crate::domain::UserId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined { position: usize },
    AlreadyJoined { position: usize },
}

impl JoinOutcome {
    pub fn position(&self) -> usize {
        match self {
            JoinOutcome::Joined { position } | JoinOutcome::AlreadyJoined { position } => {
                *position
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveOutcome {
    Left,
    NotInQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KickOutcome {
    Kicked,
    NotInQueue,
}

/// Result of removing several members at once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkKickOutcome {
    pub removed: Vec<UserId>,
    pub absent: Vec<UserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted { members: usize },
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReinitOutcome {
    /// Carriers were readable and became the new state
    Adopted { queues: usize },
    /// Carriers were unreadable or missing; the in-memory snapshot was written over them
    Rewritten { queues: usize },
}
