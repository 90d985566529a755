use crate::ids::{CelebrationId, GroupId, MemberId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a celebration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CelebrationStatus {
    #[default]
    Planning,
    Active,
    Completed,
    Cancelled,
}

impl CelebrationStatus {
    /// Terminal celebrations accept no further leadership or funding changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "planning" => Some(Self::Planning),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for CelebrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked event for one celebrant within one group.
///
/// `leader_id` is the single-writer "current Gift Leader" pointer. It is the
/// only source for "who leads now"; history exists for audit display.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Celebration {
    pub celebration_id: CelebrationId,
    pub group_id: GroupId,
    pub celebrant_id: MemberId,
    pub title: String,
    pub event_date: Option<NaiveDate>,
    pub leader_id: Option<MemberId>,
    pub target_minor: Option<i64>,
    pub status: CelebrationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Celebration {
    /// Build a new celebration in `planning` status without a leader.
    pub fn from_request(request: NewCelebration, now: DateTime<Utc>) -> Self {
        Self {
            celebration_id: CelebrationId::generate(),
            group_id: request.group_id,
            celebrant_id: request.celebrant_id,
            title: request.title,
            event_date: request.event_date,
            leader_id: None,
            target_minor: request.target_minor,
            status: CelebrationStatus::Planning,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for opening a celebration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCelebration {
    pub group_id: GroupId,
    pub celebrant_id: MemberId,
    pub title: String,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub target_minor: Option<i64>,
}

/// Why the leader pointer changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadershipReason {
    AutoRotation,
    ManualReassign,
}

impl LeadershipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoRotation => "auto_rotation",
            Self::ManualReassign => "manual_reassign",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "auto_rotation" => Some(Self::AutoRotation),
            "manual_reassign" => Some(Self::ManualReassign),
            _ => None,
        }
    }
}

/// Leadership history append payload. Sequencing and hashes are assigned by storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadershipAppend {
    pub celebration_id: CelebrationId,
    pub assigned_to: MemberId,
    pub previous_leader: Option<MemberId>,
    /// `None` for automatic rotation.
    pub assigned_by: Option<MemberId>,
    pub reason: LeadershipReason,
    pub assigned_at: DateTime<Utc>,
}

/// Persisted, hash-linked leadership history entry. Never mutated or deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadershipHistoryEntry {
    pub entry_id: String,
    pub celebration_id: CelebrationId,
    /// 1-based, per celebration.
    pub sequence: u64,
    pub assigned_to: MemberId,
    pub previous_leader: Option<MemberId>,
    pub assigned_by: Option<MemberId>,
    pub reason: LeadershipReason,
    pub assigned_at: DateTime<Utc>,
    pub previous_hash: Option<String>,
    pub hash: String,
}

/// Result of an initial assignment or a reassignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeadershipRecord {
    pub celebration_id: CelebrationId,
    pub leader_id: MemberId,
    pub previous_leader: Option<MemberId>,
    pub assigned_by: Option<MemberId>,
    pub reason: LeadershipReason,
    pub assigned_at: DateTime<Utc>,
}

impl LeadershipRecord {
    pub fn to_append(&self) -> LeadershipAppend {
        LeadershipAppend {
            celebration_id: self.celebration_id.clone(),
            assigned_to: self.leader_id.clone(),
            previous_leader: self.previous_leader.clone(),
            assigned_by: self.assigned_by.clone(),
            reason: self.reason,
            assigned_at: self.assigned_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_completed_and_cancelled_are_terminal() {
        assert!(!CelebrationStatus::Planning.is_terminal());
        assert!(!CelebrationStatus::Active.is_terminal());
        assert!(CelebrationStatus::Completed.is_terminal());
        assert!(CelebrationStatus::Cancelled.is_terminal());
    }

    #[test]
    fn reason_tags_match_serde_names() {
        let json = serde_json::to_string(&LeadershipReason::ManualReassign).unwrap();
        assert_eq!(json, format!("\"{}\"", LeadershipReason::ManualReassign.as_str()));
        assert_eq!(
            LeadershipReason::parse("auto_rotation"),
            Some(LeadershipReason::AutoRotation)
        );
    }
}
