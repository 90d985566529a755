use crate::celebration::{CelebrationStatus, LeadershipReason};
use crate::ids::{CelebrationId, ClaimId, ItemId, MemberId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Change notification for presentation layers.
///
/// Emission is fire-and-forget and sits outside the transactional contract:
/// consumers invalidate and re-fetch rather than trusting event payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GiftEvent {
    LeaderAssigned {
        celebration_id: CelebrationId,
        leader_id: MemberId,
        reason: LeadershipReason,
        at: DateTime<Utc>,
    },
    LeaderReassigned {
        celebration_id: CelebrationId,
        leader_id: MemberId,
        previous_leader: Option<MemberId>,
        assigned_by: MemberId,
        at: DateTime<Utc>,
    },
    CelebrationStatusChanged {
        celebration_id: CelebrationId,
        status: CelebrationStatus,
        at: DateTime<Utc>,
    },
    ItemClaimed {
        item_id: ItemId,
        claim_id: ClaimId,
        at: DateTime<Utc>,
    },
    ItemUnclaimed {
        item_id: ItemId,
        claim_id: ClaimId,
        at: DateTime<Utc>,
    },
    SplitOpened {
        item_id: ItemId,
        claim_id: ClaimId,
        target_minor: i64,
        at: DateTime<Utc>,
    },
    PledgeRecorded {
        item_id: ItemId,
        contributor_id: MemberId,
        amount_minor: i64,
        pledged_minor: i64,
        at: DateTime<Utc>,
    },
    SplitFunded {
        item_id: ItemId,
        claim_id: ClaimId,
        target_minor: i64,
        at: DateTime<Utc>,
    },
    ContributionRecorded {
        celebration_id: CelebrationId,
        contributor_id: MemberId,
        amount_minor: i64,
        total_minor: i64,
        at: DateTime<Utc>,
    },
}

impl GiftEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LeaderAssigned { .. } => "leader_assigned",
            Self::LeaderReassigned { .. } => "leader_reassigned",
            Self::CelebrationStatusChanged { .. } => "celebration_status_changed",
            Self::ItemClaimed { .. } => "item_claimed",
            Self::ItemUnclaimed { .. } => "item_unclaimed",
            Self::SplitOpened { .. } => "split_opened",
            Self::PledgeRecorded { .. } => "pledge_recorded",
            Self::SplitFunded { .. } => "split_funded",
            Self::ContributionRecorded { .. } => "contribution_recorded",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_name() {
        let event = GiftEvent::ItemClaimed {
            item_id: ItemId::new("item-1"),
            claim_id: ClaimId::new("claim-1"),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.name());
    }
}
