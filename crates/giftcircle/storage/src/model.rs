use crate::{StorageError, StorageResult};
use giftcircle_types::{ClaimKind, ItemClaim, LeadershipAppend, MemberId, SplitPledge};
use serde::{Deserialize, Serialize};

/// How much a pledge write should commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PledgeRequest {
    /// Replace the contributor's pledge with this amount.
    Amount(i64),
    /// Replace the contributor's pledge with whatever closes the gap to target.
    CoverRemaining,
}

/// Expected, recoverable reasons a pledge write was refused. The ledger is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PledgeRejection {
    NoClaim,
    NotSplit,
    AlreadyFunded,
    InvalidAmount { amount_minor: i64 },
    /// `remaining_minor` is the most this contributor may pledge.
    ExceedsRemaining { remaining_minor: i64 },
}

/// Pledge amount and funding result computed against current rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PledgeSettlement {
    pub amount_minor: i64,
    pub pledged_minor: i64,
    pub funded: bool,
}

/// Committed pledge write with the post-write claim and pledge rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PledgeReceipt {
    pub claim: ItemClaim,
    pub pledge: SplitPledge,
    pub pledges: Vec<SplitPledge>,
    /// True when this write moved the split to funded.
    pub newly_funded: bool,
}

/// Outcome of a transactional pledge write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PledgeOutcome {
    Applied(PledgeReceipt),
    Rejected(PledgeRejection),
}

/// Outcome of a conditional full-claim release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released(ItemClaim),
    NotFound,
    NotClaimant { claimant_id: MemberId },
}

/// Validate a pledge against the claim and its current pledge rows.
///
/// Pledges are upserts: the contributor's existing row is replaced, so the
/// ceiling for the new amount is `target - sum(other contributors)`. Every
/// backend runs this inside its atomic section so memory and postgres agree.
pub fn settle_pledge(
    claim: Option<&ItemClaim>,
    pledges: &[SplitPledge],
    contributor: &MemberId,
    request: PledgeRequest,
) -> Result<PledgeSettlement, PledgeRejection> {
    let claim = claim.ok_or(PledgeRejection::NoClaim)?;
    if claim.kind != ClaimKind::Split {
        return Err(PledgeRejection::NotSplit);
    }
    if claim.funded {
        return Err(PledgeRejection::AlreadyFunded);
    }
    let target = claim.target_minor.ok_or(PledgeRejection::NotSplit)?;

    let others: i64 = pledges
        .iter()
        .filter(|pledge| &pledge.contributor_id != contributor)
        .map(|pledge| pledge.amount_minor)
        .sum();
    let available = target - others;

    let amount_minor = match request {
        PledgeRequest::Amount(amount) if amount <= 0 => {
            return Err(PledgeRejection::InvalidAmount {
                amount_minor: amount,
            })
        }
        PledgeRequest::Amount(amount) if amount > available => {
            return Err(PledgeRejection::ExceedsRemaining {
                remaining_minor: available.max(0),
            })
        }
        PledgeRequest::Amount(amount) => amount,
        PledgeRequest::CoverRemaining if available <= 0 => {
            return Err(PledgeRejection::AlreadyFunded)
        }
        PledgeRequest::CoverRemaining => available,
    };

    let pledged_minor = others + amount_minor;
    Ok(PledgeSettlement {
        amount_minor,
        pledged_minor,
        funded: pledged_minor == target,
    })
}

/// Hash linking a leadership history entry to its predecessor in the same celebration.
pub fn compute_leadership_hash(
    append: &LeadershipAppend,
    sequence: u64,
    previous_hash: Option<&str>,
) -> StorageResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "celebration_id": append.celebration_id,
        "assigned_to": append.assigned_to,
        "previous_leader": append.previous_leader,
        "assigned_by": append.assigned_by,
        "reason": append.reason,
        "assigned_at": append.assigned_at,
    });
    let serialized = serde_json::to_vec(&serializable)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}
