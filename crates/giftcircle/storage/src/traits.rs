use crate::model::{PledgeOutcome, PledgeRequest, ReleaseOutcome};
use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use giftcircle_types::{
    Celebration, CelebrationId, CelebrationStatus, ClaimId, Contribution, ItemClaim, ItemId,
    LeadershipAppend, LeadershipHistoryEntry, MemberId, SplitPledge,
};

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

/// Storage interface for celebrations and their current-leader pointer.
#[async_trait]
pub trait CelebrationStore: Send + Sync {
    /// Insert a new celebration. Fails with `Conflict` on a duplicate id.
    async fn create_celebration(&self, celebration: Celebration) -> StorageResult<()>;

    async fn get_celebration(&self, id: &CelebrationId) -> StorageResult<Option<Celebration>>;

    /// Atomically replace the current-leader pointer.
    async fn set_leader(
        &self,
        id: &CelebrationId,
        leader: &MemberId,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<Celebration>;

    /// Move to `to` unless the celebration is already terminal (`InvariantViolation`).
    async fn transition_status(
        &self,
        id: &CelebrationId,
        to: CelebrationStatus,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<Celebration>;
}

/// Storage interface for the append-only leadership audit trail.
#[async_trait]
pub trait LeadershipHistoryStore: Send + Sync {
    /// Append an entry and return the sequenced, hash-linked record.
    async fn append_leadership(
        &self,
        entry: LeadershipAppend,
    ) -> StorageResult<LeadershipHistoryEntry>;

    /// Read one celebration's entries newest-first.
    async fn list_leadership(
        &self,
        id: &CelebrationId,
        window: QueryWindow,
    ) -> StorageResult<Vec<LeadershipHistoryEntry>>;
}

/// Storage interface for item claims. At most one active claim exists per item.
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Compare-and-insert. Fails with `Conflict` when the item already has a claim.
    async fn insert_claim(&self, claim: ItemClaim) -> StorageResult<()>;

    async fn get_claim(&self, claim_id: &ClaimId) -> StorageResult<Option<ItemClaim>>;

    async fn claim_for_item(&self, item_id: &ItemId) -> StorageResult<Option<ItemClaim>>;

    /// Delete a full claim only if `claimant` holds it.
    async fn release_full_claim(
        &self,
        claim_id: &ClaimId,
        claimant: &MemberId,
    ) -> StorageResult<ReleaseOutcome>;
}

/// Storage interface for split pledges.
#[async_trait]
pub trait PledgeStore: Send + Sync {
    async fn list_pledges(&self, item_id: &ItemId) -> StorageResult<Vec<SplitPledge>>;

    /// Validate, upsert the contributor's pledge and update the funded flag
    /// as one atomic write. Rejections leave the ledger unchanged.
    async fn apply_pledge(
        &self,
        item_id: &ItemId,
        contributor: &MemberId,
        request: PledgeRequest,
        pledged_at: DateTime<Utc>,
    ) -> StorageResult<PledgeOutcome>;
}

/// Storage interface for free-form celebration contributions.
#[async_trait]
pub trait ContributionStore: Send + Sync {
    /// Insert or replace the (celebration, contributor) row.
    async fn upsert_contribution(&self, contribution: Contribution) -> StorageResult<()>;

    async fn list_contributions(&self, id: &CelebrationId) -> StorageResult<Vec<Contribution>>;
}

/// Unified storage bundle used by the gift ledgers.
pub trait GiftStorage:
    CelebrationStore + LeadershipHistoryStore + ClaimStore + PledgeStore + ContributionStore + Send + Sync
{
    /// Short backend label for health reporting.
    fn backend_label(&self) -> &'static str;
}
