use crate::events::publish;
use crate::{GiftContext, GiftError, GiftResult};
use chrono::Utc;
use giftcircle_storage::{ReleaseOutcome, StorageError};
use giftcircle_types::{
    ClaimId, ClaimKind, ClaimSummary, GiftEvent, ItemClaim, ItemClaimState, ItemId, ItemListing,
    MemberId, SplitPledge, SplitStatus,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A viewer-specific projection of one item's claim state.
///
/// When the viewer owns the item, every member identity is removed. State and
/// funding progress stay visible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemView {
    pub item_id: ItemId,
    pub state: ItemClaimState,
    pub claim_id: Option<ClaimId>,
    pub claimant_id: Option<MemberId>,
    pub target_minor: Option<i64>,
    pub pledged_minor: Option<i64>,
    pub remaining_minor: Option<i64>,
    pub contributor_count: usize,
    pub pledges: Vec<SplitPledge>,
    pub identities_redacted: bool,
}

/// Full-claim ledger over catalog items.
#[derive(Clone)]
pub struct ClaimLedger {
    ctx: GiftContext,
}

impl ClaimLedger {
    pub fn new(ctx: GiftContext) -> Self {
        Self { ctx }
    }

    /// Claim an item outright. Exactly one concurrent caller wins.
    pub async fn claim(&self, item_id: &ItemId, actor: &MemberId) -> GiftResult<ItemClaim> {
        let listing = self.listing(item_id).await?;
        if listing.is_owned_by(actor) {
            return Err(GiftError::NotAllowed(
                "owners cannot claim their own item".to_string(),
            ));
        }

        let claim = ItemClaim::full(item_id.clone(), actor.clone(), Utc::now());
        match self.ctx.storage.insert_claim(claim.clone()).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => {
                warn!(item = %item_id, actor = %actor, "claim lost to an existing claim");
                return Err(GiftError::AlreadyClaimed {
                    item_id: item_id.clone(),
                });
            }
            Err(err) => return Err(err.into()),
        }

        info!(item = %item_id, actor = %actor, claim = %claim.claim_id, "item claimed");
        publish(
            self.ctx.events.as_ref(),
            GiftEvent::ItemClaimed {
                item_id: item_id.clone(),
                claim_id: claim.claim_id.clone(),
                at: claim.created_at,
            },
        );
        Ok(claim)
    }

    /// Release a full claim. Only the original claimant may do this.
    pub async fn unclaim(&self, claim_id: &ClaimId, actor: &MemberId) -> GiftResult<()> {
        match self
            .ctx
            .storage
            .release_full_claim(claim_id, actor)
            .await?
        {
            ReleaseOutcome::Released(claim) => {
                info!(item = %claim.item_id, actor = %actor, claim = %claim_id, "item unclaimed");
                publish(
                    self.ctx.events.as_ref(),
                    GiftEvent::ItemUnclaimed {
                        item_id: claim.item_id,
                        claim_id: claim_id.clone(),
                        at: Utc::now(),
                    },
                );
                Ok(())
            }
            ReleaseOutcome::NotFound => Err(GiftError::not_found(format!("claim {claim_id}"))),
            ReleaseOutcome::NotClaimant { .. } => Err(GiftError::NotOwnerOfClaim {
                claim_id: claim_id.clone(),
            }),
        }
    }

    /// Project an item's claim state for `viewer`.
    pub async fn item_view(&self, item_id: &ItemId, viewer: &MemberId) -> GiftResult<ItemView> {
        let listing = self.listing(item_id).await?;
        let claim = self.ctx.storage.claim_for_item(item_id).await?;
        let redact = listing.is_owned_by(viewer);

        let mut view = ItemView {
            item_id: item_id.clone(),
            state: ItemClaimState::of(claim.as_ref()),
            claim_id: None,
            claimant_id: None,
            target_minor: None,
            pledged_minor: None,
            remaining_minor: None,
            contributor_count: 0,
            pledges: Vec::new(),
            identities_redacted: redact,
        };

        if let Some(claim) = claim {
            view.claim_id = Some(claim.claim_id.clone());
            view.claimant_id = Some(claim.claimant_id.clone());
            if claim.kind == ClaimKind::Split {
                let pledges = self.ctx.storage.list_pledges(item_id).await?;
                if let Some(status) = SplitStatus::project(&claim, &pledges) {
                    view.target_minor = Some(status.target_minor);
                    view.pledged_minor = Some(status.pledged_minor);
                    view.remaining_minor = Some(status.remaining_minor);
                    view.contributor_count = status.contributor_count;
                    view.pledges = status.pledges;
                }
            }
        }

        if redact {
            view.claim_id = None;
            view.claimant_id = None;
            view.pledges.clear();
        }

        debug!(item = %item_id, state = ?view.state, redacted = redact, "item view projected");
        Ok(view)
    }

    /// Count items per claim state, recomputed from claim rows.
    pub async fn claim_summary(&self, item_ids: &[ItemId]) -> GiftResult<ClaimSummary> {
        let mut summary = ClaimSummary::default();
        for item_id in item_ids {
            let claim = self.ctx.storage.claim_for_item(item_id).await?;
            summary.record(ItemClaimState::of(claim.as_ref()));
        }
        Ok(summary)
    }

    async fn listing(&self, item_id: &ItemId) -> GiftResult<ItemListing> {
        self.ctx
            .catalog
            .listing(item_id)
            .await?
            .ok_or_else(|| GiftError::not_found(format!("item {item_id}")))
    }
}
