//! Shared funding of a single item.
//!
//! A split freezes its target when it opens. Pledges are one row per
//! contributor and replace on repeat. The pledge that brings the total to
//! exactly the target flips the split to funded in the same storage write.

use crate::events::publish;
use crate::{GiftContext, GiftError, GiftResult};
use chrono::Utc;
use giftcircle_storage::{PledgeOutcome, PledgeReceipt, PledgeRejection, PledgeRequest, StorageError};
use giftcircle_types::{
    ClaimKind, GiftEvent, ItemClaim, ItemId, ItemListing, MemberId, SplitStatus,
};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct SplitFundingEngine {
    ctx: GiftContext,
}

impl SplitFundingEngine {
    pub fn new(ctx: GiftContext) -> Self {
        Self { ctx }
    }

    /// Open a split on an unclaimed item with `target = price + additional costs`.
    pub async fn open_split(
        &self,
        item_id: &ItemId,
        actor: &MemberId,
        additional_costs_minor: Option<i64>,
    ) -> GiftResult<ItemClaim> {
        let listing = self.listing(item_id).await?;
        if listing.is_owned_by(actor) {
            return Err(GiftError::NotAllowed(
                "owners cannot open a split on their own item".to_string(),
            ));
        }

        let additional = match additional_costs_minor {
            Some(amount) if amount < 0 => {
                return Err(GiftError::InvalidAmount {
                    amount_minor: amount,
                })
            }
            Some(0) | None => 0,
            Some(amount) => amount,
        };
        let price = listing.price_minor.ok_or_else(|| {
            GiftError::Validation(format!("item {item_id} has no price to split"))
        })?;
        let target = price
            .checked_add(additional)
            .ok_or_else(|| GiftError::Validation("split target overflows".to_string()))?;
        if target <= 0 {
            return Err(GiftError::Validation(format!(
                "split target must be positive, got {target}"
            )));
        }

        let claim = ItemClaim::split(item_id.clone(), actor.clone(), target, Utc::now());
        match self.ctx.storage.insert_claim(claim.clone()).await {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => {
                warn!(item = %item_id, actor = %actor, "split open lost to an existing claim");
                return Err(GiftError::AlreadyClaimed {
                    item_id: item_id.clone(),
                });
            }
            Err(err) => return Err(err.into()),
        }

        info!(item = %item_id, actor = %actor, target_minor = target, "split opened");
        publish(
            self.ctx.events.as_ref(),
            GiftEvent::SplitOpened {
                item_id: item_id.clone(),
                claim_id: claim.claim_id.clone(),
                target_minor: target,
                at: claim.created_at,
            },
        );
        Ok(claim)
    }

    /// Set the actor's pledge to `amount_minor`, replacing any earlier pledge.
    pub async fn pledge(
        &self,
        item_id: &ItemId,
        actor: &MemberId,
        amount_minor: i64,
    ) -> GiftResult<SplitStatus> {
        if amount_minor <= 0 {
            return Err(GiftError::InvalidAmount { amount_minor });
        }
        self.ensure_not_owner(item_id, actor).await?;

        let outcome = self
            .ctx
            .storage
            .apply_pledge(
                item_id,
                actor,
                PledgeRequest::Amount(amount_minor),
                Utc::now(),
            )
            .await?;

        match outcome {
            PledgeOutcome::Applied(receipt) => self.committed(actor, receipt),
            PledgeOutcome::Rejected(rejection) => Err(match rejection {
                PledgeRejection::NoClaim
                | PledgeRejection::NotSplit
                | PledgeRejection::AlreadyFunded => GiftError::NotOpen {
                    item_id: item_id.clone(),
                },
                PledgeRejection::InvalidAmount { amount_minor } => {
                    GiftError::InvalidAmount { amount_minor }
                }
                PledgeRejection::ExceedsRemaining { remaining_minor } => {
                    GiftError::ExceedsRemaining { remaining_minor }
                }
            }),
        }
    }

    /// Cover whatever is left so that pledged equals target, in one lump sum.
    pub async fn close_split(&self, item_id: &ItemId, actor: &MemberId) -> GiftResult<SplitStatus> {
        self.ensure_not_owner(item_id, actor).await?;

        let outcome = self
            .ctx
            .storage
            .apply_pledge(item_id, actor, PledgeRequest::CoverRemaining, Utc::now())
            .await?;

        match outcome {
            PledgeOutcome::Applied(receipt) => self.committed(actor, receipt),
            PledgeOutcome::Rejected(PledgeRejection::AlreadyFunded) => {
                Err(GiftError::AlreadyFunded {
                    item_id: item_id.clone(),
                })
            }
            PledgeOutcome::Rejected(PledgeRejection::ExceedsRemaining { remaining_minor }) => {
                Err(GiftError::ExceedsRemaining { remaining_minor })
            }
            PledgeOutcome::Rejected(PledgeRejection::InvalidAmount { amount_minor }) => {
                Err(GiftError::InvalidAmount { amount_minor })
            }
            PledgeOutcome::Rejected(PledgeRejection::NoClaim | PledgeRejection::NotSplit) => {
                Err(GiftError::NotOpen {
                    item_id: item_id.clone(),
                })
            }
        }
    }

    /// Current funding projection of the item's split as `viewer` may see it.
    ///
    /// The item's owner gets totals only; opener and contributor identities
    /// are redacted.
    pub async fn split_status(
        &self,
        item_id: &ItemId,
        viewer: &MemberId,
    ) -> GiftResult<SplitStatus> {
        let listing = self.listing(item_id).await?;
        let mut status = self.project(item_id).await?;
        if listing.is_owned_by(viewer) {
            status.redact_identities();
        }
        Ok(status)
    }

    /// Equal share if one more member joined, never above the remaining gap.
    pub async fn suggested_share(&self, item_id: &ItemId) -> GiftResult<i64> {
        Ok(self.project(item_id).await?.suggested_share_minor())
    }

    async fn project(&self, item_id: &ItemId) -> GiftResult<SplitStatus> {
        let claim = self
            .ctx
            .storage
            .claim_for_item(item_id)
            .await?
            .ok_or_else(|| GiftError::not_found(format!("split for item {item_id}")))?;
        if claim.kind != ClaimKind::Split {
            return Err(GiftError::NotOpen {
                item_id: item_id.clone(),
            });
        }

        let pledges = self.ctx.storage.list_pledges(item_id).await?;
        let status = SplitStatus::project(&claim, &pledges).ok_or_else(|| GiftError::NotOpen {
            item_id: item_id.clone(),
        })?;
        debug!(
            item = %item_id,
            pledged_minor = status.pledged_minor,
            target_minor = status.target_minor,
            "split status projected"
        );
        Ok(status)
    }

    fn committed(&self, actor: &MemberId, receipt: PledgeReceipt) -> GiftResult<SplitStatus> {
        let status = SplitStatus::project(&receipt.claim, &receipt.pledges).ok_or_else(|| {
            GiftError::Storage(StorageError::InvariantViolation(format!(
                "pledge committed against non-split claim {}",
                receipt.claim.claim_id
            )))
        })?;

        info!(
            item = %status.item_id,
            actor = %actor,
            amount_minor = receipt.pledge.amount_minor,
            pledged_minor = status.pledged_minor,
            target_minor = status.target_minor,
            "pledge recorded"
        );
        publish(
            self.ctx.events.as_ref(),
            GiftEvent::PledgeRecorded {
                item_id: status.item_id.clone(),
                contributor_id: actor.clone(),
                amount_minor: receipt.pledge.amount_minor,
                pledged_minor: status.pledged_minor,
                at: receipt.pledge.pledged_at,
            },
        );

        if receipt.newly_funded {
            info!(item = %status.item_id, target_minor = status.target_minor, "split fully funded");
            publish(
                self.ctx.events.as_ref(),
                GiftEvent::SplitFunded {
                    item_id: status.item_id.clone(),
                    claim_id: receipt.claim.claim_id.clone(),
                    target_minor: status.target_minor,
                    at: receipt.pledge.pledged_at,
                },
            );
        }

        Ok(status)
    }

    async fn ensure_not_owner(&self, item_id: &ItemId, actor: &MemberId) -> GiftResult<()> {
        if self.listing(item_id).await?.is_owned_by(actor) {
            return Err(GiftError::NotAllowed(
                "owners cannot fund their own item".to_string(),
            ));
        }
        Ok(())
    }

    async fn listing(&self, item_id: &ItemId) -> GiftResult<ItemListing> {
        self.ctx
            .catalog
            .listing(item_id)
            .await?
            .ok_or_else(|| GiftError::not_found(format!("item {item_id}")))
    }
}
