use crate::events::publish;
use crate::{GiftContext, GiftError, GiftResult};
use chrono::Utc;
use giftcircle_storage::StorageError;
use giftcircle_types::{
    Celebration, CelebrationId, Contribution, ContributionTotal, GiftEvent, MemberId,
};
use tracing::info;

/// Free-form money toward a celebration's overall target.
#[derive(Clone)]
pub struct ContributionLedger {
    ctx: GiftContext,
}

impl ContributionLedger {
    pub fn new(ctx: GiftContext) -> Self {
        Self { ctx }
    }

    /// Insert or replace the actor's contribution and return the new total.
    pub async fn add_or_update_contribution(
        &self,
        celebration_id: &CelebrationId,
        actor: &MemberId,
        amount_minor: i64,
    ) -> GiftResult<ContributionTotal> {
        if amount_minor <= 0 {
            return Err(GiftError::InvalidAmount { amount_minor });
        }
        let celebration = self.celebration(celebration_id).await?;
        if celebration.status.is_terminal() {
            return Err(GiftError::CelebrationClosed {
                celebration_id: celebration.celebration_id,
                status: celebration.status,
            });
        }

        let now = Utc::now();
        self.ctx
            .storage
            .upsert_contribution(Contribution {
                celebration_id: celebration_id.clone(),
                contributor_id: actor.clone(),
                amount_minor,
                updated_at: now,
            })
            .await
            .map_err(|err| match err {
                StorageError::InvalidInput(reason) => GiftError::Validation(reason),
                other => GiftError::Storage(other),
            })?;

        let total = self.project(&celebration).await?;
        info!(
            celebration = %celebration_id,
            actor = %actor,
            amount_minor,
            total_minor = total.total_minor,
            "contribution recorded"
        );
        publish(
            self.ctx.events.as_ref(),
            GiftEvent::ContributionRecorded {
                celebration_id: celebration_id.clone(),
                contributor_id: actor.clone(),
                amount_minor,
                total_minor: total.total_minor,
                at: now,
            },
        );
        Ok(total)
    }

    pub async fn contribution_total(
        &self,
        celebration_id: &CelebrationId,
    ) -> GiftResult<ContributionTotal> {
        let celebration = self.celebration(celebration_id).await?;
        self.project(&celebration).await
    }

    async fn project(&self, celebration: &Celebration) -> GiftResult<ContributionTotal> {
        let rows = self
            .ctx
            .storage
            .list_contributions(&celebration.celebration_id)
            .await?;
        ContributionTotal::project(
            celebration.celebration_id.clone(),
            celebration.target_minor,
            &rows,
        )
        .ok_or_else(|| {
            GiftError::Validation(format!(
                "contribution total for celebration {} overflows",
                celebration.celebration_id
            ))
        })
    }

    async fn celebration(&self, celebration_id: &CelebrationId) -> GiftResult<Celebration> {
        self.ctx
            .storage
            .get_celebration(celebration_id)
            .await?
            .ok_or_else(|| GiftError::not_found(format!("celebration {celebration_id}")))
    }
}
