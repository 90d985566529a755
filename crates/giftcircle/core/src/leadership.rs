//! Gift-leader assignment and reassignment.
//!
//! The celebration's `leader_id` is the single source of truth for who leads.
//! Every change is also appended to the leadership history, but that append is
//! best-effort: when it fails after the pointer moved, the failure is logged and
//! the operation still succeeds.

use crate::events::publish;
use crate::{GiftContext, GiftError, GiftResult};
use chrono::Utc;
use giftcircle_rotation::plan_next_leader;
use giftcircle_storage::{QueryWindow, StorageError};
use giftcircle_types::{
    Celebration, CelebrationId, CelebrationStatus, GiftEvent, GroupMember, LeadershipHistoryEntry,
    LeadershipReason, LeadershipRecord, MemberId, NewCelebration,
};
use tracing::{debug, info, warn};

/// Opens celebrations and manages their gift leader.
#[derive(Clone)]
pub struct LeadershipAssignment {
    ctx: GiftContext,
}

impl LeadershipAssignment {
    pub fn new(ctx: GiftContext) -> Self {
        Self { ctx }
    }

    /// Create a celebration in `planning` status and auto-assign its leader
    /// from the group roster.
    ///
    /// The leader is planned before anything is written, so a roster that
    /// cannot produce a leader leaves no celebration behind.
    pub async fn open_celebration(
        &self,
        request: NewCelebration,
    ) -> GiftResult<(Celebration, LeadershipRecord)> {
        if request.title.trim().is_empty() {
            return Err(GiftError::Validation("title must not be empty".to_string()));
        }
        if let Some(target) = request.target_minor {
            if target <= 0 {
                return Err(GiftError::InvalidAmount {
                    amount_minor: target,
                });
            }
        }

        let roster = self.ctx.directory.roster(&request.group_id).await?;
        let leader = plan_next_leader(&roster, &request.celebrant_id)?;

        let celebration = Celebration::from_request(request, Utc::now());
        self.ctx
            .storage
            .create_celebration(celebration.clone())
            .await?;
        info!(
            celebration = %celebration.celebration_id,
            group = %celebration.group_id,
            celebrant = %celebration.celebrant_id,
            "celebration opened"
        );

        let (celebration, record) = self
            .install_leader(&celebration, leader, LeadershipReason::AutoRotation, None)
            .await?;
        Ok((celebration, record))
    }

    /// Plan the leader from `roster` and persist it as the current leader.
    pub async fn assign_initial_leader(
        &self,
        celebration_id: &CelebrationId,
        roster: &[GroupMember],
    ) -> GiftResult<LeadershipRecord> {
        let celebration = self.celebration(celebration_id).await?;
        if celebration.status.is_terminal() {
            return Err(GiftError::CelebrationClosed {
                celebration_id: celebration.celebration_id,
                status: celebration.status,
            });
        }
        let leader = plan_next_leader(roster, &celebration.celebrant_id)?;
        let (_, record) = self
            .install_leader(&celebration, leader, LeadershipReason::AutoRotation, None)
            .await?;
        Ok(record)
    }

    /// Admin override of the current leader.
    pub async fn reassign_leader(
        &self,
        celebration_id: &CelebrationId,
        new_leader: &MemberId,
        actor: &MemberId,
    ) -> GiftResult<LeadershipRecord> {
        let celebration = self.celebration(celebration_id).await?;

        if !self
            .ctx
            .directory
            .is_admin(&celebration.group_id, actor)
            .await?
        {
            return Err(GiftError::NotAuthorized(format!(
                "{actor} is not an admin of group {}",
                celebration.group_id
            )));
        }
        if celebration.status.is_terminal() {
            return Err(GiftError::CelebrationClosed {
                celebration_id: celebration.celebration_id,
                status: celebration.status,
            });
        }
        if new_leader == &celebration.celebrant_id {
            return Err(GiftError::InvalidTarget(
                "the celebrant cannot lead their own celebration".to_string(),
            ));
        }
        if !self
            .ctx
            .directory
            .is_member(&celebration.group_id, new_leader)
            .await?
        {
            return Err(GiftError::InvalidTarget(format!(
                "{new_leader} is not a member of group {}",
                celebration.group_id
            )));
        }

        let (_, record) = self
            .install_leader(
                &celebration,
                new_leader.clone(),
                LeadershipReason::ManualReassign,
                Some(actor.clone()),
            )
            .await?;
        Ok(record)
    }

    pub async fn celebration(&self, celebration_id: &CelebrationId) -> GiftResult<Celebration> {
        self.ctx
            .storage
            .get_celebration(celebration_id)
            .await?
            .ok_or_else(|| GiftError::not_found(format!("celebration {celebration_id}")))
    }

    /// Read the current-leader pointer. History is never consulted.
    pub async fn current_leader(
        &self,
        celebration_id: &CelebrationId,
    ) -> GiftResult<Option<MemberId>> {
        Ok(self.celebration(celebration_id).await?.leader_id)
    }

    /// Leadership history, newest first.
    pub async fn leadership_history(
        &self,
        celebration_id: &CelebrationId,
        window: QueryWindow,
    ) -> GiftResult<Vec<LeadershipHistoryEntry>> {
        self.celebration(celebration_id).await?;
        let entries = self
            .ctx
            .storage
            .list_leadership(celebration_id, window)
            .await?;
        debug!(celebration = %celebration_id, count = entries.len(), "leadership history read");
        Ok(entries)
    }

    /// Admin-gated status change. Terminal statuses are final.
    pub async fn set_celebration_status(
        &self,
        celebration_id: &CelebrationId,
        status: CelebrationStatus,
        actor: &MemberId,
    ) -> GiftResult<Celebration> {
        let celebration = self.celebration(celebration_id).await?;
        if !self
            .ctx
            .directory
            .is_admin(&celebration.group_id, actor)
            .await?
        {
            return Err(GiftError::NotAuthorized(format!(
                "{actor} is not an admin of group {}",
                celebration.group_id
            )));
        }
        if celebration.status.is_terminal() {
            return Err(GiftError::CelebrationClosed {
                celebration_id: celebration.celebration_id,
                status: celebration.status,
            });
        }

        let now = Utc::now();
        let updated = match self
            .ctx
            .storage
            .transition_status(celebration_id, status, now)
            .await
        {
            Ok(updated) => updated,
            // Lost a race with another terminal transition.
            Err(StorageError::InvariantViolation(_)) => {
                let current = self.celebration(celebration_id).await?;
                return Err(GiftError::CelebrationClosed {
                    celebration_id: current.celebration_id,
                    status: current.status,
                });
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            celebration = %celebration_id,
            actor = %actor,
            status = %updated.status,
            "celebration status changed"
        );
        publish(
            self.ctx.events.as_ref(),
            GiftEvent::CelebrationStatusChanged {
                celebration_id: celebration_id.clone(),
                status: updated.status,
                at: now,
            },
        );
        Ok(updated)
    }

    async fn install_leader(
        &self,
        celebration: &Celebration,
        leader: MemberId,
        reason: LeadershipReason,
        actor: Option<MemberId>,
    ) -> GiftResult<(Celebration, LeadershipRecord)> {
        let now = Utc::now();
        let updated = self
            .ctx
            .storage
            .set_leader(&celebration.celebration_id, &leader, now)
            .await?;

        let record = LeadershipRecord {
            celebration_id: celebration.celebration_id.clone(),
            leader_id: leader,
            previous_leader: celebration.leader_id.clone(),
            assigned_by: actor,
            reason,
            assigned_at: now,
        };

        match self.ctx.storage.append_leadership(record.to_append()).await {
            Ok(entry) => debug!(
                celebration = %record.celebration_id,
                sequence = entry.sequence,
                "leadership history appended"
            ),
            Err(err) => warn!(
                celebration = %record.celebration_id,
                leader = %record.leader_id,
                error = %err,
                "leadership history append failed; current leader already updated"
            ),
        }

        info!(
            celebration = %record.celebration_id,
            leader = %record.leader_id,
            reason = record.reason.as_str(),
            "gift leader assigned"
        );

        let event = match (&record.reason, &record.assigned_by) {
            (LeadershipReason::ManualReassign, Some(actor)) => GiftEvent::LeaderReassigned {
                celebration_id: record.celebration_id.clone(),
                leader_id: record.leader_id.clone(),
                previous_leader: record.previous_leader.clone(),
                assigned_by: actor.clone(),
                at: now,
            },
            _ => GiftEvent::LeaderAssigned {
                celebration_id: record.celebration_id.clone(),
                leader_id: record.leader_id.clone(),
                reason: record.reason,
                at: now,
            },
        };
        publish(self.ctx.events.as_ref(), event);

        Ok((updated, record))
    }
}
