mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{fixture, fixture_with_storage, member};
use giftcircle_core::{ErrorKind, GiftError};
use giftcircle_storage::memory::InMemoryGiftStorage;
use giftcircle_storage::{
    CelebrationStore, ClaimStore, ContributionStore, GiftStorage, LeadershipHistoryStore,
    PledgeOutcome, PledgeRequest, PledgeStore, QueryWindow, ReleaseOutcome, StorageError,
    StorageResult,
};
use giftcircle_types::{
    Celebration, CelebrationId, CelebrationStatus, ClaimId, Contribution, GiftEvent, GroupMember,
    ItemClaim, ItemId, LeadershipAppend, LeadershipHistoryEntry, LeadershipReason, MemberId,
    SplitPledge,
};
use std::sync::Arc;

#[tokio::test]
async fn opening_a_celebration_assigns_next_birthday_in_rotation() {
    let fx = fixture();
    let mut events = fx.events.subscribe();

    let (celebration, record) = fx
        .circle
        .leadership()
        .open_celebration(fx.celebration_for("a"))
        .await
        .unwrap();

    assert_eq!(celebration.status, CelebrationStatus::Planning);
    assert_eq!(celebration.leader_id, Some(member("b")));
    assert_eq!(record.reason, LeadershipReason::AutoRotation);
    assert_eq!(record.assigned_by, None);

    let history = fx
        .circle
        .leadership()
        .leadership_history(&celebration.celebration_id, QueryWindow::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].assigned_to, member("b"));

    match events.try_recv().unwrap() {
        GiftEvent::LeaderAssigned { leader_id, .. } => assert_eq!(leader_id, member("b")),
        other => panic!("unexpected event {}", other.name()),
    }
}

#[tokio::test]
async fn last_birthday_wraps_to_first() {
    let fx = fixture();
    let (celebration, _) = fx
        .circle
        .leadership()
        .open_celebration(fx.celebration_for("d"))
        .await
        .unwrap();
    assert_eq!(celebration.leader_id, Some(member("a")));
}

#[tokio::test]
async fn unknown_celebrant_leaves_no_celebration_behind() {
    let fx = fixture();
    let err = fx
        .circle
        .leadership()
        .open_celebration(fx.celebration_for("stranger"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Rotation);
    assert_eq!(err.code(), "celebrant_not_found");
}

#[tokio::test]
async fn assign_initial_leader_uses_supplied_roster() {
    let fx = fixture();
    let (celebration, _) = fx
        .circle
        .leadership()
        .open_celebration(fx.celebration_for("a"))
        .await
        .unwrap();

    let roster = vec![GroupMember::new("a"), GroupMember::new("c")];
    let record = fx
        .circle
        .leadership()
        .assign_initial_leader(&celebration.celebration_id, &roster)
        .await
        .unwrap();
    assert_eq!(record.leader_id, member("c"));
    assert_eq!(record.previous_leader, Some(member("b")));

    let single = vec![GroupMember::new("a")];
    let err = fx
        .circle
        .leadership()
        .assign_initial_leader(&celebration.celebration_id, &single)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "insufficient_members");
}

#[tokio::test]
async fn admin_reassignment_updates_pointer_and_history() {
    let fx = fixture();
    let leadership = fx.circle.leadership();
    let (celebration, _) = leadership
        .open_celebration(fx.celebration_for("a"))
        .await
        .unwrap();
    let id = celebration.celebration_id;

    let record = leadership
        .reassign_leader(&id, &member("c"), &member("d"))
        .await
        .unwrap();
    assert_eq!(record.previous_leader, Some(member("b")));
    assert_eq!(record.assigned_by, Some(member("d")));
    assert_eq!(leadership.current_leader(&id).await.unwrap(), Some(member("c")));

    let history = leadership
        .leadership_history(&id, QueryWindow::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].reason, LeadershipReason::ManualReassign);
    assert_eq!(history[0].assigned_to, member("c"));
    assert_eq!(history[0].previous_hash, Some(history[1].hash.clone()));
}

#[tokio::test]
async fn reassignment_checks_run_in_order() {
    let fx = fixture();
    let leadership = fx.circle.leadership();
    let (celebration, _) = leadership
        .open_celebration(fx.celebration_for("a"))
        .await
        .unwrap();
    let id = celebration.celebration_id;

    let missing = leadership
        .reassign_leader(&CelebrationId::new("nope"), &member("c"), &member("d"))
        .await
        .unwrap_err();
    assert!(matches!(missing, GiftError::NotFound(_)));

    let not_admin = leadership
        .reassign_leader(&id, &member("c"), &member("b"))
        .await
        .unwrap_err();
    assert!(matches!(not_admin, GiftError::NotAuthorized(_)));

    let celebrant = leadership
        .reassign_leader(&id, &member("a"), &member("d"))
        .await
        .unwrap_err();
    assert!(matches!(celebrant, GiftError::InvalidTarget(_)));

    let outsider = leadership
        .reassign_leader(&id, &member("stranger"), &member("d"))
        .await
        .unwrap_err();
    assert!(matches!(outsider, GiftError::InvalidTarget(_)));

    leadership
        .set_celebration_status(&id, CelebrationStatus::Completed, &member("d"))
        .await
        .unwrap();
    let closed = leadership
        .reassign_leader(&id, &member("a"), &member("d"))
        .await
        .unwrap_err();
    assert!(matches!(closed, GiftError::CelebrationClosed { .. }));
    assert!(closed.is_conflict());
}

#[tokio::test]
async fn members_who_left_cannot_lead_or_administer() {
    let fx = fixture();
    let leadership = fx.circle.leadership();
    let (celebration, _) = leadership
        .open_celebration(fx.celebration_for("a"))
        .await
        .unwrap();
    let id = celebration.celebration_id;

    assert!(fx.directory.remove_member(&fx.group, &member("c")).unwrap());
    let err = leadership
        .reassign_leader(&id, &member("c"), &member("d"))
        .await
        .unwrap_err();
    assert!(matches!(err, GiftError::InvalidTarget(_)));
    assert_eq!(leadership.current_leader(&id).await.unwrap(), Some(member("b")));

    assert!(fx.directory.remove_member(&fx.group, &member("d")).unwrap());
    assert!(!fx.directory.remove_member(&fx.group, &member("d")).unwrap());
    let err = leadership
        .reassign_leader(&id, &member("b"), &member("d"))
        .await
        .unwrap_err();
    assert!(matches!(err, GiftError::NotAuthorized(_)));
}

#[tokio::test]
async fn initial_assignment_refuses_closed_celebrations() {
    let fx = fixture();
    let leadership = fx.circle.leadership();
    let (celebration, _) = leadership
        .open_celebration(fx.celebration_for("a"))
        .await
        .unwrap();
    let id = celebration.celebration_id;
    leadership
        .set_celebration_status(&id, CelebrationStatus::Completed, &member("d"))
        .await
        .unwrap();

    let roster = vec![GroupMember::new("a"), GroupMember::new("c")];
    let err = leadership
        .assign_initial_leader(&id, &roster)
        .await
        .unwrap_err();
    assert!(matches!(err, GiftError::CelebrationClosed { .. }));
    assert_eq!(leadership.current_leader(&id).await.unwrap(), Some(member("b")));
    let history = leadership
        .leadership_history(&id, QueryWindow::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn status_changes_are_admin_only_and_terminal_is_final() {
    let fx = fixture();
    let leadership = fx.circle.leadership();
    let (celebration, _) = leadership
        .open_celebration(fx.celebration_for("a"))
        .await
        .unwrap();
    let id = celebration.celebration_id;

    let err = leadership
        .set_celebration_status(&id, CelebrationStatus::Active, &member("b"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let active = leadership
        .set_celebration_status(&id, CelebrationStatus::Active, &member("d"))
        .await
        .unwrap();
    assert_eq!(active.status, CelebrationStatus::Active);

    leadership
        .set_celebration_status(&id, CelebrationStatus::Cancelled, &member("d"))
        .await
        .unwrap();
    let err = leadership
        .set_celebration_status(&id, CelebrationStatus::Active, &member("d"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "celebration_closed");
}

/// Memory storage whose history table is unavailable.
struct HistoryDown {
    inner: InMemoryGiftStorage,
}

impl GiftStorage for HistoryDown {
    fn backend_label(&self) -> &'static str {
        "history-down"
    }
}

#[async_trait]
impl CelebrationStore for HistoryDown {
    async fn create_celebration(&self, celebration: Celebration) -> StorageResult<()> {
        self.inner.create_celebration(celebration).await
    }

    async fn get_celebration(&self, id: &CelebrationId) -> StorageResult<Option<Celebration>> {
        self.inner.get_celebration(id).await
    }

    async fn set_leader(
        &self,
        id: &CelebrationId,
        leader: &MemberId,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<Celebration> {
        self.inner.set_leader(id, leader, updated_at).await
    }

    async fn transition_status(
        &self,
        id: &CelebrationId,
        to: CelebrationStatus,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<Celebration> {
        self.inner.transition_status(id, to, updated_at).await
    }
}

#[async_trait]
impl LeadershipHistoryStore for HistoryDown {
    async fn append_leadership(
        &self,
        _entry: LeadershipAppend,
    ) -> StorageResult<LeadershipHistoryEntry> {
        Err(StorageError::Backend("history unavailable".to_string()))
    }

    async fn list_leadership(
        &self,
        id: &CelebrationId,
        window: QueryWindow,
    ) -> StorageResult<Vec<LeadershipHistoryEntry>> {
        self.inner.list_leadership(id, window).await
    }
}

#[async_trait]
impl ClaimStore for HistoryDown {
    async fn insert_claim(&self, claim: ItemClaim) -> StorageResult<()> {
        self.inner.insert_claim(claim).await
    }

    async fn get_claim(&self, claim_id: &ClaimId) -> StorageResult<Option<ItemClaim>> {
        self.inner.get_claim(claim_id).await
    }

    async fn claim_for_item(&self, item_id: &ItemId) -> StorageResult<Option<ItemClaim>> {
        self.inner.claim_for_item(item_id).await
    }

    async fn release_full_claim(
        &self,
        claim_id: &ClaimId,
        claimant: &MemberId,
    ) -> StorageResult<ReleaseOutcome> {
        self.inner.release_full_claim(claim_id, claimant).await
    }
}

#[async_trait]
impl PledgeStore for HistoryDown {
    async fn list_pledges(&self, item_id: &ItemId) -> StorageResult<Vec<SplitPledge>> {
        self.inner.list_pledges(item_id).await
    }

    async fn apply_pledge(
        &self,
        item_id: &ItemId,
        contributor: &MemberId,
        request: PledgeRequest,
        pledged_at: DateTime<Utc>,
    ) -> StorageResult<PledgeOutcome> {
        self.inner
            .apply_pledge(item_id, contributor, request, pledged_at)
            .await
    }
}

#[async_trait]
impl ContributionStore for HistoryDown {
    async fn upsert_contribution(&self, contribution: Contribution) -> StorageResult<()> {
        self.inner.upsert_contribution(contribution).await
    }

    async fn list_contributions(&self, id: &CelebrationId) -> StorageResult<Vec<Contribution>> {
        self.inner.list_contributions(id).await
    }
}

#[tokio::test]
async fn history_failure_does_not_undo_leader_change() {
    let fx = fixture_with_storage(Arc::new(HistoryDown {
        inner: InMemoryGiftStorage::new(),
    }));
    let leadership = fx.circle.leadership();

    let (celebration, _) = leadership
        .open_celebration(fx.celebration_for("a"))
        .await
        .unwrap();
    let id = celebration.celebration_id;
    assert_eq!(celebration.leader_id, Some(member("b")));

    leadership
        .reassign_leader(&id, &member("c"), &member("d"))
        .await
        .unwrap();
    assert_eq!(leadership.current_leader(&id).await.unwrap(), Some(member("c")));
    assert!(leadership
        .leadership_history(&id, QueryWindow::default())
        .await
        .unwrap()
        .is_empty());
}
