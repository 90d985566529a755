//! In-memory reference implementation of the Gift Circle storage traits.
//!
//! Each conditional write runs under one write lock, which gives the same
//! compare-and-insert and validate-then-write atomicity the postgres backend
//! gets from constraints and row locks. Deterministic and test-friendly.

use crate::model::{
    compute_leadership_hash, settle_pledge, PledgeOutcome, PledgeReceipt, PledgeRequest,
    ReleaseOutcome,
};
use crate::traits::{
    CelebrationStore, ClaimStore, ContributionStore, GiftStorage, LeadershipHistoryStore,
    PledgeStore, QueryWindow,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use giftcircle_types::{
    checked_total, Celebration, CelebrationId, CelebrationStatus, ClaimId, ClaimKind,
    Contribution, ItemClaim, ItemId, LeadershipAppend, LeadershipHistoryEntry, MemberId,
    SplitPledge,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use uuid::Uuid;

/// Claims and pledges share one lock so a pledge sees a consistent claim.
#[derive(Default)]
struct ClaimTables {
    claims: HashMap<ItemId, ItemClaim>,
    items_by_claim: HashMap<ClaimId, ItemId>,
    pledges: HashMap<ItemId, BTreeMap<MemberId, SplitPledge>>,
}

/// In-memory Gift Circle storage adapter.
#[derive(Default)]
pub struct InMemoryGiftStorage {
    celebrations: RwLock<HashMap<CelebrationId, Celebration>>,
    leadership: RwLock<HashMap<CelebrationId, Vec<LeadershipHistoryEntry>>>,
    claims: RwLock<ClaimTables>,
    contributions: RwLock<HashMap<(CelebrationId, MemberId), Contribution>>,
}

impl InMemoryGiftStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GiftStorage for InMemoryGiftStorage {
    fn backend_label(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl CelebrationStore for InMemoryGiftStorage {
    async fn create_celebration(&self, celebration: Celebration) -> StorageResult<()> {
        let mut guard = self
            .celebrations
            .write()
            .map_err(|_| StorageError::Backend("celebrations lock poisoned".to_string()))?;

        if guard.contains_key(&celebration.celebration_id) {
            return Err(StorageError::Conflict(format!(
                "celebration {} already exists",
                celebration.celebration_id
            )));
        }
        guard.insert(celebration.celebration_id.clone(), celebration);
        Ok(())
    }

    async fn get_celebration(&self, id: &CelebrationId) -> StorageResult<Option<Celebration>> {
        let guard = self
            .celebrations
            .read()
            .map_err(|_| StorageError::Backend("celebrations lock poisoned".to_string()))?;
        Ok(guard.get(id).cloned())
    }

    async fn set_leader(
        &self,
        id: &CelebrationId,
        leader: &MemberId,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<Celebration> {
        let mut guard = self
            .celebrations
            .write()
            .map_err(|_| StorageError::Backend("celebrations lock poisoned".to_string()))?;
        let record = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("celebration {} not found", id)))?;

        record.leader_id = Some(leader.clone());
        record.updated_at = updated_at;
        Ok(record.clone())
    }

    async fn transition_status(
        &self,
        id: &CelebrationId,
        to: CelebrationStatus,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<Celebration> {
        let mut guard = self
            .celebrations
            .write()
            .map_err(|_| StorageError::Backend("celebrations lock poisoned".to_string()))?;
        let record = guard
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(format!("celebration {} not found", id)))?;

        if record.status.is_terminal() {
            return Err(StorageError::InvariantViolation(format!(
                "celebration {} is already {}",
                id, record.status
            )));
        }

        record.status = to;
        record.updated_at = updated_at;
        Ok(record.clone())
    }
}

#[async_trait]
impl LeadershipHistoryStore for InMemoryGiftStorage {
    async fn append_leadership(
        &self,
        entry: LeadershipAppend,
    ) -> StorageResult<LeadershipHistoryEntry> {
        let mut guard = self
            .leadership
            .write()
            .map_err(|_| StorageError::Backend("leadership lock poisoned".to_string()))?;

        let chain = guard.entry(entry.celebration_id.clone()).or_default();
        let previous_hash = chain.last().map(|e| e.hash.clone());
        let sequence = chain.len() as u64 + 1;
        let hash = compute_leadership_hash(&entry, sequence, previous_hash.as_deref())?;

        let record = LeadershipHistoryEntry {
            entry_id: format!("leadership-{}", Uuid::new_v4()),
            celebration_id: entry.celebration_id,
            sequence,
            assigned_to: entry.assigned_to,
            previous_leader: entry.previous_leader,
            assigned_by: entry.assigned_by,
            reason: entry.reason,
            assigned_at: entry.assigned_at,
            previous_hash,
            hash,
        };

        chain.push(record.clone());
        Ok(record)
    }

    async fn list_leadership(
        &self,
        id: &CelebrationId,
        window: QueryWindow,
    ) -> StorageResult<Vec<LeadershipHistoryEntry>> {
        let guard = self
            .leadership
            .read()
            .map_err(|_| StorageError::Backend("leadership lock poisoned".to_string()))?;
        let mut values = guard.get(id).cloned().unwrap_or_default();
        values.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        Ok(apply_window(values, window))
    }
}

#[async_trait]
impl ClaimStore for InMemoryGiftStorage {
    async fn insert_claim(&self, claim: ItemClaim) -> StorageResult<()> {
        let mut guard = self
            .claims
            .write()
            .map_err(|_| StorageError::Backend("claims lock poisoned".to_string()))?;

        if guard.claims.contains_key(&claim.item_id) {
            return Err(StorageError::Conflict(format!(
                "item {} already has an active claim",
                claim.item_id
            )));
        }

        guard
            .items_by_claim
            .insert(claim.claim_id.clone(), claim.item_id.clone());
        guard.claims.insert(claim.item_id.clone(), claim);
        Ok(())
    }

    async fn get_claim(&self, claim_id: &ClaimId) -> StorageResult<Option<ItemClaim>> {
        let guard = self
            .claims
            .read()
            .map_err(|_| StorageError::Backend("claims lock poisoned".to_string()))?;
        Ok(guard
            .items_by_claim
            .get(claim_id)
            .and_then(|item_id| guard.claims.get(item_id))
            .cloned())
    }

    async fn claim_for_item(&self, item_id: &ItemId) -> StorageResult<Option<ItemClaim>> {
        let guard = self
            .claims
            .read()
            .map_err(|_| StorageError::Backend("claims lock poisoned".to_string()))?;
        Ok(guard.claims.get(item_id).cloned())
    }

    async fn release_full_claim(
        &self,
        claim_id: &ClaimId,
        claimant: &MemberId,
    ) -> StorageResult<ReleaseOutcome> {
        let mut guard = self
            .claims
            .write()
            .map_err(|_| StorageError::Backend("claims lock poisoned".to_string()))?;

        let Some(item_id) = guard.items_by_claim.get(claim_id).cloned() else {
            return Ok(ReleaseOutcome::NotFound);
        };
        let Some(claim) = guard.claims.get(&item_id) else {
            return Ok(ReleaseOutcome::NotFound);
        };
        if claim.kind != ClaimKind::Full {
            return Ok(ReleaseOutcome::NotFound);
        }
        if &claim.claimant_id != claimant {
            return Ok(ReleaseOutcome::NotClaimant {
                claimant_id: claim.claimant_id.clone(),
            });
        }

        guard.items_by_claim.remove(claim_id);
        let released = guard.claims.remove(&item_id).ok_or_else(|| {
            StorageError::InvariantViolation(format!("claim index out of sync for {}", item_id))
        })?;
        guard.pledges.remove(&item_id);
        Ok(ReleaseOutcome::Released(released))
    }
}

#[async_trait]
impl PledgeStore for InMemoryGiftStorage {
    async fn list_pledges(&self, item_id: &ItemId) -> StorageResult<Vec<SplitPledge>> {
        let guard = self
            .claims
            .read()
            .map_err(|_| StorageError::Backend("claims lock poisoned".to_string()))?;
        Ok(guard
            .pledges
            .get(item_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn apply_pledge(
        &self,
        item_id: &ItemId,
        contributor: &MemberId,
        request: PledgeRequest,
        pledged_at: DateTime<Utc>,
    ) -> StorageResult<PledgeOutcome> {
        let mut guard = self
            .claims
            .write()
            .map_err(|_| StorageError::Backend("claims lock poisoned".to_string()))?;
        let tables = &mut *guard;

        let current: Vec<SplitPledge> = tables
            .pledges
            .get(item_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();

        let settlement =
            match settle_pledge(tables.claims.get(item_id), &current, contributor, request) {
                Ok(settlement) => settlement,
                Err(rejection) => return Ok(PledgeOutcome::Rejected(rejection)),
            };

        let claim = tables.claims.get_mut(item_id).ok_or_else(|| {
            StorageError::InvariantViolation(format!("claim for {} vanished mid-write", item_id))
        })?;
        if settlement.funded {
            claim.funded = true;
            claim.funded_at = Some(pledged_at);
        }
        let claim = claim.clone();

        let pledge = SplitPledge {
            item_id: item_id.clone(),
            contributor_id: contributor.clone(),
            amount_minor: settlement.amount_minor,
            pledged_at,
        };
        let rows = tables.pledges.entry(item_id.clone()).or_default();
        rows.insert(contributor.clone(), pledge.clone());
        let pledges = rows.values().cloned().collect();

        Ok(PledgeOutcome::Applied(PledgeReceipt {
            claim,
            pledge,
            pledges,
            newly_funded: settlement.funded,
        }))
    }
}

#[async_trait]
impl ContributionStore for InMemoryGiftStorage {
    async fn upsert_contribution(&self, contribution: Contribution) -> StorageResult<()> {
        let mut guard = self
            .contributions
            .write()
            .map_err(|_| StorageError::Backend("contributions lock poisoned".to_string()))?;
        let others = guard.values().filter(|row| {
            row.celebration_id == contribution.celebration_id
                && row.contributor_id != contribution.contributor_id
        });
        if checked_total(
            others
                .map(|row| row.amount_minor)
                .chain(std::iter::once(contribution.amount_minor)),
        )
        .is_none()
        {
            return Err(StorageError::InvalidInput(format!(
                "contribution total for celebration {} would overflow",
                contribution.celebration_id
            )));
        }
        guard.insert(
            (
                contribution.celebration_id.clone(),
                contribution.contributor_id.clone(),
            ),
            contribution,
        );
        Ok(())
    }

    async fn list_contributions(&self, id: &CelebrationId) -> StorageResult<Vec<Contribution>> {
        let guard = self
            .contributions
            .read()
            .map_err(|_| StorageError::Backend("contributions lock poisoned".to_string()))?;
        let mut values = guard
            .values()
            .filter(|row| &row.celebration_id == id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| a.contributor_id.cmp(&b.contributor_id));
        Ok(values)
    }
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PledgeRejection;
    use chrono::Duration;
    use giftcircle_types::{GroupId, LeadershipReason, NewCelebration};
    use std::sync::Arc;

    fn celebration() -> Celebration {
        Celebration::from_request(
            NewCelebration {
                group_id: GroupId::new("g-1"),
                celebrant_id: MemberId::new("a"),
                title: "A turns 30".to_string(),
                event_date: None,
                target_minor: Some(20_000),
            },
            Utc::now(),
        )
    }

    fn append(id: &CelebrationId, to: &str, at: DateTime<Utc>) -> LeadershipAppend {
        LeadershipAppend {
            celebration_id: id.clone(),
            assigned_to: MemberId::new(to),
            previous_leader: None,
            assigned_by: None,
            reason: LeadershipReason::AutoRotation,
            assigned_at: at,
        }
    }

    #[tokio::test]
    async fn leadership_history_is_hash_linked_and_newest_first() {
        let storage = InMemoryGiftStorage::new();
        let id = CelebrationId::new("c-1");
        let first = storage
            .append_leadership(append(&id, "b", Utc::now()))
            .await
            .unwrap();
        let second = storage
            .append_leadership(append(&id, "c", Utc::now() + Duration::seconds(1)))
            .await
            .unwrap();

        assert_eq!(second.previous_hash, Some(first.hash.clone()));
        assert_eq!(second.sequence, 2);

        let listed = storage
            .list_leadership(&id, QueryWindow::default())
            .await
            .unwrap();
        assert_eq!(listed[0].entry_id, second.entry_id);
        assert_eq!(listed[1].entry_id, first.entry_id);
    }

    #[tokio::test]
    async fn terminal_celebrations_refuse_transitions() {
        let storage = InMemoryGiftStorage::new();
        let record = celebration();
        let id = record.celebration_id.clone();
        storage.create_celebration(record).await.unwrap();

        storage
            .transition_status(&id, CelebrationStatus::Cancelled, Utc::now())
            .await
            .unwrap();
        let result = storage
            .transition_status(&id, CelebrationStatus::Active, Utc::now())
            .await;
        assert!(matches!(result, Err(StorageError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn second_claim_on_item_conflicts() {
        let storage = InMemoryGiftStorage::new();
        let item = ItemId::new("item-1");
        storage
            .insert_claim(ItemClaim::full(item.clone(), MemberId::new("a"), Utc::now()))
            .await
            .unwrap();

        let result = storage
            .insert_claim(ItemClaim::split(item, MemberId::new("b"), 5_000, Utc::now()))
            .await;
        assert!(result.is_err_and(|err| err.is_conflict()));
    }

    #[tokio::test]
    async fn concurrent_inserts_have_one_winner() {
        let storage = Arc::new(InMemoryGiftStorage::new());
        let item = ItemId::new("item-race");

        let attempts = (0..16).map(|n| {
            let storage = Arc::clone(&storage);
            let item = item.clone();
            tokio::spawn(async move {
                storage
                    .insert_claim(ItemClaim::full(
                        item,
                        MemberId::new(format!("m-{n}")),
                        Utc::now(),
                    ))
                    .await
            })
        });
        let results = futures::future::join_all(attempts).await;

        let winners = results
            .iter()
            .filter(|joined| matches!(joined, Ok(Ok(()))))
            .count();
        let conflicts = results
            .iter()
            .filter(|joined| matches!(joined, Ok(Err(StorageError::Conflict(_)))))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 15);
    }

    #[tokio::test]
    async fn release_checks_claimant_and_kind() {
        let storage = InMemoryGiftStorage::new();
        let full = ItemClaim::full(ItemId::new("item-1"), MemberId::new("a"), Utc::now());
        let split = ItemClaim::split(ItemId::new("item-2"), MemberId::new("a"), 100, Utc::now());
        storage.insert_claim(full.clone()).await.unwrap();
        storage.insert_claim(split.clone()).await.unwrap();

        assert_eq!(
            storage
                .release_full_claim(&full.claim_id, &MemberId::new("b"))
                .await
                .unwrap(),
            ReleaseOutcome::NotClaimant {
                claimant_id: MemberId::new("a")
            }
        );
        assert_eq!(
            storage
                .release_full_claim(&split.claim_id, &MemberId::new("a"))
                .await
                .unwrap(),
            ReleaseOutcome::NotFound
        );
        assert!(matches!(
            storage
                .release_full_claim(&full.claim_id, &MemberId::new("a"))
                .await
                .unwrap(),
            ReleaseOutcome::Released(_)
        ));
        assert!(storage
            .claim_for_item(&ItemId::new("item-1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn rejected_pledge_leaves_rows_untouched() {
        let storage = InMemoryGiftStorage::new();
        let item = ItemId::new("item-1");
        storage
            .insert_claim(ItemClaim::split(item.clone(), MemberId::new("a"), 1_000, Utc::now()))
            .await
            .unwrap();

        let outcome = storage
            .apply_pledge(&item, &MemberId::new("b"), PledgeRequest::Amount(1_001), Utc::now())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            PledgeOutcome::Rejected(PledgeRejection::ExceedsRemaining {
                remaining_minor: 1_000
            })
        );
        assert!(storage.list_pledges(&item).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_pledges_never_overshoot_target() {
        let storage = Arc::new(InMemoryGiftStorage::new());
        let item = ItemId::new("item-race");
        storage
            .insert_claim(ItemClaim::split(item.clone(), MemberId::new("opener"), 1_000, Utc::now()))
            .await
            .unwrap();

        let attempts = (0..10).map(|n| {
            let storage = Arc::clone(&storage);
            let item = item.clone();
            tokio::spawn(async move {
                storage
                    .apply_pledge(
                        &item,
                        &MemberId::new(format!("m-{n}")),
                        PledgeRequest::Amount(300),
                        Utc::now(),
                    )
                    .await
            })
        });
        futures::future::join_all(attempts).await;

        let total: i64 = storage
            .list_pledges(&item)
            .await
            .unwrap()
            .iter()
            .map(|pledge| pledge.amount_minor)
            .sum();
        assert_eq!(total, 900);
    }

    #[tokio::test]
    async fn overflowing_contribution_is_not_written() {
        let storage = InMemoryGiftStorage::new();
        let id = CelebrationId::new("c-1");
        let row = |who: &str, amount_minor: i64| Contribution {
            celebration_id: id.clone(),
            contributor_id: MemberId::new(who),
            amount_minor,
            updated_at: Utc::now(),
        };

        storage.upsert_contribution(row("b", i64::MAX)).await.unwrap();
        let result = storage.upsert_contribution(row("c", 1)).await;
        assert!(matches!(result, Err(StorageError::InvalidInput(_))));

        // replacing b's own row does not count the old amount
        storage.upsert_contribution(row("b", i64::MAX - 1)).await.unwrap();
        storage.upsert_contribution(row("c", 1)).await.unwrap();

        let rows = storage.list_contributions(&id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].amount_minor, i64::MAX - 1);
    }
}
