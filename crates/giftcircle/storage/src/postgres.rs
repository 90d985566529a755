//! PostgreSQL adapter for Gift Circle storage.
//!
//! Claim exclusivity comes from the `item_id` primary key on
//! `gift_item_claims`. Pledges and history appends run in transactions that
//! lock the parent row (`SELECT ... FOR UPDATE`) before reading the rows they
//! validate against.

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
    Contribution, GroupId, ItemClaim, ItemId, LeadershipAppend, LeadershipHistoryEntry,
    LeadershipReason, MemberId, SplitPledge,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

/// PostgreSQL-backed storage adapter.
#[derive(Clone)]
pub struct PostgresGiftStorage {
    pool: PgPool,
}

impl PostgresGiftStorage {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS gift_celebrations (
                celebration_id TEXT PRIMARY KEY,
                group_id TEXT NOT NULL,
                celebrant_id TEXT NOT NULL,
                title TEXT NOT NULL,
                event_date DATE,
                leader_id TEXT,
                target_minor BIGINT,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS gift_leadership_history (
                entry_id TEXT PRIMARY KEY,
                celebration_id TEXT NOT NULL,
                sequence BIGINT NOT NULL,
                assigned_to TEXT NOT NULL,
                previous_leader TEXT,
                assigned_by TEXT,
                reason TEXT NOT NULL,
                assigned_at TIMESTAMPTZ NOT NULL,
                previous_hash TEXT,
                hash TEXT NOT NULL,
                UNIQUE (celebration_id, sequence)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS gift_item_claims (
                item_id TEXT PRIMARY KEY,
                claim_id TEXT NOT NULL UNIQUE,
                claimant_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                target_minor BIGINT,
                funded BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL,
                funded_at TIMESTAMPTZ
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS gift_split_pledges (
                item_id TEXT NOT NULL REFERENCES gift_item_claims (item_id) ON DELETE CASCADE,
                contributor_id TEXT NOT NULL,
                amount_minor BIGINT NOT NULL CHECK (amount_minor > 0),
                pledged_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (item_id, contributor_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS gift_contributions (
                celebration_id TEXT NOT NULL,
                contributor_id TEXT NOT NULL,
                amount_minor BIGINT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (celebration_id, contributor_id)
            )
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

impl GiftStorage for PostgresGiftStorage {
    fn backend_label(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl CelebrationStore for PostgresGiftStorage {
    async fn create_celebration(&self, celebration: Celebration) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gift_celebrations
                (celebration_id, group_id, celebrant_id, title, event_date, leader_id, target_minor, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(celebration.celebration_id.0.clone())
        .bind(celebration.group_id.0.clone())
        .bind(celebration.celebrant_id.0.clone())
        .bind(celebration.title.clone())
        .bind(celebration.event_date)
        .bind(celebration.leader_id.as_ref().map(|id| id.0.clone()))
        .bind(celebration.target_minor)
        .bind(celebration.status.as_str())
        .bind(celebration.created_at)
        .bind(celebration.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_celebration(&self, id: &CelebrationId) -> StorageResult<Option<Celebration>> {
        let row = sqlx::query("SELECT * FROM gift_celebrations WHERE celebration_id = $1")
            .bind(id.0.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(row_to_celebration).transpose()
    }

    async fn set_leader(
        &self,
        id: &CelebrationId,
        leader: &MemberId,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<Celebration> {
        let row = sqlx::query(
            r#"
            UPDATE gift_celebrations
               SET leader_id = $1,
                   updated_at = $2
             WHERE celebration_id = $3
            RETURNING *
            "#,
        )
        .bind(leader.0.clone())
        .bind(updated_at)
        .bind(id.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        match row {
            Some(row) => row_to_celebration(row),
            None => Err(StorageError::NotFound(format!("celebration {} not found", id))),
        }
    }

    async fn transition_status(
        &self,
        id: &CelebrationId,
        to: CelebrationStatus,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<Celebration> {
        let row = sqlx::query(
            r#"
            UPDATE gift_celebrations
               SET status = $1,
                   updated_at = $2
             WHERE celebration_id = $3
               AND status NOT IN ('completed', 'cancelled')
            RETURNING *
            "#,
        )
        .bind(to.as_str())
        .bind(updated_at)
        .bind(id.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if let Some(row) = row {
            return row_to_celebration(row);
        }

        match self.get_celebration(id).await? {
            Some(existing) => Err(StorageError::InvariantViolation(format!(
                "celebration {} is already {}",
                id, existing.status
            ))),
            None => Err(StorageError::NotFound(format!("celebration {} not found", id))),
        }
    }
}

#[async_trait]
impl LeadershipHistoryStore for PostgresGiftStorage {
    async fn append_leadership(
        &self,
        entry: LeadershipAppend,
    ) -> StorageResult<LeadershipHistoryEntry> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        // Serializes appends per celebration so sequences stay gapless.
        sqlx::query("SELECT celebration_id FROM gift_celebrations WHERE celebration_id = $1 FOR UPDATE")
            .bind(entry.celebration_id.0.clone())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let last = sqlx::query(
            r#"
            SELECT sequence, hash
              FROM gift_leadership_history
             WHERE celebration_id = $1
             ORDER BY sequence DESC
             LIMIT 1
            "#,
        )
        .bind(entry.celebration_id.0.clone())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        let (sequence, previous_hash) = if let Some(row) = last {
            let seq: i64 = row
                .try_get("sequence")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            let prev: String = row
                .try_get("hash")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            (seq + 1, Some(prev))
        } else {
            (1_i64, None)
        };

        let hash = compute_leadership_hash(&entry, sequence as u64, previous_hash.as_deref())?;
        let entry_id = format!("leadership-{}", Uuid::new_v4());

        sqlx::query(
            r#"
            INSERT INTO gift_leadership_history
                (entry_id, celebration_id, sequence, assigned_to, previous_leader, assigned_by, reason, assigned_at, previous_hash, hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry_id.clone())
        .bind(entry.celebration_id.0.clone())
        .bind(sequence)
        .bind(entry.assigned_to.0.clone())
        .bind(entry.previous_leader.as_ref().map(|id| id.0.clone()))
        .bind(entry.assigned_by.as_ref().map(|id| id.0.clone()))
        .bind(entry.reason.as_str())
        .bind(entry.assigned_at)
        .bind(previous_hash.clone())
        .bind(hash.clone())
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_conflict)?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(LeadershipHistoryEntry {
            entry_id,
            celebration_id: entry.celebration_id,
            sequence: sequence as u64,
            assigned_to: entry.assigned_to,
            previous_leader: entry.previous_leader,
            assigned_by: entry.assigned_by,
            reason: entry.reason,
            assigned_at: entry.assigned_at,
            previous_hash,
            hash,
        })
    }

    async fn list_leadership(
        &self,
        id: &CelebrationId,
        window: QueryWindow,
    ) -> StorageResult<Vec<LeadershipHistoryEntry>> {
        let limit = if window.limit == 0 {
            i64::MAX
        } else {
            to_i64(window.limit)?
        };
        let rows = sqlx::query(
            r#"
            SELECT *
              FROM gift_leadership_history
             WHERE celebration_id = $1
             ORDER BY sequence DESC
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(id.0.clone())
        .bind(limit)
        .bind(to_i64(window.offset)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(row_to_leadership).collect()
    }
}

#[async_trait]
impl ClaimStore for PostgresGiftStorage {
    async fn insert_claim(&self, claim: ItemClaim) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO gift_item_claims
                (item_id, claim_id, claimant_id, kind, target_minor, funded, created_at, funded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(claim.item_id.0.clone())
        .bind(claim.claim_id.0.clone())
        .bind(claim.claimant_id.0.clone())
        .bind(claim.kind.as_str())
        .bind(claim.target_minor)
        .bind(claim.funded)
        .bind(claim.created_at)
        .bind(claim.funded_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(())
    }

    async fn get_claim(&self, claim_id: &ClaimId) -> StorageResult<Option<ItemClaim>> {
        let row = sqlx::query("SELECT * FROM gift_item_claims WHERE claim_id = $1")
            .bind(claim_id.0.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(row_to_claim).transpose()
    }

    async fn claim_for_item(&self, item_id: &ItemId) -> StorageResult<Option<ItemClaim>> {
        let row = sqlx::query("SELECT * FROM gift_item_claims WHERE item_id = $1")
            .bind(item_id.0.clone())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(row_to_claim).transpose()
    }

    async fn release_full_claim(
        &self,
        claim_id: &ClaimId,
        claimant: &MemberId,
    ) -> StorageResult<ReleaseOutcome> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM gift_item_claims
             WHERE claim_id = $1
               AND kind = 'full'
               AND claimant_id = $2
            RETURNING *
            "#,
        )
        .bind(claim_id.0.clone())
        .bind(claimant.0.clone())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if let Some(row) = deleted {
            return Ok(ReleaseOutcome::Released(row_to_claim(row)?));
        }

        match self.get_claim(claim_id).await? {
            Some(existing) if existing.kind == ClaimKind::Full => Ok(ReleaseOutcome::NotClaimant {
                claimant_id: existing.claimant_id,
            }),
            _ => Ok(ReleaseOutcome::NotFound),
        }
    }
}

#[async_trait]
impl PledgeStore for PostgresGiftStorage {
    async fn list_pledges(&self, item_id: &ItemId) -> StorageResult<Vec<SplitPledge>> {
        let rows = sqlx::query(
            "SELECT * FROM gift_split_pledges WHERE item_id = $1 ORDER BY contributor_id ASC",
        )
        .bind(item_id.0.clone())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter().map(row_to_pledge).collect()
    }

    async fn apply_pledge(
        &self,
        item_id: &ItemId,
        contributor: &MemberId,
        request: PledgeRequest,
        pledged_at: DateTime<Utc>,
    ) -> StorageResult<PledgeOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let claim = sqlx::query("SELECT * FROM gift_item_claims WHERE item_id = $1 FOR UPDATE")
            .bind(item_id.0.clone())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .map(row_to_claim)
            .transpose()?;

        let current = sqlx::query(
            "SELECT * FROM gift_split_pledges WHERE item_id = $1 ORDER BY contributor_id ASC",
        )
        .bind(item_id.0.clone())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?
        .into_iter()
        .map(row_to_pledge)
        .collect::<StorageResult<Vec<_>>>()?;

        let settlement = match settle_pledge(claim.as_ref(), &current, contributor, request) {
            Ok(settlement) => settlement,
            Err(rejection) => {
                tx.rollback()
                    .await
                    .map_err(|e| StorageError::Backend(e.to_string()))?;
                debug!(item_id = %item_id, ?rejection, "pledge rejected");
                return Ok(PledgeOutcome::Rejected(rejection));
            }
        };

        sqlx::query(
            r#"
            INSERT INTO gift_split_pledges (item_id, contributor_id, amount_minor, pledged_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (item_id, contributor_id)
            DO UPDATE SET amount_minor = EXCLUDED.amount_minor,
                          pledged_at = EXCLUDED.pledged_at
            "#,
        )
        .bind(item_id.0.clone())
        .bind(contributor.0.clone())
        .bind(settlement.amount_minor)
        .bind(pledged_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        let claim_row = if settlement.funded {
            sqlx::query(
                r#"
                UPDATE gift_item_claims
                   SET funded = TRUE,
                       funded_at = $1
                 WHERE item_id = $2
                RETURNING *
                "#,
            )
            .bind(pledged_at)
            .bind(item_id.0.clone())
            .fetch_one(&mut *tx)
            .await
        } else {
            sqlx::query("SELECT * FROM gift_item_claims WHERE item_id = $1")
                .bind(item_id.0.clone())
                .fetch_one(&mut *tx)
                .await
        }
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        let claim = row_to_claim(claim_row)?;

        let pledges = sqlx::query(
            "SELECT * FROM gift_split_pledges WHERE item_id = $1 ORDER BY contributor_id ASC",
        )
        .bind(item_id.0.clone())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?
        .into_iter()
        .map(row_to_pledge)
        .collect::<StorageResult<Vec<_>>>()?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(PledgeOutcome::Applied(PledgeReceipt {
            claim,
            pledge: SplitPledge {
                item_id: item_id.clone(),
                contributor_id: contributor.clone(),
                amount_minor: settlement.amount_minor,
                pledged_at,
            },
            pledges,
            newly_funded: settlement.funded,
        }))
    }
}

#[async_trait]
impl ContributionStore for PostgresGiftStorage {
    async fn upsert_contribution(&self, contribution: Contribution) -> StorageResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        // Serializes upserts per celebration so the overflow check sees every row.
        sqlx::query("SELECT celebration_id FROM gift_celebrations WHERE celebration_id = $1 FOR UPDATE")
            .bind(contribution.celebration_id.0.clone())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let others: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT amount_minor
              FROM gift_contributions
             WHERE celebration_id = $1 AND contributor_id <> $2
            "#,
        )
        .bind(contribution.celebration_id.0.clone())
        .bind(contribution.contributor_id.0.clone())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if checked_total(others.into_iter().chain(std::iter::once(contribution.amount_minor)))
            .is_none()
        {
            debug!(celebration = %contribution.celebration_id, "contribution rejected: total overflow");
            tx.rollback()
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            return Err(StorageError::InvalidInput(format!(
                "contribution total for celebration {} would overflow",
                contribution.celebration_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO gift_contributions (celebration_id, contributor_id, amount_minor, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (celebration_id, contributor_id)
            DO UPDATE SET amount_minor = EXCLUDED.amount_minor,
                          updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(contribution.celebration_id.0.clone())
        .bind(contribution.contributor_id.0.clone())
        .bind(contribution.amount_minor)
        .bind(contribution.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn list_contributions(&self, id: &CelebrationId) -> StorageResult<Vec<Contribution>> {
        let rows = sqlx::query(
            r#"
            SELECT *
              FROM gift_contributions
             WHERE celebration_id = $1
             ORDER BY contributor_id ASC
            "#,
        )
        .bind(id.0.clone())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                Ok(Contribution {
                    celebration_id: CelebrationId::new(get_string(&row, "celebration_id")?),
                    contributor_id: MemberId::new(get_string(&row, "contributor_id")?),
                    amount_minor: row
                        .try_get("amount_minor")
                        .map_err(|e| StorageError::Backend(e.to_string()))?,
                    updated_at: row
                        .try_get("updated_at")
                        .map_err(|e| StorageError::Backend(e.to_string()))?,
                })
            })
            .collect()
    }
}

fn row_to_celebration(row: PgRow) -> StorageResult<Celebration> {
    let status_raw = get_string(&row, "status")?;
    let status = CelebrationStatus::parse(&status_raw).ok_or_else(|| {
        StorageError::Serialization(format!("unknown celebration status `{status_raw}`"))
    })?;
    let leader_id: Option<String> = row
        .try_get("leader_id")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    Ok(Celebration {
        celebration_id: CelebrationId::new(get_string(&row, "celebration_id")?),
        group_id: GroupId::new(get_string(&row, "group_id")?),
        celebrant_id: MemberId::new(get_string(&row, "celebrant_id")?),
        title: get_string(&row, "title")?,
        event_date: row
            .try_get("event_date")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        leader_id: leader_id.map(MemberId::new),
        target_minor: row
            .try_get("target_minor")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        status,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn row_to_leadership(row: PgRow) -> StorageResult<LeadershipHistoryEntry> {
    let reason_raw = get_string(&row, "reason")?;
    let reason = LeadershipReason::parse(&reason_raw).ok_or_else(|| {
        StorageError::Serialization(format!("unknown leadership reason `{reason_raw}`"))
    })?;
    let sequence: i64 = row
        .try_get("sequence")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let previous_leader: Option<String> = row
        .try_get("previous_leader")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let assigned_by: Option<String> = row
        .try_get("assigned_by")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    Ok(LeadershipHistoryEntry {
        entry_id: get_string(&row, "entry_id")?,
        celebration_id: CelebrationId::new(get_string(&row, "celebration_id")?),
        sequence: sequence as u64,
        assigned_to: MemberId::new(get_string(&row, "assigned_to")?),
        previous_leader: previous_leader.map(MemberId::new),
        assigned_by: assigned_by.map(MemberId::new),
        reason,
        assigned_at: row
            .try_get("assigned_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        previous_hash: row
            .try_get("previous_hash")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        hash: get_string(&row, "hash")?,
    })
}

fn row_to_claim(row: PgRow) -> StorageResult<ItemClaim> {
    let kind_raw = get_string(&row, "kind")?;
    let kind = ClaimKind::parse(&kind_raw)
        .ok_or_else(|| StorageError::Serialization(format!("unknown claim kind `{kind_raw}`")))?;

    Ok(ItemClaim {
        claim_id: ClaimId::new(get_string(&row, "claim_id")?),
        item_id: ItemId::new(get_string(&row, "item_id")?),
        claimant_id: MemberId::new(get_string(&row, "claimant_id")?),
        kind,
        target_minor: row
            .try_get("target_minor")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        funded: row
            .try_get("funded")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        funded_at: row
            .try_get("funded_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn row_to_pledge(row: PgRow) -> StorageResult<SplitPledge> {
    Ok(SplitPledge {
        item_id: ItemId::new(get_string(&row, "item_id")?),
        contributor_id: MemberId::new(get_string(&row, "contributor_id")?),
        amount_minor: row
            .try_get("amount_minor")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        pledged_at: row
            .try_get("pledged_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn get_string(row: &PgRow, column: &str) -> StorageResult<String> {
    row.try_get(column)
        .map_err(|e| StorageError::Backend(e.to_string()))
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StorageError::Conflict(db_err.message().to_string());
        }
    }
    StorageError::Backend(err.to_string())
}

fn to_i64(value: usize) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidInput("window value too large".to_string()))
}
