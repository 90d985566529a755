use crate::ids::{ClaimId, ItemId, MemberId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of reservation held on an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    /// Exclusive reservation by a single claimant.
    Full,
    /// Crowd-funded reservation with a frozen target.
    Split,
}

impl ClaimKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Split => "split",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "full" => Some(Self::Full),
            "split" => Some(Self::Split),
            _ => None,
        }
    }
}

/// The single active claim on an item. Storage allows at most one per item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemClaim {
    pub claim_id: ClaimId,
    pub item_id: ItemId,
    /// Full claimant, or the member who opened the split.
    pub claimant_id: MemberId,
    pub kind: ClaimKind,
    /// Frozen at open time for splits; `None` for full claims.
    pub target_minor: Option<i64>,
    pub funded: bool,
    pub created_at: DateTime<Utc>,
    pub funded_at: Option<DateTime<Utc>>,
}

impl ItemClaim {
    pub fn full(item_id: ItemId, claimant_id: MemberId, now: DateTime<Utc>) -> Self {
        Self {
            claim_id: ClaimId::generate(),
            item_id,
            claimant_id,
            kind: ClaimKind::Full,
            target_minor: None,
            funded: false,
            created_at: now,
            funded_at: None,
        }
    }

    pub fn split(
        item_id: ItemId,
        opened_by: MemberId,
        target_minor: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            claim_id: ClaimId::generate(),
            item_id,
            claimant_id: opened_by,
            kind: ClaimKind::Split,
            target_minor: Some(target_minor),
            funded: false,
            created_at: now,
            funded_at: None,
        }
    }

    pub fn state(&self) -> ItemClaimState {
        match (self.kind, self.funded) {
            (ClaimKind::Full, _) => ItemClaimState::FullClaimed,
            (ClaimKind::Split, false) => ItemClaimState::SplitOpen,
            (ClaimKind::Split, true) => ItemClaimState::SplitFunded,
        }
    }
}

/// Per-item claim state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemClaimState {
    Unclaimed,
    FullClaimed,
    SplitOpen,
    SplitFunded,
}

impl ItemClaimState {
    pub fn of(claim: Option<&ItemClaim>) -> Self {
        claim.map_or(Self::Unclaimed, ItemClaim::state)
    }
}

/// One contributor's share within a split. At most one row per (item, contributor).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPledge {
    pub item_id: ItemId,
    pub contributor_id: MemberId,
    pub amount_minor: i64,
    pub pledged_at: DateTime<Utc>,
}

/// Funding projection of a split claim, recomputed from pledge rows on every read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStatus {
    pub item_id: ItemId,
    pub claim_id: Option<ClaimId>,
    pub opened_by: Option<MemberId>,
    pub target_minor: i64,
    pub pledged_minor: i64,
    pub remaining_minor: i64,
    pub contributor_count: usize,
    pub fully_funded: bool,
    pub pledges: Vec<SplitPledge>,
    /// Set when the viewer owns the item; opener and contributors are hidden.
    #[serde(default)]
    pub identities_redacted: bool,
}

impl SplitStatus {
    /// Project a split claim and its pledge rows. Returns `None` for full claims.
    pub fn project(claim: &ItemClaim, pledges: &[SplitPledge]) -> Option<Self> {
        if claim.kind != ClaimKind::Split {
            return None;
        }
        let target_minor = claim.target_minor.unwrap_or_default();
        let pledged_minor: i64 = pledges.iter().map(|pledge| pledge.amount_minor).sum();

        let mut pledges = pledges.to_vec();
        pledges.sort_by(|a, b| {
            a.pledged_at
                .cmp(&b.pledged_at)
                .then_with(|| a.contributor_id.cmp(&b.contributor_id))
        });

        Some(Self {
            item_id: claim.item_id.clone(),
            claim_id: Some(claim.claim_id.clone()),
            opened_by: Some(claim.claimant_id.clone()),
            target_minor,
            pledged_minor,
            remaining_minor: (target_minor - pledged_minor).max(0),
            contributor_count: pledges.len(),
            fully_funded: claim.funded,
            pledges,
            identities_redacted: false,
        })
    }

    /// Hide who opened and who funds the split. Totals stay visible.
    pub fn redact_identities(&mut self) {
        self.claim_id = None;
        self.opened_by = None;
        self.pledges.clear();
        self.identities_redacted = true;
    }

    /// "If one more person joins, this is an equal share", never above the remaining gap.
    pub fn suggested_share_minor(&self) -> i64 {
        let divisor = self.contributor_count as i64 + 1;
        (self.target_minor / divisor).min(self.remaining_minor)
    }

    pub fn pledge_of(&self, member: &MemberId) -> Option<&SplitPledge> {
        self.pledges
            .iter()
            .find(|pledge| &pledge.contributor_id == member)
    }
}

/// Count of items per claim state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSummary {
    pub unclaimed: usize,
    pub full_claimed: usize,
    pub split_open: usize,
    pub split_funded: usize,
}

impl ClaimSummary {
    pub fn record(&mut self, state: ItemClaimState) {
        match state {
            ItemClaimState::Unclaimed => self.unclaimed += 1,
            ItemClaimState::FullClaimed => self.full_claimed += 1,
            ItemClaimState::SplitOpen => self.split_open += 1,
            ItemClaimState::SplitFunded => self.split_funded += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.unclaimed + self.full_claimed + self.split_open + self.split_funded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pledge(item: &ItemId, who: &str, amount_minor: i64) -> SplitPledge {
        SplitPledge {
            item_id: item.clone(),
            contributor_id: MemberId::new(who),
            amount_minor,
            pledged_at: Utc::now(),
        }
    }

    #[test]
    fn split_projection_sums_distinct_rows() {
        let item = ItemId::new("item-1");
        let claim = ItemClaim::split(item.clone(), MemberId::new("a"), 11_000, Utc::now());
        let status =
            SplitStatus::project(&claim, &[pledge(&item, "a", 4_000), pledge(&item, "b", 2_000)])
                .unwrap();

        assert_eq!(status.pledged_minor, 6_000);
        assert_eq!(status.remaining_minor, 5_000);
        assert_eq!(status.contributor_count, 2);
        assert!(!status.fully_funded);
    }

    #[test]
    fn redaction_keeps_totals() {
        let item = ItemId::new("item-1");
        let claim = ItemClaim::split(item.clone(), MemberId::new("b"), 10_000, Utc::now());
        let mut status = SplitStatus::project(&claim, &[pledge(&item, "c", 4_000)]).unwrap();
        let share = status.suggested_share_minor();

        status.redact_identities();
        assert!(status.identities_redacted);
        assert_eq!(status.opened_by, None);
        assert_eq!(status.claim_id, None);
        assert!(status.pledges.is_empty());
        assert_eq!(status.pledged_minor, 4_000);
        assert_eq!(status.contributor_count, 1);
        assert_eq!(status.suggested_share_minor(), share);
    }

    #[test]
    fn suggested_share_is_clamped_to_remaining() {
        let item = ItemId::new("item-1");
        let claim = ItemClaim::split(item.clone(), MemberId::new("a"), 10_000, Utc::now());

        let empty = SplitStatus::project(&claim, &[]).unwrap();
        assert_eq!(empty.suggested_share_minor(), 10_000);

        let one = SplitStatus::project(&claim, &[pledge(&item, "a", 9_000)]).unwrap();
        assert_eq!(one.suggested_share_minor(), 1_000);

        let two = SplitStatus::project(&claim, &[pledge(&item, "a", 1_000), pledge(&item, "b", 1_000)])
            .unwrap();
        assert_eq!(two.suggested_share_minor(), 3_333);
    }

    #[test]
    fn full_claims_have_no_split_projection() {
        let claim = ItemClaim::full(ItemId::new("item-1"), MemberId::new("a"), Utc::now());
        assert!(SplitStatus::project(&claim, &[]).is_none());
        assert_eq!(ItemClaimState::of(Some(&claim)), ItemClaimState::FullClaimed);
        assert_eq!(ItemClaimState::of(None), ItemClaimState::Unclaimed);
    }
}
