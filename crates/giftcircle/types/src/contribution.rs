use crate::ids::{CelebrationId, MemberId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form contribution toward a celebration. One row per (celebration, contributor).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub celebration_id: CelebrationId,
    pub contributor_id: MemberId,
    pub amount_minor: i64,
    pub updated_at: DateTime<Utc>,
}

/// Celebration funding projection, recomputed from contribution rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContributionTotal {
    pub celebration_id: CelebrationId,
    pub total_minor: i64,
    pub target_minor: Option<i64>,
    /// `total / target` clamped to `[0, 1]`; absent without a target.
    pub progress: Option<f64>,
    pub complete: bool,
    pub contributor_count: usize,
    pub contributions: Vec<Contribution>,
}

/// Sum of contribution amounts, `None` when it does not fit in `i64`.
pub fn checked_total(amounts: impl IntoIterator<Item = i64>) -> Option<i64> {
    amounts
        .into_iter()
        .try_fold(0i64, |total, amount| total.checked_add(amount))
}

impl ContributionTotal {
    /// Project the rows of one celebration. Returns `None` if the total overflows.
    pub fn project(
        celebration_id: CelebrationId,
        target_minor: Option<i64>,
        rows: &[Contribution],
    ) -> Option<Self> {
        let total_minor = checked_total(rows.iter().map(|row| row.amount_minor))?;
        let target = target_minor.filter(|target| *target > 0);
        let progress = target.map(|target| (total_minor as f64 / target as f64).clamp(0.0, 1.0));
        let complete = target.is_some_and(|target| total_minor >= target);

        let mut contributions = rows.to_vec();
        contributions.sort_by(|a, b| a.contributor_id.cmp(&b.contributor_id));

        Some(Self {
            celebration_id,
            total_minor,
            target_minor,
            progress,
            complete,
            contributor_count: contributions.len(),
            contributions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(who: &str, amount_minor: i64) -> Contribution {
        Contribution {
            celebration_id: CelebrationId::new("c-1"),
            contributor_id: MemberId::new(who),
            amount_minor,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn progress_is_clamped_and_complete_at_target() {
        let id = CelebrationId::new("c-1");
        let half = ContributionTotal::project(id.clone(), Some(10_000), &[row("a", 5_000)]).unwrap();
        assert_eq!(half.progress, Some(0.5));
        assert!(!half.complete);

        let over = ContributionTotal::project(
            id,
            Some(10_000),
            &[row("a", 8_000), row("b", 4_000)],
        )
        .unwrap();
        assert_eq!(over.total_minor, 12_000);
        assert_eq!(over.progress, Some(1.0));
        assert!(over.complete);
    }

    #[test]
    fn no_target_means_no_progress() {
        let total = ContributionTotal::project(CelebrationId::new("c-1"), None, &[row("a", 500)]).unwrap();
        assert_eq!(total.progress, None);
        assert!(!total.complete);
        assert_eq!(total.contributor_count, 1);
    }

    #[test]
    fn overflowing_total_is_not_projected() {
        let rows = [row("a", i64::MAX), row("b", 1)];
        assert!(ContributionTotal::project(CelebrationId::new("c-1"), None, &rows).is_none());
        assert_eq!(checked_total([i64::MAX, -1]), Some(i64::MAX - 1));
    }
}
