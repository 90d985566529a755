//! Gift Circle data model.
//!
//! Shared by the rotation planner, the storage backends and the core ledgers:
//! - identifiers for members, groups, celebrations, items and claims
//! - celebrations and their append-only leadership history
//! - item claims (full or split) and split pledges
//! - free-form celebration contributions
//! - change events emitted to presentation layers
//!
//! Monetary values are integer minor units (cents) in fields suffixed `_minor`.
//! Aggregates such as [`SplitStatus`] and [`ContributionTotal`] are projections
//! recomputed from ledger rows; nothing here caches a derived counter.

#![deny(unsafe_code)]

mod celebration;
mod claim;
mod contribution;
mod event;
mod ids;
mod member;

pub use celebration::{
    Celebration, CelebrationStatus, LeadershipAppend, LeadershipHistoryEntry, LeadershipReason,
    LeadershipRecord, NewCelebration,
};
pub use claim::{ClaimKind, ClaimSummary, ItemClaim, ItemClaimState, SplitPledge, SplitStatus};
pub use contribution::{checked_total, Contribution, ContributionTotal};
pub use event::GiftEvent;
pub use ids::{CelebrationId, ClaimId, GroupId, ItemId, MemberId};
pub use member::{GroupMember, ItemListing};
