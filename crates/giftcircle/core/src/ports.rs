//! Collaborator interfaces consumed by the gift ledgers.
//!
//! Membership, item catalog and event emission live outside this crate.
//! Services receive them as trait objects so hosts can plug in their own
//! directory or catalog.

use crate::GiftResult;
use async_trait::async_trait;
use giftcircle_types::{GiftEvent, GroupId, GroupMember, ItemId, ItemListing, MemberId};

/// Group membership and role lookup.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Current roster of a group. Unknown groups yield an empty roster.
    async fn roster(&self, group: &GroupId) -> GiftResult<Vec<GroupMember>>;

    async fn is_member(&self, group: &GroupId, member: &MemberId) -> GiftResult<bool>;

    /// Whether `member` holds admin capability over `group`.
    async fn is_admin(&self, group: &GroupId, member: &MemberId) -> GiftResult<bool>;
}

/// Item ownership and price lookup.
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn listing(&self, item: &ItemId) -> GiftResult<Option<ItemListing>>;
}

/// Fire-and-forget change notification.
///
/// Called after the primary write has committed. Failures are logged by the
/// caller and never surfaced.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: GiftEvent) -> GiftResult<()>;
}
