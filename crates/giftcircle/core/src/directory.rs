//! In-memory membership directory and item catalog.
//!
//! Used by tests and by `giftd` when it seeds fixtures from configuration.

use crate::ports::{ItemCatalog, MembershipDirectory};
use crate::{GiftError, GiftResult};
use async_trait::async_trait;
use giftcircle_types::{GroupId, GroupMember, ItemId, ItemListing, MemberId};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct GroupRoster {
    members: Vec<GroupMember>,
    admins: HashSet<MemberId>,
}

/// Membership directory backed by process memory.
#[derive(Default)]
pub struct InMemoryDirectory {
    groups: RwLock<HashMap<GroupId, GroupRoster>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a member of `group`.
    pub fn upsert_member(&self, group: &GroupId, member: GroupMember) -> GiftResult<()> {
        let mut guard = self
            .groups
            .write()
            .map_err(|_| GiftError::Collaborator("directory lock poisoned".to_string()))?;
        let roster = guard.entry(group.clone()).or_default();
        match roster.members.iter_mut().find(|m| m.id == member.id) {
            Some(existing) => *existing = member,
            None => roster.members.push(member),
        }
        Ok(())
    }

    /// Grant admin capability. The member must already belong to the group.
    pub fn grant_admin(&self, group: &GroupId, member: &MemberId) -> GiftResult<()> {
        let mut guard = self
            .groups
            .write()
            .map_err(|_| GiftError::Collaborator("directory lock poisoned".to_string()))?;
        let roster = guard
            .get_mut(group)
            .ok_or_else(|| GiftError::not_found(format!("group {group}")))?;
        if !roster.members.iter().any(|m| &m.id == member) {
            return Err(GiftError::not_found(format!("member {member} in group {group}")));
        }
        roster.admins.insert(member.clone());
        debug!(group = %group, member = %member, "admin granted");
        Ok(())
    }

    pub fn remove_member(&self, group: &GroupId, member: &MemberId) -> GiftResult<bool> {
        let mut guard = self
            .groups
            .write()
            .map_err(|_| GiftError::Collaborator("directory lock poisoned".to_string()))?;
        let Some(roster) = guard.get_mut(group) else {
            return Ok(false);
        };
        roster.admins.remove(member);
        let before = roster.members.len();
        roster.members.retain(|m| &m.id != member);
        Ok(roster.members.len() != before)
    }
}

#[async_trait]
impl MembershipDirectory for InMemoryDirectory {
    async fn roster(&self, group: &GroupId) -> GiftResult<Vec<GroupMember>> {
        let guard = self
            .groups
            .read()
            .map_err(|_| GiftError::Collaborator("directory lock poisoned".to_string()))?;
        Ok(guard
            .get(group)
            .map(|roster| roster.members.clone())
            .unwrap_or_default())
    }

    async fn is_member(&self, group: &GroupId, member: &MemberId) -> GiftResult<bool> {
        let guard = self
            .groups
            .read()
            .map_err(|_| GiftError::Collaborator("directory lock poisoned".to_string()))?;
        Ok(guard
            .get(group)
            .is_some_and(|roster| roster.members.iter().any(|m| &m.id == member)))
    }

    async fn is_admin(&self, group: &GroupId, member: &MemberId) -> GiftResult<bool> {
        let guard = self
            .groups
            .read()
            .map_err(|_| GiftError::Collaborator("directory lock poisoned".to_string()))?;
        Ok(guard
            .get(group)
            .is_some_and(|roster| roster.admins.contains(member)))
    }
}

/// Item catalog backed by process memory.
#[derive(Default)]
pub struct InMemoryCatalog {
    items: RwLock<HashMap<ItemId, ItemListing>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, listing: ItemListing) -> GiftResult<()> {
        let mut guard = self
            .items
            .write()
            .map_err(|_| GiftError::Collaborator("catalog lock poisoned".to_string()))?;
        guard.insert(listing.item_id.clone(), listing);
        Ok(())
    }
}

#[async_trait]
impl ItemCatalog for InMemoryCatalog {
    async fn listing(&self, item: &ItemId) -> GiftResult<Option<ItemListing>> {
        let guard = self
            .items
            .read()
            .map_err(|_| GiftError::Collaborator("catalog lock poisoned".to_string()))?;
        Ok(guard.get(item).cloned())
    }
}
