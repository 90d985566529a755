use crate::ids::{ItemId, MemberId};
use serde::{Deserialize, Serialize};

/// Roster entry as supplied by the membership collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: MemberId,
    #[serde(default)]
    pub birthday_month: Option<u32>,
    #[serde(default)]
    pub birthday_day: Option<u32>,
}

impl GroupMember {
    pub fn new(id: impl Into<MemberId>) -> Self {
        Self {
            id: id.into(),
            birthday_month: None,
            birthday_day: None,
        }
    }

    pub fn with_birthday(mut self, month: u32, day: u32) -> Self {
        self.birthday_month = Some(month);
        self.birthday_day = Some(day);
        self
    }

    /// Calendar key used for rotation ordering.
    ///
    /// Partial or impossible dates count as "no birthday".
    pub fn birthday(&self) -> Option<(u32, u32)> {
        match (self.birthday_month, self.birthday_day) {
            (Some(month), Some(day)) if (1..=12).contains(&month) && (1..=31).contains(&day) => {
                Some((month, day))
            }
            _ => None,
        }
    }
}

/// Item ownership and price as reported by the catalog collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemListing {
    pub item_id: ItemId,
    pub owner_id: MemberId,
    #[serde(default)]
    pub price_minor: Option<i64>,
}

impl ItemListing {
    pub fn is_owned_by(&self, member: &MemberId) -> bool {
        &self.owner_id == member
    }
}
