//! Gift Leader rotation planner.
//!
//! Members are ordered around the calendar by birthday (month, then day);
//! members without a usable birthday follow every dated member. Ties and
//! undated members are ordered by member identifier, so the order is total
//! and stable. The next leader for a celebration is the member following the
//! celebrant in that circular order.
//!
//! With exactly two members the planner always returns the other member,
//! whatever the birthday data says.

#![deny(unsafe_code)]

use giftcircle_types::{GroupMember, MemberId};
use std::cmp::Ordering;
use std::collections::HashSet;
use thiserror::Error;

/// Minimum roster size for a rotation.
pub const MIN_ROTATION_MEMBERS: usize = 2;

/// Rotation planning failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RotationError {
    #[error("insufficient members for rotation: {count} eligible, at least 2 required")]
    InsufficientMembers { count: usize },

    #[error("celebrant {0} is not in the roster")]
    CelebrantNotFound(MemberId),
}

/// Sort key: dated members first by (month, day), undated last, id as tiebreak.
fn rotation_cmp(a: &GroupMember, b: &GroupMember) -> Ordering {
    match (a.birthday(), b.birthday()) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.id.cmp(&b.id))
}

/// Return the roster in rotation order.
///
/// Duplicate member ids collapse to their first occurrence.
pub fn rotation_order(members: &[GroupMember]) -> Vec<GroupMember> {
    let mut seen = HashSet::new();
    let mut ordered: Vec<GroupMember> = members
        .iter()
        .filter(|member| seen.insert(member.id.clone()))
        .cloned()
        .collect();
    ordered.sort_by(rotation_cmp);
    ordered
}

/// Compute the next Gift Leader for `celebrant_id`.
pub fn plan_next_leader(
    members: &[GroupMember],
    celebrant_id: &MemberId,
) -> Result<MemberId, RotationError> {
    let ordered = rotation_order(members);
    if ordered.len() < MIN_ROTATION_MEMBERS {
        return Err(RotationError::InsufficientMembers {
            count: ordered.len(),
        });
    }

    let position = ordered
        .iter()
        .position(|member| &member.id == celebrant_id)
        .ok_or_else(|| RotationError::CelebrantNotFound(celebrant_id.clone()))?;

    let next = (position + 1) % ordered.len();
    Ok(ordered[next].id.clone())
}
