use giftcircle_rotation::RotationError;
use giftcircle_storage::StorageError;
use giftcircle_types::{CelebrationId, CelebrationStatus, ClaimId, ItemId};
use serde::Serialize;
use thiserror::Error;

pub type GiftResult<T> = Result<T, GiftError>;

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    Conflict,
    NotFound,
    Rotation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Rotation => "rotation",
            Self::Internal => "internal",
        }
    }
}

/// Gift Circle operation errors.
#[derive(Debug, Error)]
pub enum GiftError {
    #[error("amount must be positive, got {amount_minor}")]
    InvalidAmount { amount_minor: i64 },

    #[error("invalid leader target: {0}")]
    InvalidTarget(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("not allowed: {0}")]
    NotAllowed(String),

    #[error("claim {claim_id} belongs to another member")]
    NotOwnerOfClaim { claim_id: ClaimId },

    #[error("item {item_id} already has an active claim")]
    AlreadyClaimed { item_id: ItemId },

    #[error("pledge exceeds remaining amount of {remaining_minor}")]
    ExceedsRemaining { remaining_minor: i64 },

    #[error("split for item {item_id} is already fully funded")]
    AlreadyFunded { item_id: ItemId },

    #[error("item {item_id} has no open split")]
    NotOpen { item_id: ItemId },

    #[error("celebration {celebration_id} is {status}")]
    CelebrationClosed {
        celebration_id: CelebrationId,
        status: CelebrationStatus,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Rotation(#[from] RotationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("collaborator failure: {0}")]
    Collaborator(String),
}

impl GiftError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount { .. } | Self::InvalidTarget(_) | Self::Validation(_) => {
                ErrorKind::Validation
            }
            Self::NotAuthorized(_) | Self::NotAllowed(_) | Self::NotOwnerOfClaim { .. } => {
                ErrorKind::Authorization
            }
            Self::AlreadyClaimed { .. }
            | Self::ExceedsRemaining { .. }
            | Self::AlreadyFunded { .. }
            | Self::NotOpen { .. }
            | Self::CelebrationClosed { .. } => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Rotation(_) => ErrorKind::Rotation,
            Self::Storage(StorageError::NotFound(_)) => ErrorKind::NotFound,
            Self::Storage(err) if err.is_conflict() => ErrorKind::Conflict,
            Self::Storage(StorageError::InvalidInput(_)) => ErrorKind::Validation,
            Self::Storage(_) | Self::Collaborator(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "invalid_amount",
            Self::InvalidTarget(_) => "invalid_target",
            Self::Validation(_) => "validation_failed",
            Self::NotAuthorized(_) => "not_authorized",
            Self::NotAllowed(_) => "not_allowed",
            Self::NotOwnerOfClaim { .. } => "not_owner_of_claim",
            Self::AlreadyClaimed { .. } => "already_claimed",
            Self::ExceedsRemaining { .. } => "exceeds_remaining",
            Self::AlreadyFunded { .. } => "already_funded",
            Self::NotOpen { .. } => "not_open",
            Self::CelebrationClosed { .. } => "celebration_closed",
            Self::NotFound(_) => "not_found",
            Self::Rotation(RotationError::InsufficientMembers { .. }) => "insufficient_members",
            Self::Rotation(RotationError::CelebrantNotFound(_)) => "celebrant_not_found",
            Self::Storage(_) => "storage_error",
            Self::Collaborator(_) => "collaborator_failure",
        }
    }

    /// Expected contention, as opposed to an unexpected failure.
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub(crate) fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{what} not found"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use giftcircle_types::MemberId;

    #[test]
    fn contention_is_distinguishable_from_failure() {
        let lost_race = GiftError::AlreadyClaimed {
            item_id: ItemId::new("item-1"),
        };
        let broken = GiftError::Storage(StorageError::Backend("connection reset".into()));

        assert!(lost_race.is_conflict());
        assert!(!broken.is_conflict());
        assert_eq!(broken.kind(), ErrorKind::Internal);
    }

    #[test]
    fn rotation_errors_keep_their_own_codes() {
        let err = GiftError::from(RotationError::CelebrantNotFound(MemberId::new("z")));
        assert_eq!(err.kind(), ErrorKind::Rotation);
        assert_eq!(err.code(), "celebrant_not_found");
    }
}
