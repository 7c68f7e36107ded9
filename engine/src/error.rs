//! Error taxonomy.
//!
//! Mirrors the input / conflict / budget / integrity / internal split: every
//! external operation returns a typed [`EngineError`] with a stable `code()`,
//! never a panic or a bare string.

use thiserror::Error;

use crate::ids::{CollectionId, ItemId, OwnerId, TenantId};

/// Errors raised while resolving or managing a tenant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("unknown tenant: {0}")]
    UnknownTenant(TenantId),

    #[error("tenant already exists: {0}")]
    TenantExists(TenantId),
}

/// Errors raised while mutating per-tenant state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("item {item} is owned by {current_owner}, not {attempted_owner}")]
    OwnershipConflict {
        item: ItemId,
        current_owner: OwnerId,
        attempted_owner: OwnerId,
    },

    #[error("owner {owner} cannot want item {item} that they already own")]
    SelfWantRejected { owner: OwnerId, item: ItemId },

    #[error("unknown item: {0}")]
    UnknownItem(ItemId),

    #[error("unknown owner: {0}")]
    UnknownOwner(OwnerId),

    #[error("unknown collection: {0}")]
    UnknownCollection(CollectionId),
}

/// Errors raised by the cycle store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("cycle not found: {0}")]
    NotFound(String),
}

/// Top-level error returned across the engine's external surface.
///
/// Every variant maps to one of the stable string codes in spec's error
/// taxonomy (`UNKNOWN_TENANT`, `OWNERSHIP_CONFLICT`, …). Internal faults
/// are never allowed to propagate as anything other than `Internal`: no
/// stack trace crosses the boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable string code for this error, matching spec's error code list.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Tenant(TenantError::UnknownTenant(_)) => "UNKNOWN_TENANT",
            EngineError::Tenant(TenantError::TenantExists(_)) => "INVALID_ARGUMENT",
            EngineError::State(StateError::OwnershipConflict { .. }) => "OWNERSHIP_CONFLICT",
            EngineError::State(StateError::SelfWantRejected { .. }) => "SELF_WANT_REJECTED",
            EngineError::State(StateError::UnknownItem(_)) => "UNKNOWN_ITEM",
            EngineError::State(StateError::UnknownOwner(_)) => "UNKNOWN_ITEM",
            EngineError::State(StateError::UnknownCollection(_)) => "UNKNOWN_ITEM",
            EngineError::Store(StoreError::NotFound(_)) => "INVALID_ARGUMENT",
            EngineError::InvalidArgument(_) => "INVALID_ARGUMENT",
            EngineError::Internal(_) => "INTERNAL",
        }
    }
}
