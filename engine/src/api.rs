//! External surface: the engine as a caller outside this crate would use it.
//!
//! `Engine` is the single entry point a host process constructs once and
//! shares; every operation maps directly onto one spec §4 operation and
//! returns (or propagates) the same [`EngineError`] taxonomy. This plays
//! the role the teacher's `pyo3` `pymodule` boundary in `lib.rs` plays for
//! `backend` — a thin, explicit surface over the real machinery — except
//! this crate's boundary is plain Rust, not an FFI shim.

use std::sync::Arc;

use crate::adapters::Adapters;
use crate::config::TenantConfig;
use crate::coordinator::{CommandOutcome, SystemState, TenantHandle};
use crate::error::EngineError;
use crate::ids::{CollectionId, ItemId, OwnerId, TenantId};
use crate::integrity::IntegrityReport;
use crate::models::{CycleSignature, TradeLoop};
use crate::tenant::TenantRegistry;

/// The engine's public entry point. Cheap to clone (an `Arc` underneath);
/// clone it across request handlers rather than wrapping it in another lock.
#[derive(Clone, Default)]
pub struct Engine {
    registry: Arc<TenantRegistry>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_tenant(&self, tenant_id: TenantId, config: TenantConfig, adapters: Adapters) -> Result<(), EngineError> {
        config.validate().map_err(EngineError::InvalidArgument)?;
        self.registry.create(tenant_id, config, adapters)?;
        Ok(())
    }

    pub fn remove_tenant(&self, tenant_id: &TenantId) -> Result<(), EngineError> {
        self.registry.remove(tenant_id)?;
        Ok(())
    }

    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.registry.tenant_ids()
    }

    fn handle(&self, tenant_id: &TenantId) -> Result<Arc<TenantHandle>, EngineError> {
        Ok(self.registry.get(tenant_id)?)
    }

    pub async fn add_inventory(
        &self,
        tenant_id: &TenantId,
        owner: OwnerId,
        item: ItemId,
        collection: Option<CollectionId>,
        value_hint: Option<f64>,
    ) -> Result<CommandOutcome, EngineError> {
        self.handle(tenant_id)?.add_inventory(owner, item, collection, value_hint).await
    }

    pub async fn remove_inventory(&self, tenant_id: &TenantId, item: ItemId) -> Result<CommandOutcome, EngineError> {
        self.handle(tenant_id)?.remove_inventory(item).await
    }

    pub async fn transfer_ownership(
        &self,
        tenant_id: &TenantId,
        item: ItemId,
        new_owner: OwnerId,
    ) -> Result<CommandOutcome, EngineError> {
        self.handle(tenant_id)?.transfer_ownership(item, new_owner).await
    }

    pub async fn add_want(&self, tenant_id: &TenantId, owner: OwnerId, item: ItemId) -> Result<CommandOutcome, EngineError> {
        self.handle(tenant_id)?.add_want(owner, item).await
    }

    pub async fn remove_want(&self, tenant_id: &TenantId, owner: OwnerId, item: ItemId) -> Result<CommandOutcome, EngineError> {
        self.handle(tenant_id)?.remove_want(owner, item).await
    }

    pub async fn add_collection_want(
        &self,
        tenant_id: &TenantId,
        owner: OwnerId,
        collection: CollectionId,
    ) -> Result<CommandOutcome, EngineError> {
        self.handle(tenant_id)?.add_collection_want(owner, collection).await
    }

    pub async fn remove_collection_want(
        &self,
        tenant_id: &TenantId,
        owner: OwnerId,
        collection: CollectionId,
    ) -> Result<CommandOutcome, EngineError> {
        self.handle(tenant_id)?.remove_collection_want(owner, collection).await
    }

    pub async fn reject_owner(
        &self,
        tenant_id: &TenantId,
        rejecting_owner: OwnerId,
        rejected_owner: OwnerId,
    ) -> Result<CommandOutcome, EngineError> {
        self.handle(tenant_id)?.reject_owner(rejecting_owner, rejected_owner).await
    }

    pub async fn unreject_owner(
        &self,
        tenant_id: &TenantId,
        rejecting_owner: OwnerId,
        rejected_owner: OwnerId,
    ) -> Result<CommandOutcome, EngineError> {
        self.handle(tenant_id)?.unreject_owner(rejecting_owner, rejected_owner).await
    }

    pub async fn reject_cycle(
        &self,
        tenant_id: &TenantId,
        owner: OwnerId,
        signature: CycleSignature,
    ) -> Result<CommandOutcome, EngineError> {
        self.handle(tenant_id)?.reject_cycle(owner, signature).await
    }

    /// Cycles currently stored that involve `owner` as a participant,
    /// ordered score descending then signature ascending as a deterministic
    /// tie-break, optionally filtered to `min_score` and truncated to
    /// `limit` (spec §6 `queryCycles`).
    pub async fn query_cycles(
        &self,
        tenant_id: &TenantId,
        owner: &OwnerId,
        limit: Option<usize>,
        min_score: Option<f64>,
    ) -> Result<Vec<TradeLoop>, EngineError> {
        let mut cycles = self.handle(tenant_id)?.cycles_by_owner(owner).await;
        if let Some(min_score) = min_score {
            cycles.retain(|cycle| cycle.score >= min_score);
        }
        cycles.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.signature.as_str().cmp(b.signature.as_str()))
        });
        if let Some(limit) = limit {
            cycles.truncate(limit);
        }
        Ok(cycles)
    }

    pub async fn get_cycle(&self, tenant_id: &TenantId, signature: &CycleSignature) -> Result<Option<TradeLoop>, EngineError> {
        Ok(self.handle(tenant_id)?.get_cycle(signature).await)
    }

    pub async fn stored_cycle_count(&self, tenant_id: &TenantId) -> Result<usize, EngineError> {
        Ok(self.handle(tenant_id)?.stored_cycle_count().await)
    }

    /// Spec §6 `validateIntegrity(tenantId) -> IntegrityReport`.
    pub async fn validate_integrity(&self, tenant_id: &TenantId) -> Result<IntegrityReport, EngineError> {
        self.handle(tenant_id)?.validate_integrity().await
    }

    /// Spec §6 `systemState(tenantId) -> {owners, items, wants, activeCycles}`.
    pub async fn system_state(&self, tenant_id: &TenantId) -> Result<SystemState, EngineError> {
        self.handle(tenant_id)?.system_state().await
    }
}
