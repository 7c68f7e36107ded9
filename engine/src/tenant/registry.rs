//! Cross-tenant lookup table.
//!
//! `DashMap` gives the lock-per-shard concurrency the teacher's codebase
//! does not need (it is single-tenant) but the spec's multi-tenant model
//! does — many tenants' event loops are created, queried, and torn down
//! concurrently with no single global lock.

use std::sync::Arc;

use dashmap::DashMap;

use crate::adapters::Adapters;
use crate::config::TenantConfig;
use crate::coordinator::{self, TenantHandle};
use crate::error::TenantError;
use crate::ids::TenantId;

#[derive(Default)]
pub struct TenantRegistry {
    tenants: DashMap<TenantId, Arc<TenantHandle>>,
}

impl TenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new tenant and spawn its event loop. Errors if the tenant
    /// id is already registered (spec §4.1: tenant ids are unique).
    pub fn create(&self, tenant_id: TenantId, config: TenantConfig, adapters: Adapters) -> Result<Arc<TenantHandle>, TenantError> {
        if self.tenants.contains_key(&tenant_id) {
            return Err(TenantError::TenantExists(tenant_id));
        }
        let handle = coordinator::spawn(tenant_id.clone(), config, adapters);
        self.tenants.insert(tenant_id, handle.clone());
        Ok(handle)
    }

    pub fn get(&self, tenant_id: &TenantId) -> Result<Arc<TenantHandle>, TenantError> {
        self.tenants
            .get(tenant_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TenantError::UnknownTenant(tenant_id.clone()))
    }

    /// Stop the tenant's event loop and drop it from the registry. Already
    /// in-flight commands are allowed to drain.
    pub fn remove(&self, tenant_id: &TenantId) -> Result<(), TenantError> {
        match self.tenants.remove(tenant_id) {
            Some((_, handle)) => {
                handle.shutdown();
                Ok(())
            }
            None => Err(TenantError::UnknownTenant(tenant_id.clone())),
        }
    }

    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.tenants.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::noop_adapters;

    #[tokio::test]
    async fn creating_duplicate_tenant_fails() {
        let registry = TenantRegistry::new();
        registry.create(TenantId::new("t1"), TenantConfig::default(), noop_adapters()).unwrap();
        let err = registry.create(TenantId::new("t1"), TenantConfig::default(), noop_adapters()).unwrap_err();
        assert!(matches!(err, TenantError::TenantExists(_)));
    }

    #[tokio::test]
    async fn removing_unknown_tenant_fails() {
        let registry = TenantRegistry::new();
        let err = registry.remove(&TenantId::new("ghost")).unwrap_err();
        assert!(matches!(err, TenantError::UnknownTenant(_)));
    }

    #[tokio::test]
    async fn get_after_create_succeeds() {
        let registry = TenantRegistry::new();
        registry.create(TenantId::new("t1"), TenantConfig::default(), noop_adapters()).unwrap();
        assert!(registry.get(&TenantId::new("t1")).is_ok());
    }
}
