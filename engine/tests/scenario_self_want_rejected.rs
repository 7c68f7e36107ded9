//! An owner can never register a want for an item they already own.

use trade_loop_engine_core::config::TenantConfig;
use trade_loop_engine_core::{Engine, ItemId, OwnerId, TenantId};

mod support;
use support::noop_adapters;

#[tokio::test]
async fn self_want_is_rejected_with_stable_error_code() {
    let engine = Engine::new();
    let tenant = TenantId::new("marketplace-1");
    engine.create_tenant(tenant.clone(), TenantConfig::default(), noop_adapters()).unwrap();

    engine.add_inventory(&tenant, OwnerId::new("alice"), ItemId::new("sword"), None, None).await.unwrap();

    let err = engine.add_want(&tenant, OwnerId::new("alice"), ItemId::new("sword")).await.unwrap_err();
    assert_eq!(err.code(), "SELF_WANT_REJECTED");

    // No phantom cycle should have been recorded.
    let cycles = engine.query_cycles(&tenant, &OwnerId::new("alice"), None, None).await.unwrap();
    assert!(cycles.is_empty());
}
