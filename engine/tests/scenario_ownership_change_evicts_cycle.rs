//! Transferring an item out of a loop's ownership chain must evict the
//! now-stale cycle rather than leave a dangling reference in the store.

use trade_loop_engine_core::config::TenantConfig;
use trade_loop_engine_core::{Engine, ItemId, OwnerId, TenantId};

mod support;
use support::noop_adapters;

#[tokio::test]
async fn ownership_change_evicts_the_stale_cycle() {
    let engine = Engine::new();
    let tenant = TenantId::new("marketplace-1");
    engine.create_tenant(tenant.clone(), TenantConfig::default(), noop_adapters()).unwrap();

    engine.add_inventory(&tenant, OwnerId::new("alice"), ItemId::new("sword"), None, None).await.unwrap();
    engine.add_inventory(&tenant, OwnerId::new("bob"), ItemId::new("shield"), None, None).await.unwrap();
    engine.add_want(&tenant, OwnerId::new("bob"), ItemId::new("sword")).await.unwrap();
    engine.add_want(&tenant, OwnerId::new("alice"), ItemId::new("shield")).await.unwrap();

    assert_eq!(engine.stored_cycle_count(&tenant).await.unwrap(), 1);

    let outcome = engine.transfer_ownership(&tenant, ItemId::new("sword"), OwnerId::new("carol")).await.unwrap();
    assert_eq!(outcome.cycles_evicted, 1);
    assert_eq!(engine.stored_cycle_count(&tenant).await.unwrap(), 0);

    let alice_cycles = engine.query_cycles(&tenant, &OwnerId::new("alice"), None, None).await.unwrap();
    assert!(alice_cycles.is_empty());
}
