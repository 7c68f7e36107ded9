//! `minCycleScore` gates which discovered cycles are worth surfacing at
//! all — a topologically valid loop that scores below the configured
//! threshold (here, because most of its steps are only collection-mediated
//! rather than direct wants) is discarded instead of stored.

use trade_loop_engine_core::config::TenantConfig;
use trade_loop_engine_core::{CollectionId, Engine, ItemId, OwnerId, TenantId};

mod support;
use support::noop_adapters;

async fn build_mostly_collection_mediated_loop(engine: &Engine, tenant: &TenantId) {
    let k1 = CollectionId::new("k1");
    let k2 = CollectionId::new("k2");

    engine.add_inventory(tenant, OwnerId::new("A"), ItemId::new("a"), Some(k1.clone()), None).await.unwrap();
    engine.add_inventory(tenant, OwnerId::new("B"), ItemId::new("b"), Some(k2.clone()), None).await.unwrap();
    engine.add_inventory(tenant, OwnerId::new("C"), ItemId::new("c"), None, None).await.unwrap();

    // A -> B and B -> C are only satisfied via collection wants.
    engine.add_collection_want(tenant, OwnerId::new("B"), k1).await.unwrap();
    engine.add_collection_want(tenant, OwnerId::new("C"), k2).await.unwrap();
    // C -> A is a direct want.
    engine.add_want(tenant, OwnerId::new("A"), ItemId::new("c")).await.unwrap();
}

#[tokio::test]
async fn high_validity_threshold_discards_a_mostly_indirect_loop() {
    let engine = Engine::new();
    let tenant = TenantId::new("strict-market");
    let mut config = TenantConfig::default();
    config.min_cycle_score = 0.95;
    engine.create_tenant(tenant.clone(), config, noop_adapters()).unwrap();

    build_mostly_collection_mediated_loop(&engine, &tenant).await;

    assert_eq!(engine.stored_cycle_count(&tenant).await.unwrap(), 0);
}

#[tokio::test]
async fn default_threshold_keeps_the_same_loop() {
    let engine = Engine::new();
    let tenant = TenantId::new("lenient-market");
    engine.create_tenant(tenant.clone(), TenantConfig::default(), noop_adapters()).unwrap();

    build_mostly_collection_mediated_loop(&engine, &tenant).await;

    assert_eq!(engine.stored_cycle_count(&tenant).await.unwrap(), 1);
}
