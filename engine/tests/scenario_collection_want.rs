//! A collection want expands to every current member of the collection,
//! excluding items the wanter already owns, and is flagged as such on the
//! resulting trade loop step.

use trade_loop_engine_core::config::TenantConfig;
use trade_loop_engine_core::{CollectionId, Engine, ItemId, OwnerId, TenantId};

mod support;
use support::noop_adapters;

#[tokio::test]
async fn collection_want_materializes_a_collection_trade_step() {
    let engine = Engine::new();
    let tenant = TenantId::new("marketplace-1");
    engine.create_tenant(tenant.clone(), TenantConfig::default(), noop_adapters()).unwrap();

    let legendary = CollectionId::new("legendary-swords");
    engine
        .add_inventory(&tenant, OwnerId::new("alice"), ItemId::new("excalibur"), Some(legendary.clone()), None)
        .await
        .unwrap();
    engine.add_inventory(&tenant, OwnerId::new("bob"), ItemId::new("shield"), None, None).await.unwrap();

    // Bob wants anything in the collection rather than a specific item.
    engine.add_collection_want(&tenant, OwnerId::new("bob"), legendary).await.unwrap();
    let outcome = engine.add_want(&tenant, OwnerId::new("alice"), ItemId::new("shield")).await.unwrap();

    assert_eq!(outcome.cycles_discovered, 1);
    let cycles = engine.query_cycles(&tenant, &OwnerId::new("bob"), None, None).await.unwrap();
    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].collection_trade());
}

#[tokio::test]
async fn adding_a_second_collection_member_later_still_completes_the_loop() {
    let engine = Engine::new();
    let tenant = TenantId::new("marketplace-2");
    engine.create_tenant(tenant.clone(), TenantConfig::default(), noop_adapters()).unwrap();

    let set = CollectionId::new("starter-set");
    engine.add_collection_want(&tenant, OwnerId::new("bob"), set.clone()).await.unwrap();
    engine.add_inventory(&tenant, OwnerId::new("bob"), ItemId::new("shield"), None, None).await.unwrap();
    engine.add_want(&tenant, OwnerId::new("alice"), ItemId::new("shield")).await.unwrap();

    // The collection want was registered before the collection had members;
    // the item joining it afterward should still wire up the edge.
    let outcome = engine
        .add_inventory(&tenant, OwnerId::new("alice"), ItemId::new("dagger"), Some(set), None)
        .await
        .unwrap();

    assert_eq!(outcome.cycles_discovered, 1);
}
