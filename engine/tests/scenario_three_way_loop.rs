//! Three owners, each holding exactly what the next one wants, form one
//! elementary trade loop that every participant can query.

use trade_loop_engine_core::config::TenantConfig;
use trade_loop_engine_core::{Engine, ItemId, OwnerId, TenantId};

mod support;
use support::noop_adapters;

#[tokio::test]
async fn three_way_loop_is_discovered_and_visible_to_all_participants() {
    let engine = Engine::new();
    let tenant = TenantId::new("marketplace-1");
    engine.create_tenant(tenant.clone(), TenantConfig::default(), noop_adapters()).unwrap();

    engine.add_inventory(&tenant, OwnerId::new("alice"), ItemId::new("sword"), None, None).await.unwrap();
    engine.add_inventory(&tenant, OwnerId::new("bob"), ItemId::new("shield"), None, None).await.unwrap();
    engine.add_inventory(&tenant, OwnerId::new("carol"), ItemId::new("bow"), None, None).await.unwrap();

    engine.add_want(&tenant, OwnerId::new("bob"), ItemId::new("sword")).await.unwrap();
    engine.add_want(&tenant, OwnerId::new("carol"), ItemId::new("shield")).await.unwrap();
    let outcome = engine.add_want(&tenant, OwnerId::new("alice"), ItemId::new("bow")).await.unwrap();

    assert_eq!(outcome.cycles_discovered, 1);
    assert!(!outcome.budget_exceeded);

    for owner in ["alice", "bob", "carol"] {
        let cycles = engine.query_cycles(&tenant, &OwnerId::new(owner), None, None).await.unwrap();
        assert_eq!(cycles.len(), 1, "owner {owner} should see the loop");
        assert_eq!(cycles[0].length(), 3);
    }

    assert_eq!(engine.stored_cycle_count(&tenant).await.unwrap(), 1);
}
