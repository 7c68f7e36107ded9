//! Property-based invariants over randomly generated want-graphs: elementary
//! cycles never repeat an owner, every step is backed by a real edge, and
//! discovery is deterministic for a fixed graph.

use std::collections::BTreeSet;

use proptest::prelude::*;

use trade_loop_engine_core::config::TenantConfig;
use trade_loop_engine_core::cycles::CycleEngine;
use trade_loop_engine_core::graph::GraphIndex;
use trade_loop_engine_core::ids::{ItemId, OwnerId};

#[derive(Debug, Clone)]
enum Op {
    AddItem { owner: u8, item: u8 },
    AddWant { owner: u8, item: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..5, 0u8..6).prop_map(|(owner, item)| Op::AddItem { owner, item }),
        (0u8..5, 0u8..6).prop_map(|(owner, item)| Op::AddWant { owner, item }),
    ]
}

fn owner_id(n: u8) -> OwnerId {
    OwnerId::new(format!("owner-{n}"))
}

fn item_id(n: u8) -> ItemId {
    ItemId::new(format!("item-{n}"))
}

fn build_graph(ops: &[Op]) -> GraphIndex {
    let mut graph = GraphIndex::new();
    for op in ops {
        match op {
            Op::AddItem { owner, item } => {
                graph.add_item_edges(item_id(*item), owner_id(*owner), None);
            }
            Op::AddWant { owner, item } => {
                graph.add_direct_want(owner_id(*owner), item_id(*item));
            }
        }
    }
    graph
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn discovered_cycles_never_repeat_an_owner(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let graph = build_graph(&ops);
        let engine = CycleEngine::new(&TenantConfig::default());
        let seeds: BTreeSet<OwnerId> = (0u8..5).map(owner_id).collect();
        let result = engine.discover(&graph, &seeds, &std::collections::BTreeMap::new(), 0);

        for cycle in &result.cycles {
            let owners: Vec<&OwnerId> = cycle.owners().collect();
            let unique: BTreeSet<&OwnerId> = owners.iter().copied().collect();
            prop_assert_eq!(owners.len(), unique.len(), "cycle repeats an owner");
            prop_assert!(cycle.length() >= 2);
            prop_assert!(cycle.length() <= TenantConfig::default().max_cycle_length);
        }
    }

    #[test]
    fn every_step_is_backed_by_a_real_edge(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let graph = build_graph(&ops);
        let engine = CycleEngine::new(&TenantConfig::default());
        let seeds: BTreeSet<OwnerId> = (0u8..5).map(owner_id).collect();
        let result = engine.discover(&graph, &seeds, &std::collections::BTreeMap::new(), 0);

        for cycle in &result.cycles {
            for step in &cycle.steps {
                prop_assert_ne!(&step.from, &step.to, "no self-loop step");
                prop_assert!(!step.items.is_empty());
                let edge_items = graph.edge_items(&step.from, &step.to);
                prop_assert!(edge_items.is_some());
                let edge_items = edge_items.unwrap();
                for item in &step.items {
                    prop_assert!(edge_items.contains(item));
                }
            }
        }
    }

    #[test]
    fn discovery_is_deterministic_for_a_fixed_graph(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let graph = build_graph(&ops);
        let engine = CycleEngine::new(&TenantConfig::default());
        let seeds: BTreeSet<OwnerId> = (0u8..5).map(owner_id).collect();

        let first = engine.discover(&graph, &seeds, &std::collections::BTreeMap::new(), 0);
        let second = engine.discover(&graph, &seeds, &std::collections::BTreeMap::new(), 0);

        let first_sigs: Vec<_> = first.cycles.iter().map(|c| c.signature.clone()).collect();
        let second_sigs: Vec<_> = second.cycles.iter().map(|c| c.signature.clone()).collect();
        prop_assert_eq!(first_sigs, second_sigs);
    }
}
