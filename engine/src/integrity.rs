//! Centralized invariant checks.
//!
//! The teacher scatters invariant assertions inline across
//! `orchestrator/engine.rs` and `models/state.rs` (`assert!`/`debug_assert!`
//! on balances, queue membership, etc). Here those checks are centralized
//! into one auditable pass that returns structured violations instead of
//! panicking — consistent with the "no stack traces cross the boundary"
//! error-handling rule: a detected inconsistency is data, not a crash.

use serde::{Deserialize, Serialize};

use crate::config::TenantConfig;
use crate::cycles::CycleStore;
use crate::ids::{ItemId, OwnerId};
use crate::models::{CycleSignature, TradeLoop};
use crate::tenant::TenantState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntegrityViolation {
    SelfLoopStep { signature: CycleSignature, owner: OwnerId },
    CycleTooLong { signature: CycleSignature, length: usize, max: usize },
    SignatureMismatch { stored: CycleSignature, recomputed: CycleSignature },
    DanglingEdge { signature: CycleSignature, from: OwnerId, to: OwnerId },
    EmptyStepItems { signature: CycleSignature, from: OwnerId, to: OwnerId },
    /// `owner`'s `owned_items` bookkeeping disagrees with the authoritative
    /// `ownership` map — either nobody (`actual_owner: None`) or somebody
    /// else now owns `item`.
    OwnershipDrift { item: ItemId, recorded_owner: OwnerId, actual_owner: Option<OwnerId> },
    /// `owner` wants `item`, but `item` does not exist in the ownership map.
    UnknownWantedItem { owner: OwnerId, item: ItemId },
    /// `owner` wants `item` that `owner` itself now owns (stale want left
    /// over from before a transfer).
    SelfWantDrift { owner: OwnerId, item: ItemId },
}

/// A snapshot of the derived wants-graph suitable for visualization —
/// spec §2/§4.8's `{nodes, edges}` export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<OwnerId>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: OwnerId,
    pub to: OwnerId,
    pub items: Vec<ItemId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub violations: Vec<IntegrityViolation>,
    /// One human-readable remediation suggestion per violation, same order.
    pub recommendations: Vec<String>,
    pub graph: GraphSnapshot,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Check every invariant `TenantState`/`CycleStore` jointly claim to
/// maintain. Intended for tests and operator diagnostics, not the hot
/// mutation path — each command already keeps these invariants by
/// construction, so a clean run here is expected, not merely hoped for.
pub struct IntegrityChecker<'a> {
    config: &'a TenantConfig,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(config: &'a TenantConfig) -> Self {
        Self { config }
    }

    pub fn check(&self, state: &TenantState, cycles: &CycleStore) -> IntegrityReport {
        let mut violations = Vec::new();

        for cycle in cycles.all() {
            self.check_cycle(state, cycle, &mut violations);
        }
        self.check_state(state, &mut violations);

        let recommendations = violations.iter().map(Self::recommend).collect();
        let graph = Self::graph_snapshot(state);

        IntegrityReport { violations, recommendations, graph }
    }

    /// `ownership` is a `BTreeMap<ItemId, OwnerId>` so it is already a
    /// function by construction; what can actually drift is the redundant
    /// per-owner `owned_items`/`wanted_items` bookkeeping `TenantState`
    /// keeps alongside it (spec §4.8: ownership is a function, and every
    /// `(o, i) ∈ wants` has `ownership[i] != o`).
    fn check_state(&self, state: &TenantState, violations: &mut Vec<IntegrityViolation>) {
        for (owner, record) in state.owners_iter() {
            for item in &record.owned_items {
                match state.owner_of(item) {
                    Some(actual) if actual == owner => {}
                    Some(actual) => violations.push(IntegrityViolation::OwnershipDrift {
                        item: item.clone(),
                        recorded_owner: owner.clone(),
                        actual_owner: Some(actual.clone()),
                    }),
                    None => violations.push(IntegrityViolation::OwnershipDrift {
                        item: item.clone(),
                        recorded_owner: owner.clone(),
                        actual_owner: None,
                    }),
                }
            }
            for item in &record.wanted_items {
                match state.owner_of(item) {
                    None => violations.push(IntegrityViolation::UnknownWantedItem { owner: owner.clone(), item: item.clone() }),
                    Some(actual) if actual == owner => {
                        violations.push(IntegrityViolation::SelfWantDrift { owner: owner.clone(), item: item.clone() })
                    }
                    Some(_) => {}
                }
            }
        }
    }

    fn graph_snapshot(state: &TenantState) -> GraphSnapshot {
        let graph = state.graph();
        let nodes: Vec<OwnerId> = graph.all_owners().into_iter().collect();
        let mut edges = Vec::new();
        for from in &nodes {
            for to in graph.out_neighbors(from) {
                if let Some(items) = graph.edge_items(from, &to) {
                    edges.push(GraphEdge { from: from.clone(), to, items: items.iter().cloned().collect() });
                }
            }
        }
        GraphSnapshot { nodes, edges }
    }

    fn recommend(violation: &IntegrityViolation) -> String {
        match violation {
            IntegrityViolation::SelfLoopStep { owner, .. } => format!("drop the self-loop step at owner {owner}"),
            IntegrityViolation::CycleTooLong { signature, .. } => format!("evict cycle {signature}: exceeds maxCycleLength"),
            IntegrityViolation::SignatureMismatch { stored, .. } => format!("recompute and re-store cycle {stored}"),
            IntegrityViolation::DanglingEdge { signature, .. } => format!("evict cycle {signature}: edge no longer exists"),
            IntegrityViolation::EmptyStepItems { signature, .. } => format!("evict cycle {signature}: step carries no items"),
            IntegrityViolation::OwnershipDrift { item, recorded_owner, .. } => {
                format!("reconcile owner {recorded_owner}'s inventory against the ownership map for item {item}")
            }
            IntegrityViolation::UnknownWantedItem { owner, item } => format!("clear {owner}'s want on unknown item {item}"),
            IntegrityViolation::SelfWantDrift { owner, item } => format!("clear {owner}'s stale self-want on item {item}"),
        }
    }

    fn check_cycle(&self, state: &TenantState, cycle: &TradeLoop, violations: &mut Vec<IntegrityViolation>) {
        let recomputed = CycleSignature::compute(&cycle.steps);
        if recomputed != cycle.signature {
            violations.push(IntegrityViolation::SignatureMismatch {
                stored: cycle.signature.clone(),
                recomputed,
            });
        }

        if cycle.length() > self.config.max_cycle_length {
            violations.push(IntegrityViolation::CycleTooLong {
                signature: cycle.signature.clone(),
                length: cycle.length(),
                max: self.config.max_cycle_length,
            });
        }

        for step in &cycle.steps {
            if step.from == step.to {
                violations.push(IntegrityViolation::SelfLoopStep {
                    signature: cycle.signature.clone(),
                    owner: step.from.clone(),
                });
            }
            if step.items.is_empty() {
                violations.push(IntegrityViolation::EmptyStepItems {
                    signature: cycle.signature.clone(),
                    from: step.from.clone(),
                    to: step.to.clone(),
                });
            }
            let still_connected = state
                .graph()
                .edge_items(&step.from, &step.to)
                .is_some_and(|items| step.items.iter().all(|item| items.contains(item)));
            if !still_connected {
                violations.push(IntegrityViolation::DanglingEdge {
                    signature: cycle.signature.clone(),
                    from: step.from.clone(),
                    to: step.to.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ItemId;

    #[test]
    fn clean_state_produces_no_violations() {
        let mut state = TenantState::new();
        state.add_inventory(OwnerId::new("A"), ItemId::new("a"), None, None).unwrap();
        state.add_inventory(OwnerId::new("B"), ItemId::new("b"), None, None).unwrap();
        state.add_want(OwnerId::new("B"), ItemId::new("a")).unwrap();
        state.add_want(OwnerId::new("A"), ItemId::new("b")).unwrap();

        let mut store = CycleStore::new();
        let steps = vec![
            crate::models::CycleStep { from: OwnerId::new("A"), to: OwnerId::new("B"), items: vec![ItemId::new("a")], collection_trade: false },
            crate::models::CycleStep { from: OwnerId::new("B"), to: OwnerId::new("A"), items: vec![ItemId::new("b")], collection_trade: false },
        ];
        store.upsert(TradeLoop::new(steps, 1.0, 0), 0);

        let config = TenantConfig::default();
        let report = IntegrityChecker::new(&config).check(&state, &store);
        assert!(report.is_clean());
    }

    #[test]
    fn dangling_edge_is_detected_after_inventory_removal() {
        let mut state = TenantState::new();
        state.add_inventory(OwnerId::new("A"), ItemId::new("a"), None, None).unwrap();
        state.add_inventory(OwnerId::new("B"), ItemId::new("b"), None, None).unwrap();
        state.add_want(OwnerId::new("B"), ItemId::new("a")).unwrap();
        state.add_want(OwnerId::new("A"), ItemId::new("b")).unwrap();

        let mut store = CycleStore::new();
        let steps = vec![
            crate::models::CycleStep { from: OwnerId::new("A"), to: OwnerId::new("B"), items: vec![ItemId::new("a")], collection_trade: false },
            crate::models::CycleStep { from: OwnerId::new("B"), to: OwnerId::new("A"), items: vec![ItemId::new("b")], collection_trade: false },
        ];
        store.upsert(TradeLoop::new(steps, 1.0, 0), 0);

        // Simulate a store that wasn't evicted even though the edge is now gone.
        state.remove_inventory(&ItemId::new("a")).unwrap();

        let config = TenantConfig::default();
        let report = IntegrityChecker::new(&config).check(&state, &store);
        assert!(report
            .violations
            .iter()
            .any(|v| matches!(v, IntegrityViolation::DanglingEdge { .. })));
    }
}
