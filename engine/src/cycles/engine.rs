//! Bounded elementary-cycle discovery.
//!
//! Step 1 partitions the subgraph reachable from the delta's seed owners
//! into strongly connected components — the same job the teacher's
//! `SccFinder` (`settlement/lsm/graph.rs`) does with Tarjan's algorithm,
//! generalized here from a recursive, whole-graph pass to an iterative one
//! scoped to a vertex subset (so one tenant's huge graph never forces a
//! full rescan for a single owner's delta).
//!
//! Step 2 enumerates elementary cycles within each qualifying SCC using
//! Johnson's algorithm (block/unblock bookkeeping), bounded by
//! `maxCycleLength` and an [`EnumerationBudget`]. The teacher's
//! `TriangleFinder` is the length-3 special case of this; this engine
//! handles arbitrary bounded length the same way, generalizing the u<v<w
//! dedup into the signature-based dedup `cycles::store` performs instead.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::config::{EnumerationBudget, TenantConfig};
use crate::cycles::scorer::CycleScorer;
use crate::graph::GraphIndex;
use crate::ids::{ItemId, OwnerId};
use crate::models::{CycleStep, TradeLoop};

/// Result of one discovery pass triggered by a delta.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryResult {
    pub cycles: Vec<TradeLoop>,
    pub budget_exceeded: bool,
    pub nodes_visited: u64,
}

pub struct CycleEngine {
    scorer: CycleScorer,
    max_cycle_length: usize,
    max_item_combos: usize,
    min_cycle_score: f64,
    max_cycles_per_request: usize,
    budget: EnumerationBudget,
}

impl CycleEngine {
    pub fn new(config: &TenantConfig) -> Self {
        Self {
            scorer: CycleScorer::new(config.score_weights.clone(), config.length_penalty_alpha, config.directness_decay),
            max_cycle_length: config.max_cycle_length,
            max_item_combos: config.max_item_combos,
            min_cycle_score: config.min_cycle_score,
            max_cycles_per_request: config.max_cycles_per_request,
            budget: config.enumeration_budget.clone(),
        }
    }

    /// Discover trade loops reachable from `seeds`, the owners touched by
    /// the delta that triggered this pass (spec §4.4).
    pub fn discover(
        &self,
        graph: &GraphIndex,
        seeds: &BTreeSet<OwnerId>,
        item_values: &BTreeMap<ItemId, f64>,
        now: u64,
    ) -> DiscoveryResult {
        let scope = graph.reachable_from(seeds);
        let mut johnson = Johnson::new(graph, scope, self.max_cycle_length, self.budget.clone());
        johnson.run();

        let mut trade_loops: Vec<TradeLoop> = johnson
            .found
            .iter()
            .filter_map(|cycle_owners| self.materialize(graph, cycle_owners, item_values, now))
            .collect();

        trade_loops.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.signature.cmp(&b.signature))
        });
        trade_loops.truncate(self.max_cycles_per_request);

        DiscoveryResult {
            cycles: trade_loops,
            budget_exceeded: johnson.budget_exceeded,
            nodes_visited: johnson.nodes_visited,
        }
    }

    fn materialize(
        &self,
        graph: &GraphIndex,
        owners: &[OwnerId],
        item_values: &BTreeMap<ItemId, f64>,
        now: u64,
    ) -> Option<TradeLoop> {
        let n = owners.len();
        let mut steps = Vec::with_capacity(n);
        for i in 0..n {
            let from = &owners[i];
            let to = &owners[(i + 1) % n];
            let items = graph.edge_items(from, to)?;
            if items.is_empty() {
                return None;
            }
            let mut chosen: Vec<ItemId> = items.iter().cloned().collect();
            chosen.sort_by(|a, b| {
                let value_a = item_values.get(a).copied().unwrap_or(0.0);
                let value_b = item_values.get(b).copied().unwrap_or(0.0);
                value_b.partial_cmp(&value_a).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.cmp(b))
            });
            chosen.truncate(self.max_item_combos.max(1));
            let collection_trade = chosen.iter().all(|item| !graph.wants_directly(to, item));
            steps.push(CycleStep {
                from: from.clone(),
                to: to.clone(),
                items: chosen,
                collection_trade,
            });
        }

        let score = self.scorer.score(&steps, item_values);
        if score < self.min_cycle_score {
            return None;
        }
        Some(TradeLoop::new(steps, score, now))
    }
}

/// Iterative Tarjan restricted to `scope` — the induced subgraph on a
/// vertex subset, since Johnson's algorithm repeatedly shrinks the live
/// vertex set as it advances past each candidate start vertex.
fn tarjan_sccs(graph: &GraphIndex, scope: &BTreeSet<OwnerId>) -> Vec<BTreeSet<OwnerId>> {
    struct Frame {
        v: OwnerId,
        neighbors: Vec<OwnerId>,
        next: usize,
    }

    let mut index_counter: u32 = 0;
    let mut indices: BTreeMap<OwnerId, u32> = BTreeMap::new();
    let mut lowlink: BTreeMap<OwnerId, u32> = BTreeMap::new();
    let mut on_stack: BTreeSet<OwnerId> = BTreeSet::new();
    let mut tarjan_stack: Vec<OwnerId> = Vec::new();
    let mut sccs: Vec<BTreeSet<OwnerId>> = Vec::new();

    for start in scope {
        if indices.contains_key(start) {
            continue;
        }

        let mut work: Vec<Frame> = vec![Frame {
            v: start.clone(),
            neighbors: graph.out_neighbors(start).into_iter().filter(|w| scope.contains(w)).collect(),
            next: 0,
        }];
        indices.insert(start.clone(), index_counter);
        lowlink.insert(start.clone(), index_counter);
        index_counter += 1;
        tarjan_stack.push(start.clone());
        on_stack.insert(start.clone());

        while let Some(frame) = work.last_mut() {
            if frame.next < frame.neighbors.len() {
                let w = frame.neighbors[frame.next].clone();
                frame.next += 1;
                if !indices.contains_key(&w) {
                    indices.insert(w.clone(), index_counter);
                    lowlink.insert(w.clone(), index_counter);
                    index_counter += 1;
                    tarjan_stack.push(w.clone());
                    on_stack.insert(w.clone());
                    let w_neighbors = graph.out_neighbors(&w).into_iter().filter(|x| scope.contains(x)).collect();
                    work.push(Frame { v: w, neighbors: w_neighbors, next: 0 });
                } else if on_stack.contains(&w) {
                    let w_index = indices[&w];
                    let v_low = lowlink[&frame.v];
                    if w_index < v_low {
                        lowlink.insert(frame.v.clone(), w_index);
                    }
                }
            } else {
                let v = frame.v.clone();
                work.pop();
                if let Some(parent) = work.last() {
                    let v_low = lowlink[&v];
                    let parent_low = lowlink[&parent.v];
                    if v_low < parent_low {
                        lowlink.insert(parent.v.clone(), v_low);
                    }
                }
                if lowlink[&v] == indices[&v] {
                    let mut component = BTreeSet::new();
                    loop {
                        let w = tarjan_stack.pop().expect("scc root must be on stack");
                        on_stack.remove(&w);
                        let is_root = w == v;
                        component.insert(w);
                        if is_root {
                            break;
                        }
                    }
                    sccs.push(component);
                }
            }
        }
    }

    sccs
}

struct Johnson<'g> {
    graph: &'g GraphIndex,
    universe: BTreeSet<OwnerId>,
    max_len: usize,
    budget: EnumerationBudget,
    started: Instant,
    nodes_visited: u64,
    budget_exceeded: bool,
    blocked: BTreeSet<OwnerId>,
    block_map: BTreeMap<OwnerId, BTreeSet<OwnerId>>,
    stack: Vec<OwnerId>,
    found: Vec<Vec<OwnerId>>,
}

impl<'g> Johnson<'g> {
    fn new(graph: &'g GraphIndex, universe: BTreeSet<OwnerId>, max_len: usize, budget: EnumerationBudget) -> Self {
        Self {
            graph,
            universe,
            max_len,
            budget,
            started: Instant::now(),
            nodes_visited: 0,
            budget_exceeded: false,
            blocked: BTreeSet::new(),
            block_map: BTreeMap::new(),
            stack: Vec::new(),
            found: Vec::new(),
        }
    }

    fn should_stop(&self) -> bool {
        self.nodes_visited >= self.budget.nodes
            || self.started.elapsed().as_millis() as u64 >= self.budget.time_ms
            || self.found.len() as u64 >= self.budget.cycles
    }

    fn run(&mut self) {
        let mut scope = self.universe.clone();
        while let Some(s) = scope.iter().next().cloned() {
            if self.should_stop() {
                self.budget_exceeded = true;
                break;
            }
            let component = tarjan_sccs(self.graph, &scope).into_iter().find(|c| c.contains(&s));
            if let Some(component) = component {
                if component.len() >= 2 {
                    self.blocked.clear();
                    self.block_map.clear();
                    self.circuit(s.clone(), s.clone(), &component);
                }
            }
            scope.remove(&s);
        }
    }

    fn circuit(&mut self, v: OwnerId, s: OwnerId, component: &BTreeSet<OwnerId>) -> bool {
        if self.should_stop() {
            self.budget_exceeded = true;
            return false;
        }
        self.nodes_visited += 1;

        let mut found = false;
        self.blocked.insert(v.clone());
        self.stack.push(v.clone());

        if self.stack.len() <= self.max_len {
            for w in self.graph.out_neighbors(&v).into_iter().filter(|w| component.contains(w)) {
                if self.should_stop() {
                    self.budget_exceeded = true;
                    break;
                }
                if w == s {
                    self.found.push(self.stack.clone());
                    found = true;
                    if self.found.len() as u64 >= self.budget.cycles {
                        self.budget_exceeded = true;
                        break;
                    }
                } else if !self.blocked.contains(&w) && self.circuit(w.clone(), s.clone(), component) {
                    found = true;
                }
            }
        }

        if found {
            self.unblock(&v);
        } else {
            for w in self.graph.out_neighbors(&v).into_iter().filter(|w| component.contains(w)) {
                self.block_map.entry(w).or_default().insert(v.clone());
            }
        }

        self.stack.pop();
        found
    }

    fn unblock(&mut self, v: &OwnerId) {
        self.blocked.remove(v);
        if let Some(dependents) = self.block_map.remove(v) {
            for w in dependents {
                if self.blocked.contains(&w) {
                    self.unblock(&w);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ItemId, OwnerId};

    fn owner(s: &str) -> OwnerId {
        OwnerId::new(s)
    }
    fn item(s: &str) -> ItemId {
        ItemId::new(s)
    }

    fn triangle_graph() -> GraphIndex {
        let mut g = GraphIndex::new();
        g.add_item_edges(item("a"), owner("A"), None);
        g.add_item_edges(item("b"), owner("B"), None);
        g.add_item_edges(item("c"), owner("C"), None);
        g.add_direct_want(owner("B"), item("a"));
        g.add_direct_want(owner("C"), item("b"));
        g.add_direct_want(owner("A"), item("c"));
        g
    }

    fn default_config() -> TenantConfig {
        TenantConfig::default()
    }

    #[test]
    fn discovers_three_way_cycle() {
        let graph = triangle_graph();
        let engine = CycleEngine::new(&default_config());
        let seeds = BTreeSet::from([owner("A")]);
        let result = engine.discover(&graph, &seeds, &BTreeMap::new(), 0);

        assert_eq!(result.cycles.len(), 1);
        assert_eq!(result.cycles[0].length(), 3);
        assert!(!result.budget_exceeded);
    }

    #[test]
    fn no_cycle_when_graph_is_acyclic() {
        let mut graph = GraphIndex::new();
        graph.add_item_edges(item("a"), owner("A"), None);
        graph.add_direct_want(owner("B"), item("a"));

        let engine = CycleEngine::new(&default_config());
        let seeds = BTreeSet::from([owner("A")]);
        let result = engine.discover(&graph, &seeds, &BTreeMap::new(), 0);
        assert!(result.cycles.is_empty());
    }

    #[test]
    fn respects_node_budget() {
        let graph = triangle_graph();
        let mut config = default_config();
        config.enumeration_budget.nodes = 0;
        let engine = CycleEngine::new(&config);
        let seeds = BTreeSet::from([owner("A")]);
        let result = engine.discover(&graph, &seeds, &BTreeMap::new(), 0);
        assert!(result.budget_exceeded);
    }

    #[test]
    fn discovery_is_deterministic_across_runs() {
        let graph = triangle_graph();
        let engine = CycleEngine::new(&default_config());
        let seeds = BTreeSet::from([owner("A")]);
        let first = engine.discover(&graph, &seeds, &BTreeMap::new(), 0);
        let second = engine.discover(&graph, &seeds, &BTreeMap::new(), 0);
        assert_eq!(
            first.cycles.iter().map(|c| c.signature.clone()).collect::<Vec<_>>(),
            second.cycles.iter().map(|c| c.signature.clone()).collect::<Vec<_>>()
        );
    }
}
