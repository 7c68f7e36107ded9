//! Derived directed multigraph over owners.
//!
//! Edge `u -> v` exists iff `u` holds some item wanted by `v` (directly or
//! via a collection want). This is the incremental generalization of the
//! teacher's `AggregatedGraph` (`settlement/lsm/graph.rs`), which rebuilds
//! its adjacency from scratch every tick; this index instead exposes a
//! patch API so `DeltaCoordinator` never triggers a global rebuild.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::ids::{CollectionId, ItemId, OwnerId};

/// Derived wants-graph for one tenant.
///
/// All maps are `BTreeMap`/`BTreeSet` so iteration order is the owner/item
/// lexicographic order `CycleEngine` relies on for deterministic output.
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    out_edges: BTreeMap<OwnerId, BTreeMap<OwnerId, BTreeSet<ItemId>>>,
    in_edges: BTreeMap<OwnerId, BTreeSet<OwnerId>>,
    item_owner: BTreeMap<ItemId, OwnerId>,
    item_collection: BTreeMap<ItemId, CollectionId>,
    owner_items: BTreeMap<OwnerId, BTreeSet<ItemId>>,
    direct_wanters: BTreeMap<ItemId, BTreeSet<OwnerId>>,
    collection_wanters: BTreeMap<CollectionId, BTreeSet<OwnerId>>,
    collection_members: BTreeMap<CollectionId, BTreeSet<ItemId>>,
    /// `(u, v)` present means `v` has rejected `u`; all edges `u -> v` are suppressed.
    suppressed: BTreeSet<(OwnerId, OwnerId)>,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn owner_wants_item(&self, owner: &OwnerId, item: &ItemId) -> bool {
        if self.direct_wanters.get(item).is_some_and(|s| s.contains(owner)) {
            return true;
        }
        if let Some(collection) = self.item_collection.get(item) {
            if self.collection_wanters.get(collection).is_some_and(|s| s.contains(owner)) {
                return true;
            }
        }
        false
    }

    /// Wanters of `item`, excluding `owner` itself (spec §3: a collection
    /// want expands to items "whose owner is not `o`").
    fn wanters_excluding_owner(&self, item: &ItemId, owner: &OwnerId) -> BTreeSet<OwnerId> {
        let mut wanters = self.direct_wanters.get(item).cloned().unwrap_or_default();
        if let Some(collection) = self.item_collection.get(item) {
            if let Some(cw) = self.collection_wanters.get(collection) {
                wanters.extend(cw.iter().cloned());
            }
        }
        wanters.remove(owner);
        wanters
    }

    fn is_suppressed(&self, u: &OwnerId, v: &OwnerId) -> bool {
        self.suppressed.contains(&(u.clone(), v.clone()))
    }

    fn set_edge_item(&mut self, u: &OwnerId, v: &OwnerId, item: &ItemId) -> bool {
        let inserted = self
            .out_edges
            .entry(u.clone())
            .or_default()
            .entry(v.clone())
            .or_default()
            .insert(item.clone());
        if inserted {
            self.in_edges.entry(v.clone()).or_default().insert(u.clone());
        }
        inserted
    }

    fn clear_edge_item(&mut self, u: &OwnerId, v: &OwnerId, item: &ItemId) -> bool {
        let mut removed = false;
        if let Some(neighbors) = self.out_edges.get_mut(u) {
            if let Some(items) = neighbors.get_mut(v) {
                removed = items.remove(item);
                if items.is_empty() {
                    neighbors.remove(v);
                    if let Some(preds) = self.in_edges.get_mut(v) {
                        preds.remove(u);
                    }
                }
            }
            if neighbors.is_empty() {
                self.out_edges.remove(u);
            }
        }
        removed
    }

    fn clear_item_owner_edges(&mut self, item: &ItemId, owner: &OwnerId) -> BTreeSet<OwnerId> {
        let mut touched = BTreeSet::new();
        for v in self.wanters_excluding_owner(item, owner) {
            if self.clear_edge_item(owner, &v, item) {
                touched.insert(owner.clone());
                touched.insert(v);
            }
        }
        touched
    }

    /// Item `item` is now owned by `owner` (spec: `addItemEdges`).
    ///
    /// `collection`, if present, is recorded the first time an item in that
    /// collection is seen; subsequent calls for the same item are no-ops
    /// for collection bookkeeping.
    pub fn add_item_edges(&mut self, item: ItemId, owner: OwnerId, collection: Option<CollectionId>) -> BTreeSet<OwnerId> {
        let mut touched = BTreeSet::new();

        if let Some(prev_owner) = self.item_owner.get(&item).cloned() {
            if prev_owner != owner {
                self.owner_items.get_mut(&prev_owner).map(|s| s.remove(&item));
                touched.extend(self.clear_item_owner_edges(&item, &prev_owner));
            }
        }

        self.item_owner.insert(item.clone(), owner.clone());
        self.owner_items.entry(owner.clone()).or_default().insert(item.clone());

        if let Some(collection) = collection {
            self.item_collection.insert(item.clone(), collection.clone());
            self.collection_members.entry(collection).or_default().insert(item.clone());
        }

        for v in self.wanters_excluding_owner(&item, &owner) {
            if !self.is_suppressed(&owner, &v) && self.set_edge_item(&owner, &v, &item) {
                touched.insert(owner.clone());
                touched.insert(v);
            }
        }

        touched
    }

    /// Item `item` no longer has an owner (spec: `removeItemEdges`).
    pub fn remove_item_edges(&mut self, item: &ItemId) -> BTreeSet<OwnerId> {
        let Some(owner) = self.item_owner.remove(item) else {
            return BTreeSet::new();
        };
        if let Some(items) = self.owner_items.get_mut(&owner) {
            items.remove(item);
        }
        self.clear_item_owner_edges(item, &owner)
    }

    pub fn add_direct_want(&mut self, owner: OwnerId, item: ItemId) -> BTreeSet<OwnerId> {
        let mut touched = BTreeSet::new();
        let inserted = self.direct_wanters.entry(item.clone()).or_default().insert(owner.clone());
        if inserted {
            if let Some(current_owner) = self.item_owner.get(&item).cloned() {
                if current_owner != owner
                    && !self.is_suppressed(&current_owner, &owner)
                    && self.set_edge_item(&current_owner, &owner, &item)
                {
                    touched.insert(current_owner);
                    touched.insert(owner);
                }
            }
        }
        touched
    }

    pub fn remove_direct_want(&mut self, owner: &OwnerId, item: &ItemId) -> BTreeSet<OwnerId> {
        let mut touched = BTreeSet::new();
        let removed = self
            .direct_wanters
            .get_mut(item)
            .map(|s| s.remove(owner))
            .unwrap_or(false);
        if removed && !self.owner_wants_item(owner, item) {
            if let Some(current_owner) = self.item_owner.get(item).cloned() {
                if self.clear_edge_item(&current_owner, owner, item) {
                    touched.insert(current_owner);
                    touched.insert(owner.clone());
                }
            }
        }
        touched
    }

    pub fn add_collection_want(&mut self, owner: OwnerId, collection: CollectionId) -> BTreeSet<OwnerId> {
        let mut touched = BTreeSet::new();
        let inserted = self
            .collection_wanters
            .entry(collection.clone())
            .or_default()
            .insert(owner.clone());
        if inserted {
            let members = self.collection_members.get(&collection).cloned().unwrap_or_default();
            for item in members {
                if let Some(current_owner) = self.item_owner.get(&item).cloned() {
                    if current_owner != owner
                        && !self.is_suppressed(&current_owner, &owner)
                        && self.set_edge_item(&current_owner, &owner, &item)
                    {
                        touched.insert(current_owner);
                        touched.insert(owner.clone());
                    }
                }
            }
        }
        touched
    }

    pub fn remove_collection_want(&mut self, owner: &OwnerId, collection: &CollectionId) -> BTreeSet<OwnerId> {
        let mut touched = BTreeSet::new();
        let removed = self
            .collection_wanters
            .get_mut(collection)
            .map(|s| s.remove(owner))
            .unwrap_or(false);
        if removed {
            let members = self.collection_members.get(collection).cloned().unwrap_or_default();
            for item in members {
                if !self.owner_wants_item(owner, &item) {
                    if let Some(current_owner) = self.item_owner.get(&item).cloned() {
                        if self.clear_edge_item(&current_owner, owner, &item) {
                            touched.insert(current_owner);
                            touched.insert(owner.clone());
                        }
                    }
                }
            }
        }
        touched
    }

    /// `v` rejects `u`: all existing and future edges `u -> v` are hidden.
    pub fn suppress(&mut self, u: OwnerId, v: OwnerId) -> BTreeSet<OwnerId> {
        let mut touched = BTreeSet::new();
        if self.suppressed.insert((u.clone(), v.clone())) {
            if let Some(items) = self.out_edges.get(&u).and_then(|m| m.get(&v)).cloned() {
                for item in items {
                    if self.clear_edge_item(&u, &v, &item) {
                        touched.insert(u.clone());
                        touched.insert(v.clone());
                    }
                }
            }
        }
        touched
    }

    pub fn unsuppress(&mut self, u: &OwnerId, v: &OwnerId) -> BTreeSet<OwnerId> {
        let mut touched = BTreeSet::new();
        if self.suppressed.remove(&(u.clone(), v.clone())) {
            let owned_by_u = self.owner_items.get(u).cloned().unwrap_or_default();
            for item in owned_by_u {
                if self.owner_wants_item(v, &item) && self.set_edge_item(u, v, &item) {
                    touched.insert(u.clone());
                    touched.insert(v.clone());
                }
            }
        }
        touched
    }

    pub fn out_neighbors(&self, owner: &OwnerId) -> Vec<OwnerId> {
        self.out_edges
            .get(owner)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn in_neighbors(&self, owner: &OwnerId) -> Vec<OwnerId> {
        self.in_edges.get(owner).cloned().unwrap_or_default().into_iter().collect()
    }

    pub fn edge_items(&self, u: &OwnerId, v: &OwnerId) -> Option<&BTreeSet<ItemId>> {
        self.out_edges.get(u).and_then(|m| m.get(v))
    }

    pub fn owner_of(&self, item: &ItemId) -> Option<&OwnerId> {
        self.item_owner.get(item)
    }

    /// True if `owner` wants `item` directly (as opposed to only via a
    /// collection want on the item's collection).
    pub fn wants_directly(&self, owner: &OwnerId, item: &ItemId) -> bool {
        self.direct_wanters.get(item).is_some_and(|s| s.contains(owner))
    }

    /// All owners that currently participate in at least one edge, in
    /// lexicographic order (`BTreeSet` iteration order).
    pub fn all_owners(&self) -> BTreeSet<OwnerId> {
        let mut owners: BTreeSet<OwnerId> = self.out_edges.keys().cloned().collect();
        owners.extend(self.in_edges.keys().cloned());
        owners
    }

    /// Owners reachable from `seeds` by following edges in either direction,
    /// bounding the subgraph `CycleEngine` partitions into SCCs (spec §4.4 step 1).
    pub fn reachable_from(&self, seeds: &BTreeSet<OwnerId>) -> BTreeSet<OwnerId> {
        let mut visited: BTreeSet<OwnerId> = BTreeSet::new();
        let mut queue: VecDeque<OwnerId> = seeds.iter().cloned().collect();
        while let Some(owner) = queue.pop_front() {
            if !visited.insert(owner.clone()) {
                continue;
            }
            for next in self.out_neighbors(&owner) {
                if !visited.contains(&next) {
                    queue.push_back(next);
                }
            }
            for prev in self.in_neighbors(&owner) {
                if !visited.contains(&prev) {
                    queue.push_back(prev);
                }
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(s: &str) -> OwnerId {
        OwnerId::new(s)
    }
    fn item(s: &str) -> ItemId {
        ItemId::new(s)
    }

    #[test]
    fn direct_want_after_ownership_creates_edge() {
        let mut graph = GraphIndex::new();
        graph.add_item_edges(item("a"), owner("A"), None);
        let touched = graph.add_direct_want(owner("B"), item("a"));

        assert_eq!(touched, BTreeSet::from([owner("A"), owner("B")]));
        assert_eq!(graph.out_neighbors(&owner("A")), vec![owner("B")]);
        assert_eq!(graph.edge_items(&owner("A"), &owner("B")).unwrap().len(), 1);
    }

    #[test]
    fn ownership_after_want_creates_edge() {
        let mut graph = GraphIndex::new();
        graph.add_direct_want(owner("B"), item("a"));
        let touched = graph.add_item_edges(item("a"), owner("A"), None);

        assert_eq!(touched, BTreeSet::from([owner("A"), owner("B")]));
    }

    #[test]
    fn removing_inventory_clears_edge() {
        let mut graph = GraphIndex::new();
        graph.add_item_edges(item("a"), owner("A"), None);
        graph.add_direct_want(owner("B"), item("a"));

        let touched = graph.remove_item_edges(&item("a"));
        assert_eq!(touched, BTreeSet::from([owner("A"), owner("B")]));
        assert!(graph.out_neighbors(&owner("A")).is_empty());
    }

    #[test]
    fn collection_want_expands_to_members_excluding_owner() {
        let mut graph = GraphIndex::new();
        graph.add_item_edges(item("k1"), owner("A"), Some(CollectionId::new("K")));
        graph.add_item_edges(item("k2"), owner("B"), Some(CollectionId::new("K")));

        // B wants any item in K; must not create a self-edge B->B for k2.
        let touched = graph.add_collection_want(owner("B"), CollectionId::new("K"));
        assert_eq!(touched, BTreeSet::from([owner("A"), owner("B")]));
        assert_eq!(graph.out_neighbors(&owner("A")), vec![owner("B")]);
        assert!(graph.out_neighbors(&owner("B")).is_empty());
    }

    #[test]
    fn suppress_hides_existing_and_future_edges() {
        let mut graph = GraphIndex::new();
        graph.add_item_edges(item("a"), owner("A"), None);
        graph.add_direct_want(owner("B"), item("a"));

        graph.suppress(owner("A"), owner("B"));
        assert!(graph.out_neighbors(&owner("A")).is_empty());

        // New item from A to B while suppressed stays hidden.
        graph.add_item_edges(item("a2"), owner("A"), None);
        graph.add_direct_want(owner("B"), item("a2"));
        assert!(graph.out_neighbors(&owner("A")).is_empty());

        graph.unsuppress(&owner("A"), &owner("B"));
        assert_eq!(graph.edge_items(&owner("A"), &owner("B")).unwrap().len(), 2);
    }

    #[test]
    fn reachable_from_follows_both_directions() {
        let mut graph = GraphIndex::new();
        graph.add_item_edges(item("a"), owner("A"), None);
        graph.add_direct_want(owner("B"), item("a"));
        graph.add_item_edges(item("b"), owner("B"), None);
        graph.add_direct_want(owner("C"), item("b"));

        let reachable = graph.reachable_from(&BTreeSet::from([owner("B")]));
        assert_eq!(reachable, BTreeSet::from([owner("A"), owner("B"), owner("C")]));
    }
}
