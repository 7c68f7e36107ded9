//! Authoritative per-tenant inventory/want/rejection state.
//!
//! `TenantState` owns the same data the teacher's `SimulationState`
//! (`models/state.rs`) owns for agents — `BTreeMap`-keyed records mutated
//! only through narrow, validated methods — plus the derived [`GraphIndex`]
//! it keeps incrementally in sync so callers never rebuild the graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::adapters::TenantSnapshot;
use crate::error::StateError;
use crate::graph::GraphIndex;
use crate::ids::{CollectionId, ItemId, OwnerId};
use crate::models::{CycleSignature, OwnerRecord, TradeLoop};

#[derive(Debug, Clone, Default)]
pub struct RejectionRecord {
    pub rejected_owners: BTreeSet<OwnerId>,
    pub rejected_cycles: BTreeSet<CycleSignature>,
}

#[derive(Debug, Default)]
pub struct TenantState {
    owners: BTreeMap<OwnerId, OwnerRecord>,
    ownership: BTreeMap<ItemId, OwnerId>,
    item_collection: BTreeMap<ItemId, CollectionId>,
    collection_members: BTreeMap<CollectionId, BTreeSet<ItemId>>,
    item_value_hints: BTreeMap<ItemId, f64>,
    rejections: BTreeMap<OwnerId, RejectionRecord>,
    graph: GraphIndex,
}

impl TenantState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &GraphIndex {
        &self.graph
    }

    pub fn owner_record(&self, owner: &OwnerId) -> Option<&OwnerRecord> {
        self.owners.get(owner)
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    pub fn item_count(&self) -> usize {
        self.ownership.len()
    }

    /// Total direct-item plus collection wants across every owner.
    pub fn want_count(&self) -> usize {
        self.owners.values().map(|record| record.wanted_items.len() + record.wanted_collections.len()).sum()
    }

    pub fn owners_iter(&self) -> impl Iterator<Item = (&OwnerId, &OwnerRecord)> {
        self.owners.iter()
    }

    pub fn owner_of(&self, item: &ItemId) -> Option<&OwnerId> {
        self.ownership.get(item)
    }

    pub fn collection_members(&self, collection: &CollectionId) -> Option<&BTreeSet<ItemId>> {
        self.collection_members.get(collection)
    }

    pub fn item_value_hint(&self, item: &ItemId) -> Option<f64> {
        self.item_value_hints.get(item).copied()
    }

    /// Register a fresh item under `owner`. Re-registering the same item
    /// under the same owner is an idempotent no-op; registering an item
    /// already owned by someone else is an `OwnershipConflict` — use
    /// [`TenantState::transfer_ownership`] for an explicit hand-off.
    pub fn add_inventory(
        &mut self,
        owner: OwnerId,
        item: ItemId,
        collection: Option<CollectionId>,
        value_hint: Option<f64>,
    ) -> Result<BTreeSet<OwnerId>, StateError> {
        if let Some(current) = self.ownership.get(&item) {
            if current != &owner {
                return Err(StateError::OwnershipConflict {
                    item,
                    current_owner: current.clone(),
                    attempted_owner: owner,
                });
            }
            return Ok(BTreeSet::new());
        }

        self.ownership.insert(item.clone(), owner.clone());
        if let Some(collection) = collection.clone() {
            self.item_collection.insert(item.clone(), collection.clone());
            self.collection_members.entry(collection).or_default().insert(item.clone());
        }
        if let Some(value_hint) = value_hint {
            self.item_value_hints.insert(item.clone(), value_hint);
        }
        self.owners
            .entry(owner.clone())
            .or_insert_with(OwnerRecord::new)
            .owned_items
            .insert(item.clone());

        Ok(self.graph.add_item_edges(item, owner, collection))
    }

    pub fn transfer_ownership(&mut self, item: ItemId, new_owner: OwnerId) -> Result<BTreeSet<OwnerId>, StateError> {
        let old_owner = self
            .ownership
            .get(&item)
            .cloned()
            .ok_or_else(|| StateError::UnknownItem(item.clone()))?;
        if old_owner == new_owner {
            return Ok(BTreeSet::new());
        }

        if let Some(record) = self.owners.get_mut(&old_owner) {
            record.owned_items.remove(&item);
        }
        self.ownership.insert(item.clone(), new_owner.clone());
        self.owners
            .entry(new_owner.clone())
            .or_insert_with(OwnerRecord::new)
            .owned_items
            .insert(item.clone());

        let collection = self.item_collection.get(&item).cloned();
        Ok(self.graph.add_item_edges(item, new_owner, collection))
    }

    pub fn remove_inventory(&mut self, item: &ItemId) -> Result<BTreeSet<OwnerId>, StateError> {
        let owner = self
            .ownership
            .remove(item)
            .ok_or_else(|| StateError::UnknownItem(item.clone()))?;
        if let Some(record) = self.owners.get_mut(&owner) {
            record.owned_items.remove(item);
        }
        self.item_value_hints.remove(item);
        Ok(self.graph.remove_item_edges(item))
    }

    pub fn add_want(&mut self, owner: OwnerId, item: ItemId) -> Result<BTreeSet<OwnerId>, StateError> {
        if self.ownership.get(&item) == Some(&owner) {
            return Err(StateError::SelfWantRejected { owner, item });
        }
        self.owners
            .entry(owner.clone())
            .or_insert_with(OwnerRecord::new)
            .wanted_items
            .insert(item.clone());
        Ok(self.graph.add_direct_want(owner, item))
    }

    pub fn remove_want(&mut self, owner: &OwnerId, item: &ItemId) -> BTreeSet<OwnerId> {
        if let Some(record) = self.owners.get_mut(owner) {
            record.wanted_items.remove(item);
        }
        self.graph.remove_direct_want(owner, item)
    }

    pub fn add_collection_want(&mut self, owner: OwnerId, collection: CollectionId) -> BTreeSet<OwnerId> {
        self.owners
            .entry(owner.clone())
            .or_insert_with(OwnerRecord::new)
            .wanted_collections
            .insert(collection.clone());
        self.graph.add_collection_want(owner, collection)
    }

    pub fn remove_collection_want(&mut self, owner: &OwnerId, collection: &CollectionId) -> BTreeSet<OwnerId> {
        if let Some(record) = self.owners.get_mut(owner) {
            record.wanted_collections.remove(collection);
        }
        self.graph.remove_collection_want(owner, collection)
    }

    /// `rejecting_owner` refuses any future or existing trade that would
    /// hand it an item directly from `rejected_owner`.
    pub fn record_owner_rejection(&mut self, rejecting_owner: OwnerId, rejected_owner: OwnerId) -> BTreeSet<OwnerId> {
        self.rejections
            .entry(rejecting_owner.clone())
            .or_default()
            .rejected_owners
            .insert(rejected_owner.clone());
        self.graph.suppress(rejected_owner, rejecting_owner)
    }

    pub fn clear_owner_rejection(&mut self, rejecting_owner: &OwnerId, rejected_owner: &OwnerId) -> BTreeSet<OwnerId> {
        if let Some(record) = self.rejections.get_mut(rejecting_owner) {
            record.rejected_owners.remove(rejected_owner);
        }
        self.graph.unsuppress(rejected_owner, rejecting_owner)
    }

    pub fn record_cycle_rejection(&mut self, owner: OwnerId, signature: CycleSignature) {
        self.rejections.entry(owner).or_default().rejected_cycles.insert(signature);
    }

    /// A cycle is rejected if any one of its participant owners has
    /// individually rejected that exact signature (spec §4.6).
    pub fn cycle_rejected_by_any<'a>(&self, owners: impl Iterator<Item = &'a OwnerId>, signature: &CycleSignature) -> bool {
        owners.into_iter().any(|owner| {
            self.rejections
                .get(owner)
                .is_some_and(|record| record.rejected_cycles.contains(signature))
        })
    }

    pub fn to_snapshot(&self, seq: u64, cycles: Vec<TradeLoop>) -> TenantSnapshot {
        TenantSnapshot {
            seq,
            owners: self.owners.clone(),
            ownership: self.ownership.clone(),
            collection_members: self
                .collection_members
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
                .collect(),
            rejections: self
                .rejections
                .iter()
                .map(|(owner, record)| {
                    (
                        owner.clone(),
                        crate::adapters::RejectionSnapshot {
                            owners: record.rejected_owners.iter().cloned().collect(),
                            cycles: record.rejected_cycles.iter().map(|s| s.as_str().to_string()).collect(),
                        },
                    )
                })
                .collect(),
            cycles,
        }
    }

    /// Rebuild full state (including the derived graph) from a persisted
    /// snapshot, replaying registrations in deterministic owner/item order.
    pub fn restore_from_snapshot(snapshot: TenantSnapshot) -> Self {
        let mut state = Self::new();

        let mut item_collection: BTreeMap<ItemId, CollectionId> = BTreeMap::new();
        for (collection, items) in &snapshot.collection_members {
            for item in items {
                item_collection.insert(item.clone(), collection.clone());
            }
        }

        for (item, owner) in &snapshot.ownership {
            let collection = item_collection.get(item).cloned();
            let _ = state.add_inventory(owner.clone(), item.clone(), collection, None);
        }
        for (owner, record) in &snapshot.owners {
            for item in &record.wanted_items {
                let _ = state.add_want(owner.clone(), item.clone());
            }
            for collection in &record.wanted_collections {
                state.add_collection_want(owner.clone(), collection.clone());
            }
        }
        for (rejecting_owner, rejection) in &snapshot.rejections {
            for rejected_owner in &rejection.owners {
                state.record_owner_rejection(rejecting_owner.clone(), rejected_owner.clone());
            }
        }

        state.owners = snapshot.owners;
        state.ownership = snapshot.ownership;
        state.collection_members = snapshot
            .collection_members
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect();
        state.item_collection = item_collection;
        state
    }
}
