//! Indexed storage for discovered trade loops.
//!
//! Mirrors the teacher's `EventLog` secondary-index pattern
//! (`models/event.rs`): one authoritative map keyed by the natural id
//! (`signature` here, `tx_id` there), plus owner/item indices kept in sync
//! on every mutation so queries never scan the full set.

use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{ItemId, OwnerId};
use crate::models::{CycleSignature, CycleStatus, TradeLoop};

#[derive(Debug, Default)]
pub struct CycleStore {
    by_signature: BTreeMap<CycleSignature, TradeLoop>,
    by_owner: BTreeMap<OwnerId, BTreeSet<CycleSignature>>,
    by_item: BTreeMap<ItemId, BTreeSet<CycleSignature>>,
}

impl CycleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_signature.is_empty()
    }

    pub fn get(&self, signature: &CycleSignature) -> Option<&TradeLoop> {
        self.by_signature.get(signature)
    }

    pub fn all(&self) -> impl Iterator<Item = &TradeLoop> {
        self.by_signature.values()
    }

    pub fn cycles_by_owner(&self, owner: &OwnerId) -> Vec<&TradeLoop> {
        self.by_owner
            .get(owner)
            .into_iter()
            .flatten()
            .filter_map(|sig| self.by_signature.get(sig))
            .collect()
    }

    /// Insert a newly discovered cycle, or refresh an already-known one.
    /// Returns `true` if this signature is new to the store.
    pub fn upsert(&mut self, candidate: TradeLoop, now: u64) -> bool {
        if let Some(existing) = self.by_signature.get_mut(&candidate.signature) {
            existing.last_seen = now;
            existing.status = CycleStatus::Active;
            if candidate.score > existing.score {
                existing.score = candidate.score;
                existing.steps = candidate.steps;
            }
            return false;
        }

        for owner in candidate.owners() {
            self.by_owner.entry(owner.clone()).or_default().insert(candidate.signature.clone());
        }
        for item in candidate.items() {
            self.by_item.entry(item.clone()).or_default().insert(candidate.signature.clone());
        }
        self.by_signature.insert(candidate.signature.clone(), candidate);
        true
    }

    pub fn remove(&mut self, signature: &CycleSignature) -> Option<TradeLoop> {
        let cycle = self.by_signature.remove(signature)?;
        for owner in cycle.owners() {
            if let Some(sigs) = self.by_owner.get_mut(owner) {
                sigs.remove(signature);
                if sigs.is_empty() {
                    self.by_owner.remove(owner);
                }
            }
        }
        for item in cycle.items() {
            if let Some(sigs) = self.by_item.get_mut(item) {
                sigs.remove(signature);
                if sigs.is_empty() {
                    self.by_item.remove(item);
                }
            }
        }
        Some(cycle)
    }

    /// Remove every stored cycle touching `owner` — called when that
    /// owner's ownership or wants change in a way that can invalidate
    /// cycles it participates in (spec §4.6, ownership-change eviction).
    pub fn evict_for_owner(&mut self, owner: &OwnerId) -> Vec<CycleSignature> {
        let signatures: Vec<CycleSignature> = self.by_owner.get(owner).cloned().unwrap_or_default().into_iter().collect();
        for sig in &signatures {
            self.remove(sig);
        }
        signatures
    }

    pub fn evict_for_item(&mut self, item: &ItemId) -> Vec<CycleSignature> {
        let signatures: Vec<CycleSignature> = self.by_item.get(item).cloned().unwrap_or_default().into_iter().collect();
        for sig in &signatures {
            self.remove(sig);
        }
        signatures
    }

    pub fn evict_rejected(&mut self, signature: &CycleSignature) -> Option<TradeLoop> {
        self.remove(signature)
    }

    /// Remove cycles not observed within `ttl_ms` of `now` (spec §4.6,
    /// `cycleTtl`). Returns the signatures removed.
    pub fn evict_expired(&mut self, now: u64, ttl_ms: u64) -> Vec<CycleSignature> {
        let expired: Vec<CycleSignature> = self
            .by_signature
            .iter()
            .filter(|(_, cycle)| now.saturating_sub(cycle.last_seen) > ttl_ms)
            .map(|(sig, _)| sig.clone())
            .collect();
        for sig in &expired {
            self.remove(sig);
        }
        expired
    }

    /// Evict down to `max_cycles_stored`, dropping the lowest-scored
    /// entries first (spec §4.2's `maxCyclesStored` capacity bound).
    pub fn enforce_capacity(&mut self, max_cycles_stored: usize) -> Vec<CycleSignature> {
        if self.by_signature.len() <= max_cycles_stored {
            return Vec::new();
        }
        let mut ranked: Vec<(f64, CycleSignature)> = self
            .by_signature
            .iter()
            .map(|(sig, cycle)| (cycle.score, sig.clone()))
            .collect();
        ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let overflow = self.by_signature.len() - max_cycles_stored;
        let victims: Vec<CycleSignature> = ranked.into_iter().take(overflow).map(|(_, sig)| sig).collect();
        for sig in &victims {
            self.remove(sig);
        }
        victims
    }
}
