//! Trade loop (cycle) model and its canonical signature.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::ids::{ItemId, OwnerId};

/// One hop of a trade loop: owner `from` hands `items` to owner `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleStep {
    pub from: OwnerId,
    pub to: OwnerId,
    pub items: Vec<ItemId>,
    /// True if this step's edge is satisfied only via a collection want,
    /// never a direct want (spec §4.4 step 4).
    pub collection_trade: bool,
}

/// Lifecycle state of a stored cycle (spec §3, Lifecycles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleStatus {
    Active,
    Stale,
    Rejected,
}

/// Canonical identifier used for deduplication.
///
/// Computed as the SHA-256 hash (hex-encoded) of the lexicographically
/// minimal rotation of `"owner:sorted(items)"` per step, concatenated.
/// Two discovered cycles with equal signatures are the same cycle,
/// regardless of which owner's step the enumeration happened to start at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CycleSignature(String);

impl CycleSignature {
    /// Compute the canonical signature for an ordered cycle of steps.
    ///
    /// `steps` must already be in cycle order (`steps[i].to == steps[i+1].from`,
    /// wrapping around); this function itself does not validate that — callers
    /// in `cycles::engine` and `integrity` are responsible for well-formed input.
    pub fn compute(steps: &[CycleStep]) -> Self {
        let entries: Vec<String> = steps
            .iter()
            .map(|step| {
                let mut items: Vec<&str> = step.items.iter().map(ItemId::as_str).collect();
                items.sort_unstable();
                format!("{}:{}", step.from.as_str(), items.join(","))
            })
            .collect();

        let canonical = Self::minimal_rotation(&entries).join("|");

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Cycle lengths are bounded by `maxCycleLength` (≤ 11), so a brute-force
    /// scan over all rotations is simpler and just as fast as Booth's algorithm
    /// at this scale.
    fn minimal_rotation(entries: &[String]) -> Vec<String> {
        let n = entries.len();
        if n == 0 {
            return Vec::new();
        }
        (0..n)
            .map(|start| -> Vec<String> { (0..n).map(|i| entries[(start + i) % n].clone()).collect() })
            .min()
            .unwrap()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CycleSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered elementary cycle satisfying want constraints on every edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLoop {
    pub signature: CycleSignature,
    pub steps: Vec<CycleStep>,
    pub score: f64,
    pub status: CycleStatus,
    pub discovered_at: u64,
    pub last_seen: u64,
}

impl TradeLoop {
    pub fn new(steps: Vec<CycleStep>, score: f64, now: u64) -> Self {
        let signature = CycleSignature::compute(&steps);
        Self {
            signature,
            steps,
            score,
            status: CycleStatus::Active,
            discovered_at: now,
            last_seen: now,
        }
    }

    pub fn length(&self) -> usize {
        self.steps.len()
    }

    pub fn collection_trade(&self) -> bool {
        self.steps.iter().any(|step| step.collection_trade)
    }

    pub fn owners(&self) -> impl Iterator<Item = &OwnerId> {
        self.steps.iter().map(|step| &step.from)
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemId> {
        self.steps.iter().flat_map(|step| step.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(from: &str, to: &str, items: &[&str]) -> CycleStep {
        CycleStep {
            from: OwnerId::new(from),
            to: OwnerId::new(to),
            items: items.iter().map(|i| ItemId::new(*i)).collect(),
            collection_trade: false,
        }
    }

    #[test]
    fn signature_is_rotation_invariant() {
        let abc = vec![step("A", "B", &["a"]), step("B", "C", &["b"]), step("C", "A", &["c"])];
        let bca = vec![step("B", "C", &["b"]), step("C", "A", &["c"]), step("A", "B", &["a"])];

        assert_eq!(CycleSignature::compute(&abc), CycleSignature::compute(&bca));
    }

    #[test]
    fn signature_distinguishes_different_item_sets() {
        let a = vec![step("A", "B", &["a"]), step("B", "A", &["b"])];
        let b = vec![step("A", "B", &["a2"]), step("B", "A", &["b"])];

        assert_ne!(CycleSignature::compute(&a), CycleSignature::compute(&b));
    }

    #[test]
    fn collection_trade_reports_true_if_any_step_flagged() {
        let mut steps = vec![step("A", "B", &["a"]), step("B", "A", &["b"])];
        steps[1].collection_trade = true;
        let loop_ = TradeLoop::new(steps, 0.5, 0);
        assert!(loop_.collection_trade());
    }
}
