//! Per-tenant configuration.
//!
//! Configuration arrives as a plain constructed struct, the same way the
//! teacher's `OrchestratorConfig`/`AgentConfig` do — no config-file
//! framework, just `Default` impls a caller can override field by field.

use serde::{Deserialize, Serialize};

/// Wall-clock / node / cycle limits enforced during one enumeration pass.
///
/// Whichever limit trips first ends the pass. Exceeding a budget is not an
/// error — it yields a partial, monotone result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnumerationBudget {
    /// Wall-clock budget for a single enumeration pass.
    pub time_ms: u64,
    /// Maximum DFS nodes visited.
    pub nodes: u64,
    /// Maximum cycles emitted.
    pub cycles: u64,
}

impl Default for EnumerationBudget {
    fn default() -> Self {
        Self {
            time_ms: 250,
            nodes: 200_000,
            cycles: 10_000,
        }
    }
}

/// Weights for [`crate::cycles::scorer::CycleScorer`]'s linear combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub fairness: f64,
    pub length: f64,
    pub directness: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            fairness: 1.0,
            length: 1.0,
            directness: 1.0,
        }
    }
}

/// Fixed set of per-tenant options (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Maximum number of owners in one elementary cycle (k in spec's Cycle invariant).
    pub max_cycle_length: usize,
    /// Maximum item combinations expanded per simple cycle (parallel-edge bound).
    pub max_item_combos: usize,
    /// Maximum cycles returned from a single `queryCycles` call.
    pub max_cycles_per_request: usize,
    /// Cycles scoring below this threshold are not stored.
    pub min_cycle_score: f64,
    /// Time-to-live for an active cycle since it was last confirmed seen.
    pub cycle_ttl: std::time::Duration,
    pub enumeration_budget: EnumerationBudget,
    pub score_weights: ScoreWeights,
    /// Length-penalty decay rate (`1 / (1 + alpha * (k - 2))`).
    pub length_penalty_alpha: f64,
    /// Per-collection-only-edge directness decay.
    pub directness_decay: f64,
    pub enable_persistence: bool,
    /// Hard cap on distinct owners tracked by one tenant.
    pub max_owners: usize,
    /// Hard cap on distinct items tracked by one tenant.
    pub max_items: usize,
    /// Hard cap on cycles retained in the store.
    pub max_cycles_stored: usize,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            max_cycle_length: 11,
            max_item_combos: 4,
            max_cycles_per_request: 100,
            min_cycle_score: 0.0,
            cycle_ttl: std::time::Duration::from_secs(24 * 60 * 60),
            enumeration_budget: EnumerationBudget::default(),
            score_weights: ScoreWeights::default(),
            length_penalty_alpha: 0.15,
            directness_decay: 0.1,
            enable_persistence: false,
            max_owners: 100_000,
            max_items: 1_000_000,
            max_cycles_stored: 50_000,
        }
    }
}

impl TenantConfig {
    /// Validate the fixed invariants from spec §4.1 (`maxCycleLength ≥ 2`, …).
    pub fn validate(&self) -> Result<(), String> {
        if self.max_cycle_length < 2 {
            return Err("max_cycle_length must be >= 2".to_string());
        }
        if self.max_cycles_per_request < 1 {
            return Err("max_cycles_per_request must be >= 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_cycle_score) {
            return Err("min_cycle_score must be in [0,1]".to_string());
        }
        Ok(())
    }
}
