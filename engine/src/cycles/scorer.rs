//! Trade loop scoring.
//!
//! The teacher's `CyclePriority` (`settlement/lsm/graph.rs`) orders
//! candidate settlement cycles by a fixed tie-break chain
//! (`ThroughputFirst`/`LiquidityFirst`). `CycleScorer` generalizes that idea
//! into a single weighted numeric score so cycles from unrelated parts of
//! the graph can be ranked against one another and truncated at
//! `maxCyclesPerRequest`.

use std::collections::BTreeMap;

use crate::config::ScoreWeights;
use crate::ids::ItemId;
use crate::models::CycleStep;

#[derive(Debug, Clone)]
pub struct CycleScorer {
    weights: ScoreWeights,
    length_penalty_alpha: f64,
    directness_decay: f64,
}

impl CycleScorer {
    pub fn new(weights: ScoreWeights, length_penalty_alpha: f64, directness_decay: f64) -> Self {
        Self {
            weights,
            length_penalty_alpha,
            directness_decay,
        }
    }

    /// Score a candidate cycle in `[0, 1]`. `item_values` supplies whatever
    /// value hints/price-source lookups were resolved for items in the
    /// cycle; items absent from the map contribute no value signal.
    pub fn score(&self, steps: &[CycleStep], item_values: &BTreeMap<ItemId, f64>) -> f64 {
        let length_component = self.length_component(steps.len());
        let directness_component = self.directness_component(steps);
        let fairness_component = self.fairness_component(steps, item_values);

        let total_weight = self.weights.fairness + self.weights.length + self.weights.directness;
        if total_weight <= 0.0 {
            return 0.0;
        }

        let weighted = self.weights.fairness * fairness_component
            + self.weights.length * length_component
            + self.weights.directness * directness_component;
        (weighted / total_weight).clamp(0.0, 1.0)
    }

    /// Shorter cycles are easier to execute atomically; penalize harmonically
    /// from length 2 (the minimum possible cycle).
    fn length_component(&self, length: usize) -> f64 {
        let length = length as f64;
        1.0 / (1.0 + self.length_penalty_alpha * (length - 2.0).max(0.0))
    }

    /// Penalize steps only satisfiable via a collection want: a direct want
    /// is a stronger trade signal than "any item in this collection".
    fn directness_component(&self, steps: &[CycleStep]) -> f64 {
        let collection_steps = steps.iter().filter(|step| step.collection_trade).count() as f64;
        (-self.directness_decay * collection_steps).exp()
    }

    /// Ratio of the cheapest step's value to the most expensive step's
    /// value — a cycle where one party hands over far more value than it
    /// receives is a worse trade for that party even though it is still a
    /// valid cycle. A step with no resolved value hint for any of its items
    /// is treated as neutral (value `1.0`).
    fn fairness_component(&self, steps: &[CycleStep], item_values: &BTreeMap<ItemId, f64>) -> f64 {
        let step_values: Vec<f64> = steps
            .iter()
            .map(|step| {
                let mut any_hint = false;
                let sum = step
                    .items
                    .iter()
                    .filter_map(|item| item_values.get(item))
                    .inspect(|_| any_hint = true)
                    .sum::<f64>();
                if any_hint {
                    sum
                } else {
                    1.0
                }
            })
            .collect();

        let min = step_values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = step_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max.abs() < f64::EPSILON {
            return 1.0;
        }
        (min / max).clamp(0.0, 1.0)
    }
}
