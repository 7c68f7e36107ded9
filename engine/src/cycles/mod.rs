//! Trade-loop discovery, scoring, and storage.

pub mod engine;
pub mod scorer;
pub mod store;

pub use engine::{CycleEngine, DiscoveryResult};
pub use scorer::CycleScorer;
pub use store::CycleStore;
