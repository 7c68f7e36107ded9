//! Derived wants-graph over owners within a single tenant.

pub mod index;

pub use index::GraphIndex;
