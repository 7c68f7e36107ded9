//! Multi-tenant, multi-party NFT barter matching engine.
//!
//! # Architecture
//!
//! - **ids**: Opaque newtype identifiers (tenant, owner, item, collection)
//! - **models**: Domain types (`Item`, `OwnerRecord`, `TradeLoop`)
//! - **graph**: Incrementally-patched derived wants-graph per tenant
//! - **tenant**: Authoritative per-tenant state and the cross-tenant registry
//! - **cycles**: Elementary-cycle discovery, scoring, and storage
//! - **coordinator**: Per-tenant single-writer event loop
//! - **integrity**: Centralized invariant checks over tenant + cycle state
//! - **adapters**: External collaborator interfaces (metadata, price, events, persistence)
//! - **api**: The engine's external surface
//!
//! # Critical invariants
//!
//! 1. All cross-tenant/owner/item iteration happens in a deterministic
//!    (lexicographic) order — see [`ids`] and [`graph::GraphIndex`].
//! 2. Every external operation returns a typed [`error::EngineError`];
//!    nothing internal ever panics across this boundary.
//! 3. Each tenant has exactly one writer task (`coordinator`); mutations
//!    never race within a tenant.

pub mod adapters;
pub mod api;
pub mod config;
pub mod coordinator;
pub mod cycles;
pub mod error;
pub mod graph;
pub mod ids;
pub mod integrity;
pub mod models;
pub mod tenant;

pub use api::Engine;
pub use error::EngineError;
pub use ids::{CollectionId, ItemId, OwnerId, TenantId};
