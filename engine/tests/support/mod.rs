//! Shared no-op adapter implementations for integration tests.
//!
//! The crate's own `#[cfg(test)]` test doubles in `adapters::test_support`
//! are only visible to the crate's unit tests, not to these external
//! integration test binaries, so this module re-implements the same
//! no-op shapes against the public trait surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use trade_loop_engine_core::adapters::{
    Adapters, Clock, EventSink, EventSummary, MetadataSource, PersistedEvent, Persistence, PriceSource, TenantSnapshot,
};
use trade_loop_engine_core::{CollectionId, ItemId, TenantId};

struct NoopMetadataSource;

#[async_trait]
impl MetadataSource for NoopMetadataSource {
    async fn collection_members(&self, _collection_id: &CollectionId) -> Option<Vec<ItemId>> {
        None
    }
}

struct NoopPriceSource;

#[async_trait]
impl PriceSource for NoopPriceSource {
    async fn value_hint(&self, _item_id: &ItemId) -> Option<f64> {
        None
    }
}

struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn on_event_committed(&self, _summary: EventSummary) {}
    async fn on_cycle_discovered(&self, _tenant_id: &TenantId, _cycle: &trade_loop_engine_core::models::TradeLoop) {}
}

pub struct TestClock(AtomicU64);

impl Clock for TestClock {
    fn now_millis(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct NoopPersistence;

#[async_trait]
impl Persistence for NoopPersistence {
    async fn append_event(&self, _tenant_id: &TenantId, _event: PersistedEvent) {}
    async fn write_snapshot(&self, _tenant_id: &TenantId, _snapshot: TenantSnapshot) {}
    async fn load_latest_snapshot(&self, _tenant_id: &TenantId) -> Option<TenantSnapshot> {
        None
    }
    async fn events_since(&self, _tenant_id: &TenantId, _seq: u64) -> Vec<PersistedEvent> {
        Vec::new()
    }
}

#[allow(dead_code)]
pub fn noop_adapters() -> Adapters {
    Adapters {
        metadata: Arc::new(NoopMetadataSource),
        price: Arc::new(NoopPriceSource),
        event_sink: Arc::new(NoopEventSink),
        clock: Arc::new(TestClock(AtomicU64::new(0))),
        persistence: Arc::new(NoopPersistence),
    }
}
