//! External collaborator interfaces.
//!
//! Everything in §1's "explicitly out of scope" list — metadata/price
//! lookups, persistence, notification — is expressed as a trait the engine
//! depends on but never implements a real backend for, the re-architecture
//! note in spec §9 ("singletons / ambient services... re-express as
//! explicit interfaces passed in at construction").

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ids::{CollectionId, ItemId, OwnerId, TenantId};
use crate::models::TradeLoop;

/// Looks up item/collection metadata the engine itself does not store.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn collection_members(&self, collection_id: &CollectionId) -> Option<Vec<ItemId>>;
}

/// Looks up price signals used as a fallback when an item's `value_hint`
/// was not supplied directly.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn value_hint(&self, item_id: &ItemId) -> Option<f64>;
}

/// Summary emitted after each event commits (spec §4.7 step 6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub event_id: uuid::Uuid,
    pub tenant_id: TenantId,
    pub cycles_discovered: usize,
    pub cycles_evicted: usize,
    pub elapsed_ms: u64,
    pub budget_exceeded: bool,
}

/// Notification sink for event summaries and newly discovered cycles.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_event_committed(&self, summary: EventSummary);
    async fn on_cycle_discovered(&self, tenant_id: &TenantId, cycle: &TradeLoop);
}

/// Source of "now", injected so tests can control TTL expiry deterministically.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall-clock implementation of [`Clock`] for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Append-only event log entry persisted behind the [`Persistence`] adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEvent {
    pub seq: u64,
    pub ts: u64,
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Periodic snapshot of a tenant's authoritative state, used for recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSnapshot {
    pub seq: u64,
    pub owners: BTreeMap<OwnerId, crate::models::OwnerRecord>,
    pub ownership: BTreeMap<ItemId, OwnerId>,
    pub collection_members: BTreeMap<CollectionId, Vec<ItemId>>,
    pub rejections: BTreeMap<OwnerId, RejectionSnapshot>,
    pub cycles: Vec<TradeLoop>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectionSnapshot {
    pub owners: Vec<OwnerId>,
    pub cycles: Vec<String>,
}

/// Optional durability behind the `enablePersistence` tenant config flag.
///
/// The engine is functionally identical with or without persistence: a
/// no-op implementation is a legal adapter.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn append_event(&self, tenant_id: &TenantId, event: PersistedEvent);
    async fn write_snapshot(&self, tenant_id: &TenantId, snapshot: TenantSnapshot);
    async fn load_latest_snapshot(&self, tenant_id: &TenantId) -> Option<TenantSnapshot>;
    async fn events_since(&self, tenant_id: &TenantId, seq: u64) -> Vec<PersistedEvent>;
}

/// Bundle of adapters a `TenantHandle` is constructed with.
#[derive(Clone)]
pub struct Adapters {
    pub metadata: Arc<dyn MetadataSource>,
    pub price: Arc<dyn PriceSource>,
    pub event_sink: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
    pub persistence: Arc<dyn Persistence>,
}

/// In-process reference [`Persistence`]: keeps the latest snapshot per
/// tenant in memory and never actually appends events to durable storage.
/// Loses all state across process restarts; useful for tests and for hosts
/// that don't need `enablePersistence` recovery across a restart.
#[derive(Default)]
pub struct InMemoryPersistence {
    snapshots: std::sync::Mutex<BTreeMap<TenantId, TenantSnapshot>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn append_event(&self, _tenant_id: &TenantId, _event: PersistedEvent) {}

    async fn write_snapshot(&self, tenant_id: &TenantId, snapshot: TenantSnapshot) {
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner()).insert(tenant_id.clone(), snapshot);
    }

    async fn load_latest_snapshot(&self, tenant_id: &TenantId) -> Option<TenantSnapshot> {
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner()).get(tenant_id).cloned()
    }

    async fn events_since(&self, _tenant_id: &TenantId, _seq: u64) -> Vec<PersistedEvent> {
        Vec::new()
    }
}

/// Append-only file-backed [`Persistence`], grounded on the teacher's
/// `orchestrator/checkpoint.rs` snapshot/restore pattern: one JSON snapshot
/// file per tenant plus a JSON-lines event log alongside it.
pub struct FilePersistence {
    dir: std::path::PathBuf,
}

impl FilePersistence {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn snapshot_path(&self, tenant_id: &TenantId) -> std::path::PathBuf {
        self.dir.join(format!("{}.snapshot.json", tenant_id.as_str()))
    }

    fn log_path(&self, tenant_id: &TenantId) -> std::path::PathBuf {
        self.dir.join(format!("{}.log.jsonl", tenant_id.as_str()))
    }
}

#[async_trait]
impl Persistence for FilePersistence {
    async fn append_event(&self, tenant_id: &TenantId, event: PersistedEvent) {
        use std::io::Write;

        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!(tenant = %tenant_id, %err, "failed to create persistence directory");
            return;
        }
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(tenant = %tenant_id, %err, "failed to serialize event");
                return;
            }
        };
        let path = self.log_path(tenant_id);
        match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
            Ok(mut file) => {
                if let Err(err) = writeln!(file, "{line}") {
                    tracing::warn!(tenant = %tenant_id, %err, "failed to append event");
                }
            }
            Err(err) => tracing::warn!(tenant = %tenant_id, %err, "failed to open event log"),
        }
    }

    async fn write_snapshot(&self, tenant_id: &TenantId, snapshot: TenantSnapshot) {
        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!(tenant = %tenant_id, %err, "failed to create persistence directory");
            return;
        }
        let path = self.snapshot_path(tenant_id);
        let tmp_path = path.with_extension("json.tmp");
        match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => {
                if let Err(err) = std::fs::write(&tmp_path, &bytes).and_then(|_| std::fs::rename(&tmp_path, &path)) {
                    tracing::warn!(tenant = %tenant_id, %err, "failed to write snapshot");
                }
            }
            Err(err) => tracing::warn!(tenant = %tenant_id, %err, "failed to serialize snapshot"),
        }
    }

    async fn load_latest_snapshot(&self, tenant_id: &TenantId) -> Option<TenantSnapshot> {
        let bytes = std::fs::read(self.snapshot_path(tenant_id)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn events_since(&self, tenant_id: &TenantId, seq: u64) -> Vec<PersistedEvent> {
        let Ok(contents) = std::fs::read_to_string(self.log_path(tenant_id)) else {
            return Vec::new();
        };
        contents
            .lines()
            .filter_map(|line| serde_json::from_str::<PersistedEvent>(line).ok())
            .filter(|event| event.seq > seq)
            .collect()
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct NoopMetadataSource;

    #[async_trait]
    impl MetadataSource for NoopMetadataSource {
        async fn collection_members(&self, _collection_id: &CollectionId) -> Option<Vec<ItemId>> {
            None
        }
    }

    #[derive(Default)]
    pub struct NoopPriceSource;

    #[async_trait]
    impl PriceSource for NoopPriceSource {
        async fn value_hint(&self, _item_id: &ItemId) -> Option<f64> {
            None
        }
    }

    #[derive(Default)]
    pub struct RecordingEventSink {
        pub summaries: Mutex<Vec<EventSummary>>,
    }

    #[async_trait]
    impl EventSink for RecordingEventSink {
        async fn on_event_committed(&self, summary: EventSummary) {
            self.summaries.lock().await.push(summary);
        }

        async fn on_cycle_discovered(&self, _tenant_id: &TenantId, _cycle: &TradeLoop) {}
    }

    /// Deterministic clock a test can advance manually.
    pub struct FixedClock(pub std::sync::atomic::AtomicU64);

    impl Clock for FixedClock {
        fn now_millis(&self) -> u64 {
            self.0.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    pub struct NoopPersistence;

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

    pub fn noop_adapters() -> Adapters {
        Adapters {
            metadata: Arc::new(NoopMetadataSource),
            price: Arc::new(NoopPriceSource),
            event_sink: Arc::new(RecordingEventSink::default()),
            clock: Arc::new(FixedClock(std::sync::atomic::AtomicU64::new(0))),
            persistence: Arc::new(NoopPersistence),
        }
    }
}
