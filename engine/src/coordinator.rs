//! Per-tenant single-writer event loop.
//!
//! Every mutation to a tenant's state is funneled through one `tokio` task
//! via an `mpsc` channel — the generalization of the teacher's
//! `Orchestrator::tick` (`orchestrator/engine.rs`), which is likewise the
//! sole mutator of `SimulationState`, except here each tenant gets its own
//! task instead of one global tick loop. `CycleStore` is kept behind a
//! `RwLock` so `queryCycles` reads never wait on the write path (spec §9
//! Open Question: resolved as a read-only store — the coordinator is the
//! only thing that ever triggers enumeration).

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapters::{Adapters, EventSummary};
use crate::config::TenantConfig;
use crate::cycles::{CycleEngine, CycleStore};
use crate::error::{EngineError, StateError};
use crate::ids::{CollectionId, ItemId, OwnerId, TenantId};
use crate::integrity::{IntegrityChecker, IntegrityReport};
use crate::models::{CycleSignature, TradeLoop};
use crate::tenant::state::TenantState;

/// Outcome of one committed mutation, returned to the caller and also
/// handed to [`crate::adapters::EventSink::on_event_committed`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandOutcome {
    pub cycles_discovered: usize,
    pub cycles_evicted: usize,
    pub budget_exceeded: bool,
}

/// Spec §6 `systemState(tenantId)` response.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemState {
    pub owners: usize,
    pub items: usize,
    pub wants: usize,
    pub active_cycles: usize,
}

type Responder = oneshot::Sender<Result<CommandOutcome, EngineError>>;

enum TenantCommand {
    AddInventory {
        owner: OwnerId,
        item: ItemId,
        collection: Option<CollectionId>,
        value_hint: Option<f64>,
        respond: Responder,
    },
    TransferOwnership {
        item: ItemId,
        new_owner: OwnerId,
        respond: Responder,
    },
    RemoveInventory {
        item: ItemId,
        respond: Responder,
    },
    AddWant {
        owner: OwnerId,
        item: ItemId,
        respond: Responder,
    },
    RemoveWant {
        owner: OwnerId,
        item: ItemId,
        respond: Responder,
    },
    AddCollectionWant {
        owner: OwnerId,
        collection: CollectionId,
        respond: Responder,
    },
    RemoveCollectionWant {
        owner: OwnerId,
        collection: CollectionId,
        respond: Responder,
    },
    RejectOwner {
        rejecting_owner: OwnerId,
        rejected_owner: OwnerId,
        respond: Responder,
    },
    UnrejectOwner {
        rejecting_owner: OwnerId,
        rejected_owner: OwnerId,
        respond: Responder,
    },
    RejectCycle {
        owner: OwnerId,
        signature: CycleSignature,
        respond: Responder,
    },
    /// Read-only: does not advance `seq`, emit an event, or write a
    /// persistence snapshot.
    ValidateIntegrity {
        respond: oneshot::Sender<IntegrityReport>,
    },
    /// Read-only, see [`TenantCommand::ValidateIntegrity`].
    QuerySystemState {
        respond: oneshot::Sender<SystemState>,
    },
}

/// Handle a caller uses to submit commands to, and read cycles from, one
/// tenant's event loop. Cloning is cheap (it's a thin handle); the loop
/// itself lives in a detached task.
pub struct TenantHandle {
    tenant_id: TenantId,
    config: TenantConfig,
    command_tx: mpsc::Sender<TenantCommand>,
    cycles: Arc<RwLock<CycleStore>>,
    cancel: CancellationToken,
}

impl TenantHandle {
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn config(&self) -> &TenantConfig {
        &self.config
    }

    pub async fn cycles_by_owner(&self, owner: &OwnerId) -> Vec<TradeLoop> {
        self.cycles.read().await.cycles_by_owner(owner).into_iter().cloned().collect()
    }

    pub async fn get_cycle(&self, signature: &CycleSignature) -> Option<TradeLoop> {
        self.cycles.read().await.get(signature).cloned()
    }

    pub async fn stored_cycle_count(&self) -> usize {
        self.cycles.read().await.len()
    }

    pub async fn add_inventory(
        &self,
        owner: OwnerId,
        item: ItemId,
        collection: Option<CollectionId>,
        value_hint: Option<f64>,
    ) -> Result<CommandOutcome, EngineError> {
        self.dispatch(|respond| TenantCommand::AddInventory { owner, item, collection, value_hint, respond }).await
    }

    pub async fn transfer_ownership(&self, item: ItemId, new_owner: OwnerId) -> Result<CommandOutcome, EngineError> {
        self.dispatch(|respond| TenantCommand::TransferOwnership { item, new_owner, respond }).await
    }

    pub async fn remove_inventory(&self, item: ItemId) -> Result<CommandOutcome, EngineError> {
        self.dispatch(|respond| TenantCommand::RemoveInventory { item, respond }).await
    }

    pub async fn add_want(&self, owner: OwnerId, item: ItemId) -> Result<CommandOutcome, EngineError> {
        self.dispatch(|respond| TenantCommand::AddWant { owner, item, respond }).await
    }

    pub async fn remove_want(&self, owner: OwnerId, item: ItemId) -> Result<CommandOutcome, EngineError> {
        self.dispatch(|respond| TenantCommand::RemoveWant { owner, item, respond }).await
    }

    pub async fn add_collection_want(&self, owner: OwnerId, collection: CollectionId) -> Result<CommandOutcome, EngineError> {
        self.dispatch(|respond| TenantCommand::AddCollectionWant { owner, collection, respond }).await
    }

    pub async fn remove_collection_want(&self, owner: OwnerId, collection: CollectionId) -> Result<CommandOutcome, EngineError> {
        self.dispatch(|respond| TenantCommand::RemoveCollectionWant { owner, collection, respond }).await
    }

    pub async fn reject_owner(&self, rejecting_owner: OwnerId, rejected_owner: OwnerId) -> Result<CommandOutcome, EngineError> {
        self.dispatch(|respond| TenantCommand::RejectOwner { rejecting_owner, rejected_owner, respond }).await
    }

    pub async fn unreject_owner(&self, rejecting_owner: OwnerId, rejected_owner: OwnerId) -> Result<CommandOutcome, EngineError> {
        self.dispatch(|respond| TenantCommand::UnrejectOwner { rejecting_owner, rejected_owner, respond }).await
    }

    pub async fn reject_cycle(&self, owner: OwnerId, signature: CycleSignature) -> Result<CommandOutcome, EngineError> {
        self.dispatch(|respond| TenantCommand::RejectCycle { owner, signature, respond }).await
    }

    pub async fn validate_integrity(&self) -> Result<IntegrityReport, EngineError> {
        let (respond, recv) = oneshot::channel();
        self.command_tx
            .send(TenantCommand::ValidateIntegrity { respond })
            .await
            .map_err(|_| EngineError::Internal("tenant event loop is no longer running".to_string()))?;
        recv.await.map_err(|_| EngineError::Internal("tenant event loop dropped the response channel".to_string()))
    }

    pub async fn system_state(&self) -> Result<SystemState, EngineError> {
        let (respond, recv) = oneshot::channel();
        self.command_tx
            .send(TenantCommand::QuerySystemState { respond })
            .await
            .map_err(|_| EngineError::Internal("tenant event loop is no longer running".to_string()))?;
        recv.await.map_err(|_| EngineError::Internal("tenant event loop dropped the response channel".to_string()))
    }

    async fn dispatch<F>(&self, build: F) -> Result<CommandOutcome, EngineError>
    where
        F: FnOnce(Responder) -> TenantCommand,
    {
        let (respond, recv) = oneshot::channel();
        self.command_tx
            .send(build(respond))
            .await
            .map_err(|_| EngineError::Internal("tenant event loop is no longer running".to_string()))?;
        recv.await.map_err(|_| EngineError::Internal("tenant event loop dropped the response channel".to_string()))?
    }

    /// Stop the tenant's event loop. Already-queued commands still drain;
    /// no new ones are accepted afterward.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

pub fn spawn(tenant_id: TenantId, config: TenantConfig, adapters: Adapters) -> Arc<TenantHandle> {
    let (command_tx, command_rx) = mpsc::channel(1024);
    let cycles = Arc::new(RwLock::new(CycleStore::new()));
    let cancel = CancellationToken::new();

    let handle = Arc::new(TenantHandle {
        tenant_id: tenant_id.clone(),
        config: config.clone(),
        command_tx,
        cycles: cycles.clone(),
        cancel: cancel.clone(),
    });

    tokio::spawn(run_loop(tenant_id, config, adapters, command_rx, cycles, cancel));
    handle
}

async fn run_loop(
    tenant_id: TenantId,
    config: TenantConfig,
    adapters: Adapters,
    mut command_rx: mpsc::Receiver<TenantCommand>,
    cycles: Arc<RwLock<CycleStore>>,
    cancel: CancellationToken,
) {
    let engine = CycleEngine::new(&config);
    let mut seq: u64 = 0;
    let mut state = TenantState::new();

    if config.enable_persistence {
        if let Some(snapshot) = adapters.persistence.load_latest_snapshot(&tenant_id).await {
            seq = snapshot.seq;
            let restored_cycles = snapshot.cycles.clone();
            state = TenantState::restore_from_snapshot(snapshot);
            let mut store = cycles.write().await;
            for cycle in restored_cycles {
                store.upsert(cycle, adapters.clock.now_millis());
            }
            debug!(tenant = %tenant_id, seq, "restored tenant state from snapshot");
        }
    }

    loop {
        let command = tokio::select! {
            _ = cancel.cancelled() => break,
            received = command_rx.recv() => match received {
                Some(command) => command,
                None => break,
            },
        };

        let command = match command {
            TenantCommand::ValidateIntegrity { respond } => {
                let store = cycles.read().await;
                let report = IntegrityChecker::new(&config).check(&state, &store);
                drop(store);
                let _ = respond.send(report);
                continue;
            }
            TenantCommand::QuerySystemState { respond } => {
                let system_state = SystemState {
                    owners: state.owner_count(),
                    items: state.item_count(),
                    wants: state.want_count(),
                    active_cycles: cycles.read().await.len(),
                };
                let _ = respond.send(system_state);
                continue;
            }
            command => command,
        };

        seq += 1;
        let now = adapters.clock.now_millis();
        let outcome = apply_command(&mut state, &config, &engine, &cycles, &adapters, &tenant_id, command, now).await;

        if let Ok(outcome) = &outcome {
            adapters
                .event_sink
                .on_event_committed(EventSummary {
                    event_id: uuid::Uuid::new_v4(),
                    tenant_id: tenant_id.clone(),
                    cycles_discovered: outcome.cycles_discovered,
                    cycles_evicted: outcome.cycles_evicted,
                    elapsed_ms: adapters.clock.now_millis().saturating_sub(now),
                    budget_exceeded: outcome.budget_exceeded,
                })
                .await;

            if config.enable_persistence {
                let snapshot = state.to_snapshot(seq, cycles.read().await.all().cloned().collect());
                adapters.persistence.write_snapshot(&tenant_id, snapshot).await;
            }
        } else if let Err(err) = &outcome {
            debug!(tenant = %tenant_id, error = %err, "command rejected");
        }
    }

    warn!(tenant = %tenant_id, "tenant event loop stopped");
}

/// Apply one command against authoritative state, then run discovery over
/// whatever owner set the mutation touched (spec §4.4–§4.7).
async fn apply_command(
    state: &mut TenantState,
    config: &TenantConfig,
    engine: &CycleEngine,
    cycles: &Arc<RwLock<CycleStore>>,
    adapters: &Adapters,
    tenant_id: &TenantId,
    command: TenantCommand,
    now: u64,
) -> Result<CommandOutcome, EngineError> {
    match command {
        TenantCommand::AddInventory { owner, item, collection, value_hint, respond } => {
            let result = state.add_inventory(owner, item, collection, value_hint).map_err(EngineError::from);
            return finish(result, state, config, engine, cycles, adapters, tenant_id, now, respond).await;
        }
        TenantCommand::TransferOwnership { item, new_owner, respond } => {
            let result = state.transfer_ownership(item, new_owner).map_err(EngineError::from);
            return finish(result, state, config, engine, cycles, adapters, tenant_id, now, respond).await;
        }
        TenantCommand::RemoveInventory { item, respond } => {
            let result = state.remove_inventory(&item).map_err(EngineError::from);
            return finish(result, state, config, engine, cycles, adapters, tenant_id, now, respond).await;
        }
        TenantCommand::AddWant { owner, item, respond } => {
            let result = state.add_want(owner, item).map_err(EngineError::from);
            return finish(result, state, config, engine, cycles, adapters, tenant_id, now, respond).await;
        }
        TenantCommand::RemoveWant { owner, item, respond } => {
            let touched = state.remove_want(&owner, &item);
            return finish(Ok(touched), state, config, engine, cycles, adapters, tenant_id, now, respond).await;
        }
        TenantCommand::AddCollectionWant { owner, collection, respond } => {
            let touched = state.add_collection_want(owner, collection);
            return finish(Ok(touched), state, config, engine, cycles, adapters, tenant_id, now, respond).await;
        }
        TenantCommand::RemoveCollectionWant { owner, collection, respond } => {
            let touched = state.remove_collection_want(&owner, &collection);
            return finish(Ok(touched), state, config, engine, cycles, adapters, tenant_id, now, respond).await;
        }
        TenantCommand::RejectOwner { rejecting_owner, rejected_owner, respond } => {
            let touched = state.record_owner_rejection(rejecting_owner, rejected_owner);
            return finish(Ok(touched), state, config, engine, cycles, adapters, tenant_id, now, respond).await;
        }
        TenantCommand::UnrejectOwner { rejecting_owner, rejected_owner, respond } => {
            let touched = state.clear_owner_rejection(&rejecting_owner, &rejected_owner);
            return finish(Ok(touched), state, config, engine, cycles, adapters, tenant_id, now, respond).await;
        }
        TenantCommand::RejectCycle { owner, signature, respond } => {
            state.record_cycle_rejection(owner, signature.clone());
            let evicted = cycles.write().await.evict_rejected(&signature).is_some() as usize;
            let outcome = CommandOutcome { cycles_discovered: 0, cycles_evicted: evicted, budget_exceeded: false };
            let _ = respond.send(Ok(outcome));
            Ok(outcome)
        }
        TenantCommand::ValidateIntegrity { .. } | TenantCommand::QuerySystemState { .. } => {
            unreachable!("run_loop intercepts read-only commands before dispatching here")
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn finish(
    result: Result<std::collections::BTreeSet<OwnerId>, EngineError>,
    state: &TenantState,
    config: &TenantConfig,
    engine: &CycleEngine,
    cycles: &Arc<RwLock<CycleStore>>,
    adapters: &Adapters,
    tenant_id: &TenantId,
    now: u64,
    respond: Responder,
) -> Result<CommandOutcome, EngineError> {
    let touched = match result {
        Ok(touched) => touched,
        Err(err) => {
            let _ = respond.send(Err(clone_engine_error(&err)));
            return Err(err);
        }
    };

    let outcome = discover_and_store(state, config, engine, cycles, adapters, tenant_id, touched, now).await;
    let _ = respond.send(Ok(outcome));
    Ok(outcome)
}

async fn discover_and_store(
    state: &TenantState,
    config: &TenantConfig,
    engine: &CycleEngine,
    cycles: &Arc<RwLock<CycleStore>>,
    adapters: &Adapters,
    tenant_id: &TenantId,
    touched: std::collections::BTreeSet<OwnerId>,
    now: u64,
) -> CommandOutcome {
    if touched.is_empty() {
        return CommandOutcome::default();
    }

    let mut evicted = 0usize;
    {
        let mut store = cycles.write().await;
        for owner in &touched {
            evicted += store.evict_for_owner(owner).len();
        }
    }

    let mut item_values: BTreeMap<ItemId, f64> = BTreeMap::new();
    for owner in &touched {
        let Some(record) = state.owner_record(owner) else { continue };
        for item in record.owned_items.iter().chain(record.wanted_items.iter()) {
            if item_values.contains_key(item) {
                continue;
            }
            if let Some(value) = state.item_value_hint(item) {
                item_values.insert(item.clone(), value);
            } else if let Some(value) = adapters.price.value_hint(item).await {
                item_values.insert(item.clone(), value);
            }
        }
    }

    let result = engine.discover(state.graph(), &touched, &item_values, now);

    let mut discovered = 0usize;
    {
        let mut store = cycles.write().await;
        for cycle in result.cycles {
            if state.cycle_rejected_by_any(cycle.owners(), &cycle.signature) {
                continue;
            }
            if store.upsert(cycle.clone(), now) {
                discovered += 1;
                adapters.event_sink.on_cycle_discovered(tenant_id, &cycle).await;
            }
        }
        evicted += store.evict_expired(now, config.cycle_ttl.as_millis() as u64).len();
        evicted += store.enforce_capacity(config.max_cycles_stored).len();
    }

    CommandOutcome {
        cycles_discovered: discovered,
        cycles_evicted: evicted,
        budget_exceeded: result.budget_exceeded,
    }
}

/// `EngineError` is not `Clone` (thiserror sources aren't generally), so
/// construct an equivalent value for the two places a failure is reported
/// (once to the caller via `respond`, once as this function's return).
fn clone_engine_error(err: &EngineError) -> EngineError {
    match err {
        EngineError::Tenant(e) => EngineError::Tenant(match e {
            crate::error::TenantError::UnknownTenant(id) => crate::error::TenantError::UnknownTenant(id.clone()),
            crate::error::TenantError::TenantExists(id) => crate::error::TenantError::TenantExists(id.clone()),
        }),
        EngineError::State(e) => EngineError::State(match e {
            StateError::OwnershipConflict { item, current_owner, attempted_owner } => StateError::OwnershipConflict {
                item: item.clone(),
                current_owner: current_owner.clone(),
                attempted_owner: attempted_owner.clone(),
            },
            StateError::SelfWantRejected { owner, item } => {
                StateError::SelfWantRejected { owner: owner.clone(), item: item.clone() }
            }
            StateError::UnknownItem(item) => StateError::UnknownItem(item.clone()),
            StateError::UnknownOwner(owner) => StateError::UnknownOwner(owner.clone()),
            StateError::UnknownCollection(collection) => StateError::UnknownCollection(collection.clone()),
        }),
        EngineError::Store(crate::error::StoreError::NotFound(s)) => {
            EngineError::Store(crate::error::StoreError::NotFound(s.clone()))
        }
        EngineError::InvalidArgument(s) => EngineError::InvalidArgument(s.clone()),
        EngineError::Internal(s) => EngineError::Internal(s.clone()),
    }
}
