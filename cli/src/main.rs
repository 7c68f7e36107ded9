//! Command-line driver for the barter matching engine.
//!
//! Each invocation spins up one in-process [`Engine`], creates (or
//! reattaches to, via file persistence) the requested tenant, applies the
//! requested operation, and prints the resulting [`CommandOutcome`] or
//! query result as JSON. State survives across invocations through
//! `FilePersistence` under `--state-dir`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::info;

use trade_loop_engine_core::adapters::{
    Adapters, Clock, EventSink, EventSummary, FilePersistence, MetadataSource, PriceSource, SystemClock,
};
use trade_loop_engine_core::config::TenantConfig;
use trade_loop_engine_core::models::TradeLoop;
use trade_loop_engine_core::{CollectionId, Engine, ItemId, OwnerId, TenantId};

#[derive(Parser)]
#[command(name = "trade-loop", author, version, about = "Drive the NFT barter matching engine from the shell")]
struct Cli {
    /// Directory holding per-tenant snapshot/event-log files.
    #[arg(long, global = true, default_value = "./.trade-loop-state")]
    state_dir: PathBuf,

    /// Tenant the command applies to.
    #[arg(long, global = true, default_value = "default")]
    tenant: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register an item as owned by `owner`.
    AddInventory {
        owner: String,
        item: String,
        #[arg(long)]
        collection: Option<String>,
        #[arg(long)]
        value: Option<f64>,
    },
    /// Remove an item from circulation.
    RemoveInventory { item: String },
    /// Move an item to a new owner outside the matching flow.
    Transfer { item: String, new_owner: String },
    /// Register that `owner` wants `item`.
    Want { owner: String, item: String },
    /// Withdraw a previously registered want.
    Unwant { owner: String, item: String },
    /// Register that `owner` wants any item in `collection`.
    WantCollection { owner: String, collection: String },
    /// Withdraw a collection want.
    UnwantCollection { owner: String, collection: String },
    /// `rejecting` will never trade with `rejected`.
    Reject { rejecting: String, rejected: String },
    /// Undo a previous rejection.
    Unreject { rejecting: String, rejected: String },
    /// `owner` declines one specific discovered cycle by signature.
    RejectCycle { owner: String, signature: String },
    /// List cycles currently stored that involve `owner`, highest score
    /// first (ties broken by signature).
    Query {
        owner: String,
        /// Cap the number of cycles returned.
        #[arg(long)]
        limit: Option<usize>,
        /// Discard cycles scoring below this threshold.
        #[arg(long)]
        min_score: Option<f64>,
    },
    /// Print one stored cycle by signature, if it still exists.
    GetCycle { signature: String },
    /// Print owner/item/want/active-cycle counts for the tenant.
    Status,
    /// Run the centralized invariant checks and print the resulting report.
    ValidateIntegrity,
    /// Seed a throwaway three-way loop and print what gets discovered,
    /// without touching `--state-dir`.
    Demo,
}

#[derive(Default)]
struct NoMetadataSource;

#[async_trait]
impl MetadataSource for NoMetadataSource {
    async fn collection_members(&self, _collection_id: &CollectionId) -> Option<Vec<ItemId>> {
        None
    }
}

#[derive(Default)]
struct NoPriceSource;

#[async_trait]
impl PriceSource for NoPriceSource {
    async fn value_hint(&self, _item_id: &ItemId) -> Option<f64> {
        None
    }
}

struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn on_event_committed(&self, summary: EventSummary) {
        info!(
            tenant = %summary.tenant_id,
            cycles_discovered = summary.cycles_discovered,
            cycles_evicted = summary.cycles_evicted,
            elapsed_ms = summary.elapsed_ms,
            budget_exceeded = summary.budget_exceeded,
            "event committed"
        );
    }

    async fn on_cycle_discovered(&self, tenant_id: &TenantId, cycle: &TradeLoop) {
        info!(tenant = %tenant_id, signature = %cycle.signature, score = cycle.score, "cycle discovered");
    }
}

fn adapters(clock: Arc<dyn Clock>, persistence: FilePersistence) -> Adapters {
    Adapters {
        metadata: Arc::new(NoMetadataSource),
        price: Arc::new(NoPriceSource),
        event_sink: Arc::new(TracingEventSink),
        clock,
        persistence: Arc::new(persistence),
    }
}

fn print_cycle(cycle: &TradeLoop) {
    println!("{}", serde_json::to_string_pretty(cycle).unwrap_or_else(|_| "<unserializable cycle>".to_string()));
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if matches!(cli.command, Command::Demo) {
        return run_demo().await;
    }

    let engine = Engine::new();
    let tenant = TenantId::new(cli.tenant.clone());
    let mut config = TenantConfig::default();
    config.enable_persistence = true;
    config.validate()?;

    let persistence = FilePersistence::new(cli.state_dir.clone());
    engine.create_tenant(tenant.clone(), config, adapters(Arc::new(SystemClock), persistence))?;

    match cli.command {
        Command::Demo => unreachable!("handled above"),
        Command::AddInventory { owner, item, collection, value } => {
            let outcome = engine
                .add_inventory(&tenant, OwnerId::new(owner), ItemId::new(item), collection.map(CollectionId::new), value)
                .await?;
            println!("{outcome:?}");
        }
        Command::RemoveInventory { item } => {
            let outcome = engine.remove_inventory(&tenant, ItemId::new(item)).await?;
            println!("{outcome:?}");
        }
        Command::Transfer { item, new_owner } => {
            let outcome = engine.transfer_ownership(&tenant, ItemId::new(item), OwnerId::new(new_owner)).await?;
            println!("{outcome:?}");
        }
        Command::Want { owner, item } => {
            let outcome = engine.add_want(&tenant, OwnerId::new(owner), ItemId::new(item)).await?;
            println!("{outcome:?}");
        }
        Command::Unwant { owner, item } => {
            let outcome = engine.remove_want(&tenant, OwnerId::new(owner), ItemId::new(item)).await?;
            println!("{outcome:?}");
        }
        Command::WantCollection { owner, collection } => {
            let outcome = engine.add_collection_want(&tenant, OwnerId::new(owner), CollectionId::new(collection)).await?;
            println!("{outcome:?}");
        }
        Command::UnwantCollection { owner, collection } => {
            let outcome = engine.remove_collection_want(&tenant, OwnerId::new(owner), CollectionId::new(collection)).await?;
            println!("{outcome:?}");
        }
        Command::Reject { rejecting, rejected } => {
            let outcome = engine.reject_owner(&tenant, OwnerId::new(rejecting), OwnerId::new(rejected)).await?;
            println!("{outcome:?}");
        }
        Command::Unreject { rejecting, rejected } => {
            let outcome = engine.unreject_owner(&tenant, OwnerId::new(rejecting), OwnerId::new(rejected)).await?;
            println!("{outcome:?}");
        }
        Command::RejectCycle { owner, signature } => {
            let outcome = engine.reject_cycle(&tenant, OwnerId::new(owner), signature_from_str(&signature)).await?;
            println!("{outcome:?}");
        }
        Command::Query { owner, limit, min_score } => {
            let cycles = engine.query_cycles(&tenant, &OwnerId::new(owner), limit, min_score).await?;
            for cycle in &cycles {
                print_cycle(cycle);
            }
            if cycles.is_empty() {
                println!("no cycles stored for that owner");
            }
        }
        Command::GetCycle { signature } => match engine.get_cycle(&tenant, &signature_from_str(&signature)).await? {
            Some(cycle) => print_cycle(&cycle),
            None => println!("no such cycle"),
        },
        Command::Status => {
            let state = engine.system_state(&tenant).await?;
            println!(
                "tenant {}: {} owner(s), {} item(s), {} want(s), {} active cycle(s)",
                tenant.as_str(),
                state.owners,
                state.items,
                state.wants,
                state.active_cycles
            );
        }
        Command::ValidateIntegrity => {
            let report = engine.validate_integrity(&tenant).await?;
            println!("{}", serde_json::to_string_pretty(&report).unwrap_or_else(|_| "<unserializable report>".to_string()));
        }
    }

    Ok(())
}

fn signature_from_str(raw: &str) -> trade_loop_engine_core::models::CycleSignature {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).expect("signature is always a plain string")
}

/// Seed a self-contained three-way loop (A has a sword, wants a bow; B has
/// a shield, wants the sword; C has a bow, wants the shield) and print
/// whatever `Engine` discovers, so a first-time reader can see the whole
/// flow without writing any state to disk.
async fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let engine = Engine::new();
    let tenant = TenantId::new("demo");
    let persistence = FilePersistence::new(std::env::temp_dir().join("trade-loop-demo-unused"));
    engine.create_tenant(tenant.clone(), TenantConfig::default(), adapters(Arc::new(SystemClock), persistence))?;

    engine.add_inventory(&tenant, OwnerId::new("alice"), ItemId::new("sword"), None, None).await?;
    engine.add_inventory(&tenant, OwnerId::new("bob"), ItemId::new("shield"), None, None).await?;
    engine.add_inventory(&tenant, OwnerId::new("carol"), ItemId::new("bow"), None, None).await?;
    engine.add_want(&tenant, OwnerId::new("bob"), ItemId::new("sword")).await?;
    engine.add_want(&tenant, OwnerId::new("carol"), ItemId::new("shield")).await?;
    engine.add_want(&tenant, OwnerId::new("alice"), ItemId::new("bow")).await?;

    let cycles = engine.query_cycles(&tenant, &OwnerId::new("alice"), None, None).await?;
    println!("discovered {} cycle(s):", cycles.len());
    for cycle in &cycles {
        print_cycle(cycle);
    }

    Ok(())
}
