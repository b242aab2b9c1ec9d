use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use application::{EventBus, RuleSnapshotStore};
use domain::{DomainEvent, FrameTransport};
use hub_agent::hub::{Hub, hydrate_rules};
use infrastructure::{HubConfig, JsonSnapshotStore, SharedTransport, TransportManager, WebSocketConnector};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Override hub host
    #[arg(long)]
    host: Option<String>,

    /// Force the secure socket scheme
    #[arg(long)]
    secure_origin: bool,
}

async fn run() -> Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,hub_agent=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🤖 Node Hub Agent Starting...");
    info!("🆔 Process ID: {}", std::process::id());

    let args = Args::parse();

    // 1. Load Configuration
    info!(config_dir = %args.config_dir, "Loading configuration...");
    let mut config = HubConfig::load(&args.config_dir)
        .with_context(|| format!("Failed to load configuration from {}", args.config_dir))?;

    if let Some(host) = args.host {
        config.transport.host = host;
    }
    if args.secure_origin {
        config.transport.secure_origin = true;
    }
    info!(
        nodes = config.nodes.len(),
        rules = config.rules.len(),
        "✅ Configuration loaded"
    );

    // 2. Rules: snapshot first, configuration otherwise
    let store: Option<Arc<dyn RuleSnapshotStore>> = config
        .state_file
        .as_ref()
        .map(|path| Arc::new(JsonSnapshotStore::new(path)) as Arc<dyn RuleSnapshotStore>);
    let rules = hydrate_rules(config.rules.clone(), store.as_deref())?;

    // 3. Transport, with subscribers registered before the first connect
    let events = EventBus::default();
    let (inbound_tx, inbound_rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
    let transport_config = config.transport.clone();
    let status_events = events.clone();
    let shared = SharedTransport::new(move || {
        let manager = TransportManager::new(
            transport_config.endpoint(),
            Arc::new(WebSocketConnector),
            transport_config.policy(),
        );
        let tx = inbound_tx.clone();
        manager.on_message(move |bytes| {
            let _ = tx.send(bytes);
        });
        let events = status_events.clone();
        manager.on_status(move |connected| {
            events.publish(DomainEvent::transport_status(connected));
        });
        manager
    });
    let lease: Arc<dyn FrameTransport> = Arc::new(shared.acquire());

    // 4. Application services
    let mut hub = Hub::assemble(
        config.nodes.clone(),
        rules,
        lease.clone(),
        inbound_rx,
        events,
        store,
    )?;

    let cancel = CancellationToken::new();
    let handles = hub.start(&config.automation, cancel.clone());

    // 5. Shutdown Signal
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Shutting down..."),
        Err(err) => warn!(error = %err, "Unable to listen for shutdown signal"),
    }

    cancel.cancel();
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }

    // Last lease: closes the socket
    drop(hub);
    drop(lease);
    info!(active = shared.is_active(), "👋 Good bye!");
    Ok(())
}

fn main() {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("❌ Failed to start runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(run()) {
        eprintln!("\n❌ CRITICAL ERROR: {:?}", e);
        std::process::exit(1);
    }
}
