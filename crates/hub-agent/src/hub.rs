//! Assembles the application services around one transport.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use application::{
    AutoOffTimer, AutomationEngine, CommandDispatcher, DeviceRegistry, EventBus, Fleet,
    InboundHandler, RuleBook, RuleSnapshotStore, SharedRegistry, SharedRuleBook,
};
use domain::automation::Rule;
use domain::FrameTransport;
use infrastructure::AutomationConfig;

/// Picks the rules to start with: a saved snapshot wins over configuration
pub fn hydrate_rules(configured: Vec<Rule>, store: Option<&dyn RuleSnapshotStore>) -> Result<RuleBook> {
    let snapshot = match store {
        Some(store) => store.load().context("Failed to load rule snapshot")?,
        None => None,
    };

    let rules = match snapshot {
        Some(rules) => {
            info!(count = rules.len(), "📥 Restored rules from snapshot");
            rules
        }
        None => configured,
    };

    RuleBook::from_rules(rules).context("Rule rejected at admission")
}

pub struct Hub {
    pub registry: SharedRegistry,
    pub rules: SharedRuleBook,
    pub dispatcher: Arc<CommandDispatcher>,
    pub engine: Arc<AutomationEngine>,
    pub fleet: Fleet,
    pub events: EventBus,
    inbound: Option<(InboundHandler, mpsc::UnboundedReceiver<Vec<u8>>)>,
}

impl Hub {
    /// `inbound` carries raw messages from the transport's message callback
    pub fn assemble(
        nodes: Vec<domain::Node>,
        rules: RuleBook,
        transport: Arc<dyn FrameTransport>,
        inbound: mpsc::UnboundedReceiver<Vec<u8>>,
        events: EventBus,
        store: Option<Arc<dyn RuleSnapshotStore>>,
    ) -> Result<Self> {
        let registry = DeviceRegistry::from_nodes(nodes)
            .context("Invalid node table")?
            .into_shared();
        let rules = rules.into_shared();

        let dispatcher = Arc::new(CommandDispatcher::new(
            registry.clone(),
            transport,
            events.clone(),
        ));

        let mut engine = AutomationEngine::new(rules.clone(), dispatcher.clone(), events.clone());
        if let Some(store) = store {
            engine = engine.with_store(store);
        }

        let fleet = Fleet::new(registry.clone(), rules.clone(), events.clone());
        let handler = InboundHandler::new(registry.clone(), events.clone());

        Ok(Self {
            registry,
            rules,
            dispatcher,
            engine: Arc::new(engine),
            fleet,
            events,
            inbound: Some((handler, inbound)),
        })
    }

    /// Spawns the inbound pump, the automation tick and the auto-off sweep
    pub fn start(&mut self, automation: &AutomationConfig, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        if let Some((inbound, rx)) = self.inbound.take() {
            handles.push(tokio::spawn(inbound.run(rx, cancel.clone())));
        } else {
            warn!("Hub already started");
            return handles;
        }

        handles.push(self.engine.clone().spawn(automation.tick(), cancel.clone()));
        handles.push(AutoOffTimer::new(self.dispatcher.clone()).spawn(automation.auto_off_tick(), cancel.clone()));
        handles.push(self.spawn_event_log(cancel));

        info!(
            nodes = self.registry.lock().len(),
            rules = self.rules.lock().len(),
            "🚀 Hub services started"
        );
        handles
    }

    fn spawn_event_log(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(event) => {
                            let payload = serde_json::to_string(&event).unwrap_or_default();
                            debug!(event_type = event.event_type(), %payload, "📣 Event");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(count)) => {
                            warn!(skipped = count, "Event log lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}
