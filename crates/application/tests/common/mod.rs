use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use application::{CommandDispatcher, DeviceRegistry, EventBus, SharedRegistry};
use domain::node::{Node, NodeId};
use domain::{ConnectionState, FrameTransport};

/// Transport double that records every frame it accepts
#[derive(Default)]
pub struct RecordingTransport {
    pub down: AtomicBool,
    pub sent: Mutex<Vec<Vec<u8>>>,
}

impl RecordingTransport {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }
}

impl FrameTransport for RecordingTransport {
    fn send(&self, frame: &[u8]) -> bool {
        if self.down.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().push(frame.to_vec());
        true
    }

    fn connection_state(&self) -> ConnectionState {
        if self.down.load(Ordering::SeqCst) {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        }
    }
}

pub struct Harness {
    pub registry: SharedRegistry,
    pub transport: Arc<RecordingTransport>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub events: EventBus,
}

pub fn harness(nodes: Vec<Node>) -> Harness {
    let registry = DeviceRegistry::from_nodes(nodes).unwrap().into_shared();
    let transport = Arc::new(RecordingTransport::default());
    let events = EventBus::new(64);
    let dispatcher = Arc::new(CommandDispatcher::new(
        registry.clone(),
        transport.clone(),
        events.clone(),
    ));
    Harness {
        registry,
        transport,
        dispatcher,
        events,
    }
}

pub fn id(raw: &str) -> NodeId {
    NodeId::new(raw).unwrap()
}
