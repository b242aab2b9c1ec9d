use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use domain::{ConnectionState, FrameTransport};

use super::manager::TransportManager;

type ManagerFactory = Box<dyn Fn() -> TransportManager + Send + Sync>;

#[derive(Default)]
struct Slot {
    manager: Option<TransportManager>,
    leases: usize,
}

/// Reference-counted owner of the one transport.
///
/// The first lease builds and connects a manager, the last lease to drop
/// disconnects and releases it.
pub struct SharedTransport {
    factory: ManagerFactory,
    slot: Mutex<Slot>,
}

impl SharedTransport {
    pub fn new<F>(factory: F) -> Arc<Self>
    where
        F: Fn() -> TransportManager + Send + Sync + 'static,
    {
        Arc::new(Self {
            factory: Box::new(factory),
            slot: Mutex::new(Slot::default()),
        })
    }

    pub fn acquire(self: &Arc<Self>) -> TransportLease {
        let mut slot = self.slot.lock();
        let manager = match &slot.manager {
            Some(manager) => manager.clone(),
            None => {
                let manager = (self.factory)();
                manager.connect();
                info!(url = %manager.endpoint(), "📡 Shared transport created");
                slot.manager = Some(manager.clone());
                manager
            }
        };
        slot.leases += 1;

        TransportLease {
            owner: self.clone(),
            manager,
        }
    }

    pub fn lease_count(&self) -> usize {
        self.slot.lock().leases
    }

    pub fn is_active(&self) -> bool {
        self.slot.lock().manager.is_some()
    }

    fn release(&self) {
        let released = {
            let mut slot = self.slot.lock();
            slot.leases = slot.leases.saturating_sub(1);
            if slot.leases == 0 {
                slot.manager.take()
            } else {
                None
            }
        };

        if let Some(manager) = released {
            manager.disconnect();
            info!("📴 Shared transport released");
        }
    }
}

/// A subscriber's handle on the shared transport
pub struct TransportLease {
    owner: Arc<SharedTransport>,
    manager: TransportManager,
}

impl Deref for TransportLease {
    type Target = TransportManager;

    fn deref(&self) -> &Self::Target {
        &self.manager
    }
}

impl FrameTransport for TransportLease {
    fn send(&self, frame: &[u8]) -> bool {
        self.manager.send(frame)
    }

    fn connection_state(&self) -> ConnectionState {
        self.manager.connection_state()
    }
}

impl Drop for TransportLease {
    fn drop(&mut self) {
        self.owner.release();
    }
}
