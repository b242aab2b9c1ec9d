//! Infrastructure layer - WebSocket transport, configuration and persistence

pub mod config;
pub mod snapshot;
pub mod transport;

pub use config::{AutomationConfig, HubConfig, TransportConfig};
pub use snapshot::JsonSnapshotStore;
pub use transport::{
    Endpoint, ReconnectPolicy, SharedTransport, TransportLease, TransportManager,
    WebSocketConnector,
};
