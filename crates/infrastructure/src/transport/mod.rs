//! WebSocket transport to the hub firmware

mod connector;
mod endpoint;
mod manager;
mod shared;

pub use connector::{Connector, Link, TransportError, WebSocketConnector};
pub use endpoint::{DEFAULT_PATH, Endpoint};
pub use manager::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RECONNECT_DELAY, MessageCallback, ReconnectPolicy,
    StatusCallback, TransportManager,
};
pub use shared::{SharedTransport, TransportLease};
