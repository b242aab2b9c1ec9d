mod connection_state;
mod frame_transport;

pub use connection_state::ConnectionState;
pub use frame_transport::FrameTransport;
