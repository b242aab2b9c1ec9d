use super::ConnectionState;

/// Outbound side of the duplex connection as seen by command issuers.
///
/// `send` never blocks and never fails loudly: `false` means "not delivered"
/// and the caller decides what to do about it.
pub trait FrameTransport: Send + Sync {
    /// Hand one encoded frame to the connection
    fn send(&self, frame: &[u8]) -> bool;

    fn connection_state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }
}
