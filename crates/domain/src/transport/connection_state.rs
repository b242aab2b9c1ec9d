use serde::{Deserialize, Serialize};

/// Lifecycle of the single duplex connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    /// Not connected, no attempt pending
    #[default]
    Disconnected,
    /// Currently opening the socket
    Connecting,
    /// Open and able to carry frames
    Connected,
    /// Waiting out the backoff before the next attempt
    Reconnecting,
    /// Reconnect attempts exhausted; only an explicit connect revives it
    Failed,
}

impl ConnectionState {
    /// Check if state allows an explicit connection attempt
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Transition to connecting state
    pub fn to_connecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Disconnected | Self::Failed | Self::Reconnecting => Ok(Self::Connecting),
            _ => Err("Can only connect from Disconnected, Reconnecting or Failed state"),
        }
    }

    /// Transition to connected state
    pub fn to_connected(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting => Ok(Self::Connected),
            _ => Err("Can only complete connection from Connecting state"),
        }
    }

    pub fn to_disconnected(&self) -> Self {
        Self::Disconnected
    }

    /// Transition to the backoff wait
    pub fn to_reconnecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connected | Self::Connecting | Self::Disconnected => Ok(Self::Reconnecting),
            _ => Err("Can only schedule a reconnect after a connection or attempt ended"),
        }
    }

    pub fn to_failed(&self) -> Self {
        Self::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_disconnected() {
        let state = ConnectionState::default();
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(state.can_connect());
        assert!(!state.is_connected());
    }

    #[test]
    fn test_transition_disconnected_to_connecting() {
        let next = ConnectionState::Disconnected.to_connecting().unwrap();
        assert_eq!(next, ConnectionState::Connecting);
        assert!(!next.can_connect());
    }

    #[test]
    fn test_transition_connecting_to_connected() {
        let next = ConnectionState::Connecting.to_connected().unwrap();
        assert!(next.is_connected());
    }

    #[test]
    fn test_cannot_connect_from_connected() {
        assert!(ConnectionState::Connected.to_connecting().is_err());
        assert!(ConnectionState::Reconnecting.to_connected().is_err());
    }

    #[test]
    fn test_backoff_then_attempt() {
        let waiting = ConnectionState::Connecting.to_reconnecting().unwrap();
        assert!(!waiting.can_connect());
        assert!(!waiting.is_connected());
        assert_eq!(waiting.to_connecting().unwrap(), ConnectionState::Connecting);
    }

    #[test]
    fn test_failed_cannot_schedule_reconnect() {
        assert!(ConnectionState::Failed.to_reconnecting().is_err());
        assert!(ConnectionState::Failed.can_connect());
    }

    #[test]
    fn test_to_disconnected_from_any_state() {
        for state in [
            ConnectionState::Connected,
            ConnectionState::Connecting,
            ConnectionState::Reconnecting,
            ConnectionState::Failed,
        ] {
            assert_eq!(state.to_disconnected(), ConnectionState::Disconnected);
        }
    }
}
