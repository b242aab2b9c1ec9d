use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::automation::RuleId;
use crate::frame::Command;
use crate::node::NodeId;

/// Notifications for collaborators that render or audit fleet state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// A node's state changed (optimistically or from the wire)
    NodeUpdated {
        node_id: NodeId,
        timestamp: DateTime<Utc>,
    },

    /// Connection came up or went down
    TransportStatusChanged {
        connected: bool,
        timestamp: DateTime<Utc>,
    },

    /// A command could not be delivered and its optimistic change was undone
    CommandRolledBack {
        node_id: NodeId,
        command: Command,
        timestamp: DateTime<Utc>,
    },

    /// An automation rule matched and issued its action
    RuleFired {
        rule_id: RuleId,
        target: NodeId,
        delivered: bool,
        timestamp: DateTime<Utc>,
    },

    /// Text echoed by the firmware console
    ConsoleOutput {
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// Firmware reported an error code
    DeviceError {
        address: u8,
        code: u16,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn node_updated(node_id: NodeId) -> Self {
        Self::NodeUpdated {
            node_id,
            timestamp: Utc::now(),
        }
    }

    pub fn transport_status(connected: bool) -> Self {
        Self::TransportStatusChanged {
            connected,
            timestamp: Utc::now(),
        }
    }

    pub fn command_rolled_back(node_id: NodeId, command: Command) -> Self {
        Self::CommandRolledBack {
            node_id,
            command,
            timestamp: Utc::now(),
        }
    }

    pub fn rule_fired(rule_id: RuleId, target: NodeId, delivered: bool) -> Self {
        Self::RuleFired {
            rule_id,
            target,
            delivered,
            timestamp: Utc::now(),
        }
    }

    pub fn console_output(text: impl Into<String>) -> Self {
        Self::ConsoleOutput {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn device_error(address: u8, code: u16) -> Self {
        Self::DeviceError {
            address,
            code,
            timestamp: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::NodeUpdated { .. } => "NodeUpdated",
            Self::TransportStatusChanged { .. } => "TransportStatusChanged",
            Self::CommandRolledBack { .. } => "CommandRolledBack",
            Self::RuleFired { .. } => "RuleFired",
            Self::ConsoleOutput { .. } => "ConsoleOutput",
            Self::DeviceError { .. } => "DeviceError",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::NodeUpdated { timestamp, .. }
            | Self::TransportStatusChanged { timestamp, .. }
            | Self::CommandRolledBack { timestamp, .. }
            | Self::RuleFired { timestamp, .. }
            | Self::ConsoleOutput { timestamp, .. }
            | Self::DeviceError { timestamp, .. } => *timestamp,
        }
    }
}
