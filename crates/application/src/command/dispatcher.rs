use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use domain::frame::{Command, Frame};
use domain::node::{Node, NodeId, NodeUpdate};
use domain::{DomainEvent, FrameTransport};

use crate::event_bus::EventBus;
use crate::registry::SharedRegistry;

/// Programmer errors: the command could never have been valid for this node
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Node {node} lives on address {expected}, not {given}")]
    AddressMismatch {
        node: NodeId,
        expected: u8,
        given: u8,
    },

    #[error("{0} is not an output command")]
    NotIssuable(Command),

    #[error("Node {node} does not accept {command}")]
    Unsupported { node: NodeId, command: Command },

    #[error("Value {value} out of range for {command}")]
    ValueOutOfRange { command: Command, value: u16 },
}

/// Result of a well-formed command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    /// Frame handed to the transport; optimistic state kept
    Delivered(Frame),
    /// Transport was down; optimistic state rolled back
    NotDelivered,
}

impl IssueOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Optimistic apply-then-send pipeline for outbound commands.
///
/// The registry changes before the frame hits the wire. If the transport
/// refuses the frame every node touched is restored and the caller is told;
/// nothing is retried here.
pub struct CommandDispatcher {
    registry: SharedRegistry,
    transport: Arc<dyn FrameTransport>,
    events: EventBus,
}

impl CommandDispatcher {
    pub fn new(
        registry: SharedRegistry,
        transport: Arc<dyn FrameTransport>,
        events: EventBus,
    ) -> Self {
        Self {
            registry,
            transport,
            events,
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn issue(
        &self,
        command: Command,
        address: u8,
        value: u16,
        node_id: &NodeId,
    ) -> Result<IssueOutcome, DispatchError> {
        self.issue_at(command, address, value, node_id, Utc::now())
    }

    /// Same as [`issue`](Self::issue) with an explicit clock reading, used for
    /// arming auto-off timers.
    pub fn issue_at(
        &self,
        command: Command,
        address: u8,
        value: u16,
        node_id: &NodeId,
        now: DateTime<Utc>,
    ) -> Result<IssueOutcome, DispatchError> {
        if !command.is_output_command() {
            return Err(DispatchError::NotIssuable(command));
        }

        let mut registry = self.registry.lock();

        let node = registry
            .get(node_id)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownNode(node_id.clone()))?;

        if node.address != address {
            return Err(DispatchError::AddressMismatch {
                node: node_id.clone(),
                expected: node.address,
                given: address,
            });
        }

        let unsupported = || DispatchError::Unsupported {
            node: node_id.clone(),
            command,
        };

        // 1. Snapshot everything on the address; a byte write touches siblings
        let snapshot: Vec<Node> = registry
            .get_by_address(address)
            .into_iter()
            .cloned()
            .collect();

        // 2. Optimistic mutation + the frame that carries it
        let (frame, changed) = match command {
            Command::OutputOn | Command::OutputOff | Command::OutputToggle => {
                if !node.kind.is_switchable() {
                    return Err(unsupported());
                }
                let on = match command {
                    Command::OutputOn => true,
                    Command::OutputOff => false,
                    _ => !node.on_state,
                };
                let update = switch_update(&node, on, now);
                registry.apply(node_id, &update);

                if node.is_shift_register_bit() {
                    // The wire replaces the whole byte, so send all siblings
                    let byte = registry.shift_register_byte(address);
                    (
                        Frame::new(Command::ShiftRegisterSet, address, u16::from(byte)),
                        vec![node_id.clone()],
                    )
                } else {
                    (Frame::new(command, address, value), vec![node_id.clone()])
                }
            }
            Command::AnalogSet => {
                if !node.kind.is_dimmable() {
                    return Err(unsupported());
                }
                let level = u8::try_from(value)
                    .map_err(|_| DispatchError::ValueOutOfRange { command, value })?;
                registry.apply(node_id, &NodeUpdate::analog(level));
                (Frame::new(command, address, value), vec![node_id.clone()])
            }
            Command::ShiftRegisterSet | Command::ShiftRegisterClear => {
                if !node.is_shift_register_bit() {
                    return Err(unsupported());
                }
                let byte = if command == Command::ShiftRegisterClear {
                    0
                } else {
                    u8::try_from(value)
                        .map_err(|_| DispatchError::ValueOutOfRange { command, value })?
                };
                let changed = registry.set_shift_register_byte(address, byte);
                (Frame::new(command, address, u16::from(byte)), changed)
            }
            _ => return Err(DispatchError::NotIssuable(command)),
        };

        // 3. Send; roll back on refusal
        let delivered = self.transport.send(&frame.encode());
        if !delivered {
            for prior in snapshot {
                registry.restore(prior);
            }
        }
        drop(registry);

        if delivered {
            debug!(
                node_id = %node_id,
                command = %frame.command,
                address = frame.address,
                value = frame.value,
                "📤 Frame sent"
            );
            for id in changed {
                self.events.publish(DomainEvent::node_updated(id));
            }
            Ok(IssueOutcome::Delivered(frame))
        } else {
            warn!(node_id = %node_id, command = %command, "⚠️ Transport unavailable - command rolled back");
            self.events
                .publish(DomainEvent::command_rolled_back(node_id.clone(), command));
            Ok(IssueOutcome::NotDelivered)
        }
    }

    /// Turns a node off because its auto-off timer ran out. The timer is
    /// cleared even when the frame cannot be delivered.
    pub fn expire_timer(&self, node_id: &NodeId, now: DateTime<Utc>) -> Result<IssueOutcome, DispatchError> {
        let address = self
            .registry
            .lock()
            .get(node_id)
            .map(|node| node.address)
            .ok_or_else(|| DispatchError::UnknownNode(node_id.clone()))?;

        let outcome = self.issue_at(Command::OutputOff, address, 0, node_id, now)?;
        if !outcome.is_delivered() {
            self.registry.lock().apply(node_id, &NodeUpdate::clear_timer());
        }
        info!(node_id = %node_id, delivered = outcome.is_delivered(), "⏲️ Auto-off timer expired");
        Ok(outcome)
    }
}

fn switch_update(node: &Node, on: bool, now: DateTime<Utc>) -> NodeUpdate {
    let update = NodeUpdate::switch(on);
    if on {
        match node.auto_off_deadline(now) {
            Some(deadline) => update.with_pending_timer(Some(deadline)),
            None => update,
        }
    } else {
        update
    }
}
