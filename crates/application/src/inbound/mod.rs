//! Applies frames reported by the firmware to the registry.
//!
//! Inbound state is authoritative: it overwrites whatever optimistic guess the
//! dispatcher left behind.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use domain::frame::{Command, Frame, decode_batch};
use domain::node::{NodeId, NodeUpdate};
use domain::DomainEvent;

use crate::event_bus::EventBus;
use crate::registry::SharedRegistry;

pub struct InboundHandler {
    registry: SharedRegistry,
    events: EventBus,
}

impl InboundHandler {
    pub fn new(registry: SharedRegistry, events: EventBus) -> Self {
        Self { registry, events }
    }

    /// Decodes and applies one raw message. Malformed input is logged and
    /// dropped. Returns the nodes that changed.
    pub fn handle(&self, bytes: &[u8]) -> Vec<NodeId> {
        match Frame::decode(bytes) {
            Ok(frame) => self.apply_frame(frame),
            Err(e) => {
                warn!(error = %e, len = bytes.len(), "Dropping malformed frame");
                Vec::new()
            }
        }
    }

    pub fn apply_frame(&self, frame: Frame) -> Vec<NodeId> {
        let Frame {
            command,
            address,
            value,
        } = frame;
        debug!(command = %command, address, value, "📥 Frame received");

        let changed = {
            let mut registry = self.registry.lock();
            let plain = |node: &domain::Node| !node.is_shift_register_bit();

            match command {
                Command::OutputOn | Command::OutputOff => registry.apply_by_address_where(
                    address,
                    &NodeUpdate::switch(command == Command::OutputOn),
                    plain,
                ),
                Command::OutputToggle => {
                    let targets: Vec<(NodeId, bool)> = registry
                        .get_by_address(address)
                        .into_iter()
                        .filter(|node| node.kind.is_switchable() && plain(node))
                        .map(|node| (node.id.clone(), node.on_state))
                        .collect();
                    targets
                        .into_iter()
                        .filter(|(id, on)| registry.apply(id, &NodeUpdate::switch(!on)))
                        .map(|(id, _)| id)
                        .collect()
                }
                Command::AnalogSet => {
                    let level = u8::try_from(value).unwrap_or(u8::MAX);
                    registry.apply_by_address(address, &NodeUpdate::analog(level))
                }
                Command::ShiftRegisterSet => {
                    let [_, low] = value.to_be_bytes();
                    registry.set_shift_register_byte(address, low)
                }
                Command::ShiftRegisterClear => registry.set_shift_register_byte(address, 0),
                Command::OutputBatch => decode_batch(value, address)
                    .iter()
                    .flat_map(|(channel, on)| {
                        registry.apply_by_address_where(channel, &NodeUpdate::switch(on), plain)
                    })
                    .collect(),
                Command::TemperatureReading => registry
                    .apply_by_address(address, &NodeUpdate::temperature(frame.sensor_value())),
                Command::HumidityReading => {
                    registry.apply_by_address(address, &NodeUpdate::humidity(frame.sensor_value()))
                }
                Command::InputLevel => {
                    registry.apply_by_address(address, &NodeUpdate::input(value != 0))
                }
                Command::InputBatch => decode_batch(value, address)
                    .iter()
                    .flat_map(|(channel, level)| {
                        registry.apply_by_address(channel, &NodeUpdate::input(level))
                    })
                    .collect(),
                Command::RawConsole => {
                    let text = console_text(address, value);
                    info!(text = %text, "🖥️ Console");
                    self.events.publish(DomainEvent::console_output(text));
                    Vec::new()
                }
                Command::Error => {
                    warn!(address, code = value, "❌ Device reported error");
                    self.events.publish(DomainEvent::device_error(address, value));
                    Vec::new()
                }
            }
        };

        for id in &changed {
            self.events.publish(DomainEvent::node_updated(id.clone()));
        }
        changed
    }

    /// Drains raw messages until the channel closes or `cancel` fires
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<Vec<u8>>, cancel: CancellationToken) {
        info!("Listening for inbound frames");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Inbound listener shutting down");
                    break;
                }
                msg = rx.recv() => match msg {
                    Some(bytes) => {
                        self.handle(&bytes);
                    }
                    None => {
                        warn!("Inbound channel closed");
                        break;
                    }
                }
            }
        }
    }
}

/// Console frames carry up to three printable bytes: address and both value
/// bytes, NUL-padded.
fn console_text(address: u8, value: u16) -> String {
    let [hi, lo] = value.to_be_bytes();
    [address, hi, lo]
        .into_iter()
        .filter(|b| *b != 0)
        .map(char::from)
        .collect()
}
