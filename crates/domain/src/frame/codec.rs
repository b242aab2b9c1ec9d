//! Fixed 4-byte frame:
//! - Byte 0: command code
//! - Byte 1: address
//! - Bytes 2-3: value (BE)

use thiserror::Error;

use super::Command;

/// Frame size in bytes
pub const FRAME_LEN: usize = 4;

/// Channels covered by one batch bitmask
pub const BATCH_WIDTH: u8 = 16;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Invalid frame length: {0} bytes (expected 4)")]
    InvalidLength(usize),

    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),
}

/// One decoded wire message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub address: u8,
    pub value: u16,
}

impl Frame {
    pub fn new(command: Command, address: u8, value: u16) -> Self {
        Self {
            command,
            address,
            value,
        }
    }

    pub fn encode(&self) -> [u8; FRAME_LEN] {
        encode(self.command, self.address, self.value)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        decode(bytes)
    }

    /// Value interpreted as a sensor reading scaled by 10
    pub fn sensor_value(&self) -> f32 {
        f32::from(self.value) / 10.0
    }
}

pub fn encode(command: Command, address: u8, value: u16) -> [u8; FRAME_LEN] {
    let [hi, lo] = value.to_be_bytes();
    [command.code(), address, hi, lo]
}

pub fn decode(bytes: &[u8]) -> Result<Frame, FrameError> {
    let [code, address, hi, lo]: [u8; FRAME_LEN] = bytes
        .try_into()
        .map_err(|_| FrameError::InvalidLength(bytes.len()))?;

    let command = Command::from_code(code).ok_or(FrameError::UnknownCommand(code))?;

    Ok(Frame {
        command,
        address,
        value: u16::from_be_bytes([hi, lo]),
    })
}

/// Per-channel states unpacked from a batch bitmask
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchUpdate {
    pub addresses: Vec<u8>,
    pub states: Vec<bool>,
}

impl BatchUpdate {
    /// Addresses whose bit was set, ascending
    pub fn active_addresses(&self) -> Vec<u8> {
        self.iter()
            .filter_map(|(address, state)| state.then_some(address))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, bool)> + '_ {
        self.addresses.iter().copied().zip(self.states.iter().copied())
    }
}

/// Unpacks a bitmask where bit `i` is the state of channel `address_base + i`.
///
/// Channels past address 255 do not exist on the wire and are skipped.
pub fn decode_batch(value: u16, address_base: u8) -> BatchUpdate {
    let mut batch = BatchUpdate::default();
    for bit in 0..BATCH_WIDTH {
        let Some(address) = address_base.checked_add(bit) else {
            break;
        };
        batch.addresses.push(address);
        batch.states.push(value & (1 << bit) != 0);
    }
    batch
}
