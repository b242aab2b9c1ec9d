use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::node::{NodeId, NodeUpdate};

/// Highest bit position on a shift-register byte
pub const MAX_BIT_INDEX: u8 = 7;

/// What a node physically is. Decides which state fields are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    BinaryOutput,
    AnalogOutput,
    BinaryInput,
    Sensor,
    Composite,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BinaryOutput => "binary-output",
            Self::AnalogOutput => "analog-output",
            Self::BinaryInput => "binary-input",
            Self::Sensor => "sensor",
            Self::Composite => "composite",
        }
    }

    /// Carries an `on_state` (and therefore auto-off timers)
    pub fn is_switchable(&self) -> bool {
        matches!(self, Self::BinaryOutput | Self::Composite)
    }

    pub fn is_dimmable(&self) -> bool {
        matches!(self, Self::AnalogOutput | Self::Composite)
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Self::BinaryInput)
    }

    pub fn is_sensor(&self) -> bool {
        matches!(self, Self::Sensor)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensor metric carried by a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temperature,
    Humidity,
}

/// Latest environmental readings, tenths-of-unit precision
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReadings {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
}

impl SensorReadings {
    pub fn get(&self, metric: Metric) -> Option<f32> {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
        }
    }
}

/// Rounds to one decimal place, the precision of the wire encoding.
pub fn round_tenths(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// A single addressable hardware endpoint.
///
/// Several nodes may share one `address`. Nodes with a `bit_index` are bits of
/// a shift-register byte jointly owned by every node on that address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    pub address: u8,
    pub kind: NodeKind,
    #[serde(default)]
    pub on_state: bool,
    #[serde(default)]
    pub analog_value: u8,
    #[serde(default)]
    pub sensor: SensorReadings,
    #[serde(default)]
    pub input_level: bool,
    #[serde(default)]
    pub bit_index: Option<u8>,
    #[serde(default)]
    pub pending_timer: Option<DateTime<Utc>>,
    /// Configured auto-off duration in seconds
    #[serde(default)]
    pub auto_off_secs: Option<u32>,
}

impl Node {
    pub fn new(id: NodeId, address: u8, kind: NodeKind) -> Self {
        Self {
            name: id.to_string(),
            id,
            address,
            kind,
            on_state: false,
            analog_value: 0,
            sensor: SensorReadings::default(),
            input_level: false,
            bit_index: None,
            pending_timer: None,
            auto_off_secs: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_bit_index(mut self, bit_index: u8) -> Self {
        self.bit_index = Some(bit_index);
        self
    }

    pub fn with_auto_off(mut self, seconds: u32) -> Self {
        self.auto_off_secs = Some(seconds);
        self
    }

    /// Checks the node's own configuration (not sibling invariants)
    pub fn validate(&self) -> Result<()> {
        if let Some(bit) = self.bit_index {
            if bit > MAX_BIT_INDEX {
                return Err(DomainError::InvalidConfiguration(format!(
                    "Node {} bit_index {} out of range 0..={}",
                    self.id, bit, MAX_BIT_INDEX
                )));
            }
            if !self.kind.is_switchable() {
                return Err(DomainError::InvalidConfiguration(format!(
                    "Node {} is a {} node and cannot sit on a shift register",
                    self.id, self.kind
                )));
            }
        }

        if self.auto_off_secs.is_some() && !self.kind.is_switchable() {
            return Err(DomainError::InvalidConfiguration(format!(
                "Node {} is a {} node and cannot have an auto-off timer",
                self.id, self.kind
            )));
        }

        Ok(())
    }

    pub fn is_shift_register_bit(&self) -> bool {
        self.bit_index.is_some()
    }

    /// Auto-off expiry for a node switched on at `now`, if configured
    pub fn auto_off_deadline(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.auto_off_secs
            .map(|secs| now + Duration::seconds(i64::from(secs)))
    }

    pub fn timer_expired(&self, now: DateTime<Utc>) -> bool {
        self.pending_timer.is_some_and(|deadline| now >= deadline)
    }

    /// Merges an update into this node. Fields not applicable to the node's
    /// kind are rejected and nothing is written.
    pub fn apply(&mut self, update: &NodeUpdate) -> Result<()> {
        update.validate_for(self.kind)?;

        if let Some(on) = update.on_state {
            self.on_state = on;
            if !on {
                self.pending_timer = None;
            }
        }
        if let Some(value) = update.analog_value {
            self.analog_value = value;
        }
        if let Some(t) = update.temperature {
            self.sensor.temperature = Some(round_tenths(t));
        }
        if let Some(h) = update.humidity {
            self.sensor.humidity = Some(round_tenths(h));
        }
        if let Some(level) = update.input_level {
            self.input_level = level;
        }
        if let Some(timer) = update.pending_timer {
            self.pending_timer = timer;
        }

        Ok(())
    }
}
