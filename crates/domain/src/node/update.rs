use chrono::{DateTime, Utc};

use crate::error::{DomainError, Result};
use crate::node::NodeKind;

/// Named set of optional field writes applied to a [`Node`](crate::node::Node).
///
/// Each field is checked against the target's [`NodeKind`] before anything is
/// written, so a sensor reading can never land on a relay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    pub on_state: Option<bool>,
    pub analog_value: Option<u8>,
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub input_level: Option<bool>,
    /// `Some(None)` clears the timer, `Some(Some(t))` arms it
    pub pending_timer: Option<Option<DateTime<Utc>>>,
}

impl NodeUpdate {
    pub fn switch(on: bool) -> Self {
        Self {
            on_state: Some(on),
            ..Default::default()
        }
    }

    pub fn analog(value: u8) -> Self {
        Self {
            analog_value: Some(value),
            ..Default::default()
        }
    }

    pub fn temperature(value: f32) -> Self {
        Self {
            temperature: Some(value),
            ..Default::default()
        }
    }

    pub fn humidity(value: f32) -> Self {
        Self {
            humidity: Some(value),
            ..Default::default()
        }
    }

    pub fn input(level: bool) -> Self {
        Self {
            input_level: Some(level),
            ..Default::default()
        }
    }

    pub fn clear_timer() -> Self {
        Self {
            pending_timer: Some(None),
            ..Default::default()
        }
    }

    pub fn with_pending_timer(mut self, timer: Option<DateTime<Utc>>) -> Self {
        self.pending_timer = Some(timer);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate_for(&self, kind: NodeKind) -> Result<()> {
        let reject = |field: &'static str| {
            Err(DomainError::FieldNotApplicable {
                field,
                kind: kind.as_str(),
            })
        };

        if self.on_state.is_some() && !kind.is_switchable() {
            return reject("on_state");
        }
        if self.pending_timer.is_some() && !kind.is_switchable() {
            return reject("pending_timer");
        }
        if self.analog_value.is_some() && !kind.is_dimmable() {
            return reject("analog_value");
        }
        if self.temperature.is_some() && !kind.is_sensor() {
            return reject("temperature");
        }
        if self.humidity.is_some() && !kind.is_sensor() {
            return reject("humidity");
        }
        if self.input_level.is_some() && !kind.is_input() {
            return reject("input_level");
        }

        if let Some(t) = self.temperature {
            if !t.is_finite() {
                return Err(DomainError::InvalidValue(format!("temperature {t}")));
            }
        }
        if let Some(h) = self.humidity {
            if !h.is_finite() {
                return Err(DomainError::InvalidValue(format!("humidity {h}")));
            }
        }

        Ok(())
    }
}
