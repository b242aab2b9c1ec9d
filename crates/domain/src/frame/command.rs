use serde::{Deserialize, Serialize};

/// Wire command codes.
///
/// Codes are part of the wire contract with the firmware and must not be
/// renumbered. Persisted rules never embed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Command {
    OutputOn = 0x01,
    OutputOff = 0x02,
    OutputToggle = 0x03,
    AnalogSet = 0x04,
    ShiftRegisterSet = 0x05,
    ShiftRegisterClear = 0x06,
    OutputBatch = 0x07,
    TemperatureReading = 0x10,
    HumidityReading = 0x11,
    InputLevel = 0x12,
    InputBatch = 0x13,
    RawConsole = 0x20,
    Error = 0xFF,
}

impl Command {
    pub const ALL: [Command; 13] = [
        Command::OutputOn,
        Command::OutputOff,
        Command::OutputToggle,
        Command::AnalogSet,
        Command::ShiftRegisterSet,
        Command::ShiftRegisterClear,
        Command::OutputBatch,
        Command::TemperatureReading,
        Command::HumidityReading,
        Command::InputLevel,
        Command::InputBatch,
        Command::RawConsole,
        Command::Error,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Commands that set the state of outputs and can be issued toward a node
    pub fn is_output_command(self) -> bool {
        matches!(
            self,
            Self::OutputOn
                | Self::OutputOff
                | Self::OutputToggle
                | Self::AnalogSet
                | Self::ShiftRegisterSet
                | Self::ShiftRegisterClear
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutputOn => "output-on",
            Self::OutputOff => "output-off",
            Self::OutputToggle => "output-toggle",
            Self::AnalogSet => "analog-set",
            Self::ShiftRegisterSet => "shift-register-set",
            Self::ShiftRegisterClear => "shift-register-clear",
            Self::OutputBatch => "output-batch",
            Self::TemperatureReading => "temperature-reading",
            Self::HumidityReading => "humidity-reading",
            Self::InputLevel => "input-level",
            Self::InputBatch => "input-batch",
            Self::RawConsole => "raw-console",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
