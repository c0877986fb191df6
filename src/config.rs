// Serial parameters, timing budgets, motion constants and lens presets
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Serial link (115200-8-N-1)
pub const BAUD_RATE: u32 = 115_200;
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

// Default serial port for the board's USB virtual com port
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

// Max time for the board to post a complete response once input is pending
pub const RESPONSE_WINDOW: Duration = Duration::from_millis(500);

// Sleep between polls of the input buffer
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

// Oldest firmware major version this driver talks to
pub const MIN_FIRMWARE_MAJOR: u32 = 5;

// Board reboots after a communication path change; wait this long before the next command
pub const COMM_PATH_REBOOT_DELAY: Duration = Duration::from_millis(700);

// Overshoot used to take up gear backlash, should exceed the lens' maximum backlash
pub const BACKLASH_OVERSHOOT: i32 = 60;

// Default speeds (pps)
pub const FZ_DEFAULT_SPEED: u16 = 1000;
pub const IRIS_DEFAULT_SPEED: u16 = 100;

// IRC switch: activation time is set by step count (1 step = 1 ms at 1000 pps)
pub const IRC_TRAVEL_STEPS: u16 = 1000;
pub const IRC_SWITCH_STEPS: i32 = 50;
pub const IRC_SWITCH_SPEED: u16 = 1000;

/// Timing and diagnostics for the command codec
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodecConfig {
    /// Ceiling on waiting for a complete response after the motion wait
    pub response_window: Duration,
    /// Sleep between input buffer polls
    pub poll_interval: Duration,
    /// Read timeout of the serial port itself
    pub read_timeout: Duration,
    /// Dump every frame sent and received at debug level
    pub log_frames: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            response_window: RESPONSE_WINDOW,
            poll_interval: POLL_INTERVAL,
            read_timeout: READ_TIMEOUT,
            log_frames: false,
        }
    }
}

/// Travel range and PI position of one stepper axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisPreset {
    pub steps: u16,
    pub pi: u16,
    #[serde(default)]
    pub accel: u8,
}

/// Motor constants for a lens model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LensPreset {
    pub name: String,
    pub focus: AxisPreset,
    pub zoom: AxisPreset,
    pub iris_steps: u16,
}

/// Errors loading a lens preset
#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("Unknown lens model: {0}")]
    UnknownModel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid preset file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl LensPreset {
    /// TL1250 (TW60 / TW90)
    pub fn tl1250() -> Self {
        Self {
            name: "TL1250".to_string(),
            focus: AxisPreset { steps: 8390, pi: 7959, accel: 0 },
            zoom: AxisPreset { steps: 3227, pi: 3119, accel: 0 },
            iris_steps: 75,
        }
    }

    /// TL410 (TW50 / TW80)
    pub fn tl410() -> Self {
        Self {
            name: "TL410".to_string(),
            focus: AxisPreset { steps: 9353, pi: 8652, accel: 0 },
            zoom: AxisPreset { steps: 4073, pi: 154, accel: 0 },
            iris_steps: 75,
        }
    }

    /// Look up a built-in preset by model name (case-insensitive)
    pub fn builtin(model: &str) -> Result<Self, PresetError> {
        match model.to_ascii_uppercase().as_str() {
            "TL1250" => Ok(Self::tl1250()),
            "TL410" => Ok(Self::tl410()),
            _ => Err(PresetError::UnknownModel(model.to_string())),
        }
    }

    /// Load a preset from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, PresetError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
