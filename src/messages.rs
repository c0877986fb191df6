// Data types reported by the driver and printed by the CLI

use serde::{Deserialize, Serialize};

use crate::motor::protocol::{MotorId, MotorType, PiSide};

/// Motor configuration as stored on the board (0x63 / 0x67 frames)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorSetup {
    pub motor: MotorId,
    pub motor_type: MotorType,
    /// Stop at the PI when it lies at the high (max steps) end
    pub left_stop: bool,
    /// Stop at the PI when it lies at the low (0) end
    pub right_stop: bool,
    pub max_steps: u16,
    pub min_speed: u16,
    pub max_speed: u16,
}

/// Snapshot of a stepper motor's logical state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorStatus {
    pub motor: MotorId,
    pub current_step: i32,
    pub current_speed: u16,
    pub max_steps: i32,
    pub pi_step: i32,
    pub pi_side: PiSide,
    pub respect_limits: bool,
    pub homed: bool,
}

/// IR-cut filter position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrcFilter {
    /// Clear filter (switch driven negative)
    Clear,
    /// Visible, IR blocking filter (switch driven positive)
    Visible,
}

impl From<bool> for IrcFilter {
    fn from(on: bool) -> Self {
        if on {
            IrcFilter::Visible
        } else {
            IrcFilter::Clear
        }
    }
}

/// What an actuator knows about where it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionState {
    Stepper { step: i32, homed: bool },
    Switch { filter: Option<IrcFilter> },
}

/// Board identification report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub port: String,
    pub firmware: String,
    pub serial_number: String,
    pub initialized: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_state_json() {
        let state = PositionState::Stepper { step: 7959, homed: true };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"kind":"stepper","step":7959,"homed":true}"#);

        let switch = PositionState::Switch { filter: Some(IrcFilter::Visible) };
        let json = serde_json::to_string(&switch).unwrap();
        assert_eq!(json, r#"{"kind":"switch","filter":"visible"}"#);
    }

    #[test]
    fn test_irc_filter_from_bool() {
        assert_eq!(IrcFilter::from(true), IrcFilter::Visible);
        assert_eq!(IrcFilter::from(false), IrcFilter::Clear);
    }
}
