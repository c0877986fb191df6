// MCR600 binary command protocol
//
// Every frame is a fixed-length byte sequence terminated with CR (0x0D).
// Replies are at most 12 bytes; byte 1 == 0x00 signals success.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::McrError;
use crate::messages::MotorSetup;

/// Frame terminator
pub const CR: u8 = 0x0D;

/// Longest reply the board sends
pub const MAX_RESPONSE_LEN: usize = 12;

pub const SETUP_FRAME_LEN: usize = 12;
pub const MOVE_FRAME_LEN: usize = 8;

/// Largest step count one move frame carries
pub const MAX_MOVE_STEPS: i32 = u16::MAX as i32;

/// Command opcodes
pub mod opcode {
    pub const FIRMWARE_REVISION: u8 = 0x76;
    pub const SERIAL_NUMBER: u8 = 0x79;
    pub const COMM_PATH: u8 = 0x6B;
    pub const MOTOR_SETUP: u8 = 0x63;
    pub const READ_SETUP: u8 = 0x67;
    pub const MOVE_FORWARD: u8 = 0x66;
    pub const MOVE_REVERSE: u8 = 0x62;
    /// First byte of the reply synthesized when the board never answers
    pub const TIMEOUT_SENTINEL: u8 = 0x74;
}

/// Field offsets in the 12-byte motor setup frame
pub mod setup_field {
    pub const OPCODE: usize = 0;
    pub const MOTOR_ID: usize = 1;
    pub const MOTOR_TYPE: usize = 2;
    pub const LEFT_STOP: usize = 3;
    pub const RIGHT_STOP: usize = 4;
    pub const MAX_STEPS: usize = 5; // 2 bytes, big-endian
    pub const MIN_SPEED: usize = 7; // 2 bytes, big-endian
    pub const MAX_SPEED: usize = 9; // 2 bytes, big-endian
    pub const TERMINATOR: usize = 11;
}

/// Field offsets in the 8-byte move frame
pub mod move_field {
    pub const OPCODE: usize = 0;
    pub const MOTOR_ID: usize = 1;
    pub const STEPS: usize = 2; // 2 bytes, big-endian
    pub const ACCELERATION: usize = 4;
    pub const SPEED: usize = 5; // 2 bytes, big-endian
    pub const TERMINATOR: usize = 7;
}

/// Response byte carrying the success flag
pub const RESPONSE_STATUS: usize = 1;

/// Actuator ids as specified in the motor control documentation
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorId {
    Focus = 0x01,
    Zoom = 0x02,
    Iris = 0x03,
    Irc = 0x04,
}

impl MotorId {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Speed band the board is configured with for this actuator
    pub fn speed_class(self) -> SpeedClass {
        match self {
            MotorId::Focus | MotorId::Zoom => SpeedClass::Fast,
            MotorId::Iris | MotorId::Irc => SpeedClass::Slow,
        }
    }

    /// Only focus and zoom have PI limit switches wired to board stops
    pub fn has_limit_switch(self) -> bool {
        matches!(self, MotorId::Focus | MotorId::Zoom)
    }
}

impl fmt::Display for MotorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MotorId::Focus => "focus",
            MotorId::Zoom => "zoom",
            MotorId::Iris => "iris",
            MotorId::Irc => "IRC",
        };
        f.write_str(name)
    }
}

impl TryFrom<u8> for MotorId {
    type Error = McrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(MotorId::Focus),
            0x02 => Ok(MotorId::Zoom),
            0x03 => Ok(MotorId::Iris),
            0x04 => Ok(MotorId::Irc),
            other => Err(McrError::InvalidParameter(format!(
                "unknown motor id 0x{:02X}",
                other
            ))),
        }
    }
}

/// Board speed band for a motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedClass {
    /// 10-200 pps (iris)
    Slow,
    /// 100-1500 pps (focus/zoom)
    Fast,
}

impl SpeedClass {
    pub fn min(self) -> u16 {
        match self {
            SpeedClass::Slow => 10,
            SpeedClass::Fast => 100,
        }
    }

    pub fn max(self) -> u16 {
        match self {
            SpeedClass::Slow => 200,
            SpeedClass::Fast => 1500,
        }
    }

    pub fn contains(self, speed: u16) -> bool {
        (self.min()..=self.max()).contains(&speed)
    }
}

/// Drive type written into the setup frame
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotorType {
    Stepper = 0x00,
    Dc = 0x01,
}

/// Which end of the travel range the PI switch sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiSide {
    High,
    Low,
}

impl PiSide {
    /// High when the PI is closer to max steps than to 0
    pub fn from_range(max_steps: i32, pi_step: i32) -> Self {
        if max_steps - pi_step < pi_step {
            PiSide::High
        } else {
            PiSide::Low
        }
    }

    pub fn sign(self) -> i32 {
        match self {
            PiSide::High => 1,
            PiSide::Low => -1,
        }
    }
}

/// Encoded acceleration byte: raw value shifted left 3 with the low flag bit set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acceleration(u8);

impl Acceleration {
    pub fn new(raw: u8) -> Self {
        Acceleration((raw << 3) | 0x01)
    }

    pub fn byte(self) -> u8 {
        self.0
    }
}

impl Default for Acceleration {
    fn default() -> Self {
        Acceleration::new(0)
    }
}

/// Board communication path
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommPath {
    I2c = 0,
    Usb = 1,
    Uart = 2,
}

impl TryFrom<u8> for CommPath {
    type Error = McrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CommPath::I2c),
            1 => Ok(CommPath::Usb),
            2 => Ok(CommPath::Uart),
            other => Err(McrError::InvalidParameter(format!(
                "comm path index {} out of range (0~2)",
                other
            ))),
        }
    }
}

impl TryFrom<&str> for CommPath {
    type Error = McrError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for CommPath {
    type Err = McrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "I2C" | "0" => Ok(CommPath::I2c),
            "USB" | "1" => Ok(CommPath::Usb),
            "UART" | "2" => Ok(CommPath::Uart),
            _ => Err(McrError::InvalidParameter(format!(
                "comm path '{}' not recognized, choose I2C, USB, or UART",
                s
            ))),
        }
    }
}

/// Reply from the board, or the failure frame synthesized on timeout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    bytes: Vec<u8>,
    timed_out: bool,
}

impl Response {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            timed_out: false,
        }
    }

    /// `[0x74, 0x01, CR]`: lets callers treat a missing reply like a rejected command
    pub fn timeout() -> Self {
        Self {
            bytes: vec![opcode::TIMEOUT_SENTINEL, 0x01, CR],
            timed_out: true,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True if the board never answered
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Generic success check: status byte is zero
    pub fn is_ok(&self) -> bool {
        self.bytes.get(RESPONSE_STATUS) == Some(&0x00)
    }
}

/// Lowercase hex dump used for frame logging (e.g. `76:0d`)
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

pub fn firmware_query() -> [u8; 2] {
    [opcode::FIRMWARE_REVISION, CR]
}

pub fn serial_number_query() -> [u8; 2] {
    [opcode::SERIAL_NUMBER, CR]
}

pub fn comm_path_frame(path: CommPath) -> [u8; 3] {
    [opcode::COMM_PATH, path as u8, CR]
}

pub fn read_setup_frame(motor: MotorId) -> [u8; 3] {
    [opcode::READ_SETUP, motor.as_byte(), CR]
}

/// Build a 0x63 setup frame
pub fn setup_frame(setup: &MotorSetup) -> [u8; SETUP_FRAME_LEN] {
    let mut frame = [0u8; SETUP_FRAME_LEN];
    frame[setup_field::OPCODE] = opcode::MOTOR_SETUP;
    frame[setup_field::MOTOR_ID] = setup.motor.as_byte();
    frame[setup_field::MOTOR_TYPE] = setup.motor_type as u8;
    frame[setup_field::LEFT_STOP] = u8::from(setup.left_stop);
    frame[setup_field::RIGHT_STOP] = u8::from(setup.right_stop);
    put_u16(&mut frame, setup_field::MAX_STEPS, setup.max_steps);
    put_u16(&mut frame, setup_field::MIN_SPEED, setup.min_speed);
    put_u16(&mut frame, setup_field::MAX_SPEED, setup.max_speed);
    frame[setup_field::TERMINATOR] = CR;
    frame
}

/// Decode a 0x67 reply (same layout as the setup frame)
pub fn parse_setup(bytes: &[u8]) -> Option<MotorSetup> {
    if bytes.len() < SETUP_FRAME_LEN || bytes[setup_field::TERMINATOR] != CR {
        return None;
    }
    let motor = MotorId::try_from(bytes[setup_field::MOTOR_ID]).ok()?;
    let motor_type = match bytes[setup_field::MOTOR_TYPE] {
        0x00 => MotorType::Stepper,
        _ => MotorType::Dc,
    };
    Some(MotorSetup {
        motor,
        motor_type,
        left_stop: bytes[setup_field::LEFT_STOP] != 0,
        right_stop: bytes[setup_field::RIGHT_STOP] != 0,
        max_steps: get_u16(bytes, setup_field::MAX_STEPS),
        min_speed: get_u16(bytes, setup_field::MIN_SPEED),
        max_speed: get_u16(bytes, setup_field::MAX_SPEED),
    })
}

/// A decoded 0x66/0x62 move frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveCommand {
    pub opcode: u8,
    pub motor: MotorId,
    pub steps: u16,
    pub acceleration: u8,
    pub speed: u16,
}

impl MoveCommand {
    /// Encode a signed step request
    ///
    /// The iris step direction is inverted on the board (0x66 closes it), so a
    /// positive iris request is sent as 0x62. Magnitudes saturate at u16::MAX;
    /// [`Codec::move_motor`](super::codec::Codec::move_motor) rejects them first.
    pub fn new(motor: MotorId, steps: i32, speed: u16, acceleration: Acceleration) -> Self {
        let forward = steps >= 0;
        let opcode = match (motor, forward) {
            (MotorId::Iris, true) | (MotorId::Focus | MotorId::Zoom | MotorId::Irc, false) => {
                opcode::MOVE_REVERSE
            }
            _ => opcode::MOVE_FORWARD,
        };
        let magnitude = u16::try_from(steps.unsigned_abs()).unwrap_or(u16::MAX);
        Self {
            opcode,
            motor,
            steps: magnitude,
            acceleration: acceleration.byte(),
            speed,
        }
    }

    pub fn encode(&self) -> [u8; MOVE_FRAME_LEN] {
        let mut frame = [0u8; MOVE_FRAME_LEN];
        frame[move_field::OPCODE] = self.opcode;
        frame[move_field::MOTOR_ID] = self.motor.as_byte();
        put_u16(&mut frame, move_field::STEPS, self.steps);
        frame[move_field::ACCELERATION] = self.acceleration;
        put_u16(&mut frame, move_field::SPEED, self.speed);
        frame[move_field::TERMINATOR] = CR;
        frame
    }

    pub fn decode(frame: &[u8]) -> Option<Self> {
        if frame.len() != MOVE_FRAME_LEN || frame[move_field::TERMINATOR] != CR {
            return None;
        }
        let opcode = frame[move_field::OPCODE];
        if opcode != opcode::MOVE_FORWARD && opcode != opcode::MOVE_REVERSE {
            return None;
        }
        Some(Self {
            opcode,
            motor: MotorId::try_from(frame[move_field::MOTOR_ID]).ok()?,
            steps: get_u16(frame, move_field::STEPS),
            acceleration: frame[move_field::ACCELERATION],
            speed: get_u16(frame, move_field::SPEED),
        })
    }

    /// Signed step count as the caller requested it
    pub fn signed_steps(&self) -> i32 {
        let reverse = self.opcode == opcode::MOVE_REVERSE;
        let negative = if self.motor == MotorId::Iris { !reverse } else { reverse };
        if negative {
            -i32::from(self.steps)
        } else {
            i32::from(self.steps)
        }
    }

    /// Expected travel time plus 5% for boards running slightly under the set speed
    pub fn expected_duration_ms(&self) -> u64 {
        u64::from(self.steps) * 1050 / u64::from(self.speed.max(1))
    }
}

fn put_u16(frame: &mut [u8], offset: usize, value: u16) {
    frame[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

fn get_u16(frame: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([frame[offset], frame[offset + 1]])
}

/// Format a firmware reply as dot-separated hex digits, dropping the echoed opcode and CR
pub fn format_firmware(bytes: &[u8]) -> String {
    if bytes.len() < 2 {
        return String::new();
    }
    bytes[1..bytes.len() - 1]
        .iter()
        .map(|b| format!("{:x}", b))
        .collect::<Vec<_>>()
        .join(".")
}

/// Major component of a firmware revision string
pub fn firmware_major(revision: &str) -> Option<u32> {
    let major = revision.split('.').next()?;
    u32::from_str_radix(major, 16).ok()
}

/// Format a serial number reply as `NNN-00NNNN`
///
/// The board sends the digits as hex nibbles to be read as decimal.
pub fn format_serial_number(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 5 {
        return None;
    }
    let n = bytes.len();
    let mut prefix = format!("{:02x}{:02x}", bytes[1], bytes[2]);
    prefix.pop();
    Some(format!("{}-00{:x}{:x}", prefix, bytes[n - 3], bytes[n - 2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_move_frame() {
        let cmd = MoveCommand::new(MotorId::Zoom, 500, 600, Acceleration::default());
        let frame = cmd.encode();
        assert_eq!(frame, [0x66, 0x02, 0x01, 0xF4, 0x01, 0x02, 0x58, CR]);

        let decoded = MoveCommand::decode(&frame).unwrap();
        assert_eq!(decoded.motor, MotorId::Zoom);
        assert_eq!(decoded.steps, 0x01F4);
        assert_eq!(decoded.opcode, opcode::MOVE_FORWARD);
        assert_eq!(decoded.signed_steps(), 500);
    }

    #[test]
    fn test_move_direction_encoding() {
        let accel = Acceleration::default();
        let focus_back = MoveCommand::new(MotorId::Focus, -20, 1000, accel);
        assert_eq!(focus_back.opcode, opcode::MOVE_REVERSE);
        assert_eq!(focus_back.steps, 20);
        // Iris convention is inverted
        let iris_open = MoveCommand::new(MotorId::Iris, 40, 100, accel);
        assert_eq!(iris_open.opcode, opcode::MOVE_REVERSE);
        let iris_close = MoveCommand::new(MotorId::Iris, -40, 100, accel);
        assert_eq!(iris_close.opcode, opcode::MOVE_FORWARD);
        assert_eq!(iris_close.steps, 40);
        assert_eq!(iris_close.signed_steps(), -40);
    }

    #[test]
    fn test_move_steps_saturate() {
        let cmd = MoveCommand::new(MotorId::Focus, 100_000, 1000, Acceleration::default());
        assert_eq!(cmd.steps, u16::MAX);
    }

    #[test]
    fn test_expected_duration() {
        let cmd = MoveCommand::new(MotorId::Focus, 1000, 1000, Acceleration::default());
        assert_eq!(cmd.expected_duration_ms(), 1050);
        let cmd = MoveCommand::new(MotorId::Zoom, -600, 600, Acceleration::default());
        assert_eq!(cmd.expected_duration_ms(), 1050);
    }

    #[test]
    fn test_acceleration_encoding() {
        assert_eq!(Acceleration::new(0).byte(), 0x01);
        assert_eq!(Acceleration::new(3).byte(), 0x19);
    }

    #[test]
    fn test_pi_side() {
        assert_eq!(PiSide::from_range(8390, 7959), PiSide::High);
        assert_eq!(PiSide::from_range(4073, 154), PiSide::Low);
        assert_eq!(PiSide::from_range(75, 0), PiSide::Low);
    }

    #[test]
    fn test_setup_frame_layout() {
        let setup = MotorSetup {
            motor: MotorId::Focus,
            motor_type: MotorType::Stepper,
            left_stop: true,
            right_stop: false,
            max_steps: 8390,
            min_speed: 100,
            max_speed: 1500,
        };
        let frame = setup_frame(&setup);
        assert_eq!(
            frame,
            [0x63, 0x01, 0x00, 0x01, 0x00, 0x20, 0xC6, 0x00, 0x64, 0x05, 0xDC, CR]
        );
        assert_eq!(parse_setup(&frame), Some(setup));
        assert_eq!(parse_setup(&[0x74, 0x01, CR]), None);
    }

    #[test]
    fn test_comm_path_parsing() {
        assert_eq!("uart".parse::<CommPath>().unwrap(), CommPath::Uart);
        assert_eq!(CommPath::try_from("I2c").unwrap(), CommPath::I2c);
        assert_eq!(CommPath::try_from(1u8).unwrap(), CommPath::Usb);
        assert!(CommPath::try_from(3u8).is_err());
        assert!("serial".parse::<CommPath>().is_err());
        assert_eq!(comm_path_frame(CommPath::Uart), [0x6B, 0x02, CR]);
    }

    #[test]
    fn test_firmware_formatting() {
        let reply = [0x76, 0x05, 0x03, 0x01, 0x00, 0x00, CR];
        let fw = format_firmware(&reply);
        assert_eq!(fw, "5.3.1.0.0");
        assert_eq!(firmware_major(&fw), Some(5));
        assert_eq!(firmware_major(""), None);
    }

    #[test]
    fn test_serial_number_formatting() {
        let reply = [0x79, 0x05, 0x50, 0x00, 0x12, 0x34, CR];
        assert_eq!(format_serial_number(&reply).unwrap(), "055-001234");
        assert_eq!(format_serial_number(&[0x74, 0x01, CR]), None);
    }

    #[test]
    fn test_response_status() {
        assert!(Response::new(vec![0x66, 0x00, CR]).is_ok());
        assert!(!Response::new(vec![0x66, 0x01, CR]).is_ok());
        let timeout = Response::timeout();
        assert_eq!(timeout.bytes(), &[0x74, 0x01, 0x0D]);
        assert!(timeout.timed_out());
        assert!(!timeout.is_ok());
    }
}
