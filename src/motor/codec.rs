// Command codec: encodes board operations, sends them and waits for replies
//
// All calls block. A move is expected to take steps * 1050 / speed ms, so the
// codec first waits up to that long for any reply to appear, then gives the
// board a fixed window to deliver a complete frame. A missing reply becomes the
// in-band failure frame [0x74, 0x01, CR].

use std::io;
use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::link::Link;
use super::protocol::{
    self, Acceleration, CommPath, MotorId, MotorType, MoveCommand, PiSide, Response,
    SpeedClass, MAX_MOVE_STEPS, MAX_RESPONSE_LEN, CR,
};
use crate::config::CodecConfig;
use crate::errors::{Component, ErrorRegistry, McrError, Result};
use crate::messages::MotorSetup;

/// Frame codec and transport adapter over a [`Link`]
///
/// Reconnecting after a lost link is left to the caller: wrap the link in a
/// retrying [`Link`] implementation if that is needed.
#[derive(Debug)]
pub struct Codec<L> {
    link: Option<L>,
    config: CodecConfig,
    errors: ErrorRegistry,
}

impl<L: Link> Codec<L> {
    pub fn new(link: L, config: CodecConfig, errors: ErrorRegistry) -> Self {
        Self {
            link: Some(link),
            config,
            errors,
        }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn errors(&self) -> &ErrorRegistry {
        &self.errors
    }

    /// The underlying link, or None once closed
    pub fn link(&self) -> Option<&L> {
        self.link.as_ref()
    }

    pub fn link_mut(&mut self) -> Option<&mut L> {
        self.link.as_mut()
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    /// Release the link; later commands fail with a serial port error
    pub fn close(&mut self) -> Option<L> {
        self.link.take()
    }

    /// Send a frame and wait for the reply
    ///
    /// `wait` is how long the commanded action should take; the board only
    /// answers once it is done (or a PI switch stopped the motor early).
    pub fn send_command(&mut self, frame: &[u8], wait: Duration) -> Response {
        let log_frames = self.config.log_frames;
        let Some(link) = self.link.as_mut() else {
            warn!("Command sent on a closed link");
            self.errors.record(
                McrError::SerialPort("link closed".to_string()),
                Component::Codec,
            );
            return Response::timeout();
        };

        if log_frames {
            debug!("   -> {}", protocol::hex_dump(frame));
        }
        if let Err(e) = link.write_frame(frame) {
            error!("Serial write failed: {}", e);
            self.errors.record(McrError::SerialPort(e.to_string()), Component::Codec);
            return Response::timeout();
        }

        // Wait until the action finishes or a PI triggers a reply
        let motion_deadline = Instant::now() + wait;
        while Instant::now() < motion_deadline {
            match has_input(link) {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    error!("Serial link lost: {}", e);
                    self.errors.record(McrError::SerialPort(e.to_string()), Component::Codec);
                    return Response::timeout();
                }
            }
            sleep(self.config.poll_interval);
        }

        // Read the reply
        let read_deadline = Instant::now() + self.config.response_window;
        let response = loop {
            let frame = match has_input(link) {
                Ok(true) => read_frame(link),
                Ok(false) => Ok(Vec::new()),
                Err(e) => Err(e),
            };
            match frame {
                Ok(bytes) if !bytes.is_empty() => break Some(Response::new(bytes)),
                Ok(_) => {}
                Err(e) => {
                    error!("Serial link lost: {}", e);
                    self.errors.record(McrError::SerialPort(e.to_string()), Component::Codec);
                    break None;
                }
            }
            if Instant::now() >= read_deadline {
                break None;
            }
            sleep(self.config.poll_interval);
        };

        let response = response.unwrap_or_else(|| {
            warn!("MCR send command timed out without response");
            Response::timeout()
        });
        if log_frames {
            debug!("   <- {}", protocol::hex_dump(response.bytes()));
        }
        response
    }

    /// Firmware revision, e.g. "5.3.1.0.0"
    pub fn read_firmware_revision(&mut self) -> Result<String> {
        let response = self.send_command(&protocol::firmware_query(), Duration::ZERO);
        if response.timed_out() || response.bytes().len() < 3 {
            error!("No response received from MCR controller");
            self.errors.record(McrError::NoCommunication, Component::Codec);
            return Err(McrError::NoCommunication);
        }
        let fw = protocol::format_firmware(response.bytes());
        info!("FW revision: {}", fw);
        Ok(fw)
    }

    /// Board serial number, e.g. "055-001234"
    pub fn read_board_serial_number(&mut self) -> Result<String> {
        let response = self.send_command(&protocol::serial_number_query(), Duration::ZERO);
        let sn = if response.timed_out() {
            None
        } else {
            protocol::format_serial_number(response.bytes())
        };
        match sn {
            Some(sn) => {
                info!("Board serial number {}", sn);
                Ok(sn)
            }
            None => {
                error!("No response received from MCR controller");
                self.errors.record(McrError::NoCommunication, Component::Codec);
                Err(McrError::NoCommunication)
            }
        }
    }

    /// Switch the board to another communication path
    ///
    /// The board reboots and drops the current path; wait at least
    /// [`COMM_PATH_REBOOT_DELAY`](crate::config::COMM_PATH_REBOOT_DELAY)
    /// before sending anything else.
    pub fn set_communication_path(&mut self, path: CommPath) -> Result<()> {
        // No reply is expected: the board is already rebooting
        self.send_command(&protocol::comm_path_frame(path), Duration::ZERO);
        info!("New comm path set ({:?})", path);
        Ok(())
    }

    /// Configure a motor's travel, stops and speed band (no movement)
    pub fn init_motor(
        &mut self,
        motor: MotorId,
        steps: u16,
        pi: u16,
        speed_class: SpeedClass,
        motor_type: MotorType,
    ) -> Result<()> {
        let mut setup = MotorSetup {
            motor,
            motor_type,
            left_stop: false,
            right_stop: false,
            max_steps: steps,
            min_speed: speed_class.min(),
            max_speed: speed_class.max(),
        };
        if motor.has_limit_switch() {
            match PiSide::from_range(i32::from(steps), i32::from(pi)) {
                PiSide::High => setup.left_stop = true,
                PiSide::Low => setup.right_stop = true,
            }
        }

        let response = self.send_command(&protocol::setup_frame(&setup), Duration::ZERO);
        if !response.is_ok() {
            error!("Init {} motor response error", motor);
            self.errors.record(McrError::NoCommunication, Component::Codec);
            return Err(McrError::NoCommunication);
        }
        debug!("{} motor configured: {:?}", motor, setup);
        Ok(())
    }

    /// Move a motor by a signed number of steps and wait for it to finish
    pub fn move_motor(
        &mut self,
        motor: MotorId,
        steps: i32,
        speed: u16,
        acceleration: Acceleration,
    ) -> Result<()> {
        if steps.unsigned_abs() > MAX_MOVE_STEPS.unsigned_abs() {
            error!("{} motor move of {} steps does not fit one frame", motor, steps);
            let err = McrError::InvalidParameter(format!(
                "{} steps exceeds the {} step move limit",
                steps, MAX_MOVE_STEPS
            ));
            self.errors.record(err.clone(), Component::Codec);
            return Err(err);
        }
        let command = MoveCommand::new(motor, steps, speed, acceleration);
        let wait = Duration::from_millis(command.expected_duration_ms());
        debug!(
            "Move {} motor {} steps at {} pps (wait {:?})",
            motor, steps, speed, wait
        );

        let response = self.send_command(&command.encode(), wait);
        if !response.is_ok() {
            error!("Move {} motor response error", motor);
            let err = McrError::MoveTimeout { motor };
            self.errors.record(err.clone(), Component::Codec);
            return Err(err);
        }
        Ok(())
    }

    /// Read the motor configuration stored on the board
    pub fn read_motor_setup(&mut self, motor: MotorId) -> Result<MotorSetup> {
        let response = self.send_command(&protocol::read_setup_frame(motor), Duration::ZERO);
        let setup = if response.timed_out() {
            None
        } else {
            protocol::parse_setup(response.bytes())
        };
        setup.ok_or_else(|| {
            error!("Read {} motor setup failed", motor);
            self.errors.record(McrError::NoCommunication, Component::Codec);
            McrError::NoCommunication
        })
    }

    /// Overwrite the motor configuration on the board
    pub fn write_motor_setup(&mut self, setup: &MotorSetup) -> Result<()> {
        let response = self.send_command(&protocol::setup_frame(setup), Duration::ZERO);
        if !response.is_ok() {
            error!("Write {} motor setup response error", setup.motor);
            self.errors.record(McrError::NoCommunication, Component::Codec);
            return Err(McrError::NoCommunication);
        }
        Ok(())
    }

    /// Enable or disable the board's PI stop for focus/zoom
    ///
    /// The current configuration is read back first so only the stop flags
    /// change.
    pub fn set_regard_limits(
        &mut self,
        motor: MotorId,
        state: bool,
        pi_side: PiSide,
    ) -> Result<()> {
        if !motor.has_limit_switch() {
            error!("{} motor has no limit switch", motor);
            return Err(McrError::InvalidParameter(format!(
                "{} motor has no limit switch",
                motor
            )));
        }

        let mut setup = self.read_motor_setup(motor)?;
        setup.left_stop = state && pi_side == PiSide::High;
        setup.right_stop = state && pi_side == PiSide::Low;
        self.write_motor_setup(&setup)
    }
}

fn has_input<L: Link>(link: &mut L) -> io::Result<bool> {
    Ok(link.bytes_to_read()? > 0)
}

/// Read one reply: stops at 12 bytes, at a CR with nothing else pending, or on timeout
fn read_frame<L: Link>(link: &mut L) -> io::Result<Vec<u8>> {
    let mut frame = Vec::with_capacity(MAX_RESPONSE_LEN);
    let mut buf = [0u8; MAX_RESPONSE_LEN];
    while frame.len() < MAX_RESPONSE_LEN {
        let remaining = MAX_RESPONSE_LEN - frame.len();
        match link.read(&mut buf[..remaining]) {
            Ok(0) => break,
            Ok(n) => frame.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) => return Err(e),
        }
        if frame.last() == Some(&CR) && !has_input(link)? {
            break;
        }
    }
    Ok(frame)
}
