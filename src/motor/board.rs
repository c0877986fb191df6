// Board controller for the MCR600 lens control board
//
// Owns the link (through the codec), checks the firmware on connect and holds
// the motor state for focus, zoom, iris and the IRC switch.

use tracing::{error, info, warn};

use super::actuator::IrcSwitch;
use super::codec::Codec;
use super::link::{Link, SerialLink};
use super::protocol::{self, CommPath, MotorId};
use super::stepper::StepperMotor;
use crate::config::{CodecConfig, MIN_FIRMWARE_MAJOR};
use crate::errors::{Component, ErrorRegistry, McrError, Result};
use crate::messages::{BoardInfo, IrcFilter, MotorSetup, MotorStatus};

/// Connection to one MCR board and the motors configured on it
#[derive(Debug)]
pub struct LensBoard<L: Link = SerialLink> {
    codec: Codec<L>,
    port: String,
    firmware: String,
    initialized: bool,
    focus: Option<StepperMotor>,
    zoom: Option<StepperMotor>,
    iris: Option<StepperMotor>,
    irc: Option<IrcSwitch>,
}

impl LensBoard<SerialLink> {
    /// Open the serial port and verify the board answers
    pub fn connect(port: &str) -> Result<Self> {
        Self::connect_with(port, CodecConfig::default(), ErrorRegistry::new())
    }

    /// Connect with explicit codec timing and a caller-held error registry
    ///
    /// Failing to open the port is the only hard failure. A board that opens
    /// but reports old or no firmware is returned with
    /// [`is_initialized`](Self::is_initialized) false.
    pub fn connect_with(port: &str, config: CodecConfig, errors: ErrorRegistry) -> Result<Self> {
        info!("Opening MCR board on {}", port);
        let link = match SerialLink::open(port, config.read_timeout) {
            Ok(link) => link,
            Err(e) => {
                error!("Serial port not open: {}", e);
                let err = McrError::SerialPort(e.to_string());
                errors.record(err.clone(), Component::Board);
                return Err(err);
            }
        };
        Ok(Self::with_link(link, port, config, errors))
    }
}

impl<L: Link> LensBoard<L> {
    /// Wrap an already open link and read the firmware revision
    pub fn with_link(link: L, port: &str, config: CodecConfig, errors: ErrorRegistry) -> Self {
        let mut codec = Codec::new(link, config, errors);
        let firmware = codec.read_firmware_revision().unwrap_or_default();

        let initialized = match protocol::firmware_major(&firmware) {
            Some(major) if major >= MIN_FIRMWARE_MAJOR => true,
            _ => {
                error!("No valid response received from MCR controller (FW '{}')", firmware);
                codec
                    .errors()
                    .record(McrError::NoCommunication, Component::Board);
                false
            }
        };

        Self {
            codec,
            port: port.to_string(),
            firmware,
            initialized,
            focus: None,
            zoom: None,
            iris: None,
            irc: None,
        }
    }

    /// True once the board answered with a supported firmware revision
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Firmware revision read on connect (empty if the board never answered)
    pub fn firmware_revision(&self) -> &str {
        &self.firmware
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn errors(&self) -> &ErrorRegistry {
        self.codec.errors()
    }

    pub fn codec(&self) -> &Codec<L> {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut Codec<L> {
        &mut self.codec
    }

    pub fn read_serial_number(&mut self) -> Result<String> {
        self.codec.read_board_serial_number()
    }

    /// Identification report for the board
    pub fn info(&mut self) -> Result<BoardInfo> {
        let serial_number = self.read_serial_number()?;
        Ok(BoardInfo {
            port: self.port.clone(),
            firmware: self.firmware.clone(),
            serial_number,
            initialized: self.initialized,
        })
    }

    /// Switch the board to I2C, USB or UART, given as an index or a name
    ///
    /// Invalid paths are rejected without sending anything. The board reboots
    /// on success and stops listening on the current path.
    pub fn set_communication_path<P>(&mut self, path: P) -> Result<()>
    where
        P: TryInto<CommPath, Error = McrError>,
    {
        let path = match path.try_into() {
            Ok(path) => path,
            Err(e) => {
                error!("{}", e);
                self.errors().record(e.clone(), Component::Board);
                return Err(e);
            }
        };
        self.codec.set_communication_path(path)
    }

    pub fn init_focus(&mut self, steps: u16, pi: u16, home: bool, accel: u8) -> Result<()> {
        self.init_stepper(MotorId::Focus, steps, pi, home, accel)
    }

    pub fn init_zoom(&mut self, steps: u16, pi: u16, home: bool, accel: u8) -> Result<()> {
        self.init_stepper(MotorId::Zoom, steps, pi, home, accel)
    }

    pub fn init_iris(&mut self, steps: u16, pi: u16, home: bool, accel: u8) -> Result<()> {
        self.init_stepper(MotorId::Iris, steps, pi, home, accel)
    }

    /// Configure the IRC switch motor (never homed)
    pub fn init_irc(&mut self) -> Result<()> {
        self.irc = Some(IrcSwitch::init(&mut self.codec)?);
        Ok(())
    }

    fn init_stepper(
        &mut self,
        id: MotorId,
        steps: u16,
        pi: u16,
        home: bool,
        accel: u8,
    ) -> Result<()> {
        let slot = match id {
            MotorId::Focus => &mut self.focus,
            MotorId::Zoom => &mut self.zoom,
            MotorId::Iris => &mut self.iris,
            MotorId::Irc => {
                return Err(McrError::InvalidParameter(
                    "IRC is not a stepper motor".to_string(),
                ));
            }
        };
        // A failed init leaves the motor unusable until re-initialized
        *slot = None;
        let mut motor = StepperMotor::init(&mut self.codec, id, steps, pi, accel)?;
        let homed = if home { motor.home(&mut self.codec) } else { Ok(()) };
        *slot = Some(motor);
        homed
    }

    /// Handle to an initialized stepper motor
    pub fn motor(&mut self, id: MotorId) -> Result<Motor<'_, L>> {
        let slot = match id {
            MotorId::Focus => &mut self.focus,
            MotorId::Zoom => &mut self.zoom,
            MotorId::Iris => &mut self.iris,
            MotorId::Irc => {
                return Err(McrError::InvalidParameter(
                    "IRC is a switch, use set_irc_state".to_string(),
                ));
            }
        };
        match slot.as_mut() {
            Some(state) => Ok(Motor {
                state,
                codec: &mut self.codec,
            }),
            None => Err(McrError::NotInitialized { motor: id }),
        }
    }

    pub fn focus(&mut self) -> Result<Motor<'_, L>> {
        self.motor(MotorId::Focus)
    }

    pub fn zoom(&mut self) -> Result<Motor<'_, L>> {
        self.motor(MotorId::Zoom)
    }

    pub fn iris(&mut self) -> Result<Motor<'_, L>> {
        self.motor(MotorId::Iris)
    }

    /// Set the IR-cut filter: true for the visible (IR blocking) filter, false for clear
    pub fn set_irc_state(&mut self, on: bool) -> Result<()> {
        let Some(irc) = self.irc.as_mut() else {
            return Err(McrError::NotInitialized { motor: MotorId::Irc });
        };
        irc.set_state(&mut self.codec, on)
    }

    pub fn irc_state(&self) -> Option<IrcFilter> {
        self.irc.as_ref().and_then(IrcSwitch::filter)
    }

    /// Release the serial link; every later command fails with a communication error
    pub fn close(&mut self) {
        if self.codec.close().is_some() {
            info!("MCR board on {} closed", self.port);
        } else {
            warn!("MCR board on {} already closed", self.port);
        }
        self.initialized = false;
    }
}

/// A stepper motor borrowed together with the board's codec
#[derive(Debug)]
pub struct Motor<'a, L: Link> {
    state: &'a mut StepperMotor,
    codec: &'a mut Codec<L>,
}

impl<L: Link> Motor<'_, L> {
    pub fn id(&self) -> MotorId {
        self.state.id()
    }

    pub fn state(&self) -> &StepperMotor {
        &*self.state
    }

    pub fn current_step(&self) -> i32 {
        self.state.current_step()
    }

    pub fn status(&self) -> MotorStatus {
        self.state.status()
    }

    pub fn home(&mut self) -> Result<()> {
        self.state.home(&mut *self.codec)
    }

    pub fn move_abs(&mut self, step: i32) -> Result<()> {
        self.state.move_abs(&mut *self.codec, step)
    }

    pub fn move_rel(&mut self, steps: i32, correct_backlash: bool) -> Result<()> {
        self.state.move_rel(&mut *self.codec, steps, correct_backlash)
    }

    pub fn set_speed(&mut self, speed: u16) -> Result<()> {
        self.state.set_speed(speed)
    }

    pub fn set_respect_limits(&mut self, state: bool) -> Result<()> {
        self.state.set_respect_limits(&mut *self.codec, state)
    }

    pub fn read_setup(&mut self) -> Result<MotorSetup> {
        self.codec.read_motor_setup(self.state.id())
    }

    /// Overwrite the board configuration for this motor
    pub fn write_setup(&mut self, setup: &MotorSetup) -> Result<()> {
        if setup.motor != self.state.id() {
            return Err(McrError::InvalidParameter(format!(
                "setup for {} motor written to {} motor",
                setup.motor,
                self.state.id()
            )));
        }
        self.codec.write_motor_setup(setup)
    }
}
