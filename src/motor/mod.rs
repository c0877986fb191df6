// Motor control module for MCR600 lens control boards
//
// Provides:
// - MCR binary frame protocol (frame builders and parsers)
// - Command codec with blocking, time-bounded replies
// - Stepper state machine (homing, backlash, limits) and the IRC switch
// - Board controller API

pub mod actuator;
mod board;
pub mod codec;
pub mod link;
pub mod protocol;
pub mod stepper;

pub use actuator::{Actuator, IrcSwitch};
pub use board::{LensBoard, Motor};
pub use codec::Codec;
#[cfg(any(test, feature = "mock"))]
pub use link::MockLink;
pub use link::{Link, SerialLink};
pub use protocol::{Acceleration, CommPath, MotorId, MotorType, PiSide, SpeedClass};
pub use stepper::{LimitCheck, LimitHit, StepperMotor};
