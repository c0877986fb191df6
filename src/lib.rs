// Driver for MCR600-series lens motor control boards
//
// The board drives focus, zoom and iris steppers plus an IR-cut filter switch
// over a serial link using fixed-length binary frames.

pub mod config;
pub mod errors;
pub mod jog;
pub mod messages;
pub mod motor;

pub use errors::{Component, ErrorRecord, ErrorRegistry, McrError, Result};
pub use motor::{LensBoard, Motor, MotorId};
