// Error kinds and the append-only error registry
//
// Every driver operation returns a Result; failures are additionally appended
// to an ErrorRegistry so callers can inspect where a fault originated.

use std::fmt;
use std::panic::Location;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::motor::MotorId;

/// Error types for MCR board communication and motion
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum McrError {
    #[error("Serial port error: {0}")]
    SerialPort(String),

    #[error("No communication with the MCR board")]
    NoCommunication,

    #[error("{motor} motor not initialized")]
    NotInitialized { motor: MotorId },

    #[error("{motor} motor move failed")]
    BadMove { motor: MotorId },

    #[error("Timeout waiting for {motor} motor move response")]
    MoveTimeout { motor: MotorId },

    #[error("Speed {speed} pps outside range {min}-{max}")]
    Range { speed: u16, min: u16, max: u16 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl McrError {
    /// Stable signed code for the error kind
    pub fn code(&self) -> i32 {
        match self {
            McrError::SerialPort(_) => -1,
            McrError::NoCommunication => -2,
            McrError::NotInitialized { .. } => -3,
            McrError::BadMove { .. } => -4,
            McrError::MoveTimeout { .. } => -5,
            McrError::Range { .. } => -6,
            McrError::InvalidParameter(_) => -7,
        }
    }
}

pub type Result<T> = std::result::Result<T, McrError>;

/// Part of the driver that raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Board,
    Codec,
    Motor(MotorId),
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Board => f.write_str("board"),
            Component::Codec => f.write_str("codec"),
            Component::Motor(id) => write!(f, "{} motor", id),
        }
    }
}

/// One recorded fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub error: McrError,
    pub component: Component,
    pub location: &'static Location<'static>,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}) at {}:{}",
            self.error.code(),
            self.error,
            self.component,
            self.location.file(),
            self.location.line()
        )
    }
}

/// Shared handle to an append-only list of error records
///
/// Cloning the handle shares the same underlying list. The board and its codec
/// are the only writers; callers read it after an operation fails.
#[derive(Debug, Clone, Default)]
pub struct ErrorRegistry {
    records: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ErrorRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an error, tagging it with the caller's source location
    #[track_caller]
    pub fn record(&self, error: McrError, component: Component) {
        let record = ErrorRecord {
            error,
            component,
            location: Location::caller(),
        };
        debug!("Recorded error: {}", record);
        self.lock().push(record);
    }

    /// Most recent record, if any
    pub fn latest(&self) -> Option<ErrorRecord> {
        self.lock().last().cloned()
    }

    /// Snapshot of every record in order
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            McrError::SerialPort("x".into()),
            McrError::NoCommunication,
            McrError::NotInitialized { motor: MotorId::Focus },
            McrError::BadMove { motor: MotorId::Focus },
            McrError::MoveTimeout { motor: MotorId::Focus },
            McrError::Range { speed: 1, min: 10, max: 200 },
            McrError::InvalidParameter("x".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(McrError::code).collect();
        assert!(codes.iter().all(|&c| c < 0));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_registry_shared_between_clones() {
        let registry = ErrorRegistry::new();
        let writer = registry.clone();
        assert!(registry.latest().is_none());

        writer.record(McrError::NoCommunication, Component::Codec);
        writer.record(McrError::BadMove { motor: MotorId::Zoom }, Component::Motor(MotorId::Zoom));

        assert_eq!(registry.len(), 2);
        let latest = registry.latest().unwrap();
        assert_eq!(latest.error, McrError::BadMove { motor: MotorId::Zoom });
        assert_eq!(latest.component, Component::Motor(MotorId::Zoom));
        assert!(latest.location.file().ends_with("errors.rs"));
        assert_eq!(registry.records()[0].error, McrError::NoCommunication);
    }
}
