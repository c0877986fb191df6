// Byte-stream link to the board
//
// The codec only needs to write a frame, ask how many bytes are pending and
// read them. SerialLink provides that over a serial port; MockLink emulates a
// board in memory for tests.

use serialport::{self, DataBits, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Duration;

use crate::config::BAUD_RATE;

/// Byte stream the codec talks through
pub trait Link {
    /// Write a complete frame
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Number of bytes waiting in the input buffer
    fn bytes_to_read(&mut self) -> io::Result<usize>;

    /// Read pending bytes; returns a `TimedOut` error if nothing arrives
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl<L: Link + ?Sized> Link for Box<L> {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        (**self).write_frame(frame)
    }
    fn bytes_to_read(&mut self) -> io::Result<usize> {
        (**self).bytes_to_read()
    }
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

/// Serial port link (115200-8-N-1)
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("port", &self.port.name())
            .finish()
    }
}

impl SerialLink {
    /// Open a serial port with the board's fixed parameters
    pub fn open(port_name: &str, read_timeout: Duration) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(read_timeout)
            .open()?;

        Ok(Self { port })
    }
}

impl Link for SerialLink {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::MockLink;

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::{HashMap, VecDeque};
    use std::io;

    use super::Link;
    use crate::motor::protocol::{opcode, setup_field, CR, SETUP_FRAME_LEN};

    /// In-memory board emulator
    ///
    /// Every written frame is recorded. Replies come from the scripted queue
    /// first; once it is empty the mock answers like a healthy board running
    /// firmware 5.3.1.0.0.
    #[derive(Debug, Default)]
    pub struct MockLink {
        written: Vec<Vec<u8>>,
        scripted: VecDeque<Option<Vec<u8>>>,
        pending: VecDeque<u8>,
        setups: HashMap<u8, [u8; SETUP_FRAME_LEN]>,
        write_error: Option<io::Error>,
    }

    impl MockLink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue an exact reply for the next command
        pub fn push_reply<T: AsRef<[u8]>>(&mut self, bytes: T) {
            self.scripted.push_back(Some(bytes.as_ref().to_vec()));
        }

        /// Make the board stay silent for the next command
        pub fn push_silence(&mut self) {
            self.scripted.push_back(None);
        }

        /// Fail the next write
        pub fn fail_next_write(&mut self, err: io::Error) {
            self.write_error = Some(err);
        }

        /// Every frame written so far
        pub fn written(&self) -> &[Vec<u8>] {
            &self.written
        }

        /// Written frames with the given opcode
        pub fn frames_with_opcode(&self, op: u8) -> Vec<&[u8]> {
            self.written
                .iter()
                .filter(|f| f.first() == Some(&op))
                .map(Vec::as_slice)
                .collect()
        }

        pub fn clear_written(&mut self) {
            self.written.clear();
        }

        fn board_reply(&mut self, frame: &[u8]) -> Option<Vec<u8>> {
            let op = *frame.first()?;
            match op {
                opcode::FIRMWARE_REVISION => Some(vec![op, 0x05, 0x03, 0x01, 0x00, 0x00, CR]),
                opcode::SERIAL_NUMBER => Some(vec![op, 0x05, 0x50, 0x00, 0x12, 0x34, CR]),
                opcode::MOTOR_SETUP if frame.len() == SETUP_FRAME_LEN => {
                    let mut stored = [0u8; SETUP_FRAME_LEN];
                    stored.copy_from_slice(frame);
                    self.setups.insert(frame[setup_field::MOTOR_ID], stored);
                    Some(vec![op, 0x00, CR])
                }
                opcode::READ_SETUP => {
                    let id = *frame.get(1)?;
                    let mut stored = self.setups.get(&id).copied()?;
                    stored[setup_field::OPCODE] = op;
                    Some(stored.to_vec())
                }
                opcode::MOVE_FORWARD | opcode::MOVE_REVERSE => Some(vec![op, 0x00, CR]),
                // Board reboots on a path change and does not answer
                opcode::COMM_PATH => None,
                _ => Some(vec![op, 0x01, CR]),
            }
        }
    }

    impl Link for MockLink {
        fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
            if let Some(err) = self.write_error.take() {
                return Err(err);
            }
            self.written.push(frame.to_vec());
            let reply = match self.scripted.pop_front() {
                Some(scripted) => scripted,
                None => self.board_reply(frame),
            };
            if let Some(bytes) = reply {
                self.pending.extend(bytes);
            }
            Ok(())
        }

        fn bytes_to_read(&mut self) -> io::Result<usize> {
            Ok(self.pending.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pending.is_empty() {
                // A real port would block until its timeout expires
                return Err(io::Error::new(io::ErrorKind::TimedOut, "Simulated timeout"));
            }
            let n = buf.len().min(self.pending.len());
            for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::protocol::CR;

    #[test]
    fn test_mock_scripted_reply_then_board_emulation() {
        let mut link = MockLink::new();
        link.push_reply([0x66, 0x01, CR]);
        link.push_silence();

        link.write_frame(&[0x66, 0x01, 0x00, 0x0A, 0x01, 0x03, 0xE8, CR]).unwrap();
        assert_eq!(link.bytes_to_read().unwrap(), 3);
        let mut buf = [0u8; 12];
        assert_eq!(link.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[0x66, 0x01, CR]);

        link.write_frame(&[0x76, CR]).unwrap();
        assert_eq!(link.bytes_to_read().unwrap(), 0);
        let err = link.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        link.write_frame(&[0x76, CR]).unwrap();
        assert_eq!(link.bytes_to_read().unwrap(), 7);
        assert_eq!(link.written().len(), 3);
    }
}
