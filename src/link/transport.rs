//! Serial transport for the modem link.
//!
//! The state machine talks to the wire through the [`Transport`] trait so it
//! can run against real hardware or a scripted mock. Reads are strictly
//! non-blocking: `read_available` returns whatever the driver already
//! buffered and never waits for more.

use crate::error::NodeResult;

#[cfg(feature = "modem_serial")]
use crate::error::NodeError;
#[cfg(feature = "modem_serial")]
use std::io::{Read, Write};
#[cfg(feature = "modem_serial")]
use std::time::Duration;

/// A byte channel to the modem.
pub trait Transport {
    /// Copy already-received bytes into `buf` without blocking.
    ///
    /// Returns the number of bytes copied; 0 means nothing is waiting.
    fn read_available(&mut self, buf: &mut [u8]) -> NodeResult<usize>;

    /// Write the whole buffer to the channel.
    fn write_all(&mut self, bytes: &[u8]) -> NodeResult<()>;
}

/// Transport over a real serial port.
#[cfg(feature = "modem_serial")]
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

#[cfg(feature = "modem_serial")]
impl SerialTransport {
    /// Open the serial port with the modem's framing (8N1).
    pub fn open(path: &str, baud_rate: u32) -> NodeResult<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .timeout(Duration::from_millis(20))
            .open()
            .map_err(|e| NodeError::Transport(format!("failed to open '{path}': {e}")))?;
        Ok(Self { port })
    }
}

#[cfg(feature = "modem_serial")]
impl Transport for SerialTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> NodeResult<usize> {
        let waiting = self
            .port
            .bytes_to_read()
            .map_err(|e| NodeError::Transport(e.to_string()))?;
        if waiting == 0 {
            return Ok(0);
        }
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> NodeResult<()> {
        self.port.write_all(bytes)?;
        Ok(())
    }
}
