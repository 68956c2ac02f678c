//! Blocking byte pipe over the controller's virtual serial port.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

/// A blocking byte pipe with per-call timeout overrides.
///
/// Reads may legally return fewer bytes than requested when the timeout
/// expires; a short read is not an error. All concurrency concerns live in
/// the callers.
pub trait ByteLink {
    fn write_bytes(&mut self, bytes: &[u8], timeout: Option<Duration>) -> io::Result<usize>;

    /// Read up to `n` bytes, waiting at most the (possibly overridden) read
    /// timeout for them to arrive.
    fn read_bytes(&mut self, n: usize, timeout: Option<Duration>) -> io::Result<Vec<u8>>;
}

/// The CDC serial endpoint of the controller, configured 8-N-1 without flow
/// control.
///
/// The handle owns the port; dropping it releases the device on every exit
/// path. [`CdcSerial::try_clone`] yields a second handle onto the same port
/// so one thread can keep reading a stream while another issues the final
/// write.
pub struct CdcSerial {
    port: Box<dyn SerialPort>,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl CdcSerial {
    /// Baud rate is nominal only; USB-CDC ignores it.
    const BAUD_RATE: u32 = 115_200;

    pub fn open(name: &str, read_timeout: Duration, write_timeout: Duration) -> io::Result<Self> {
        let port = serialport::new(name, Self::BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()
            .map_err(io::Error::from)?;
        Ok(CdcSerial {
            port,
            read_timeout,
            write_timeout,
        })
    }

    pub fn try_clone(&self) -> io::Result<Self> {
        let port = self.port.try_clone().map_err(io::Error::from)?;
        Ok(CdcSerial {
            port,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        })
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }

    fn fill_until(&mut self, buf: &mut [u8], deadline: Instant) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    break
                }
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                break;
            }
        }
        Ok(filled)
    }
}

impl ByteLink for CdcSerial {
    fn write_bytes(&mut self, bytes: &[u8], timeout: Option<Duration>) -> io::Result<usize> {
        let effective = timeout.unwrap_or(self.write_timeout);
        self.port.set_timeout(effective).map_err(io::Error::from)?;
        let result = self.port.write_all(bytes).and_then(|()| self.port.flush());
        // The port carries a single timeout; reads expect theirs back.
        let restored = self.port.set_timeout(self.read_timeout).map_err(io::Error::from);
        result.and(restored)?;
        Ok(bytes.len())
    }

    fn read_bytes(&mut self, n: usize, timeout: Option<Duration>) -> io::Result<Vec<u8>> {
        let effective = timeout.unwrap_or(self.read_timeout);
        if timeout.is_some() {
            self.port.set_timeout(effective).map_err(io::Error::from)?;
        }
        let deadline = Instant::now() + effective;
        let mut buf = vec![0u8; n];
        let result = self.fill_until(&mut buf, deadline);
        if timeout.is_some() {
            self.port
                .set_timeout(self.read_timeout)
                .map_err(io::Error::from)?;
        }
        let filled = result?;
        buf.truncate(filled);
        Ok(buf)
    }
}
