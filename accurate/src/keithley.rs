/*!
Keithley source meter control over SCPI.

Only the raw socket (`TCPIP::host::port::SOCKET`) and serial (`ASRL...`)
resource forms are understood; both carry newline-terminated SCPI text.
*/

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use shared::SharedError;
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Port of the instrument's raw SCPI socket
pub const DEFAULT_SOCKET_PORT: u16 = 5025;

/// Where the instrument lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeithleyAddress {
    Tcp { host: String, port: u16 },
    Serial { device: String },
}

impl FromStr for KeithleyAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let tcp = Regex::new(r"(?i)^TCPIP\d*::([^:]+)(?:::(\d+))?::SOCKET$")?;
        let serial = Regex::new(r"(?i)^ASRL(.+?)(?:::INSTR)?$")?;

        if let Some(caps) = tcp.captures(s) {
            let host = caps[1].to_string();
            let port = match caps.get(2) {
                Some(port) => port
                    .as_str()
                    .parse()
                    .map_err(|_| SharedError::config(format!("Invalid socket port in '{}'", s)))?,
                None => DEFAULT_SOCKET_PORT,
            };
            return Ok(Self::Tcp { host, port });
        }

        if let Some(caps) = serial.captures(s) {
            let device = &caps[1];
            // ASRL3 names COM3; anything else is taken as a device path
            let device = if device.chars().all(|c| c.is_ascii_digit()) {
                format!("COM{}", device)
            } else {
                device.to_string()
            };
            return Ok(Self::Serial { device });
        }

        Err(SharedError::config(format!(
            "Unsupported instrument address '{}': expected TCPIP::<host>[::<port>]::SOCKET or ASRL<device>[::INSTR]",
            s
        ))
        .into())
    }
}

impl fmt::Display for KeithleyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Self::Serial { device } => write!(f, "{}", device),
        }
    }
}

/// Byte stream to an instrument
pub trait Transport: Read + Write {}

impl<T: Read + Write> Transport for T {}

/// Open the transport for `address`. Reads time out after `timeout`.
pub fn open_transport(
    address: &KeithleyAddress,
    timeout: Duration,
    baudrate: u32,
) -> Result<Box<dyn Transport>> {
    match address {
        KeithleyAddress::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port))
                .with_context(|| format!("Failed to connect to {}:{}", host, port))?;
            stream.set_read_timeout(Some(timeout))?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
        KeithleyAddress::Serial { device } => {
            let port = crate::serial::open_port(device, baudrate, timeout)?;
            Ok(Box::new(port))
        }
    }
}

/// Newline-terminated SCPI conversation
pub struct ScpiSession<T> {
    transport: T,
    timeout: Duration,
}

impl<T: Read + Write> ScpiSession<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send one command
    pub fn write_line(&mut self, command: &str) -> Result<()> {
        debug!("SCPI > {}", command);
        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(b'\n');

        self.transport
            .write_all(&line)
            .with_context(|| format!("Failed to send '{}'", command))?;
        self.transport.flush()?;
        Ok(())
    }

    /// Send a query and wait for one response line
    pub fn query(&mut self, command: &str) -> Result<String> {
        self.write_line(command)?;

        let deadline = Instant::now() + self.timeout;
        let mut response = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            match self.transport.read(&mut byte) {
                Ok(0) => bail!("Instrument closed the connection while answering '{}'", command),
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => response.push(byte[0]),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e).with_context(|| format!("Failed to read answer to '{}'", command)),
            }

            if Instant::now() >= deadline {
                return Err(anyhow!(
                    "No answer to '{}' within {} ms",
                    command,
                    self.timeout.as_millis()
                ));
            }
        }

        let response = String::from_utf8_lossy(&response).trim().to_string();
        debug!("SCPI < {}", response);
        Ok(response)
    }
}

/// Switch the instrument to current sourcing at `current_ua` micro-amps,
/// enable the output and return the first reading
pub fn set_source_current<T: Read + Write>(
    session: &mut ScpiSession<T>,
    current_ua: f64,
) -> Result<String> {
    if !current_ua.is_finite() {
        bail!(SharedError::config(format!("Invalid source current {}", current_ua)));
    }
    let amps = current_ua / 1e6;
    info!("Sourcing {} uA", current_ua);

    session.write_line(":SOUR:FUNC CURR")?;
    session.write_line(&format!(":SOUR:CURR {:e}", amps))?;
    session.write_line(":OUTP ON")?;
    session.query("READ?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// Records writes and answers every query with a fixed line
    struct MockInstrument {
        written: Vec<u8>,
        answer: Vec<u8>,
        pending: usize,
    }

    impl MockInstrument {
        fn new(answer: &str) -> Self {
            Self {
                written: Vec::new(),
                answer: answer.as_bytes().to_vec(),
                pending: 0,
            }
        }
    }

    impl Read for MockInstrument {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.written.ends_with(b"?\n") || self.pending >= self.answer.len() {
                return Err(io::Error::new(ErrorKind::TimedOut, "timed out"));
            }
            buf[0] = self.answer[self.pending];
            self.pending += 1;
            Ok(1)
        }
    }

    impl Write for MockInstrument {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_parse_tcp_addresses() {
        assert_eq!(
            "TCPIP::192.168.1.20::SOCKET".parse::<KeithleyAddress>().unwrap(),
            KeithleyAddress::Tcp {
                host: "192.168.1.20".to_string(),
                port: DEFAULT_SOCKET_PORT
            }
        );
        assert_eq!(
            "tcpip0::keithley.lab::1394::socket".parse::<KeithleyAddress>().unwrap(),
            KeithleyAddress::Tcp {
                host: "keithley.lab".to_string(),
                port: 1394
            }
        );
    }

    #[test]
    fn test_parse_serial_addresses() {
        assert_eq!(
            "ASRL3::INSTR".parse::<KeithleyAddress>().unwrap(),
            KeithleyAddress::Serial {
                device: "COM3".to_string()
            }
        );
        assert_eq!(
            "ASRL/dev/ttyUSB0::INSTR".parse::<KeithleyAddress>().unwrap(),
            KeithleyAddress::Serial {
                device: "/dev/ttyUSB0".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown_forms() {
        for address in ["GPIB0::24::INSTR", "USB0::0x05E6::0x2450::INSTR", "", "TCPIP::host::INSTR"] {
            assert!(address.parse::<KeithleyAddress>().is_err(), "{}", address);
        }
    }

    #[test]
    fn test_source_current_sequence() {
        let mut session = ScpiSession::new(MockInstrument::new("+1.000E-06\n"), Duration::from_millis(100));

        let reading = set_source_current(&mut session, 1.0).unwrap();

        assert_eq!(reading, "+1.000E-06");
        let written = String::from_utf8(session.into_inner().written).unwrap();
        assert_eq!(written, ":SOUR:FUNC CURR\n:SOUR:CURR 1e-6\n:OUTP ON\nREAD?\n");
    }

    #[test]
    fn test_query_times_out() {
        let mut session = ScpiSession::new(MockInstrument::new(""), Duration::from_millis(20));

        let err = session.query("*IDN?").unwrap_err();
        assert!(err.to_string().contains("No answer"));
    }

    #[test]
    fn test_non_finite_current_rejected() {
        let mut session = ScpiSession::new(MockInstrument::new("0\n"), Duration::from_millis(20));

        assert!(set_source_current(&mut session, f64::NAN).is_err());
        assert!(session.into_inner().written.is_empty());
    }
}
