/*!
Serial port access: enumeration, opening, the raw byte monitor and DAC writes.
*/

use anyhow::{Context, Result};
use serialport::SerialPort;
use shared::DacCommand;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

/// Device paths known to the host, possibly none
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().context("Failed to enumerate serial ports")?;
    Ok(ports.into_iter().map(|port| port.port_name).collect())
}

/// Open `path` at 8N1 with the given read timeout
pub fn open_port(path: &str, baudrate: u32, timeout: Duration) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(path, baudrate)
        .data_bits(serialport::DataBits::Eight)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .timeout(timeout)
        .open()
        .with_context(|| format!("Failed to open serial port {} at {} baud", path, baudrate))?;

    info!("Opened {} at {} baud", path, baudrate);
    Ok(port)
}

/// Print every byte as two hex digits and a space until the flag clears or
/// the stream ends. Returns the number of bytes printed.
pub fn dump_bytes<R: Read, W: Write>(
    reader: &mut R,
    out: &mut W,
    running: &AtomicBool,
) -> Result<u64> {
    let mut buffer = [0u8; 256];
    let mut total = 0u64;

    while running.load(Ordering::SeqCst) {
        let n = match reader.read(&mut buffer) {
            Ok(0) => {
                debug!("Serial stream ended");
                break;
            }
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => continue,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("Failed to read from serial port"),
        };

        for byte in &buffer[..n] {
            write!(out, "{:02X} ", byte)?;
        }
        out.flush()?;
        total += n as u64;
    }

    Ok(total)
}

/// Write one DAC command; nothing is read back
pub fn send_dac_command<W: Write>(port: &mut W, command: &DacCommand) -> Result<()> {
    let bytes = command.to_bytes();
    debug!(
        "DAC channel {} code {} -> {}",
        command.channel,
        command.code,
        command.binary_string()
    );

    port.write_all(&bytes)
        .context("Failed to write DAC command")?;
    port.flush().context("Failed to flush DAC command")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::DacChannel;
    use std::collections::VecDeque;
    use std::io::{self, Cursor};

    /// Yields queued chunks, `None` standing for a read timeout
    struct TimeoutReader {
        steps: VecDeque<Option<Vec<u8>>>,
    }

    impl Read for TimeoutReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                Some(Some(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(None) => Err(io::Error::new(ErrorKind::TimedOut, "timed out")),
                None => Ok(0),
            }
        }
    }

    #[test]
    fn test_dump_prints_hex_pairs() {
        let running = AtomicBool::new(true);
        let mut out = Vec::new();

        let count = dump_bytes(&mut Cursor::new(vec![0xAB, 0x01, 0xFF]), &mut out, &running).unwrap();

        assert_eq!(count, 3);
        assert_eq!(String::from_utf8(out).unwrap(), "AB 01 FF ");
    }

    #[test]
    fn test_dump_skips_timeouts() {
        let running = AtomicBool::new(true);
        let mut reader = TimeoutReader {
            steps: VecDeque::from(vec![Some(vec![0xDD]), None, None, Some(vec![0x0A, 0x0B])]),
        };
        let mut out = Vec::new();

        let count = dump_bytes(&mut reader, &mut out, &running).unwrap();

        assert_eq!(count, 3);
        assert_eq!(String::from_utf8(out).unwrap(), "DD 0A 0B ");
    }

    #[test]
    fn test_dump_stops_when_cancelled() {
        let running = AtomicBool::new(false);
        let mut out = Vec::new();

        let count = dump_bytes(&mut Cursor::new(vec![1, 2, 3]), &mut out, &running).unwrap();

        assert_eq!(count, 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_dac_command_bytes() {
        let command = DacCommand::from_voltage(DacChannel::C, 1.5, 3.0).unwrap();
        let mut port = Vec::new();

        send_dac_command(&mut port, &command).unwrap();

        assert_eq!(port.len(), 33);
        assert_eq!(port[0], 0x02);
        assert_eq!(&port[1..], b"00000000000000000000100000000000");
    }
}
