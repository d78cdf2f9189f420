/*!
DAC7578 channel table and command encoding.

The FPGA expects one address byte followed by the Din code written out as 32
ASCII `'0'`/`'1'` characters, most significant digit first.
*/

use crate::error::{Result, SharedError};
use crate::protocol::{DAC_CODE_DIGITS, DAC_RESOLUTION};
use std::fmt;
use std::str::FromStr;

/// One of the eight DAC7578 outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DacChannel {
    A = 0x00,
    B = 0x01,
    C = 0x02,
    D = 0x03,
    E = 0x04,
    F = 0x05,
    G = 0x06,
    H = 0x07,
}

impl DacChannel {
    pub const ALL: [DacChannel; 8] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
    ];

    /// Address byte sent before the code
    pub fn address(self) -> u8 {
        self as u8
    }

    pub fn letter(self) -> char {
        (b'A' + self.address()) as char
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            'C' => Some(Self::C),
            'D' => Some(Self::D),
            'E' => Some(Self::E),
            'F' => Some(Self::F),
            'G' => Some(Self::G),
            'H' => Some(Self::H),
            _ => None,
        }
    }
}

impl FromStr for DacChannel {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => {
                Self::from_letter(letter).ok_or_else(|| SharedError::InvalidChannel(s.to_string()))
            }
            _ => Err(SharedError::InvalidChannel(s.to_string())),
        }
    }
}

impl fmt::Display for DacChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Address and Din code for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DacCommand {
    pub channel: DacChannel,
    pub code: u32,
}

impl DacCommand {
    /// Compute `floor(voltage * 4096 / reference)` for `channel`.
    ///
    /// Voltages outside `[0, reference)` do not fit the 12-bit code and are
    /// rejected.
    pub fn from_voltage(channel: DacChannel, voltage: f64, reference: f64) -> Result<Self> {
        let invalid = || SharedError::InvalidVoltage { voltage, reference };

        if !voltage.is_finite() || !reference.is_finite() || reference <= 0.0 || voltage < 0.0 {
            return Err(invalid());
        }

        let code = (voltage * DAC_RESOLUTION as f64 / reference).floor();
        if code >= DAC_RESOLUTION as f64 {
            return Err(invalid());
        }

        Ok(Self {
            channel,
            code: code as u32,
        })
    }

    /// Din code as a zero-padded 32-digit binary string
    pub fn binary_string(&self) -> String {
        format!("{:0width$b}", self.code, width = DAC_CODE_DIGITS)
    }

    /// Bytes sent to the FPGA: address byte, then the ASCII binary string
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + DAC_CODE_DIGITS);
        bytes.push(self.channel.address());
        bytes.extend_from_slice(self.binary_string().as_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DAC_REFERENCE_VOLTAGE;

    #[test]
    fn test_channel_table() {
        for (i, channel) in DacChannel::ALL.iter().enumerate() {
            assert_eq!(channel.address(), i as u8);
        }
        assert_eq!("A".parse::<DacChannel>().unwrap(), DacChannel::A);
        assert_eq!("h".parse::<DacChannel>().unwrap(), DacChannel::H);
        assert_eq!(DacChannel::C.to_string(), "C");
    }

    #[test]
    fn test_invalid_channel() {
        assert!(matches!("Z".parse::<DacChannel>(), Err(SharedError::InvalidChannel(c)) if c == "Z"));
        assert!("AB".parse::<DacChannel>().is_err());
        assert!("".parse::<DacChannel>().is_err());
    }

    #[test]
    fn test_midscale_code() {
        let cmd = DacCommand::from_voltage(DacChannel::B, 1.5, DAC_REFERENCE_VOLTAGE).unwrap();
        assert_eq!(cmd.code, 2048);
        assert_eq!(cmd.binary_string(), "00000000000000000000100000000000");
        assert_eq!(cmd.binary_string().len(), 32);
    }

    #[test]
    fn test_board_default_voltages() {
        // Vcm, Vbias3, Vth4 and Vbias1 defaults
        let cases = [(1.5, 0x800), (1.18, 0x64B), (2.5, 0xD55), (1.6, 2184)];
        for (voltage, code) in cases {
            let cmd = DacCommand::from_voltage(DacChannel::A, voltage, 3.0).unwrap();
            assert_eq!(cmd.code, code, "voltage {}", voltage);
        }
    }

    #[test]
    fn test_wire_bytes() {
        let cmd = DacCommand::from_voltage(DacChannel::D, 1.5, 3.0).unwrap();
        let bytes = cmd.to_bytes();
        assert_eq!(bytes.len(), 33);
        assert_eq!(bytes[0], 0x03);
        assert_eq!(&bytes[1..], b"00000000000000000000100000000000");
    }

    #[test]
    fn test_out_of_range_voltage() {
        assert!(DacCommand::from_voltage(DacChannel::A, -0.1, 3.0).is_err());
        assert!(DacCommand::from_voltage(DacChannel::A, 3.0, 3.0).is_err());
        assert!(DacCommand::from_voltage(DacChannel::A, f64::NAN, 3.0).is_err());
        assert_eq!(DacCommand::from_voltage(DacChannel::A, 0.0, 3.0).unwrap().code, 0);
        assert_eq!(DacCommand::from_voltage(DacChannel::A, 2.9999, 3.0).unwrap().code, 4095);
    }
}
