/*!
Configuration management for the ACCURATE2 command line tool.

Every section is optional; missing values fall back to the board defaults.
Command line options override whatever the file provides.
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared::protocol::{
    DAC_REFERENCE_VOLTAGE, DEFAULT_LSB_CHARGE_AC, DEFAULT_SAMPLING_PERIOD_MS, FIELD_CHARGE,
};
use shared::{Calibration, FrameLayout, LayoutPreset};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub acquisition: AcquisitionConfig,
    pub dac: DacConfig,
    pub keithley: KeithleyConfig,
}

impl AppConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as TOML: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            debug!("Loading configuration from {}", path.as_ref().display());
            Self::load_from_file(path)
        } else {
            debug!("No configuration at {}, using defaults", path.as_ref().display());
            Ok(Self::new())
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize config to TOML")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}

/// Serial link to the FPGA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate used when the command line does not give one
    pub baudrate: u32,

    /// Read timeout in milliseconds; a timeout means "no data yet"
    pub timeout_ms: u64,
}

/// Shortest read timeout; zero would make reads non-blocking and spin the loop
pub const MIN_TIMEOUT_MS: u64 = 10;

impl SerialConfig {
    /// Read timeout, never shorter than [`MIN_TIMEOUT_MS`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(MIN_TIMEOUT_MS))
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baudrate: 9600,
            timeout_ms: 1000,
        }
    }
}

/// Frame layout: a preset name or an explicit table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutConfig {
    Preset(LayoutPreset),
    Custom(FrameLayout),
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::Preset(LayoutPreset::Extended)
    }
}

/// Measurement conversion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Sampling period in ms
    pub sampling_period_ms: f64,

    /// Least significant bit value in aC
    pub lsb_charge_ac: f64,

    /// Frame layout sent by the FPGA
    pub layout: LayoutConfig,
}

impl AcquisitionConfig {
    pub fn calibration(&self) -> Calibration {
        Calibration::new(self.sampling_period_ms, self.lsb_charge_ac)
    }

    /// Resolve and validate the frame layout. The layout must carry a charge
    /// field for a current to be computed.
    pub fn frame_layout(&self) -> Result<FrameLayout> {
        let layout = match &self.layout {
            LayoutConfig::Preset(preset) => preset.layout(),
            LayoutConfig::Custom(layout) => layout.clone(),
        };
        layout.validate().context("Invalid frame layout in configuration")?;
        layout
            .require_field(FIELD_CHARGE)
            .context("Frame layout cannot produce a current")?;
        Ok(layout)
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sampling_period_ms: DEFAULT_SAMPLING_PERIOD_MS,
            lsb_charge_ac: DEFAULT_LSB_CHARGE_AC,
            layout: LayoutConfig::default(),
        }
    }
}

/// DAC programming settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DacConfig {
    /// Reference voltage of the DAC7578 in volts
    pub reference_voltage: f64,
}

impl Default for DacConfig {
    fn default() -> Self {
        Self {
            reference_voltage: DAC_REFERENCE_VOLTAGE,
        }
    }
}

/// Keithley source meter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeithleyConfig {
    /// Query timeout in milliseconds
    pub timeout_ms: u64,

    /// Baud rate for `ASRL` addresses
    pub baudrate: u32,
}

impl KeithleyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(MIN_TIMEOUT_MS))
    }
}

impl Default for KeithleyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            baudrate: 9600,
        }
    }
}
