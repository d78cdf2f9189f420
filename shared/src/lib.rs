/*!
# Shared Types and Utilities

This crate contains the protocol pieces shared by the ACCURATE2 evaluation
board tools: frame synchronization and decoding, measurement conversion and
DAC command encoding.

## Core Types

- [`FrameLayout`] - Header byte and ordered field widths of a frame variant
- [`FrameReader`] - Header synchronization and payload reading over any `Read`
- [`DecodedFields`] - Named little-endian integers of one frame
- [`Measurement`] - Charge, current, temperature and humidity in physical units
- [`RunningAverage`] - Sum/count accumulator for the average current
- [`DacCommand`] - Channel address plus ASCII binary Din code

## Modules

- [`layout`] - Frame layout descriptors and presets
- [`frame`] - Raw frames and payload decoding
- [`sync`] - Header synchronization and payload reading
- [`measurement`] - Calibration and the raw-to-physical transform
- [`units`] - Current unit scaling for display
- [`average`] - Running average accumulator
- [`dac`] - DAC channel table and command encoder
- [`error`] - Common error types
*/

pub mod average;
pub mod dac;
pub mod error;
pub mod frame;
pub mod layout;
pub mod measurement;
pub mod sync;
pub mod units;

// Re-export commonly used types
pub use average::RunningAverage;
pub use dac::{DacChannel, DacCommand};
pub use error::{SharedError, Result};
pub use frame::{DecodedFields, RawFrame};
pub use layout::{FieldSpec, FrameLayout, LayoutPreset};
pub use measurement::{Calibration, Measurement};
pub use sync::{FramePoll, FrameReader, SyncState, SyncStats};
pub use units::{format_current, scale_current};

/// Version information for the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol constants
pub mod protocol {
    /// Header byte of the basic (charge only) frame
    pub const HEADER_BASIC: u8 = 0xAB;

    /// Header byte of the extended frame
    pub const HEADER_EXTENDED: u8 = 0xDD;

    /// Widest field that still fits a `u64`
    pub const MAX_FIELD_WIDTH: usize = 8;

    /// Field carrying the integrated charge, in LSB units
    pub const FIELD_CHARGE: &str = "charge";

    /// Field carrying the raw SHT41 temperature word
    pub const FIELD_TEMPERATURE: &str = "temperature";

    /// Field carrying the raw SHT41 humidity word
    pub const FIELD_HUMIDITY: &str = "humidity";

    /// Default sampling period in milliseconds
    pub const DEFAULT_SAMPLING_PERIOD_MS: f64 = 100.0;

    /// Default charge of one LSB in atto-coulombs
    pub const DEFAULT_LSB_CHARGE_AC: f64 = 39.339;

    /// DAC7578 reference voltage on the evaluation board
    pub const DAC_REFERENCE_VOLTAGE: f64 = 3.0;

    /// Number of DAC codes (12-bit converter)
    pub const DAC_RESOLUTION: u32 = 4096;

    /// Width of the ASCII binary string sent after the DAC address byte
    pub const DAC_CODE_DIGITS: usize = 32;

    /// Full scale of the SHT41 raw words
    pub const SHT41_FULL_SCALE: f64 = 65535.0;
}
