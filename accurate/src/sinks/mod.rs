/*!
Consumers of converted measurements.

Every accepted frame becomes a [`Sample`] that is handed to each sink in turn
on the capture thread.
*/

use anyhow::Result;
use chrono::{DateTime, Local};
use shared::{scale_current, Measurement};

mod console;
mod csv_log;
mod json;
mod plot;

pub use console::ConsoleSink;
pub use csv_log::CsvLogSink;
pub use json::JsonSink;
pub use plot::PlotSink;

/// One converted frame plus the run state at that point
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Local>,
    pub measurement: Measurement,
    /// Average current over the run so far, in fA
    pub average_fa: f64,
    /// Number of frames averaged, this one included
    pub count: u64,
    /// Header and payload as received
    pub raw: Vec<u8>,
}

impl Sample {
    pub fn raw_hex(&self) -> String {
        hex::encode(&self.raw)
    }
}

/// Something that wants every sample
pub trait MeasurementSink {
    fn consume(&mut self, sample: &Sample) -> Result<()>;

    /// Called when a read timed out without a frame
    fn idle(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once when the capture loop ends, on every exit path
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Text block shown by the live displays. Both currents use the unit picked
/// for the instantaneous value.
pub fn live_lines(sample: &Sample, verbose: bool) -> Vec<String> {
    let current = sample.measurement.current_fa;
    let (scale, unit) = scale_current(current);

    let mut lines = vec![
        "Live data:".to_string(),
        format!(
            "Instantaneous current: {:.2} {} - Average current: {:.2} {} ({})",
            current * scale,
            unit,
            sample.average_fa * scale,
            unit,
            sample.count
        ),
    ];

    match (sample.measurement.temperature_c, sample.measurement.humidity_pct) {
        (None, None) => {}
        (temperature, humidity) => lines.push(format!(
            "Temperature: {} °C - Humidity: {} %",
            format_optional(temperature),
            format_optional(humidity)
        )),
    }

    if verbose {
        lines.push("Debug data:".to_string());
        lines.push(format!("Serial data: 0x{}", sample.raw_hex()));
    }

    lines
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}
