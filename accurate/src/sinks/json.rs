/*!
Newline-delimited JSON output for piping into other tools.
*/

use super::{MeasurementSink, Sample};
use anyhow::Result;
use serde::Serialize;
use shared::Measurement;
use std::io::Write;

#[derive(Serialize)]
struct JsonRecord<'a> {
    timestamp: String,
    count: u64,
    average_current_fa: f64,
    #[serde(flatten)]
    measurement: &'a Measurement,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_data: Option<String>,
}

/// One JSON object per line
pub struct JsonSink<W: Write> {
    out: W,
    verbose: bool,
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self { out, verbose }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MeasurementSink for JsonSink<W> {
    fn consume(&mut self, sample: &Sample) -> Result<()> {
        let record = JsonRecord {
            timestamp: sample.timestamp.to_rfc3339(),
            count: sample.count,
            average_current_fa: sample.average_fa,
            measurement: &sample.measurement,
            serial_data: self.verbose.then(|| sample.raw_hex()),
        };

        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}
