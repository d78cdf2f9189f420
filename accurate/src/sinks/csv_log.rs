/*!
CSV measurement log.
*/

use super::{MeasurementSink, Sample};
use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

const COLUMNS: [&str; 5] = [
    "timestamp",
    "instantaneous_current_fa",
    "average_current_fa",
    "temperature_c",
    "humidity_pct",
];

/// Writes a header row once, then one flushed row per sample
pub struct CsvLogSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    verbose: bool,
    rows: u64,
}

impl CsvLogSink {
    /// Create (or truncate) the log file and write the header row
    pub fn create<P: AsRef<Path>>(path: P, verbose: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .with_context(|| format!("Failed to create log file: {}", path.display()))?;

        let mut writer = csv::Writer::from_writer(file);
        let mut header: Vec<&str> = COLUMNS.to_vec();
        if verbose {
            header.push("serial_data");
        }
        writer
            .write_record(&header)
            .with_context(|| format!("Failed to write log header: {}", path.display()))?;
        writer.flush()?;

        info!("Logging measurements to {}", path.display());
        Ok(Self {
            path,
            writer,
            verbose,
            rows: 0,
        })
    }
}

impl MeasurementSink for CsvLogSink {
    fn consume(&mut self, sample: &Sample) -> Result<()> {
        let m = &sample.measurement;
        let mut record = vec![
            sample.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            format!("{:.2}", m.current_fa),
            format!("{:.2}", sample.average_fa),
            m.temperature_c.map(|t| format!("{:.2}", t)).unwrap_or_default(),
            m.humidity_pct.map(|h| format!("{:.2}", h)).unwrap_or_default(),
        ];
        if self.verbose {
            record.push(sample.raw_hex());
        }

        self.writer
            .write_record(&record)
            .with_context(|| format!("Failed to append to log file: {}", self.path.display()))?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        info!("Wrote {} rows to {}", self.rows, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::tests::sample;

    #[test]
    fn test_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.log");

        let mut sink = CsvLogSink::create(&path, false).unwrap();
        sink.consume(&sample(393.391, Some(21.0), Some(45.123))).unwrap();
        sink.consume(&sample(12.0, None, None)).unwrap();
        sink.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "timestamp,instantaneous_current_fa,average_current_fa,temperature_c,humidity_pct"
        );
        assert!(lines[1].ends_with(",393.39,393.39,21.00,45.12"));
        assert!(lines[2].ends_with(",12.00,12.00,,"));
    }

    #[test]
    fn test_verbose_adds_serial_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("verbose.log");

        let mut sink = CsvLogSink::create(&path, true).unwrap();
        sink.consume(&sample(1.0, None, None)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].ends_with(",serial_data"));
        assert!(lines[1].ends_with(",dd0102"));
    }

    #[test]
    fn test_existing_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.log");
        std::fs::write(&path, "stale contents\n").unwrap();

        CsvLogSink::create(&path, false).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("timestamp,"));
        assert!(!content.contains("stale"));
    }
}
