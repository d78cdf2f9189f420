/*!
Current acquisition loop.

This module drives the frame reader, converts each frame into a measurement,
keeps the running average and feeds every configured sink. The loop runs on
the calling thread and stops when the running flag is cleared.
*/

use crate::sinks::{MeasurementSink, Sample};
use anyhow::{Context, Result};
use chrono::Local;
use shared::{Calibration, FrameLayout, FramePoll, FrameReader, Measurement, RunningAverage};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, trace};

/// Final statistics of one run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureStats {
    pub frames: u64,
    pub discarded_bytes: u64,
    pub timeouts: u64,
    pub average_fa: Option<f64>,
    pub duration: Duration,
}

/// Reads frames from a serial stream and hands samples to sinks
pub struct CurrentMonitor<R> {
    reader: FrameReader<R>,
    calibration: Calibration,
    average: RunningAverage,
    running: Arc<AtomicBool>,
}

impl<R: Read> CurrentMonitor<R> {
    /// Create a monitor over `stream`; `layout` must already be validated
    pub fn new(stream: R, layout: FrameLayout, calibration: Calibration) -> Self {
        Self {
            reader: FrameReader::new(stream, layout),
            calibration,
            average: RunningAverage::new(),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a reference to the running flag for external control
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    #[cfg(test)]
    pub fn average(&self) -> &RunningAverage {
        &self.average
    }

    /// Poll one frame; `None` means the read timed out
    pub fn step(&mut self) -> Result<Option<Sample>> {
        let frame = match self.reader.poll().context("Failed to read frame")? {
            FramePoll::Frame(frame) => frame,
            FramePoll::NoData => return Ok(None),
        };

        let fields = frame.decode(self.reader.layout())?;
        let measurement = Measurement::from_fields(&fields, &self.calibration);
        self.average.update(measurement.current_fa);

        trace!(
            "Frame {}: charge {:.1} aC, current {:.3} fA",
            self.average.count(),
            measurement.charge_ac,
            measurement.current_fa
        );

        Ok(Some(Sample {
            timestamp: Local::now(),
            measurement,
            average_fa: self.average.mean().unwrap_or(measurement.current_fa),
            count: self.average.count(),
            raw: frame.to_bytes(),
        }))
    }

    /// Run until the running flag is cleared or an error occurs. Every sink
    /// is finished on both paths.
    pub fn run(&mut self, sinks: &mut [Box<dyn MeasurementSink>]) -> Result<CaptureStats> {
        let start_time = Instant::now();
        info!(
            "Waiting for frames with header 0x{:02X} ({} bytes)",
            self.reader.layout().header,
            self.reader.layout().frame_len()
        );

        let result = self.run_loop(sinks);

        let mut finish_result = Ok(());
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.finish() {
                error!("Failed to finish sink: {:#}", e);
                if finish_result.is_ok() {
                    finish_result = Err(e);
                }
            }
        }

        let sync = self.reader.stats();
        let stats = CaptureStats {
            frames: sync.frames,
            discarded_bytes: sync.discarded_bytes,
            timeouts: sync.timeouts,
            average_fa: self.average.mean(),
            duration: start_time.elapsed(),
        };

        info!("Capture final stats:");
        info!("   Frames: {}", stats.frames);
        info!("   Discarded bytes: {}", stats.discarded_bytes);
        info!("   Read timeouts: {}", stats.timeouts);
        info!("   Duration: {:.1}s", stats.duration.as_secs_f64());

        result?;
        finish_result?;
        Ok(stats)
    }

    fn run_loop(&mut self, sinks: &mut [Box<dyn MeasurementSink>]) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            let Some(sample) = self.step()? else {
                // Sinks still get a turn so they can react to input
                for sink in sinks.iter_mut() {
                    sink.idle()?;
                }
                continue;
            };

            for sink in sinks.iter_mut() {
                sink.consume(&sample)?;
            }
        }
        Ok(())
    }
}
