/*!
Header synchronization and payload reading.

[`FrameReader`] is a two-state machine over any `Read`: it consumes single
bytes until one equals the layout's header, then reads the fixed payload.
Read timeouts hand control back to the caller as [`FramePoll::NoData`]
without losing progress, so a partially received payload is completed on the
next poll.

Resynchronization is deliberately lenient: there is no bound on discarded
bytes and no check that a matching byte is a real header rather than payload
data of a shifted frame.
*/

use crate::error::{Result, SharedError};
use crate::frame::RawFrame;
use crate::layout::FrameLayout;
use std::io::{ErrorKind, Read};
use tracing::{debug, trace};

/// Reader state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Discarding bytes until the header byte is seen
    WaitingForHeader,
    /// Header consumed, `filled` payload bytes received so far
    ReadingPayload { filled: usize },
}

/// Outcome of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePoll {
    /// A complete frame
    Frame(RawFrame),
    /// The read timed out, nothing to report yet
    NoData,
}

/// Counters kept across polls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub frames: u64,
    pub discarded_bytes: u64,
    pub timeouts: u64,
}

enum ReadStep {
    Data(usize),
    TimedOut,
}

/// Frame synchronizer and payload reader
pub struct FrameReader<R> {
    reader: R,
    layout: FrameLayout,
    state: SyncState,
    payload: Vec<u8>,
    stats: SyncStats,
}

impl<R: Read> FrameReader<R> {
    /// Create a reader for `layout`; the layout must already be valid
    pub fn new(reader: R, layout: FrameLayout) -> Self {
        let payload = vec![0u8; layout.payload_len()];
        Self {
            reader,
            layout,
            state: SyncState::WaitingForHeader,
            payload,
            stats: SyncStats::default(),
        }
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Advance until a frame is complete or the stream times out
    pub fn poll(&mut self) -> Result<FramePoll> {
        loop {
            match self.state {
                SyncState::WaitingForHeader => {
                    if !self.seek_header()? {
                        return Ok(FramePoll::NoData);
                    }
                    self.state = SyncState::ReadingPayload { filled: 0 };
                }
                SyncState::ReadingPayload { filled } => {
                    let filled = self.fill_payload(filled)?;
                    if filled < self.payload.len() {
                        self.state = SyncState::ReadingPayload { filled };
                        return Ok(FramePoll::NoData);
                    }

                    self.state = SyncState::WaitingForHeader;
                    self.stats.frames += 1;
                    return Ok(FramePoll::Frame(RawFrame::new(
                        self.layout.header,
                        self.payload.clone(),
                    )));
                }
            }
        }
    }

    /// Consume one byte at a time until the header byte. Returns `false` when
    /// the stream timed out first.
    fn seek_header(&mut self) -> Result<bool> {
        let mut byte = [0u8; 1];
        loop {
            match read_step(&mut self.reader, &mut byte)? {
                ReadStep::TimedOut => {
                    self.stats.timeouts += 1;
                    return Ok(false);
                }
                ReadStep::Data(0) => {
                    return Err(SharedError::StreamClosed {
                        received: 0,
                        expected: self.layout.frame_len(),
                    });
                }
                ReadStep::Data(_) if byte[0] == self.layout.header => {
                    trace!("Header 0x{:02X} found", byte[0]);
                    return Ok(true);
                }
                ReadStep::Data(_) => {
                    trace!("Discarding byte 0x{:02X} while waiting for header", byte[0]);
                    self.stats.discarded_bytes += 1;
                }
            }
        }
    }

    /// Read payload bytes starting at `filled`; returns the new fill level,
    /// which is short of the payload length only after a timeout
    fn fill_payload(&mut self, mut filled: usize) -> Result<usize> {
        let expected = self.payload.len();
        while filled < expected {
            match read_step(&mut self.reader, &mut self.payload[filled..])? {
                ReadStep::TimedOut => {
                    self.stats.timeouts += 1;
                    debug!("Timed out mid-frame after {} of {} payload bytes", filled, expected);
                    return Ok(filled);
                }
                ReadStep::Data(0) => {
                    return Err(SharedError::StreamClosed {
                        received: 1 + filled,
                        expected: 1 + expected,
                    });
                }
                ReadStep::Data(n) => filled += n,
            }
        }
        Ok(filled)
    }
}

/// One read, with timeouts reported as a step rather than an error
fn read_step<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<ReadStep> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(ReadStep::Data(n)),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                return Ok(ReadStep::TimedOut)
            }
            Err(e) => return Err(e.into()),
        }
    }
}
