/*!
In-place console display.
*/

use super::{live_lines, MeasurementSink, Sample};
use anyhow::Result;
use crossterm::{cursor, queue, terminal};
use std::io::Write;

/// Redraws the live block over its previous rendering
pub struct ConsoleSink<W: Write> {
    out: W,
    verbose: bool,
    drawn_lines: u16,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self {
            out,
            verbose,
            drawn_lines: 0,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MeasurementSink for ConsoleSink<W> {
    fn consume(&mut self, sample: &Sample) -> Result<()> {
        // MoveUp(0) still moves one row on most terminals
        if self.drawn_lines > 0 {
            queue!(
                self.out,
                cursor::MoveUp(self.drawn_lines),
                cursor::MoveToColumn(0),
                terminal::Clear(terminal::ClearType::FromCursorDown)
            )?;
        }

        let lines = live_lines(sample, self.verbose);
        for line in &lines {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()?;

        self.drawn_lines = lines.len() as u16;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::tests::sample;

    #[test]
    fn test_first_draw_is_plain_text() {
        let mut sink = ConsoleSink::new(Vec::new(), false);
        sink.consume(&sample(500.0, None, None)).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "Live data:\nInstantaneous current: 500.00 fA - Average current: 500.00 fA (1)\n"
        );
    }

    #[test]
    fn test_redraw_moves_cursor_up() {
        let mut sink = ConsoleSink::new(Vec::new(), false);
        sink.consume(&sample(500.0, None, None)).unwrap();
        sink.consume(&sample(600.0, None, None)).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        // Cursor up two rows before the second block
        assert!(out.contains("\x1b[2A"));
        assert!(out.ends_with("Average current: 600.00 fA (1)\n"));
    }
}
