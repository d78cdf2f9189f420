/*!
Live terminal plot.

Draws the live text block and a scatter chart of the instantaneous current
on the alternate screen. Rendering happens synchronously once per sample, so
a slow terminal delays the next frame read.

The terminal runs in raw mode, where Ctrl+C arrives as a key press instead of
a signal; `q`, `Esc` and Ctrl+C all clear the running flag.
*/

use super::{live_lines, MeasurementSink, Sample};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph};
use ratatui::Terminal;
use shared::scale_current;
use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Oldest points are dropped beyond this many
const PLOT_HISTORY: usize = 5000;

pub struct PlotSink {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    running: Arc<AtomicBool>,
    verbose: bool,
    /// (sample number, current in fA)
    points: VecDeque<(f64, f64)>,
    active: bool,
}

impl PlotSink {
    /// Take over the terminal
    pub fn new(running: Arc<AtomicBool>, verbose: bool) -> Result<Self> {
        enable_raw_mode()?;
        let terminal = restore_on_error(setup_terminal(), leave_terminal)?;

        Ok(Self {
            terminal,
            running,
            verbose,
            points: VecDeque::with_capacity(PLOT_HISTORY),
            active: true,
        })
    }

    fn handle_input(&self) -> Result<()> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let quit = match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => true,
                    KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
                    _ => false,
                };
                if quit {
                    self.running.store(false, Ordering::SeqCst);
                }
            }
        }
        Ok(())
    }

    fn draw(&mut self, sample: &Sample) -> Result<()> {
        let (scale, unit) = scale_current(sample.measurement.current_fa);
        let data: Vec<(f64, f64)> = self
            .points
            .iter()
            .map(|&(x, femto)| (x, femto * scale))
            .collect();
        let (x_min, x_max) = x_bounds(&data);
        let (y_min, y_max) = y_bounds(&data);

        let mut text: Vec<Line> = live_lines(sample, self.verbose)
            .into_iter()
            .enumerate()
            .map(|(i, line)| {
                if i == 0 {
                    Line::from(Span::styled(line, Style::default().add_modifier(Modifier::BOLD)))
                } else {
                    Line::from(line)
                }
            })
            .collect();
        text.push(Line::from(Span::styled(
            "Press q to stop",
            Style::default().add_modifier(Modifier::DIM),
        )));
        let text_height = text.len() as u16 + 2;

        self.terminal.draw(|frame| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(text_height), Constraint::Min(5)])
                .split(frame.size());

            let paragraph = Paragraph::new(text)
                .block(Block::default().borders(Borders::ALL).title("ACCURATE2"));
            frame.render_widget(paragraph, chunks[0]);

            let dataset = Dataset::default()
                .name("Instantaneous current")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Red))
                .data(&data);

            let chart = Chart::new(vec![dataset])
                .block(Block::default().borders(Borders::ALL).title("Current"))
                .x_axis(
                    Axis::default()
                        .title("Sample")
                        .bounds([x_min, x_max])
                        .labels(vec![
                            Span::raw(format!("{:.0}", x_min)),
                            Span::raw(format!("{:.0}", x_max)),
                        ]),
                )
                .y_axis(
                    Axis::default()
                        .title(format!("Current [{}]", unit))
                        .bounds([y_min, y_max])
                        .labels(vec![
                            Span::raw(format!("{:.2}", y_min)),
                            Span::raw(format!("{:.2}", (y_min + y_max) / 2.0)),
                            Span::raw(format!("{:.2}", y_max)),
                        ]),
                );
            frame.render_widget(chart, chunks[1]);
        })?;

        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl MeasurementSink for PlotSink {
    fn consume(&mut self, sample: &Sample) -> Result<()> {
        if self.points.len() == PLOT_HISTORY {
            self.points.pop_front();
        }
        self.points
            .push_back((sample.count as f64, sample.measurement.current_fa));

        self.draw(sample)?;
        self.handle_input()
    }

    fn idle(&mut self) -> Result<()> {
        self.handle_input()
    }

    fn finish(&mut self) -> Result<()> {
        self.restore()
    }
}

impl Drop for PlotSink {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;
    Ok(terminal)
}

/// Best effort, used when setup fails halfway
fn leave_terminal() {
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
    let _ = disable_raw_mode();
}

/// Run `cleanup` when `result` is an error
fn restore_on_error<T>(result: Result<T>, cleanup: impl FnOnce()) -> Result<T> {
    if result.is_err() {
        cleanup();
    }
    result
}

fn x_bounds(data: &[(f64, f64)]) -> (f64, f64) {
    match (data.first(), data.last()) {
        (Some(first), Some(last)) if last.0 > first.0 => (first.0, last.0),
        (Some(first), _) => (first.0 - 1.0, first.0 + 1.0),
        _ => (0.0, 1.0),
    }
}

fn y_bounds(data: &[(f64, f64)]) -> (f64, f64) {
    let (min, max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let margin = ((max - min) * 0.1).max(max.abs() * 0.05).max(1e-3);
    (min - margin, max + margin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_setup_runs_cleanup() {
        let mut cleaned = false;
        let result: Result<u8> = restore_on_error(Err(anyhow::anyhow!("no tty")), || cleaned = true);
        assert!(result.is_err());
        assert!(cleaned);

        let mut cleaned = false;
        let result = restore_on_error(Ok(7u8), || cleaned = true);
        assert_eq!(result.unwrap(), 7);
        assert!(!cleaned);
    }

    #[test]
    fn test_bounds_empty_and_single() {
        assert_eq!(x_bounds(&[]), (0.0, 1.0));
        assert_eq!(y_bounds(&[]), (0.0, 1.0));
        assert_eq!(x_bounds(&[(3.0, 1.0)]), (2.0, 4.0));

        let (lo, hi) = y_bounds(&[(1.0, 10.0)]);
        assert!(lo < 10.0 && hi > 10.0);
    }

    #[test]
    fn test_bounds_cover_data() {
        let data = [(1.0, 5.0), (2.0, 15.0), (3.0, 10.0)];
        assert_eq!(x_bounds(&data), (1.0, 3.0));

        let (lo, hi) = y_bounds(&data);
        assert!(lo < 5.0);
        assert!(hi > 15.0);
    }
}
