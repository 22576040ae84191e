//! Differential terminal writer.
//!
//! The live region sits directly above the cursor. Each frame moves up over
//! it, writes any new static lines (which become scrollback), then rewrites
//! only the live rows that changed.

use crate::mode::Screen;
use crate::planning::Frame;
use crossterm::{
    cursor::{Hide, MoveUp, Show},
    queue,
    terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Write};
use tracing::warn;

pub struct ScreenWriter<W: Write> {
    out: W,
    screen: Screen,
    last_dynamic_line_count: usize,
    previous_lines: Vec<String>,
    /// Static lines written to the alternate buffer, replayed onto the
    /// normal screen by [`ScreenWriter::finish`].
    static_history: Vec<String>,
    max_rows: Option<usize>,
    disabled: bool,
    entered: bool,
    finished: bool,
}

impl<W: Write> ScreenWriter<W> {
    pub fn new(out: W, screen: Screen) -> Self {
        Self {
            out,
            screen,
            last_dynamic_line_count: 0,
            previous_lines: Vec::new(),
            static_history: Vec::new(),
            max_rows: None,
            disabled: false,
            entered: false,
            finished: false,
        }
    }

    pub fn last_dynamic_line_count(&self) -> usize {
        self.last_dynamic_line_count
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Caps the live region; only the bottom `rows` lines are drawn.
    pub fn set_max_rows(&mut self, rows: Option<usize>) {
        self.max_rows = rows;
    }

    /// Hides the cursor and, for alternate-screen sessions, switches buffers.
    pub fn enter(&mut self) {
        if self.entered {
            return;
        }
        self.entered = true;
        let mut buf = Vec::new();
        let queued = match self.screen {
            Screen::Alternate => queue!(buf, EnterAlternateScreen, Hide),
            Screen::Normal => queue!(buf, Hide),
        };
        let result = queued.and_then(|()| self.emit(&buf));
        self.record(result);
    }

    pub fn write_frame(&mut self, frame: &Frame) {
        self.write_lines(&frame.new_static_lines, &frame.dynamic_lines);
    }

    pub fn write_lines(&mut self, new_static_lines: &[String], dynamic_lines: &[String]) {
        if self.disabled {
            return;
        }
        let dynamic = self.clamp(dynamic_lines);
        if new_static_lines.is_empty() && dynamic == self.previous_lines.as_slice() {
            return;
        }

        let result = self
            .compose(new_static_lines, dynamic)
            .and_then(|buf| self.emit(&buf));
        self.record(result);

        if self.screen == Screen::Alternate {
            self.static_history.extend_from_slice(new_static_lines);
        }
        self.last_dynamic_line_count = dynamic.len();
        self.previous_lines = dynamic.to_vec();
    }

    /// Restores the cursor. Alternate-screen sessions leave the alternate
    /// buffer and print every static line followed by the final live region
    /// onto the normal screen.
    /// Runs at most once; also invoked on drop.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if !self.entered || self.disabled {
            return;
        }

        let mut buf = Vec::new();
        let mut result = queue!(buf, Show);
        if self.screen == Screen::Alternate {
            result = result.and_then(|()| queue!(buf, LeaveAlternateScreen));
            for line in self.static_history.iter().chain(&self.previous_lines) {
                buf.extend_from_slice(line.as_bytes());
                buf.extend_from_slice(b"\r\n");
            }
        }
        let result = result.and_then(|()| self.emit(&buf));
        self.record(result);
    }

    fn clamp<'a>(&self, lines: &'a [String]) -> &'a [String] {
        match self.max_rows {
            Some(max) if lines.len() > max => &lines[lines.len() - max..],
            _ => lines,
        }
    }

    fn compose(&self, new_static_lines: &[String], dynamic: &[String]) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let last = self.last_dynamic_line_count;

        if last > 0 {
            queue!(buf, MoveUp(u16::try_from(last).unwrap_or(u16::MAX)))?;
        }
        buf.write_all(b"\r")?;

        for line in new_static_lines {
            queue!(buf, Clear(ClearType::CurrentLine))?;
            buf.write_all(line.as_bytes())?;
            buf.write_all(b"\r\n")?;
        }

        let displaced = !new_static_lines.is_empty();
        for (i, line) in dynamic.iter().enumerate() {
            let unchanged = !displaced && self.previous_lines.get(i) == Some(line);
            if !unchanged {
                queue!(buf, Clear(ClearType::CurrentLine))?;
                buf.write_all(line.as_bytes())?;
            }
            buf.write_all(b"\r\n")?;
        }

        if new_static_lines.len() + dynamic.len() < last {
            queue!(buf, Clear(ClearType::FromCursorDown))?;
        }
        Ok(buf)
    }

    fn emit(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)?;
        self.out.flush()
    }

    fn record(&mut self, result: io::Result<()>) {
        if let Err(err) = result {
            if !self.disabled {
                self.disabled = true;
                warn!(error = %err, "terminal write failed; visual output disabled for this session");
            }
        }
    }
}

impl<W: Write> Drop for ScreenWriter<W> {
    fn drop(&mut self) {
        self.finish();
    }
}
