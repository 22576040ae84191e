//! Test helpers: an in-memory sink and a planner/writer pair whose output is
//! replayed through a `vt100` emulator.

use crate::layout::LayoutError;
use crate::mode::Screen;
use crate::node::Node;
use crate::output::ScreenWriter;
use crate::planning::{Frame, FramePlanner};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Cloneable `Write` sink; every clone appends to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Drains and returns the raw bytes written so far.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Drives a [`FramePlanner`] and [`ScreenWriter`] at a fixed size and feeds
/// the bytes into a terminal emulator.
pub struct TestRuntime {
    planner: FramePlanner,
    writer: ScreenWriter<SharedBuffer>,
    buffer: SharedBuffer,
    parser: vt100::Parser,
    last_output: Vec<u8>,
}

impl TestRuntime {
    pub fn new(width: u16, height: u16) -> Self {
        let buffer = SharedBuffer::new();
        Self {
            planner: FramePlanner::new(width),
            writer: ScreenWriter::new(buffer.clone(), Screen::Normal),
            buffer,
            parser: vt100::Parser::new(height, width, 1000),
            last_output: Vec::new(),
        }
    }

    /// Plans and writes one frame.
    pub fn render(&mut self, tree: &Node) -> Result<Frame, LayoutError> {
        let frame = self.planner.plan(tree)?;
        self.writer.write_frame(&frame);
        self.pump();
        Ok(frame)
    }

    /// Writes raw lines, bypassing layout.
    pub fn write_lines(&mut self, new_static_lines: &[String], dynamic_lines: &[String]) {
        self.writer.write_lines(new_static_lines, dynamic_lines);
        self.pump();
    }

    /// Restores the cursor as a finished session would.
    pub fn finish(&mut self) {
        self.writer.finish();
        self.pump();
    }

    /// Bytes produced by the most recent call.
    pub fn last_output(&self) -> &[u8] {
        &self.last_output
    }

    pub fn last_output_str(&self) -> String {
        String::from_utf8_lossy(&self.last_output).into_owned()
    }

    pub fn planner(&self) -> &FramePlanner {
        &self.planner
    }

    pub fn writer(&self) -> &ScreenWriter<SharedBuffer> {
        &self.writer
    }

    pub fn screen(&self) -> &vt100::Screen {
        self.parser.screen()
    }

    /// Visible screen rows with trailing blanks trimmed.
    pub fn screen_rows(&self) -> Vec<String> {
        let (_, cols) = self.parser.screen().size();
        self.parser
            .screen()
            .rows(0, cols)
            .map(|row| row.trim_end().to_string())
            .collect()
    }

    /// The rows currently occupied by the live region, read off the screen.
    pub fn live_rows(&self) -> Vec<String> {
        let (cursor_row, _) = self.parser.screen().cursor_position();
        let count = self.writer.last_dynamic_line_count();
        let end = usize::from(cursor_row);
        let start = end.saturating_sub(count);
        self.screen_rows()[start..end].to_vec()
    }

    fn pump(&mut self) {
        self.last_output = self.buffer.take();
        self.parser.process(&self.last_output);
    }
}
