//! Per-mode output: live terminal, final frame only, JSON and NDJSON.

use crate::app::{SizeSource, ViewContext, ViewFn};
use crate::error::Result;
use crate::logging::CaptureGuard;
use crate::mode::{Screen, Timing};
use crate::output::ScreenWriter;
use crate::planning::FramePlanner;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::warn;

/// Receives the session's state at each point of its lifecycle.
pub(crate) trait Reporter<S>: Send {
    /// The session has started with `state`.
    fn started(&mut self, state: &S) -> Result<()>;
    /// A dispatch was accepted and produced `state`.
    fn dispatched(&mut self, _state: &S) -> Result<()> {
        Ok(())
    }
    /// A coalesced render was requested.
    fn render(&mut self, _state: &S) -> Result<()> {
        Ok(())
    }
    /// The session has terminated; flush everything. Called once.
    fn finish(&mut self, state: &S) -> Result<()>;
    fn frames(&self) -> u64;
}

pub(crate) struct LiveReporter<S, W: Write> {
    planner: FramePlanner,
    writer: ScreenWriter<W>,
    size: SizeSource,
    view: Arc<ViewFn<S>>,
    max_rows: Option<usize>,
    capture: Option<CaptureGuard>,
    frames: u64,
}

impl<S, W: Write> LiveReporter<S, W> {
    pub(crate) fn new(
        out: W,
        screen: Screen,
        size: SizeSource,
        view: Arc<ViewFn<S>>,
        max_rows: Option<usize>,
        capture: CaptureGuard,
    ) -> Self {
        let (width, _) = size.query();
        Self {
            planner: FramePlanner::new(width),
            writer: ScreenWriter::new(out, screen),
            size,
            view,
            max_rows,
            capture: Some(capture),
            frames: 0,
        }
    }

    fn draw(&mut self, state: &S) -> Result<()> {
        let (width, height) = self.size.query();
        self.planner.set_width(width);

        let fits = usize::from(height).saturating_sub(1).max(1);
        let rows = self.max_rows.map_or(fits, |max| max.min(fits));
        self.writer.set_max_rows(Some(rows));

        let (evicted, logs) = self
            .capture
            .as_ref()
            .map(CaptureGuard::window)
            .unwrap_or_default();
        let ctx = ViewContext::new(width, height, &logs).with_logs_offset(evicted);
        let tree = (self.view)(state, &ctx);

        let frame = self.planner.plan(&tree)?;
        self.writer.write_frame(&frame);
        self.frames += 1;
        Ok(())
    }
}

impl<S, W> Reporter<S> for LiveReporter<S, W>
where
    S: 'static,
    W: Write + Send,
{
    fn started(&mut self, state: &S) -> Result<()> {
        self.writer.enter();
        self.draw(state)
    }

    fn render(&mut self, state: &S) -> Result<()> {
        self.draw(state)
    }

    fn finish(&mut self, state: &S) -> Result<()> {
        let result = self.draw(state);
        self.writer.finish();
        self.capture = None;
        result
    }

    fn frames(&self) -> u64 {
        self.frames
    }
}

/// Prints the final frame once, for terminals that cannot move the cursor.
pub(crate) struct FinalFrameReporter<S, W: Write> {
    out: W,
    size: SizeSource,
    view: Arc<ViewFn<S>>,
    frames: u64,
}

impl<S, W: Write> FinalFrameReporter<S, W> {
    pub(crate) fn new(out: W, size: SizeSource, view: Arc<ViewFn<S>>) -> Self {
        Self {
            out,
            size,
            view,
            frames: 0,
        }
    }
}

impl<S, W> Reporter<S> for FinalFrameReporter<S, W>
where
    S: 'static,
    W: Write + Send,
{
    fn started(&mut self, _state: &S) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self, state: &S) -> Result<()> {
        let (width, height) = self.size.query();
        let ctx = ViewContext::new(width, height, &[]);
        let tree = (self.view)(state, &ctx);
        let frame = FramePlanner::new(width).plan(&tree)?;
        self.frames += 1;

        let mut buf = Vec::new();
        for line in frame.new_static_lines.iter().chain(&frame.dynamic_lines) {
            buf.extend_from_slice(line.as_bytes());
            buf.push(b'\n');
        }
        if let Err(err) = self.out.write_all(&buf).and_then(|()| self.out.flush()) {
            warn!(error = %err, "failed to write final frame");
        }
        Ok(())
    }

    fn frames(&self) -> u64 {
        self.frames
    }
}

/// Serializes the state: once at the end (`Final`) or as NDJSON, one line
/// for the initial state and one per accepted dispatch (`Progressive`).
pub(crate) struct JsonReporter<W: Write> {
    out: W,
    timing: Timing,
    disabled: bool,
    frames: u64,
}

impl<W: Write> JsonReporter<W> {
    pub(crate) fn new(out: W, timing: Timing) -> Self {
        Self {
            out,
            timing,
            disabled: false,
            frames: 0,
        }
    }

    fn emit<S: Serialize>(&mut self, state: &S) -> Result<()> {
        if self.disabled {
            return Ok(());
        }
        let mut line = serde_json::to_vec(state)?;
        line.push(b'\n');
        match self.out.write_all(&line).and_then(|()| self.out.flush()) {
            Ok(()) => {
                self.frames += 1;
                Ok(())
            }
            Err(err) => {
                self.disable(err);
                Ok(())
            }
        }
    }

    fn disable(&mut self, err: io::Error) {
        self.disabled = true;
        warn!(error = %err, "JSON output failed; further output disabled for this session");
    }
}

impl<S, W> Reporter<S> for JsonReporter<W>
where
    S: Serialize,
    W: Write + Send,
{
    fn started(&mut self, state: &S) -> Result<()> {
        match self.timing {
            Timing::Progressive => self.emit(state),
            Timing::Final => Ok(()),
        }
    }

    fn dispatched(&mut self, state: &S) -> Result<()> {
        match self.timing {
            Timing::Progressive => self.emit(state),
            Timing::Final => Ok(()),
        }
    }

    fn finish(&mut self, state: &S) -> Result<()> {
        match self.timing {
            Timing::Final => self.emit(state),
            Timing::Progressive => Ok(()),
        }
    }

    fn frames(&self) -> u64 {
        self.frames
    }
}
