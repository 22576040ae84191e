//! Captured log bridge.
//!
//! While a live session holds a [`CaptureGuard`], tracing events from other
//! crates are buffered here instead of reaching the console, and the session
//! is woken so the view can show them. Outside a session the console writer
//! passes everything through to stderr.

use crate::error::{Result, TuiError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Events from this crate are never captured; rendering them would schedule
/// another render.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

fn is_own_target(target: &str) -> bool {
    match target.strip_prefix(OWN_TARGET) {
        Some(rest) => rest.is_empty() || rest.starts_with("::"),
        None => false,
    }
}

static SINK: Mutex<Option<CaptureSink>> = parking_lot::const_mutex(None);
static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLogEntry {
    /// Monotonic across the process.
    pub id: u64,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<&Level> for LogLevel {
    fn from(level: &Level) -> Self {
        match *level {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warn,
            Level::INFO => LogLevel::Info,
            Level::DEBUG => LogLevel::Debug,
            Level::TRACE => LogLevel::Trace,
        }
    }
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

struct CaptureSink {
    generation: u64,
    entries: VecDeque<CapturedLogEntry>,
    /// Entries dropped from the front so far.
    evicted: usize,
    capacity: usize,
    waker: Option<Arc<Notify>>,
}

/// Keeps capture active until dropped. Dropping restores whatever sink was
/// installed before and discards the buffered entries.
#[must_use = "capture stops when the guard is dropped"]
pub struct CaptureGuard {
    generation: u64,
    previous: Option<CaptureSink>,
}

/// Starts buffering ambient log events, keeping at most `capacity` entries.
/// `waker` is notified after every captured event.
pub fn install_capture(capacity: usize, waker: Option<Arc<Notify>>) -> CaptureGuard {
    let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    let sink = CaptureSink {
        generation,
        entries: VecDeque::with_capacity(capacity.min(1024)),
        evicted: 0,
        capacity: capacity.max(1),
        waker,
    };
    let previous = SINK.lock().replace(sink);
    CaptureGuard {
        generation,
        previous,
    }
}

impl CaptureGuard {
    pub fn snapshot(&self) -> Vec<CapturedLogEntry> {
        self.window().1
    }

    /// Buffered entries together with the number evicted before the first
    /// of them, read atomically.
    pub fn window(&self) -> (usize, Vec<CapturedLogEntry>) {
        match SINK.lock().as_ref() {
            Some(sink) if sink.generation == self.generation => {
                (sink.evicted, sink.entries.iter().cloned().collect())
            }
            _ => (0, Vec::new()),
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        let mut slot = SINK.lock();
        if slot.as_ref().map(|s| s.generation) == Some(self.generation) {
            *slot = self.previous.take();
        }
    }
}

pub fn capture_active() -> bool {
    SINK.lock().is_some()
}

/// Entries buffered by the active capture, oldest first.
pub fn captured_logs() -> Vec<CapturedLogEntry> {
    SINK.lock()
        .as_ref()
        .map(|sink| sink.entries.iter().cloned().collect())
        .unwrap_or_default()
}

/// Tracing layer that feeds the active capture sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaptureLayer;

impl CaptureLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_own_target(metadata.target()) {
            return;
        }

        let waker = {
            let mut slot = SINK.lock();
            let Some(sink) = slot.as_mut() else {
                return;
            };

            let mut visitor = MessageVisitor::default();
            event.record(&mut visitor);

            if sink.entries.len() >= sink.capacity {
                sink.entries.pop_front();
                sink.evicted += 1;
            }
            sink.entries.push_back(CapturedLogEntry {
                id: NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed),
                level: LogLevel::from(metadata.level()),
                target: metadata.target().to_string(),
                message: visitor.finish(),
                timestamp: Utc::now(),
            });
            sink.waker.clone()
        };

        if let Some(waker) = waker {
            waker.notify_one();
        }
    }
}

/// Collects the `message` field plus any other fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        let fields = self.fields.join(" ");
        if self.message.is_empty() {
            fields
        } else {
            format!("{} {}", self.message, fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// `MakeWriter` for the console layer: stderr, or nowhere while a capture
/// sink is active.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleWriter;

pub enum ConsoleSink {
    Stderr(io::Stderr),
    Discard,
}

impl Write for ConsoleSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ConsoleSink::Stderr(err) => err.write(buf),
            ConsoleSink::Discard => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ConsoleSink::Stderr(err) => err.flush(),
            ConsoleSink::Discard => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for ConsoleWriter {
    type Writer = ConsoleSink;

    fn make_writer(&'a self) -> Self::Writer {
        if capture_active() {
            ConsoleSink::Discard
        } else {
            ConsoleSink::Stderr(io::stderr())
        }
    }
}

/// Installs the global subscriber: an `EnvFilter` from `RUST_LOG` (falling
/// back to `default_filter`), a console layer and the [`CaptureLayer`].
pub fn init_logging(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| TuiError::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(ConsoleWriter))
        .with(CaptureLayer::new())
        .try_init()
        .map_err(|e| TuiError::Logging(e.to_string()))
}

#[cfg(test)]
pub(crate) static TEST_SINK_LOCK: Mutex<()> = parking_lot::const_mutex(());
