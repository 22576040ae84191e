use crate::config::TuiConfig;
use crate::error::Result;
use crate::logging::CapturedLogEntry;
use crate::mode::{Environment, OutputFlags, OutputMode};
use crate::node::{static_list_from, Node};
use crate::session::Session;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Actions must be able to express "an external interrupt was requested".
/// Every reducer has to accept it from every reachable state.
pub trait Interrupt {
    fn interrupt() -> Self;
}

pub(crate) type ReducerFn<S, A> = dyn Fn(&S, A) -> S + Send + Sync;
pub(crate) type ViewFn<S> = dyn Fn(&S, &ViewContext<'_>) -> Node + Send + Sync;
pub(crate) type StateFn<S, T> = dyn Fn(&S) -> T + Send + Sync;
pub type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;

/// What a view can see besides the state.
#[derive(Debug, Clone, Copy)]
pub struct ViewContext<'a> {
    pub width: u16,
    pub height: u16,
    logs: &'a [CapturedLogEntry],
    logs_offset: usize,
}

impl<'a> ViewContext<'a> {
    pub fn new(width: u16, height: u16, logs: &'a [CapturedLogEntry]) -> Self {
        Self {
            width,
            height,
            logs,
            logs_offset: 0,
        }
    }

    pub fn with_logs_offset(mut self, offset: usize) -> Self {
        self.logs_offset = offset;
        self
    }

    /// Log events captured during this session, oldest first. The buffer is
    /// bounded, so the oldest entries drop out as new ones arrive.
    pub fn logs(&self) -> &'a [CapturedLogEntry] {
        self.logs
    }

    /// Absolute position of `logs()[0]`: how many entries were evicted
    /// before it.
    pub fn logs_offset(&self) -> usize {
        self.logs_offset
    }

    /// Static list over the captured logs that keeps each entry's identity
    /// across evictions, so every entry reaches scrollback exactly once.
    pub fn log_list(
        &self,
        key: impl Into<String>,
        mut render: impl FnMut(&CapturedLogEntry) -> Node,
    ) -> Node {
        static_list_from(key, self.logs_offset, self.logs, |entry, _| render(entry))
    }
}

/// Where the renderer learns the terminal size. Queried before every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSource {
    Terminal,
    Fixed(u16, u16),
}

const FALLBACK_SIZE: (u16, u16) = (80, 24);

impl SizeSource {
    pub fn query(&self) -> (u16, u16) {
        match self {
            SizeSource::Terminal => crossterm::terminal::size()
                .ok()
                .filter(|(w, h)| *w > 0 && *h > 0)
                .unwrap_or(FALLBACK_SIZE),
            SizeSource::Fixed(w, h) => (*w, *h),
        }
    }
}

/// A state machine plus the view that draws it.
pub struct TuiApp<S, A> {
    pub(crate) initial: S,
    pub(crate) reducer: Box<ReducerFn<S, A>>,
    pub(crate) view: Arc<ViewFn<S>>,
    pub(crate) exit_code: Box<StateFn<S, i32>>,
    pub(crate) is_terminal: Box<StateFn<S, bool>>,
    pub(crate) grace: Duration,
    pub(crate) config: TuiConfig,
    pub(crate) exit_hook: ExitHook,
    pub(crate) handle_signals: bool,
}

pub struct TuiAppBuilder<S, A> {
    app: TuiApp<S, A>,
}

impl<S, A> TuiApp<S, A>
where
    S: Clone + Serialize + Send + 'static,
    A: Interrupt + Send + 'static,
{
    pub fn builder(
        initial: S,
        reducer: impl Fn(&S, A) -> S + Send + Sync + 'static,
    ) -> TuiAppBuilder<S, A> {
        let config = TuiConfig::default();
        TuiAppBuilder {
            app: TuiApp {
                initial,
                reducer: Box::new(reducer),
                view: Arc::new(empty_view::<S>),
                exit_code: Box::new(success::<S>),
                is_terminal: Box::new(never_terminal::<S>),
                grace: config.interrupt_grace(),
                config,
                exit_hook: Arc::new(exit_process),
                handle_signals: true,
            },
        }
    }

    /// Picks the output mode from `flags` and the detected environment and
    /// starts a session on stdout. Must be called inside a tokio runtime.
    pub fn run(self, flags: &OutputFlags) -> Result<Session<S, A>> {
        let mode = OutputMode::select(flags, &Environment::detect());
        self.run_with(mode, std::io::stdout(), SizeSource::Terminal)
    }

    /// Starts a session with an explicit mode, sink and size source.
    pub fn run_with<W>(self, mode: OutputMode, out: W, size: SizeSource) -> Result<Session<S, A>>
    where
        W: Write + Send + 'static,
    {
        Session::start(self, mode, out, size)
    }
}

fn empty_view<S>(_: &S, _: &ViewContext<'_>) -> Node {
    Node::Empty
}

fn success<S>(_: &S) -> i32 {
    0
}

fn never_terminal<S>(_: &S) -> bool {
    false
}

fn exit_process(code: i32) {
    std::process::exit(code)
}

impl<S, A> TuiAppBuilder<S, A>
where
    S: Clone + Serialize + Send + 'static,
    A: Interrupt + Send + 'static,
{
    pub fn view(mut self, view: impl Fn(&S, &ViewContext<'_>) -> Node + Send + Sync + 'static) -> Self {
        self.app.view = Arc::new(view);
        self
    }

    pub fn exit_code(mut self, exit_code: impl Fn(&S) -> i32 + Send + Sync + 'static) -> Self {
        self.app.exit_code = Box::new(exit_code);
        self
    }

    /// The app's own notion of "done". Reaching such a state ends the session.
    pub fn is_terminal(mut self, is_terminal: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        self.app.is_terminal = Box::new(is_terminal);
        self
    }

    pub fn interrupt_grace(mut self, grace: Duration) -> Self {
        self.app.grace = grace;
        self
    }

    /// Applies `config`, including its interrupt grace period.
    pub fn config(mut self, config: TuiConfig) -> Self {
        self.app.grace = config.interrupt_grace();
        self.app.config = config;
        self
    }

    /// Called with the exit code when the grace period expires. Defaults to
    /// `std::process::exit`.
    pub fn on_forced_exit(mut self, hook: impl Fn(i32) + Send + Sync + 'static) -> Self {
        self.app.exit_hook = Arc::new(hook);
        self
    }

    /// Whether SIGINT (and SIGTERM on Unix) interrupt the session.
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.app.handle_signals = enabled;
        self
    }

    pub fn build(self) -> TuiApp<S, A> {
        self.app
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_size_is_reported_verbatim() {
        assert_eq!(SizeSource::Fixed(40, 10).query(), (40, 10));
    }

    #[test]
    fn terminal_size_is_never_zero() {
        let (w, h) = SizeSource::Terminal.query();
        assert!(w > 0 && h > 0);
    }

    #[derive(Clone, serde::Serialize)]
    struct Count(u32);

    enum Bump {
        One,
        Stop,
    }

    impl Interrupt for Bump {
        fn interrupt() -> Self {
            Bump::Stop
        }
    }

    #[test]
    fn builder_defaults() {
        let app = TuiApp::builder(Count(0), |s: &Count, a: Bump| match a {
            Bump::One => Count(s.0 + 1),
            Bump::Stop => s.clone(),
        })
        .build();
        assert_eq!(app.grace, Duration::from_secs(3));
        assert_eq!((app.exit_code)(&app.initial), 0);
        assert!(!(app.is_terminal)(&app.initial));
        assert!(app.handle_signals);
    }

    #[test]
    fn config_sets_grace() {
        let config = TuiConfig {
            interrupt_grace_ms: 40,
            ..Default::default()
        };
        let app = TuiApp::builder(Count(0), |s: &Count, _: Bump| s.clone())
            .config(config)
            .build();
        assert_eq!(app.grace, Duration::from_millis(40));
    }
}
