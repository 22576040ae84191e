//! The running app: serialized reducer applications, coalesced rendering and
//! the interrupt lifecycle.

use crate::app::{ExitHook, Interrupt, ReducerFn, SizeSource, StateFn, TuiApp};
use crate::error::{Result, TuiError};
use crate::interrupt::{self, Watchdog, FORCED_EXIT_CODE};
use crate::logging::install_capture;
use crate::mode::{OutputMode, Strategy};
use crate::report::{FinalFrameReporter, JsonReporter, LiveReporter, Reporter};
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, warn};

/// How long the watchdog waits for the engine lock before giving up on a
/// final flush.
const FORCE_LOCK_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Active,
    Interrupting,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOutcome {
    pub exit_code: i32,
    /// The grace period expired before the state became terminal.
    pub forced: bool,
}

struct Engine<S> {
    state: S,
    phase: Phase,
    reporter: Box<dyn Reporter<S>>,
    outcome: Option<SessionOutcome>,
    fatal: Option<TuiError>,
    panic: Option<Box<dyn Any + Send>>,
}

struct Hooks<S, A> {
    reducer: Box<ReducerFn<S, A>>,
    exit_code: Box<StateFn<S, i32>>,
    is_terminal: Box<StateFn<S, bool>>,
    wake: Arc<Notify>,
    done: watch::Sender<bool>,
    watchdog: Mutex<Option<Watchdog>>,
    grace: Duration,
    exit_hook: ExitHook,
}

struct Shared<S, A> {
    engine: Mutex<Engine<S>>,
    hooks: Hooks<S, A>,
}

/// Stands in for a reporter that was torn down after a panic.
struct Detached;

impl<S> Reporter<S> for Detached {
    fn started(&mut self, _state: &S) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self, _state: &S) -> Result<()> {
        Ok(())
    }

    fn frames(&self) -> u64 {
        0
    }
}

impl<S, A> Hooks<S, A> {
    /// Final flush, exit code and wake-ups. Runs at most once per session.
    fn finalize(&self, engine: &mut Engine<S>, forced: bool) {
        if engine.phase == Phase::Terminated {
            return;
        }
        engine.phase = Phase::Terminated;

        if let Err(err) = engine.reporter.finish(&engine.state) {
            warn!(error = %err, "final render failed");
            if engine.fatal.is_none() {
                engine.fatal = Some(err);
            }
        }

        let exit_code = (self.exit_code)(&engine.state);
        engine.outcome = Some(SessionOutcome { exit_code, forced });

        if let Some(watchdog) = self.watchdog.lock().take() {
            watchdog.disarm();
        }
        self.done.send_replace(true);
        self.wake.notify_one();
        debug!(
            exit_code,
            forced,
            frames = engine.reporter.frames(),
            "session terminated"
        );
    }

    /// Tears the session down after the reducer or view panicked. The panic
    /// is re-raised from [`Session::wait`] and [`Session::unmount`].
    fn abort(&self, engine: &mut Engine<S>, panic: Box<dyn Any + Send>) {
        warn!("app panicked; restoring the terminal and ending the session");
        engine.phase = Phase::Terminated;
        // Dropping the reporter restores the cursor and screen.
        drop(std::mem::replace(&mut engine.reporter, Box::new(Detached)));
        engine.panic = Some(panic);
        if let Some(watchdog) = self.watchdog.lock().take() {
            watchdog.disarm();
        }
        self.done.send_replace(true);
        self.wake.notify_one();
    }
}

impl<S, A> Shared<S, A> {
    /// Draws the latest state. Returns `false` once the session is over.
    fn render(&self) -> bool {
        let mut engine = self.engine.lock();
        if engine.phase == Phase::Terminated {
            return false;
        }
        let eng = &mut *engine;
        match panic::catch_unwind(AssertUnwindSafe(|| eng.reporter.render(&eng.state))) {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(error = %err, "render failed; ending session");
                eng.fatal = Some(err);
                self.hooks.finalize(eng, false);
                false
            }
            Err(panic) => {
                self.hooks.abort(eng, panic);
                false
            }
        }
    }
}

impl<S, A> Drop for Shared<S, A> {
    fn drop(&mut self) {
        let engine = self.engine.get_mut();
        if engine.phase != Phase::Terminated {
            self.hooks.finalize(engine, false);
        }
    }
}

/// Handle to a running app. Cloning shares the same session.
pub struct Session<S, A> {
    shared: Arc<Shared<S, A>>,
}

impl<S, A> Clone for Session<S, A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, A> Session<S, A>
where
    S: Clone + Serialize + Send + 'static,
    A: Interrupt + Send + 'static,
{
    pub(crate) fn start<W>(
        app: TuiApp<S, A>,
        mode: OutputMode,
        out: W,
        size: SizeSource,
    ) -> Result<Self>
    where
        W: Write + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()?;
        let TuiApp {
            initial,
            reducer,
            view,
            exit_code,
            is_terminal,
            grace,
            config,
            exit_hook,
            handle_signals,
        } = app;

        let wake = Arc::new(Notify::new());
        let mut reporter: Box<dyn Reporter<S>> = match mode.strategy() {
            Strategy::Inline | Strategy::Fullscreen => {
                let capture = install_capture(config.log_capacity, Some(Arc::clone(&wake)));
                Box::new(LiveReporter::new(
                    out,
                    mode.screen,
                    size,
                    view,
                    config.viewport.max_rows,
                    capture,
                ))
            }
            Strategy::FinalFrame => Box::new(FinalFrameReporter::new(out, size, view)),
            Strategy::Json | Strategy::Ndjson => Box::new(JsonReporter::new(out, mode.timing)),
        };
        reporter.started(&initial)?;

        let (done, _) = watch::channel(false);
        let shared = Arc::new(Shared {
            engine: Mutex::new(Engine {
                state: initial,
                phase: Phase::Active,
                reporter,
                outcome: None,
                fatal: None,
                panic: None,
            }),
            hooks: Hooks {
                reducer,
                exit_code,
                is_terminal,
                wake: Arc::clone(&wake),
                done,
                watchdog: Mutex::new(None),
                grace,
                exit_hook,
            },
        });
        debug!(?mode, grace_ms = grace.as_millis() as u64, "session started");

        {
            let mut engine = shared.engine.lock();
            if (shared.hooks.is_terminal)(&engine.state) {
                shared.hooks.finalize(&mut engine, false);
            }
        }

        if mode.is_live() {
            runtime.spawn(render_loop(Arc::downgrade(&shared), wake));
        }
        if handle_signals {
            let done = shared.hooks.done.subscribe();
            runtime.spawn(signal_loop(Arc::downgrade(&shared), done));
        }

        Ok(Self { shared })
    }

    /// Applies `action`. Returns `false` if the session had already
    /// terminated and the action was dropped, or if the reducer panicked; in
    /// the latter case the session is torn down and the panic resurfaces
    /// from [`Session::wait`].
    pub fn dispatch(&self, action: A) -> bool {
        let hooks = &self.shared.hooks;
        let mut engine = self.shared.engine.lock();
        if engine.phase == Phase::Terminated {
            debug!("dispatch after termination ignored");
            return false;
        }

        let eng = &mut *engine;
        let reduced = panic::catch_unwind(AssertUnwindSafe(|| (hooks.reducer)(&eng.state, action)));
        eng.state = match reduced {
            Ok(next) => next,
            Err(panic) => {
                hooks.abort(eng, panic);
                return false;
            }
        };

        if let Err(err) = eng.reporter.dispatched(&eng.state) {
            warn!(error = %err, "reporting a dispatch failed; ending session");
            eng.fatal = Some(err);
            hooks.finalize(eng, false);
        } else if (hooks.is_terminal)(&eng.state) {
            hooks.finalize(eng, false);
        } else {
            drop(engine);
            hooks.wake.notify_one();
        }
        true
    }

    /// Requests an orderly shutdown: dispatches `A::interrupt()` and arms the
    /// grace-period watchdog. Ignored unless the session is `Active`.
    pub fn interrupt(&self) {
        {
            let mut engine = self.shared.engine.lock();
            if engine.phase != Phase::Active {
                debug!(phase = ?engine.phase, "interrupt ignored");
                return;
            }
            engine.phase = Phase::Interrupting;

            let weak = Arc::downgrade(&self.shared);
            match Watchdog::arm(self.shared.hooks.grace, move || force_exit(weak)) {
                Ok(watchdog) => *self.shared.hooks.watchdog.lock() = Some(watchdog),
                Err(err) => warn!(error = %err, "could not start the interrupt watchdog"),
            }
        }
        self.dispatch(A::interrupt());
    }
}

impl<S, A> Session<S, A>
where
    S: Clone,
{
    pub fn state(&self) -> S {
        self.shared.engine.lock().state.clone()
    }

    pub fn phase(&self) -> Phase {
        self.shared.engine.lock().phase
    }

    /// Frames drawn or JSON objects written so far.
    pub fn frame_count(&self) -> u64 {
        self.shared.engine.lock().reporter.frames()
    }

    /// Resolves once the session has terminated.
    pub async fn wait(&self) -> Result<SessionOutcome> {
        let mut done = self.shared.hooks.done.subscribe();
        let _ = done.wait_for(|d| *d).await;
        self.outcome()
    }

    /// Terminates the session now, flushing the current state as final.
    pub fn unmount(&self) -> Result<SessionOutcome> {
        {
            let mut engine = self.shared.engine.lock();
            self.shared.hooks.finalize(&mut engine, false);
        }
        self.outcome()
    }

    fn outcome(&self) -> Result<SessionOutcome> {
        let mut engine = self.shared.engine.lock();
        if let Some(panic) = engine.panic.take() {
            drop(engine);
            panic::resume_unwind(panic);
        }
        if let Some(err) = engine.fatal.take() {
            return Err(err);
        }
        engine.outcome.ok_or(TuiError::SessionClosed)
    }
}

async fn render_loop<S, A>(shared: Weak<Shared<S, A>>, wake: Arc<Notify>) {
    loop {
        wake.notified().await;
        let Some(shared) = shared.upgrade() else {
            break;
        };
        if !shared.render() {
            break;
        }
    }
}

async fn signal_loop<S, A>(shared: Weak<Shared<S, A>>, mut done: watch::Receiver<bool>)
where
    S: Clone + Serialize + Send + 'static,
    A: Interrupt + Send + 'static,
{
    while interrupt::next_signal(&mut done).await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        debug!("interrupt signal received");
        Session { shared }.interrupt();
    }
}

/// Runs on the watchdog thread when the grace period expires.
fn force_exit<S, A>(shared: Weak<Shared<S, A>>) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let exit_code = match shared.engine.try_lock_for(FORCE_LOCK_TIMEOUT) {
        Some(mut engine) => {
            if engine.phase == Phase::Terminated {
                return;
            }
            shared.hooks.finalize(&mut engine, true);
            engine
                .outcome
                .map_or(FORCED_EXIT_CODE, |outcome| outcome.exit_code)
        }
        None => FORCED_EXIT_CODE,
    };
    warn!(
        exit_code,
        grace_ms = shared.hooks.grace.as_millis() as u64,
        "interrupt grace period expired; forcing exit"
    );
    (shared.hooks.exit_hook)(exit_code);
}
