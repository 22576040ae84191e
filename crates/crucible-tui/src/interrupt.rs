//! Interrupt plumbing: OS signal listening and the grace-period watchdog.
//!
//! The watchdog runs on its own OS thread so it fires even when the async
//! runtime driving the session is blocked.

use std::io;
use std::thread;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Exit code used when the forced path cannot read the final state.
pub const FORCED_EXIT_CODE: i32 = 130;

/// A pending deadline. Dropping or disarming it cancels the deadline.
pub(crate) struct Watchdog {
    cancel: flume::Sender<()>,
}

impl Watchdog {
    /// Runs `on_expire` on a dedicated thread unless disarmed within `grace`.
    pub(crate) fn arm(grace: Duration, on_expire: impl FnOnce() + Send + 'static) -> io::Result<Self> {
        let (cancel, cancelled) = flume::bounded::<()>(1);
        thread::Builder::new()
            .name("crucible-tui-watchdog".into())
            .spawn(move || match cancelled.recv_timeout(grace) {
                Err(flume::RecvTimeoutError::Timeout) => on_expire(),
                Ok(()) | Err(flume::RecvTimeoutError::Disconnected) => {
                    debug!("interrupt watchdog disarmed");
                }
            })?;
        Ok(Self { cancel })
    }

    pub(crate) fn disarm(self) {
        let _ = self.cancel.try_send(());
    }
}

/// Resolves on the first SIGINT (or SIGTERM on Unix), or when `done` flips.
/// Returns `true` for a signal.
pub(crate) async fn next_signal(done: &mut watch::Receiver<bool>) -> bool {
    let received = tokio::select! {
        result = os_signal() => Some(result),
        _ = done.wait_for(|d| *d) => None,
    };
    match received {
        Some(Ok(())) => true,
        Some(Err(err)) => {
            warn!(error = %err, "could not listen for interrupt signals");
            let _ = done.wait_for(|d| *d).await;
            false
        }
        None => false,
    }
}

#[cfg(unix)]
async fn os_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = term.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn os_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
