//! Declarative inline terminal renderer
//!
//! An app is a state type, a reducer over actions and a view from state to a
//! [`Node`] tree. The session draws the tree just above the cursor:
//!
//! - **Static**: items inside [`static_list`] are printed once and graduate
//!   into the terminal's scrollback
//! - **Dynamic**: everything else is redrawn in place, rewriting only the
//!   rows that changed
//! - **Batch**: without a terminal the same app reports its state as JSON or
//!   NDJSON instead
//!
//! # Architecture
//!
//! ```text
//! dispatch(action) -> reducer -> State -> view() -> Node tree
//!                                                      |
//!                     FramePlanner (graduation + layout + render)
//!                                                      |
//!                     ScreenWriter (static lines, then live region)
//! ```
//!
//! An interrupt (SIGINT, SIGTERM or [`Session::interrupt`]) is dispatched as
//! an ordinary action; if the app does not reach a terminal state within the
//! grace period the process is terminated.

pub mod ansi;
mod app;
mod config;
mod error;
mod graduation;
mod interrupt;
pub mod layout;
pub mod logging;
mod mode;
mod node;
mod output;
mod planning;
mod render;
mod report;
mod session;
mod style;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use app::{ExitHook, Interrupt, SizeSource, TuiApp, TuiAppBuilder, ViewContext};
pub use config::{TuiConfig, ViewportConfig, GRACE_ENV};
pub use error::{Result, TuiError};
pub use graduation::{GraduationPlan, GraduationState, PendingItem};
pub use interrupt::FORCED_EXIT_CODE;
pub use layout::{LayoutEngine, LayoutError, LayoutService, StackLayout, TaffyLayout};
pub use logging::{init_logging, CapturedLogEntry, LogLevel};
pub use mode::{Environment, OutputFlags, OutputMode, RenderKind, Screen, Strategy, Timing};
pub use node::*;
pub use output::ScreenWriter;
pub use planning::{Frame, FramePlanner, FrameTrace};
pub use render::render_lines;
pub use session::{Phase, Session, SessionOutcome};
pub use style::*;
