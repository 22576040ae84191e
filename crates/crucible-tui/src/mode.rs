use clap::Args;
use crossterm::tty::IsTty;
use tracing::debug;

/// Output flags a host CLI can `#[command(flatten)]` into its own arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct OutputFlags {
    /// Emit machine-readable JSON instead of drawing to the terminal
    #[arg(long)]
    pub json: bool,

    /// With --json, emit one JSON object per state change (NDJSON)
    #[arg(long, requires = "json")]
    pub stream: bool,

    /// Draw in the terminal's alternate screen buffer
    #[arg(long = "alternate-screen")]
    pub alternate_screen: bool,
}

/// The facts about the process environment mode selection depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub stdout_is_tty: bool,
    pub term: Option<String>,
}

impl Environment {
    pub fn detect() -> Self {
        Self {
            stdout_is_tty: std::io::stdout().is_tty(),
            term: std::env::var("TERM").ok(),
        }
    }

    fn is_dumb(&self) -> bool {
        self.term.as_deref() == Some("dumb")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    Visual,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    Progressive,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Normal,
    Alternate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    pub render: RenderKind,
    pub timing: Timing,
    pub screen: Screen,
}

/// The five concrete reporting strategies an [`OutputMode`] maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Live region redrawn in place on the normal screen.
    Inline,
    /// Live region in the alternate screen buffer.
    Fullscreen,
    /// Only the final frame, printed once.
    FinalFrame,
    /// One JSON object for the terminal state.
    Json,
    /// One JSON object per state change.
    Ndjson,
}

impl OutputMode {
    pub const INLINE: Self = Self {
        render: RenderKind::Visual,
        timing: Timing::Progressive,
        screen: Screen::Normal,
    };
    pub const FULLSCREEN: Self = Self {
        render: RenderKind::Visual,
        timing: Timing::Progressive,
        screen: Screen::Alternate,
    };
    pub const FINAL_FRAME: Self = Self {
        render: RenderKind::Visual,
        timing: Timing::Final,
        screen: Screen::Normal,
    };
    pub const JSON: Self = Self {
        render: RenderKind::Json,
        timing: Timing::Final,
        screen: Screen::Normal,
    };
    pub const NDJSON: Self = Self {
        render: RenderKind::Json,
        timing: Timing::Progressive,
        screen: Screen::Normal,
    };

    /// First match wins: explicit JSON flag, then non-TTY stdout, then a dumb
    /// terminal, then an interactive terminal.
    pub fn select(flags: &OutputFlags, env: &Environment) -> Self {
        let mode = if flags.json {
            if flags.stream {
                Self::NDJSON
            } else {
                Self::JSON
            }
        } else if !env.stdout_is_tty {
            Self::JSON
        } else if env.is_dumb() {
            Self::FINAL_FRAME
        } else if flags.alternate_screen {
            Self::FULLSCREEN
        } else {
            Self::INLINE
        };
        debug!(?mode, ?flags, ?env, "selected output mode");
        mode
    }

    pub fn strategy(&self) -> Strategy {
        match (self.render, self.timing, self.screen) {
            (RenderKind::Json, Timing::Final, _) => Strategy::Json,
            (RenderKind::Json, Timing::Progressive, _) => Strategy::Ndjson,
            (RenderKind::Visual, Timing::Final, _) => Strategy::FinalFrame,
            (RenderKind::Visual, Timing::Progressive, Screen::Normal) => Strategy::Inline,
            (RenderKind::Visual, Timing::Progressive, Screen::Alternate) => Strategy::Fullscreen,
        }
    }

    pub fn is_live(&self) -> bool {
        self.render == RenderKind::Visual && self.timing == Timing::Progressive
    }
}
