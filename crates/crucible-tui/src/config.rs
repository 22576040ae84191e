use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub const GRACE_ENV: &str = "CRUCIBLE_TUI_GRACE_MS";

const DEFAULT_GRACE_MS: u64 = 3000;
const DEFAULT_LOG_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuiConfig {
    /// How long an interrupted session may take to reach a terminal state
    /// before the process is terminated.
    pub interrupt_grace_ms: u64,
    /// Captured log entries kept per session; oldest are evicted first.
    pub log_capacity: usize,
    pub viewport: ViewportConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Upper bound on live-region rows. Defaults to the terminal height
    /// minus one.
    pub max_rows: Option<usize>,
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            interrupt_grace_ms: DEFAULT_GRACE_MS,
            log_capacity: DEFAULT_LOG_CAPACITY,
            viewport: ViewportConfig::default(),
        }
    }
}

impl TuiConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Applies `CRUCIBLE_TUI_GRACE_MS`. Unparseable values are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(GRACE_ENV) {
            match raw.trim().parse() {
                Ok(ms) => self.interrupt_grace_ms = ms,
                Err(_) => warn!(value = %raw, "ignoring invalid {}", GRACE_ENV),
            }
        }
        self
    }

    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_millis(self.interrupt_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TuiError;

    #[test]
    fn defaults_match_documented_values() {
        let config = TuiConfig::default();
        assert_eq!(config.interrupt_grace(), Duration::from_secs(3));
        assert_eq!(config.log_capacity, 1000);
        assert_eq!(config.viewport.max_rows, None);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = TuiConfig::from_toml_str("interrupt_grace_ms = 500").unwrap();
        assert_eq!(config.interrupt_grace_ms, 500);
        assert_eq!(config.log_capacity, 1000);
    }

    #[test]
    fn nested_viewport_table() {
        let config = TuiConfig::from_toml_str("[viewport]\nmax_rows = 12\n").unwrap();
        assert_eq!(config.viewport.max_rows, Some(12));
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = TuiConfig::from_toml_str("interrupt_grace_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, TuiError::Config(_)));
    }

    #[test]
    fn env_override_replaces_grace() {
        let config = TuiConfig::default()
            .with_overrides_from(|key| (key == GRACE_ENV).then(|| "250".to_string()));
        assert_eq!(config.interrupt_grace_ms, 250);
    }

    #[test]
    fn bad_env_override_is_ignored() {
        let config = TuiConfig::default().with_overrides_from(|_| Some("never".to_string()));
        assert_eq!(config.interrupt_grace_ms, 3000);
    }
}
