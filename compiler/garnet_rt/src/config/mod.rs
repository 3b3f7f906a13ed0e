//! Runtime configuration.

use crate::errors::ConfigError;

/// Default call-depth limit before `SystemStackError`.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

const MAX_CALL_DEPTH_VAR: &str = "GARNET_MAX_CALL_DEPTH";
const PROFILE_VAR: &str = "GARNET_PROFILE";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Nested calls allowed before raising `SystemStackError`. `None` disables
    /// the check.
    pub max_call_depth: Option<usize>,
    /// Collect `DispatchCounters`.
    pub profile: bool,
    /// File name used in backtraces for frames without provenance.
    pub script_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            max_call_depth: Some(DEFAULT_MAX_CALL_DEPTH),
            profile: false,
            script_name: "main".to_owned(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `GARNET_MAX_CALL_DEPTH` and `GARNET_PROFILE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = RuntimeConfig::default();

        if let Some(raw) = lookup(MAX_CALL_DEPTH_VAR) {
            config.max_call_depth = match raw.trim() {
                "0" | "none" | "unlimited" => None,
                text => Some(text.parse().map_err(|_| ConfigError::InvalidValue {
                    var: MAX_CALL_DEPTH_VAR,
                    value: raw.clone(),
                    expected: "a positive integer or \"unlimited\"",
                })?),
            };
        }

        if let Some(raw) = lookup(PROFILE_VAR) {
            config.profile = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "" | "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: PROFILE_VAR,
                        value: raw,
                        expected: "a boolean",
                    })
                }
            };
        }

        Ok(config)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
