//! Runtime configuration for the refresh controller

use crate::constants::{
    DEBOUNCE_WINDOW_MS, ENV_AUTO_REFRESH, ENV_DEBOUNCE_MS, ENV_TIMEOUT_SECS,
    REQUEST_TIMEOUT_SECS, STALE_THRESHOLD_SECS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Knobs for the refresh pipeline
///
/// Defaults come from `constants`; `from_env` applies environment overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Quiet window between the last block and the auto refresh
    pub debounce_window: Duration,
    /// Timeout for each reserve call
    pub request_timeout: Duration,
    /// Age after which cached rates are reported stale (seconds)
    pub stale_threshold_secs: u64,
    /// Whether block-driven refresh starts enabled
    pub auto_refresh: bool,
    /// Run one pass as soon as watching starts
    pub refresh_on_start: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_millis(DEBOUNCE_WINDOW_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            stale_threshold_secs: STALE_THRESHOLD_SECS,
            auto_refresh: true,
            refresh_on_start: true,
        }
    }
}

impl RefreshConfig {
    /// Defaults with `RATE_REFRESH_*` environment overrides applied
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_DEBOUNCE_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.debounce_window = Duration::from_millis(ms),
                Err(e) => tracing::warn!(key = ENV_DEBOUNCE_MS, value = %raw, error = %e, "Ignoring invalid override"),
            }
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(key = ENV_TIMEOUT_SECS, value = %raw, "Ignoring invalid override"),
            }
        }

        if let Some(raw) = lookup(ENV_AUTO_REFRESH) {
            match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.auto_refresh = true,
                "0" | "false" | "no" | "off" => config.auto_refresh = false,
                _ => tracing::warn!(key = ENV_AUTO_REFRESH, value = %raw, "Ignoring invalid override"),
            }
        }

        config
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    pub fn with_refresh_on_start(mut self, enabled: bool) -> Self {
        self.refresh_on_start = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RefreshConfig::default();
        assert_eq!(config.debounce_window, Duration::from_millis(1000));
        assert!(config.auto_refresh);
        assert!(config.refresh_on_start);
    }

    #[test]
    fn test_env_overrides() {
        let config = RefreshConfig::from_lookup(lookup_from(&[
            (ENV_DEBOUNCE_MS, "250"),
            (ENV_TIMEOUT_SECS, "3"),
            (ENV_AUTO_REFRESH, "off"),
        ]));
        assert_eq!(config.debounce_window, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert!(!config.auto_refresh);
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let config = RefreshConfig::from_lookup(lookup_from(&[
            (ENV_DEBOUNCE_MS, "soon"),
            (ENV_TIMEOUT_SECS, "0"),
            (ENV_AUTO_REFRESH, "maybe"),
        ]));
        assert_eq!(config, RefreshConfig::default());
    }
}
