//! Tracker configuration.
//!
//! Settings come from code, from `FERROUS_LIFETIMES_*` environment variables,
//! or, with the `config` feature, from JSON.

use std::env;

#[cfg(feature = "config")]
use serde::Deserialize;

/// Environment variable prefix read by [`TrackerConfig::from_env`].
pub const ENV_PREFIX: &str = "FERROUS_LIFETIMES";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {variable}: expected {expected}")]
    InvalidValue {
        variable: String,
        value: String,
        expected: &'static str,
    },

    #[cfg(feature = "config")]
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tuning knobs for [`BuildTracker`](crate::BuildTracker).
///
/// # Examples
///
/// ```
/// use ferrous_lifetimes::TrackerConfig;
///
/// let config = TrackerConfig::default()
///     .prune_on_insert(true)
///     .live_tree_warning(10_000);
///
/// assert!(config.prune_on_tear_down);
/// assert!(config.prune_on_insert);
/// assert_eq!(config.live_tree_warning, Some(10_000));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct TrackerConfig {
    /// Drop collected roots while searching the store at tear-down.
    pub prune_on_tear_down: bool,
    /// Drop collected roots whenever a new root is inserted.
    pub prune_on_insert: bool,
    /// Log a warning once the store holds more roots than this.
    pub live_tree_warning: Option<usize>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            prune_on_tear_down: true,
            prune_on_insert: false,
            live_tree_warning: None,
        }
    }
}

impl TrackerConfig {
    pub fn prune_on_tear_down(mut self, enabled: bool) -> Self {
        self.prune_on_tear_down = enabled;
        self
    }

    pub fn prune_on_insert(mut self, enabled: bool) -> Self {
        self.prune_on_insert = enabled;
        self
    }

    pub fn live_tree_warning(mut self, threshold: usize) -> Self {
        self.live_tree_warning = Some(threshold);
        self
    }

    /// Defaults overridden by any `FERROUS_LIFETIMES_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(value) = read_var("PRUNE_ON_TEAR_DOWN", parse_bool)? {
            config.prune_on_tear_down = value;
        }
        if let Some(value) = read_var("PRUNE_ON_INSERT", parse_bool)? {
            config.prune_on_insert = value;
        }
        if let Some(value) = read_var("LIVE_TREE_WARNING", parse_usize)? {
            config.live_tree_warning = Some(value);
        }
        Ok(config)
    }

    /// Parses a JSON object; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn read_var<T>(
    name: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError> {
    let variable = format!("{}_{}", ENV_PREFIX, name);
    match env::var(&variable) {
        Ok(raw) => parse(raw.trim()).map(Some).ok_or(ConfigError::InvalidValue {
            expected: std::any::type_name::<T>(),
            variable,
            value: raw,
        }),
        Err(_) => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_usize(raw: &str) -> Option<usize> {
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = TrackerConfig::default().prune_on_tear_down(false);
        assert!(!config.prune_on_tear_down);
        assert!(!config.prune_on_insert);
        assert_eq!(config.live_tree_warning, None);
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_keeps_missing_fields_at_default() {
        let config = TrackerConfig::from_json(r#"{ "prune_on_insert": true }"#).unwrap();
        assert!(config.prune_on_insert);
        assert!(config.prune_on_tear_down);

        assert!(TrackerConfig::from_json("[1, 2]").is_err());
    }
}
