use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-session switches handed to the client when a session is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Log every wire message at info level.
    pub verbose_logging: bool,
    /// Send compact value-only updates. Only enable against devices that
    /// understand them.
    pub value_updates: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub host: String,
    pub port: u16,
    /// Quiescence window for batched add/remove publication.
    pub debounce: Duration,
    /// How long connect/disconnect may go unacknowledged. `None` waits forever.
    pub connect_timeout: Option<Duration>,
    pub session: SessionConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            debounce: DEFAULT_DEBOUNCE,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            session: SessionConfig::default(),
        }
    }
}

impl PanelConfig {
    /// Defaults overlaid with `RCP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`PanelConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(host) = lookup("RCP_HOST") {
            let host = host.trim();
            if !host.is_empty() {
                cfg.host = host.to_string();
            }
        }
        if let Some(port) = lookup("RCP_PORT") {
            cfg.port = parse_number("RCP_PORT", &port)?;
        }
        if let Some(ms) = lookup("RCP_DEBOUNCE_MS") {
            cfg.debounce = Duration::from_millis(parse_number("RCP_DEBOUNCE_MS", &ms)?);
        }
        if let Some(ms) = lookup("RCP_CONNECT_TIMEOUT_MS") {
            let ms: u64 = parse_number("RCP_CONNECT_TIMEOUT_MS", &ms)?;
            cfg.connect_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(v) = lookup("RCP_VERBOSE") {
            cfg.session.verbose_logging = parse_bool("RCP_VERBOSE", &v)?;
        }
        if let Some(v) = lookup("RCP_VALUE_UPDATES") {
            cfg.session.value_updates = parse_bool("RCP_VALUE_UPDATES", &v)?;
        }

        Ok(cfg)
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = PanelConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, PanelConfig::default());
        assert_eq!(cfg.port, 10000);
        assert_eq!(cfg.debounce, Duration::from_millis(100));
    }

    #[test]
    fn env_overrides() {
        let cfg = PanelConfig::from_lookup(lookup(&[
            ("RCP_HOST", "10.0.0.7"),
            ("RCP_PORT", "9001"),
            ("RCP_DEBOUNCE_MS", "40"),
            ("RCP_CONNECT_TIMEOUT_MS", "0"),
            ("RCP_VERBOSE", "true"),
            ("RCP_VALUE_UPDATES", "1"),
        ]))
        .unwrap();
        assert_eq!(cfg.host, "10.0.0.7");
        assert_eq!(cfg.port, 9001);
        assert_eq!(cfg.debounce, Duration::from_millis(40));
        assert_eq!(cfg.connect_timeout, None);
        assert!(cfg.session.verbose_logging);
        assert!(cfg.session.value_updates);
    }

    #[test]
    fn malformed_values_are_errors() {
        let err = PanelConfig::from_lookup(lookup(&[("RCP_PORT", "ten")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { key: "RCP_PORT", .. }));

        let err = PanelConfig::from_lookup(lookup(&[("RCP_VERBOSE", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBool { key: "RCP_VERBOSE", .. }));
    }
}
