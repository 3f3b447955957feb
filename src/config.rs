use crate::error::{DeviceError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Default device address on the local network
pub const DEFAULT_HOST: &str = "192.168.31.123";

/// Port the device listens on for LAN control
pub const DEFAULT_PORT: u16 = 55443;

/// Bound on connect, send and receive
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Quiet period before a slider value is sent
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Connection and timing settings for a single light
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub host: String,
    pub port: u16,
    #[serde(rename = "timeout_ms", deserialize_with = "millis")]
    pub timeout: Duration,
    #[serde(rename = "debounce_ms", deserialize_with = "millis")]
    pub debounce: Duration,
}

fn millis<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

impl DeviceConfig {
    /// Config for the given host with default port and timings
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Build a config from `CEILING_LIGHT_*` environment variables
    ///
    /// Unset variables keep their defaults; set but unparseable ones are errors.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("CEILING_LIGHT_HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("CEILING_LIGHT_PORT") {
            config.port = parse_var("CEILING_LIGHT_PORT", &port)?;
        }
        if let Some(ms) = lookup("CEILING_LIGHT_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(parse_var("CEILING_LIGHT_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = lookup("CEILING_LIGHT_DEBOUNCE_MS") {
            config.debounce = Duration::from_millis(parse_var("CEILING_LIGHT_DEBOUNCE_MS", &ms)?);
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DeviceError::Config(format!("{} has invalid value {:?}", key, value)))
}
