//! Server configuration and its environment overrides.

use std::str::FromStr;
use std::time::Duration;

use versus_hub::HubConfig;
use versus_transport::DEFAULT_HANDSHAKE_TIMEOUT;

use crate::VersusError;

/// Address used when nothing else is configured.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Everything needed to start a [`VersusServer`](crate::VersusServer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    pub bind_addr: String,
    /// Upper bound on the HTTP → WebSocket upgrade.
    pub handshake_timeout: Duration,
    /// Hub limits and policies.
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `VERSUS_*` environment variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `VERSUS_BIND` | `bind_addr` |
    /// | `VERSUS_OUTBOX_CAPACITY` | `hub.outbox_capacity` |
    /// | `VERSUS_MAX_CLIENTS` | `hub.max_clients` (0 = unlimited) |
    /// | `VERSUS_WAITING_TIMEOUT_SECS` | `hub.waiting_timeout` (0 = never) |
    /// | `VERSUS_HANDSHAKE_TIMEOUT_SECS` | `handshake_timeout` |
    ///
    /// # Errors
    /// [`VersusError::Config`] naming the first variable that fails to parse.
    pub fn from_env() -> Result<Self, VersusError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, VersusError> {
        let mut config = Self::default();

        if let Some(bind) = lookup("VERSUS_BIND") {
            let bind = bind.trim();
            if bind.is_empty() {
                return Err(VersusError::Config("VERSUS_BIND is empty".into()));
            }
            config.bind_addr = bind.to_string();
        }
        if let Some(capacity) = parse(&lookup, "VERSUS_OUTBOX_CAPACITY")? {
            config.hub.outbox_capacity = capacity;
        }
        if let Some(max) = parse(&lookup, "VERSUS_MAX_CLIENTS")? {
            config.hub.max_clients = max;
        }
        if let Some(secs) = parse::<u64>(&lookup, "VERSUS_WAITING_TIMEOUT_SECS")? {
            config.hub.waiting_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(secs) = parse(&lookup, "VERSUS_HANDSHAKE_TIMEOUT_SECS")? {
            config.handshake_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, VersusError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e| VersusError::Config(format!("{key}={raw:?}: {e}")))
}
