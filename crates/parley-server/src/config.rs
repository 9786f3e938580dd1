use std::time::Duration;

use anyhow::Result;

use parley_gateway::connection::DEFAULT_HEARTBEAT_INTERVAL;

/// Server configuration from the environment. All knobs are operational,
/// not behavioral: endpoint binding, allowed CORS origin, heartbeat tuning.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Exact origin allowed to connect. Unset means permissive (dev).
    pub cors_origin: Option<String>,
    pub heartbeat_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("PARLEY_PORT")
            .unwrap_or_else(|_| "4000".into())
            .parse()?;
        let cors_origin = std::env::var("PARLEY_CORS_ORIGIN").ok().filter(|s| !s.is_empty());
        let heartbeat_interval = match std::env::var("PARLEY_HEARTBEAT_SECS") {
            Ok(secs) => Duration::from_secs(secs.parse()?),
            Err(_) => DEFAULT_HEARTBEAT_INTERVAL,
        };

        Ok(Self {
            host,
            port,
            cors_origin,
            heartbeat_interval,
        })
    }
}
