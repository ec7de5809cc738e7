//! Adapter configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use uuid::Uuid;

use mmi_domain::IpAddress;

/// Adapter configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Interface the WebSocket/HTTP listener binds to
    pub host: String,
    /// Listener port
    pub port: u16,
    /// Address advertised at the directory (what clients dial)
    pub public_address: String,

    /// Adapter id advertised at the directory
    pub adapter_id: String,
    /// Human-readable adapter name
    pub adapter_name: String,

    /// Directory service base URL; `None` runs against an in-memory directory
    pub directory_url: Option<String>,
    /// Heartbeat period
    pub registration_interval: Duration,

    /// Reaper configuration
    pub sessions: SessionConfig,

    /// Unit discovery configuration
    pub units: UnitConfig,
}

/// Session reaper configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle timeout; `None` disables eviction
    pub timeout: Option<Duration>,
    /// How often the reaper scans
    pub sweep_interval: Duration,
}

/// Unit discovery configuration
#[derive(Debug, Clone)]
pub struct UnitConfig {
    /// Directories scanned for `description.json` files
    pub paths: Vec<PathBuf>,
    /// Rescan period of the directory provider
    pub poll_interval: Duration,
}

impl AdapterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        // loop periods; zero would make the background tasks spin
        let period = |key: &str, default: &str| -> Result<u64> {
            let value: u64 = var(key, default)
                .parse()
                .with_context(|| format!("{key} must be a positive number"))?;
            ensure!(value > 0, "{key} must be greater than zero");
            Ok(value)
        };

        Ok(Self {
            host: var("ADAPTER_HOST", "0.0.0.0"),
            port: var("ADAPTER_PORT", "8900")
                .parse()
                .context("ADAPTER_PORT must be a valid port number")?,
            public_address: var("ADAPTER_PUBLIC_ADDRESS", "127.0.0.1"),

            adapter_id: non_empty("ADAPTER_ID").unwrap_or_else(|| Uuid::new_v4().to_string()),
            adapter_name: var("ADAPTER_NAME", "Rust Adapter"),

            directory_url: non_empty("DIRECTORY_URL"),
            registration_interval: Duration::from_millis(period(
                "REGISTRATION_INTERVAL_MS",
                "1000",
            )?),

            sessions: SessionConfig {
                timeout: non_empty("SESSION_TIMEOUT_SECS")
                    .map(|v| v.parse::<u64>())
                    .transpose()
                    .context("SESSION_TIMEOUT_SECS must be a number of seconds")?
                    .map(Duration::from_secs),
                sweep_interval: Duration::from_secs(period("REAPER_INTERVAL_SECS", "60")?),
            },

            units: UnitConfig {
                paths: var("UNIT_PATHS", "")
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect(),
                poll_interval: Duration::from_millis(period("UNIT_POLL_INTERVAL_MS", "2000")?),
            },
        })
    }

    /// Socket address string for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address advertised to the directory.
    pub fn advertised_address(&self) -> IpAddress {
        IpAddress::new(self.public_address.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AdapterConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AdapterConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.port, 8900);
        assert_eq!(cfg.bind_address(), "0.0.0.0:8900");
        assert_eq!(cfg.registration_interval, Duration::from_secs(1));
        assert!(cfg.sessions.timeout.is_none());
        assert_eq!(cfg.sessions.sweep_interval, Duration::from_secs(60));
        assert!(cfg.directory_url.is_none());
        assert!(cfg.units.paths.is_empty());
        assert!(Uuid::parse_str(&cfg.adapter_id).is_ok());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("ADAPTER_PORT", "9100"),
            ("ADAPTER_ID", "adapter-1"),
            ("SESSION_TIMEOUT_SECS", "300"),
            ("UNIT_PATHS", "units/a, units/b ,"),
            ("DIRECTORY_URL", "http://localhost:9009"),
        ])
        .unwrap();
        assert_eq!(cfg.advertised_address(), IpAddress::new("127.0.0.1", 9100));
        assert_eq!(cfg.adapter_id, "adapter-1");
        assert_eq!(cfg.sessions.timeout, Some(Duration::from_secs(300)));
        assert_eq!(
            cfg.units.paths,
            vec![PathBuf::from("units/a"), PathBuf::from("units/b")]
        );
        assert_eq!(cfg.directory_url.as_deref(), Some("http://localhost:9009"));
    }

    #[test]
    fn test_invalid_port_fails() {
        let err = config(&[("ADAPTER_PORT", "not-a-port")]).unwrap_err();
        assert!(err.to_string().contains("ADAPTER_PORT"));
    }

    #[test]
    fn test_zero_loop_periods_fail() {
        for key in [
            "REGISTRATION_INTERVAL_MS",
            "REAPER_INTERVAL_SECS",
            "UNIT_POLL_INTERVAL_MS",
        ] {
            let err = config(&[(key, "0")]).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn test_invalid_timeout_fails() {
        assert!(config(&[("SESSION_TIMEOUT_SECS", "soon")]).is_err());
    }
}
