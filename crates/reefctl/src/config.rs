//! TOML configuration for `reefctl`.
//!
//! Every section is optional; a missing file or section falls back to a
//! single local instance with the default lock timing.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use reef_cache::CacheFacadeConfig;
use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Backend instances.
    pub cluster: ClusterSection,
    /// Ring construction.
    pub ring: RingSection,
    /// Populate-once lock service.
    pub lock: LockSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[cluster]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// Instance hosts. The list order is the ring order, so every process
    /// must list the same hosts in the same order.
    pub hosts: Vec<String>,
    /// Port shared by every instance.
    pub port: u16,
    /// `AUTH` password; empty for none.
    pub password: String,
    /// Logical database index.
    pub database: i64,
    /// Connect and per-command timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            hosts: vec!["127.0.0.1".to_string()],
            port: 6379,
            password: String::new(),
            database: 0,
            timeout_ms: 2000,
        }
    }
}

/// `[ring]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RingSection {
    /// Virtual nodes per instance.
    pub vnodes: u16,
}

impl Default for RingSection {
    fn default() -> Self {
        Self {
            vnodes: reef_placement::DEFAULT_VNODES,
        }
    }
}

/// `[lock]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LockSection {
    /// `host:port` of the single lock instance.
    pub endpoint: String,
    /// Seconds a writer waits for a key's lock.
    pub wait_secs: u64,
    /// Seconds a granted lock lives without release.
    pub hold_secs: u64,
}

impl Default for LockSection {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:6379".to_string(),
            wait_secs: 3,
            hold_secs: 10,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
    /// Log a line with the elapsed time whenever an operation span closes.
    pub span_timings: bool,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            span_timings: false,
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read {}", p.display()))?;
                toml::from_str(&content)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        let config: CliConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no ring or lock could be built from.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cluster.hosts.is_empty() {
            bail!("[cluster] hosts must list at least one instance");
        }
        if self.ring.vnodes == 0 {
            bail!("[ring] vnodes must be at least 1");
        }
        if self.lock.hold_secs == 0 {
            bail!("[lock] hold_secs must be at least 1");
        }
        self.lock_address()?;
        Ok(())
    }

    /// `host:port` of every instance, in ring order.
    pub fn instance_addrs(&self) -> Vec<String> {
        self.cluster
            .hosts
            .iter()
            .map(|host| format!("{host}:{}", self.cluster.port))
            .collect()
    }

    /// Password, if one is configured.
    pub fn password(&self) -> Option<&str> {
        Some(self.cluster.password.as_str()).filter(|p| !p.is_empty())
    }

    /// Connect and per-command timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.cluster.timeout_ms)
    }

    /// Lock timing for the facade.
    pub fn facade_config(&self) -> CacheFacadeConfig {
        CacheFacadeConfig {
            lock_wait: Duration::from_secs(self.lock.wait_secs),
            lock_hold: Duration::from_secs(self.lock.hold_secs),
        }
    }

    /// The lock endpoint split into host and port.
    pub fn lock_address(&self) -> anyhow::Result<(String, u16)> {
        let (host, port) = self
            .lock
            .endpoint
            .rsplit_once(':')
            .with_context(|| format!("[lock] endpoint {:?} is not host:port", self.lock.endpoint))?;
        let port = port
            .parse::<u16>()
            .with_context(|| format!("[lock] endpoint {:?} has a bad port", self.lock.endpoint))?;
        if host.is_empty() {
            bail!("[lock] endpoint {:?} has no host", self.lock.endpoint);
        }
        Ok((host.to_string(), port))
    }

    /// Endpoints of every instance, in ring order.
    #[cfg(feature = "redis")]
    pub fn endpoints(&self) -> Vec<reef_store::RedisEndpoint> {
        self.cluster
            .hosts
            .iter()
            .map(|host| self.endpoint(host.clone(), self.cluster.port))
            .collect()
    }

    /// Endpoint of the lock instance.
    #[cfg(feature = "redis")]
    pub fn lock_endpoint(&self) -> anyhow::Result<reef_store::RedisEndpoint> {
        let (host, port) = self.lock_address()?;
        Ok(self.endpoint(host, port))
    }

    #[cfg(feature = "redis")]
    fn endpoint(&self, host: String, port: u16) -> reef_store::RedisEndpoint {
        reef_store::RedisEndpoint {
            host,
            port,
            password: self.password().map(str::to_string),
            database: self.cluster.database,
        }
    }
}
