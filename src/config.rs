//! Server configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKLOG, DEFAULT_BIND_ADDRESS, DEFAULT_POLL_TIMEOUT, DEFAULT_PORT,
    DEFAULT_READ_BUFFER_SIZE,
};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port to listen on; 0 picks an ephemeral port
    pub port: u16,

    /// Address the listener binds to
    pub bind_address: String,

    /// Pending-connection queue length
    pub backlog: u32,

    /// Upper bound on one readiness wait, in seconds
    pub poll_timeout_secs: u64,

    /// Bytes read per readiness event; longer messages are truncated
    pub read_buffer_size: usize,

    /// Refuse a nickname that an active connection already uses
    pub reject_duplicate_names: bool,

    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            backlog: DEFAULT_BACKLOG,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT.as_secs(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            reject_duplicate_names: false,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Applies `LINECHAT_PORT`, `LINECHAT_BIND` and `LINECHAT_LOG` overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("LINECHAT_PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("LINECHAT_PORT is not a port: {port}")))?;
        }
        if let Some(bind) = lookup("LINECHAT_BIND") {
            self.bind_address = bind;
        }
        if let Some(filter) = lookup("LINECHAT_LOG") {
            self.log_filter = filter;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.backlog == 0 {
            return Err(Error::Config("backlog must be non-zero".to_string()));
        }
        if self.poll_timeout_secs == 0 {
            return Err(Error::Config("poll_timeout_secs must be non-zero".to_string()));
        }
        if self.read_buffer_size == 0 {
            return Err(Error::Config("read_buffer_size must be non-zero".to_string()));
        }
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| Error::InvalidAddress(self.bind_address.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}
