//! Process configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Listener family for the proxy socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenNetwork {
    Tcp,
    Unix,
}

impl std::str::FromStr for ListenNetwork {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" | "tcp4" | "tcp6" => Ok(Self::Tcp),
            "unix" => Ok(Self::Unix),
            other => Err(Error::Config(format!("unsupported network: {}", other))),
        }
    }
}

/// Knobs the reconciliation engine is constructed with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// When false the store is neither read nor written.
    pub cache_enabled: bool,
    /// Maximum number of cached segments spliced into one answer.
    pub max_splice_depth: usize,
    /// Smallest requested span, in seconds, eligible for write-back.
    pub min_cacheable_span_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            max_splice_depth: 8,
            min_cacheable_span_secs: 300,
        }
    }
}

/// Top-level Dashcache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashcacheConfig {
    /// Base URL of the metrics backend, e.g. `http://prometheus:9090`.
    pub backend_url: String,
    pub network: ListenNetwork,
    /// `host:port` for tcp, a socket path for unix.
    pub listen_addr: String,
    /// SQLite database file backing the range store.
    pub db_path: PathBuf,
    pub engine: EngineConfig,
}

impl Default for DashcacheConfig {
    fn default() -> Self {
        Self {
            backend_url: String::new(),
            network: ListenNetwork::Tcp,
            listen_addr: "0.0.0.0:9090".to_string(),
            db_path: PathBuf::from("data/dashcache.db"),
            engine: EngineConfig::default(),
        }
    }
}

impl DashcacheConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("DASHCACHE_BACKEND_URL") {
            config.backend_url = url;
        }
        if let Ok(net) = std::env::var("DASHCACHE_NET") {
            config.network = net.parse()?;
        }
        if let Ok(addr) = std::env::var("DASHCACHE_ADDR") {
            config.listen_addr = addr;
        }
        if let Ok(path) = std::env::var("DASHCACHE_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(flag) = std::env::var("DASHCACHE_CACHE") {
            config.engine.cache_enabled = parse_bool(&flag)?;
        }
        if let Ok(depth) = std::env::var("DASHCACHE_MAX_SPLICE_DEPTH") {
            config.engine.max_splice_depth = depth
                .parse()
                .map_err(|_| Error::Config(format!("invalid max splice depth: {}", depth)))?;
        }
        Ok(config)
    }

    /// Apply `--flag value` / `--flag=value` command-line overrides.
    pub fn apply_args<I, S>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.into_iter().map(|a| a.as_ref().to_string());
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg.clone(), None),
            };
            match flag.as_str() {
                "--cache" if inline.is_none() => self.engine.cache_enabled = true,
                "--no-cache" => self.engine.cache_enabled = false,
                "--backend-url" | "--prom-url" | "--net" | "--addr" | "--db-path"
                | "--cache" | "--max-splice-depth" => {
                    let value = match inline {
                        Some(v) => v,
                        None => args
                            .next()
                            .ok_or_else(|| Error::Config(format!("{} requires a value", flag)))?,
                    };
                    self.set(&flag, &value)?;
                }
                other => return Err(Error::Config(format!("unknown argument: {}", other))),
            }
        }
        Ok(())
    }

    fn set(&mut self, flag: &str, value: &str) -> Result<()> {
        match flag {
            "--backend-url" | "--prom-url" => self.backend_url = value.to_string(),
            "--net" => self.network = value.parse()?,
            "--addr" => self.listen_addr = value.to_string(),
            "--db-path" => self.db_path = PathBuf::from(value),
            "--cache" => self.engine.cache_enabled = parse_bool(value)?,
            "--max-splice-depth" => {
                self.engine.max_splice_depth = value
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid max splice depth: {}", value)))?
            }
            _ => return Err(Error::Config(format!("unknown argument: {}", flag))),
        }
        Ok(())
    }

    /// Check required fields and normalise the listen address.
    pub fn validate(&mut self) -> Result<()> {
        if self.backend_url.is_empty() {
            return Err(Error::Config("backend URL is required".to_string()));
        }
        self.backend_url = self.backend_url.trim_end_matches('/').to_string();
        if self.network == ListenNetwork::Tcp && self.listen_addr.starts_with(':') {
            self.listen_addr = format!("0.0.0.0{}", self.listen_addr);
        }
        if self.engine.max_splice_depth == 0 {
            return Err(Error::Config("max splice depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("invalid boolean: {}", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DashcacheConfig::default();
        assert_eq!(config.network, ListenNetwork::Tcp);
        assert!(config.engine.cache_enabled);
        assert_eq!(config.engine.min_cacheable_span_secs, 300);
    }

    #[test]
    fn test_apply_args() {
        let mut config = DashcacheConfig::default();
        config
            .apply_args([
                "--prom-url",
                "http://prom:9090/",
                "--addr=:8080",
                "--no-cache",
                "--db-path",
                "/tmp/cache.db",
            ])
            .unwrap();
        config.validate().unwrap();
        assert_eq!(config.backend_url, "http://prom:9090");
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert!(!config.engine.cache_enabled);
        assert_eq!(config.db_path, PathBuf::from("/tmp/cache.db"));
    }

    #[test]
    fn test_cache_flag_with_value() {
        let mut config = DashcacheConfig::default();
        config.apply_args(["--cache=false"]).unwrap();
        assert!(!config.engine.cache_enabled);
        config.apply_args(["--cache"]).unwrap();
        assert!(config.engine.cache_enabled);
    }

    #[test]
    fn test_unix_network() {
        let mut config = DashcacheConfig::default();
        config
            .apply_args(["--net", "unix", "--addr", "/run/dashcache.sock", "--backend-url", "http://b"])
            .unwrap();
        config.validate().unwrap();
        assert_eq!(config.network, ListenNetwork::Unix);
        assert_eq!(config.listen_addr, "/run/dashcache.sock");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = DashcacheConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(config.apply_args(["--bogus"]).is_err());
        assert!(config.apply_args(["--net", "udp"]).is_err());
        assert!(config.apply_args(["--addr"]).is_err());
    }
}
