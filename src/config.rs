use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CheckError, Result};
use crate::models::{ProxyProtocol, ProxyTarget, WebsiteEntry, WebsiteSpec};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Probe configuration
    pub check: CheckConfig,
    /// Website checks configuration
    pub websites: WebsitesConfig,
    /// Geolocation configuration
    pub geoip: GeoIpConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Host (optionally with a path) of the JSON echo endpoint
    pub probe_host: String,
    /// Local IP sent as the probe marker
    pub local_ip: String,
    /// Protocol candidates raced per proxy
    pub protocols: Vec<ProxyProtocol>,
    /// Probe connect timeout in seconds
    pub connect_timeout: u64,
    /// Probe overall timeout in seconds
    pub timeout: u64,
    /// Wait for all website checks once a probe succeeded
    pub wait_for_websites: bool,
}

#[derive(Debug, Clone)]
pub struct WebsitesConfig {
    /// JSON file listing websites to check
    pub file: Option<PathBuf>,
    /// Default connect timeout in seconds for entries that set none
    pub connect_timeout: u64,
    /// Default overall timeout in seconds for entries that set none
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct GeoIpConfig {
    /// MaxMind country database
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            check: CheckConfig {
                probe_host: get_env_or("CHECK_PROBE_HOST", "httpbin.org/anything"),
                local_ip: get_env_or("CHECK_LOCAL_IP", "127.0.0.1"),
                protocols: ProxyProtocol::parse_list(&get_env_or(
                    "CHECK_PROTOCOLS",
                    "http,https,socks4,socks5",
                ))
                .map_err(|e| CheckError::InvalidConfig(format!("CHECK_PROTOCOLS: {}", e)))?,
                connect_timeout: parse_secs("CHECK_CONNECT_TIMEOUT", "5")?,
                timeout: parse_secs("CHECK_TIMEOUT", "10")?,
                wait_for_websites: get_env_or("CHECK_WAIT_FOR_WEBSITES", "false")
                    .parse()
                    .unwrap_or(false),
            },
            websites: WebsitesConfig {
                file: get_env_path("CHECK_WEBSITES_FILE"),
                connect_timeout: parse_secs("WEBSITE_CONNECT_TIMEOUT", "5")?,
                timeout: parse_secs("WEBSITE_TIMEOUT", "15")?,
            },
            geoip: GeoIpConfig {
                database: get_env_path("GEOIP_DATABASE"),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Build the verification target for `host:port`
    pub fn target(&self, host: &str, port: u16) -> ProxyTarget {
        ProxyTarget::new(host, port, self.check.probe_host.as_str())
            .with_protocols(self.check.protocols.iter().copied())
            .with_local_ip(self.check.local_ip.as_str())
            .with_timeouts(
                Some(Duration::from_secs(self.check.connect_timeout)),
                Some(Duration::from_secs(self.check.timeout)),
            )
    }

    /// Load the configured websites file; no file means no website checks
    pub fn load_websites(&self) -> Result<Vec<WebsiteSpec>> {
        match &self.websites.file {
            Some(path) => self.websites.load(path),
            None => Ok(Vec::new()),
        }
    }
}

impl WebsitesConfig {
    /// Parse a JSON websites file
    pub fn load(&self, path: &Path) -> Result<Vec<WebsiteSpec>> {
        let raw = std::fs::read_to_string(path)?;
        self.parse(&raw)
    }

    pub fn parse(&self, raw: &str) -> Result<Vec<WebsiteSpec>> {
        let entries: Vec<WebsiteEntry> = serde_json::from_str(raw)?;

        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(CheckError::InvalidConfig(format!(
                    "duplicate website name: {}",
                    entry.name
                )));
            }
        }

        entries
            .into_iter()
            .map(|entry| {
                entry.into_spec(
                    Duration::from_secs(self.connect_timeout),
                    Duration::from_secs(self.timeout),
                )
            })
            .collect()
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn parse_secs(key: &str, default: &str) -> Result<u64> {
    get_env_or(key, default).parse().map_err(|_| {
        CheckError::InvalidConfig(format!("{} must be a number of seconds", key))
    })
}
