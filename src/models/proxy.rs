use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CheckError, Result};

/// Proxy protocol hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyProtocol {
    /// Every supported protocol, in tie-break priority order
    pub const ALL: [ProxyProtocol; 4] = [
        ProxyProtocol::Http,
        ProxyProtocol::Https,
        ProxyProtocol::Socks4,
        ProxyProtocol::Socks5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
            ProxyProtocol::Socks4 => "socks4",
            ProxyProtocol::Socks5 => "socks5",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "http" => Some(ProxyProtocol::Http),
            "https" => Some(ProxyProtocol::Https),
            "socks4" => Some(ProxyProtocol::Socks4),
            "socks5" => Some(ProxyProtocol::Socks5),
            _ => None,
        }
    }

    /// Parse a comma-separated protocol list such as `http,socks5`
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                ProxyProtocol::from_str(p)
                    .ok_or_else(|| CheckError::UnsupportedProtocol(p.to_string()))
            })
            .collect()
    }
}

impl std::fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One proxy endpoint to verify, plus the probe parameters of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    /// Protocol candidates raced against each other (deduplicated, ordered)
    pub protocols: Vec<ProxyProtocol>,
    pub host: String,
    pub port: u16,
    /// Caller's IP, sent as the `ip` marker parameter of each probe
    pub local_ip: String,
    /// Host (optionally with a path) of the JSON echo endpoint used for probes
    pub probe_host: String,
    pub connect_timeout: Option<Duration>,
    pub timeout: Option<Duration>,
}

impl ProxyTarget {
    /// Create a target that races every supported protocol
    pub fn new(host: impl Into<String>, port: u16, probe_host: impl Into<String>) -> Self {
        Self {
            protocols: ProxyProtocol::ALL.to_vec(),
            host: host.into(),
            port,
            local_ip: "127.0.0.1".to_string(),
            probe_host: probe_host.into(),
            connect_timeout: None,
            timeout: None,
        }
    }

    /// Restrict the candidate set; duplicates are dropped, first occurrence wins
    pub fn with_protocols(mut self, protocols: impl IntoIterator<Item = ProxyProtocol>) -> Self {
        let mut unique = Vec::new();
        for protocol in protocols {
            if !unique.contains(&protocol) {
                unique.push(protocol);
            }
        }
        self.protocols = unique;
        self
    }

    pub fn with_local_ip(mut self, local_ip: impl Into<String>) -> Self {
        self.local_ip = local_ip.into();
        self
    }

    pub fn with_timeouts(mut self, connect_timeout: Option<Duration>, timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self.timeout = timeout;
        self
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn address(&self) -> String {
        if self.host.contains(':') && !(self.host.starts_with('[') && self.host.ends_with(']')) {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Proxy URL handed to the transport for the given protocol hypothesis
    pub fn proxy_url(&self, protocol: ProxyProtocol) -> String {
        format!("{}://{}", protocol.as_str(), self.address())
    }
}

/// Parse `host:port` (IPv6 in brackets) into its parts
pub fn parse_host_port(addr: &str) -> Result<(String, u16)> {
    // Use URL parsing to properly handle bracketed IPv6 like "[::1]:8080".
    let url = url::Url::parse(&format!("http://{}", addr)).map_err(|e| {
        CheckError::InvalidProxyAddress(format!("Invalid address '{}': {}", addr, e))
    })?;

    let host = url.host_str().ok_or_else(|| {
        CheckError::InvalidProxyAddress(format!("Invalid address '{}': missing host", addr))
    })?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    // Url drops the default port for http, so fall back to the literal suffix.
    let port = match url.port() {
        Some(port) => port,
        None => addr
            .rsplit_once(':')
            .and_then(|(_, p)| p.parse::<u16>().ok())
            .ok_or_else(|| {
                CheckError::InvalidProxyAddress(format!("Invalid address '{}': missing port", addr))
            })?,
    };

    Ok((host.to_string(), port))
}
