use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing statistics reported for a single transport call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestStats {
    pub total_time_ms: u64,
    /// Time until the response headers arrived
    pub connect_time_ms: u64,
}

impl RequestStats {
    pub fn new(total: Duration, connect: Duration) -> Self {
        Self {
            total_time_ms: total.as_millis() as u64,
            connect_time_ms: connect.as_millis() as u64,
        }
    }
}

/// Options for one call through a proxy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub cookie: Option<String>,
    /// Form body; when present the call is sent as a POST
    pub form: Option<Vec<(String, String)>>,
    /// Proxy URL, e.g. `socks5://1.2.3.4:1080`
    pub proxy: String,
    pub connect_timeout: Option<Duration>,
    pub timeout: Option<Duration>,
    /// Accept non-2xx responses as successful
    pub ignore_errors: bool,
}

impl RequestOptions {
    /// Options carrying the browser-like header set used by every check
    pub fn browser_like(proxy: impl Into<String>) -> Self {
        Self {
            headers: vec![
                ("User-Agent".to_string(), "Mozilla/4.0".to_string()),
                ("Accept".to_string(), "text/html".to_string()),
                ("Referer".to_string(), "http://www.google.com".to_string()),
                ("Connection".to_string(), "close".to_string()),
            ],
            proxy: proxy.into(),
            ..Default::default()
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Result of one transport call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestResult {
    pub success: bool,
    pub status: Option<u16>,
    pub payload: String,
    pub stats: RequestStats,
}

impl RequestResult {
    pub fn ok(status: u16, payload: impl Into<String>, stats: RequestStats) -> Self {
        Self {
            success: true,
            status: Some(status),
            payload: payload.into(),
            stats,
        }
    }

    pub fn failed(elapsed: Duration) -> Self {
        Self {
            success: false,
            status: None,
            payload: String::new(),
            stats: RequestStats::new(elapsed, Duration::ZERO),
        }
    }
}
