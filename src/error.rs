use thiserror::Error;

use crate::models::ProxyProtocol;

/// Unified error type for proxy verification
#[derive(Error, Debug)]
pub enum CheckError {
    // Probe errors
    #[error("Probe failed: {0}")]
    Probe(String),

    // Website validation errors
    #[error("No matcher configured for website '{website}'")]
    MissingMatcher { website: String },

    #[error("Website '{website}' did not match: {reason}")]
    WebsiteMismatch { website: String, reason: String },

    // Trial errors
    #[error("Trial for protocol {protocol} failed: {source}")]
    Trial {
        protocol: ProxyProtocol,
        #[source]
        source: Box<CheckError>,
    },

    #[error("Proxy {host}:{port} checked, no viable protocol")]
    NoViableProtocol { host: String, port: u16 },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid proxy address: {0}")]
    InvalidProxyAddress(String),

    #[error("Unsupported proxy protocol: {0}")]
    UnsupportedProtocol(String),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for proxy verification
pub type Result<T> = std::result::Result<T, CheckError>;

impl CheckError {
    /// Wrap a probe failure as the failure of the trial for `protocol`
    pub fn trial(protocol: ProxyProtocol, source: CheckError) -> Self {
        CheckError::Trial {
            protocol,
            source: Box::new(source),
        }
    }

    /// Check if this error is a configuration problem rather than a proxy failure
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CheckError::InvalidConfig(_)
                | CheckError::InvalidProxyAddress(_)
                | CheckError::UnsupportedProtocol(_)
                | CheckError::MissingMatcher { .. }
        )
    }
}

// Convert from reqwest errors
impl From<reqwest::Error> for CheckError {
    fn from(err: reqwest::Error) -> Self {
        CheckError::Http(err.to_string())
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for CheckError {
    fn from(err: url::ParseError) -> Self {
        CheckError::InvalidProxyAddress(err.to_string())
    }
}

// Convert from regex compile errors
impl From<regex::Error> for CheckError {
    fn from(err: regex::Error) -> Self {
        CheckError::InvalidConfig(format!("invalid regex: {}", err))
    }
}
