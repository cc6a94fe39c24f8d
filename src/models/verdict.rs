use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{ProxyProtocol, RequestStats};

/// Result of a successful probe run for one protocol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub total_time_ms: u64,
    pub connect_time_ms: u64,
    /// JSON object echoed by the probe endpoint
    #[serde(flatten)]
    pub identity: Map<String, Value>,
    pub supports_https: bool,
}

/// Per-website check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebsiteOutcome {
    Passed {
        total_time_ms: u64,
        connect_time_ms: u64,
    },
    /// Timeout, transport error, mismatch or missing matcher
    Failed,
}

impl WebsiteOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, WebsiteOutcome::Passed { .. })
    }
}

impl From<RequestStats> for WebsiteOutcome {
    fn from(stats: RequestStats) -> Self {
        WebsiteOutcome::Passed {
            total_time_ms: stats.total_time_ms,
            connect_time_ms: stats.connect_time_ms,
        }
    }
}

// Failed entries serialize as `false`, passed ones as their timings.
impl Serialize for WebsiteOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WebsiteOutcome::Passed {
                total_time_ms,
                connect_time_ms,
            } => {
                let mut state = serializer.serialize_struct("WebsiteOutcome", 2)?;
                state.serialize_field("total_time_ms", total_time_ms)?;
                state.serialize_field("connect_time_ms", connect_time_ms)?;
                state.end()
            }
            WebsiteOutcome::Failed => serializer.serialize_bool(false),
        }
    }
}

/// Verdict of one protocol trial that got at least one probe through
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialVerdict {
    pub protocol: ProxyProtocol,
    pub host: String,
    pub port: u16,
    #[serde(flatten)]
    pub probe: ProbeOutcome,
    pub websites: BTreeMap<String, WebsiteOutcome>,
}

/// Winning trial enriched with geolocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalVerdict {
    #[serde(flatten)]
    pub trial: TrialVerdict,
    /// ISO country code; `None` when unknown
    pub country: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl FinalVerdict {
    pub fn protocol(&self) -> ProxyProtocol {
        self.trial.protocol
    }
}
