//! Reachability probes through a proxy
//!
//! A probe is a plain and a secure request to a JSON echo endpoint, sent
//! concurrently through the proxy with a browser-like header set, a cookie
//! and a form body so proxies that mangle requests stand out.

use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::checker::transport::RequestContext;
use crate::error::{CheckError, Result};
use crate::models::{ProbeOutcome, ProxyProtocol, ProxyTarget, RequestOptions, RequestStats};

/// Parsed response of a single sub-probe
#[derive(Debug)]
struct Ping {
    identity: Map<String, Value>,
    stats: RequestStats,
}

impl Ping {
    fn into_outcome(self, supports_https: bool) -> ProbeOutcome {
        ProbeOutcome {
            total_time_ms: self.stats.total_time_ms,
            connect_time_ms: self.stats.connect_time_ms,
            identity: self.identity,
            supports_https,
        }
    }
}

/// Issues the plain/secure probe pair for one protocol hypothesis
#[derive(Clone)]
pub struct ProtocolProber {
    ctx: RequestContext,
}

impl ProtocolProber {
    pub fn new(ctx: RequestContext) -> Self {
        Self { ctx }
    }

    /// Probe the proxy with `protocol`.
    ///
    /// Identity and timings come from the plain probe; the secure probe only
    /// sets `supports_https`. When only the secure probe succeeds its data is
    /// used instead. Fails if neither sub-probe produced a JSON object.
    pub async fn probe(&self, target: &ProxyTarget, protocol: ProxyProtocol) -> Result<ProbeOutcome> {
        let (plain, secure) = tokio::join!(
            self.ping(target, protocol, "http"),
            self.ping(target, protocol, "https"),
        );

        match (plain, secure) {
            (Ok(plain), secure) => Ok(plain.into_outcome(secure.is_ok())),
            (Err(e), Ok(secure)) => {
                debug!("Plain probe via {} failed ({}), secure probe succeeded", protocol, e);
                Ok(secure.into_outcome(true))
            }
            (Err(plain), Err(secure)) => Err(CheckError::Probe(format!(
                "plain: {}; secure: {}",
                plain, secure
            ))),
        }
    }

    async fn ping(&self, target: &ProxyTarget, protocol: ProxyProtocol, scheme: &str) -> Result<Ping> {
        let (url, options) = probe_request(target, protocol, scheme)?;

        let result = self.ctx.get(&url, &options).await;
        if !result.success {
            return Err(CheckError::Probe(format!("{} request failed", scheme)));
        }

        match serde_json::from_str::<Value>(&result.payload) {
            Ok(Value::Object(identity)) => Ok(Ping {
                identity,
                stats: result.stats,
            }),
            _ => Err(CheckError::Probe(format!(
                "{} response is not a JSON object",
                scheme
            ))),
        }
    }
}

/// Build the probe URL and options for one scheme
pub fn probe_request(
    target: &ProxyTarget,
    protocol: ProxyProtocol,
    scheme: &str,
) -> Result<(String, RequestOptions)> {
    let mut url = Url::parse(&format!("{}://{}", scheme, target.probe_host))?;
    url.query_pairs_mut()
        .append_pair("test", "get")
        .append_pair("ip", &target.local_ip);

    let mut options = RequestOptions::browser_like(target.proxy_url(protocol));
    options.cookie = Some("test=cookie;".to_string());
    options.form = Some(vec![("test".to_string(), "post".to_string())]);
    options.connect_timeout = target.connect_timeout;
    options.timeout = target.timeout;

    Ok((url.to_string(), options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::checker::testing::MockTransport;
    use tokio_test::{assert_err, assert_ok};

    fn target() -> ProxyTarget {
        ProxyTarget::new("10.0.0.1", 3128, "judge.example/anything")
            .with_local_ip("203.0.113.7")
            .with_timeouts(Some(Duration::from_secs(2)), Some(Duration::from_secs(6)))
    }

    fn prober(mock: &Arc<MockTransport>) -> ProtocolProber {
        ProtocolProber::new(RequestContext::new(mock.clone()))
    }

    #[test]
    fn test_probe_request_shape() {
        let (url, options) = assert_ok!(probe_request(&target(), ProxyProtocol::Socks5, "https"));

        assert_eq!(
            url,
            "https://judge.example/anything?test=get&ip=203.0.113.7"
        );
        assert_eq!(options.proxy, "socks5://10.0.0.1:3128");
        assert_eq!(options.header("user-agent"), Some("Mozilla/4.0"));
        assert_eq!(options.header("Connection"), Some("close"));
        assert_eq!(options.cookie.as_deref(), Some("test=cookie;"));
        assert_eq!(
            options.form,
            Some(vec![("test".to_string(), "post".to_string())])
        );
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(2)));
        assert_eq!(options.timeout, Some(Duration::from_secs(6)));
        assert!(!options.ignore_errors);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_comes_from_plain_probe() {
        let mock = Arc::new(
            MockTransport::new()
                .ok("http://", "http://judge", 200, r#"{"origin": "plain"}"#)
                .ok("http://", "https://judge", 50, r#"{"origin": "secure"}"#),
        );

        let outcome = assert_ok!(prober(&mock).probe(&target(), ProxyProtocol::Http).await);

        assert_eq!(outcome.identity["origin"], "plain");
        assert_eq!(outcome.total_time_ms, 200);
        assert!(outcome.supports_https);
    }

    #[tokio::test]
    async fn test_secure_failure_does_not_fail_probe() {
        let mock = Arc::new(MockTransport::new().ok("http://", "http://judge", 0, r#"{"a": 1}"#));

        let outcome = assert_ok!(prober(&mock).probe(&target(), ProxyProtocol::Http).await);

        assert!(!outcome.supports_https);
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    async fn test_secure_only_probe_succeeds() {
        let mock = Arc::new(
            MockTransport::new()
                .fail("socks4://", "http://judge", 0)
                .ok("socks4://", "https://judge", 0, r#"{"origin": "secure"}"#),
        );

        let outcome = assert_ok!(prober(&mock).probe(&target(), ProxyProtocol::Socks4).await);

        assert_eq!(outcome.identity["origin"], "secure");
        assert!(outcome.supports_https);
    }

    #[tokio::test]
    async fn test_unparseable_body_counts_as_failed_sub_probe() {
        let mock = Arc::new(
            MockTransport::new()
                .ok("http://", "http://judge", 0, "<html>not json</html>")
                .ok("http://", "https://judge", 0, r#"{"origin": "secure"}"#),
        );

        let outcome = assert_ok!(prober(&mock).probe(&target(), ProxyProtocol::Http).await);
        assert_eq!(outcome.identity["origin"], "secure");

        let mock = Arc::new(
            MockTransport::new()
                .ok("http://", "http://judge", 0, "[1, 2, 3]")
                .ok("http://", "https://judge", 0, "garbage"),
        );
        let err = assert_err!(prober(&mock).probe(&target(), ProxyProtocol::Http).await);
        assert!(matches!(err, CheckError::Probe(_)));
    }

    #[tokio::test]
    async fn test_both_sub_probes_failing_fails_probe() {
        let mock = Arc::new(MockTransport::new());

        let err = assert_err!(prober(&mock).probe(&target(), ProxyProtocol::Https).await);

        assert!(matches!(err, CheckError::Probe(_)));
        assert_eq!(mock.calls(), 2);
    }
}
