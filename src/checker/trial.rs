//! One protocol trial: probe and website checks against the same proxy URL
//!
//! The probe alone decides whether the trial succeeds. Website checks run
//! alongside it and are attached best-effort: whatever has settled when the
//! probe settles is kept, every other website is recorded as failed.

use std::collections::BTreeMap;

use futures::{FutureExt, StreamExt};
use tracing::{debug, instrument};

use crate::checker::prober::ProtocolProber;
use crate::checker::validator::WebsiteValidator;
use crate::error::{CheckError, Result};
use crate::models::{ProxyProtocol, ProxyTarget, TrialVerdict, WebsiteOutcome, WebsiteSpec};

#[derive(Clone)]
pub struct ProtocolTrial {
    prober: ProtocolProber,
    validator: WebsiteValidator,
    /// Wait for every website check once the probe succeeded
    wait_for_websites: bool,
}

impl ProtocolTrial {
    pub fn new(prober: ProtocolProber, validator: WebsiteValidator, wait_for_websites: bool) -> Self {
        Self {
            prober,
            validator,
            wait_for_websites,
        }
    }

    /// Run the trial for `protocol`; fails only if the probe fails
    #[instrument(skip(self, target, websites), fields(proxy = %target.address()))]
    pub async fn run(
        &self,
        target: &ProxyTarget,
        protocol: ProxyProtocol,
        websites: &[WebsiteSpec],
    ) -> Result<TrialVerdict> {
        let proxy = target.proxy_url(protocol);
        let mut outcomes = BTreeMap::new();

        let mut checks = self.validator.check_each(&proxy, websites);
        let mut checks_done = websites.is_empty();

        let probe = self.prober.probe(target, protocol);
        tokio::pin!(probe);

        let probe = loop {
            tokio::select! {
                biased;
                probe = &mut probe => break probe,
                next = checks.next(), if !checks_done => match next {
                    Some((name, outcome)) => {
                        outcomes.insert(name, outcome);
                    }
                    None => checks_done = true,
                },
            }
        };

        let probe = probe.map_err(|e| CheckError::trial(protocol, e))?;

        if self.wait_for_websites {
            while let Some((name, outcome)) = checks.next().await {
                outcomes.insert(name, outcome);
            }
        } else {
            // Keep only what has already settled; never block on the rest.
            while let Some(Some((name, outcome))) = checks.next().now_or_never() {
                outcomes.insert(name, outcome);
            }
        }

        for website in websites {
            outcomes
                .entry(website.name.clone())
                .or_insert(WebsiteOutcome::Failed);
        }

        debug!(
            "Trial via {} succeeded (https: {}, {}ms)",
            protocol, probe.supports_https, probe.total_time_ms
        );

        Ok(TrialVerdict {
            protocol,
            host: target.host.clone(),
            port: target.port,
            probe,
            websites: outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::checker::testing::MockTransport;
    use crate::checker::transport::RequestContext;
    use crate::models::Matcher;
    use tokio_test::{assert_err, assert_ok};

    const IDENTITY: &str = r#"{"origin": "10.0.0.1"}"#;

    fn target() -> ProxyTarget {
        ProxyTarget::new("10.0.0.1", 3128, "judge.example")
    }

    fn trial(mock: &Arc<MockTransport>, wait_for_websites: bool) -> ProtocolTrial {
        let ctx = RequestContext::new(mock.clone());
        ProtocolTrial::new(
            ProtocolProber::new(ctx.clone()),
            WebsiteValidator::new(ctx),
            wait_for_websites,
        )
    }

    fn websites() -> Vec<WebsiteSpec> {
        vec![
            WebsiteSpec::new("fast", "https://fast.example", Matcher::literal("ok")),
            WebsiteSpec::new("slow", "https://slow.example", Matcher::literal("ok")),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_attaches_settled_websites_only() {
        let mock = Arc::new(
            MockTransport::new()
                .ok("http://", "http://judge", 100, IDENTITY)
                .ok("http://", "https://fast", 10, "ok")
                .ok("http://", "https://slow", 10_000, "ok"),
        );

        let verdict = assert_ok!(
            trial(&mock, false)
                .run(&target(), ProxyProtocol::Http, &websites())
                .await
        );

        assert_eq!(verdict.protocol, ProxyProtocol::Http);
        assert_eq!(verdict.host, "10.0.0.1");
        assert_eq!(verdict.port, 3128);
        assert!(!verdict.probe.supports_https);
        assert!(verdict.websites["fast"].is_passed());
        assert_eq!(verdict.websites["slow"], WebsiteOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_waits_for_websites_when_configured() {
        let mock = Arc::new(
            MockTransport::new()
                .ok("http://", "http://judge", 100, IDENTITY)
                .ok("http://", "https://fast", 10, "ok")
                .ok("http://", "https://slow", 10_000, "ok"),
        );

        let verdict = assert_ok!(
            trial(&mock, true)
                .run(&target(), ProxyProtocol::Http, &websites())
                .await
        );

        assert!(verdict.websites["fast"].is_passed());
        assert!(verdict.websites["slow"].is_passed());
    }

    #[tokio::test]
    async fn test_websites_cannot_make_trial_succeed() {
        let mock = Arc::new(
            MockTransport::new()
                .ok("socks5://", "https://fast", 0, "ok")
                .ok("socks5://", "https://slow", 0, "ok"),
        );

        let err = assert_err!(
            trial(&mock, true)
                .run(&target(), ProxyProtocol::Socks5, &websites())
                .await
        );

        assert!(matches!(
            err,
            CheckError::Trial {
                protocol: ProxyProtocol::Socks5,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_trial_without_websites() {
        let mock = Arc::new(MockTransport::new().ok("https://", "https://judge", 0, IDENTITY));

        let verdict = assert_ok!(trial(&mock, false).run(&target(), ProxyProtocol::Https, &[]).await);

        assert!(verdict.probe.supports_https);
        assert!(verdict.websites.is_empty());
    }
}
