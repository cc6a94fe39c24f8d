//! Proxy verification core
//!
//! This module provides:
//! - Protocol probing (plain and secure reachability through the proxy)
//! - Website validation with per-site matchers
//! - Protocol trials combining both
//! - The verifier racing one trial per protocol candidate

pub mod geo;
pub mod prober;
pub mod transport;
pub mod trial;
pub mod validator;
pub mod verifier;

pub use geo::{CountryLookup, GeoIpLookup, NoGeoLookup};
pub use prober::ProtocolProber;
pub use transport::{RequestContext, ReqwestTransport, Transport};
pub use trial::ProtocolTrial;
pub use validator::WebsiteValidator;
pub use verifier::{ProxyVerifier, VerifierConfig};

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for tests

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::Transport;
    use crate::models::{RequestOptions, RequestResult, RequestStats};

    struct Route {
        proxy_prefix: String,
        url_prefix: String,
        delay: Duration,
        result: RequestResult,
    }

    /// Answers calls from the first route whose proxy and URL prefixes match.
    /// Unrouted calls fail immediately.
    #[derive(Default)]
    pub struct MockTransport {
        routes: Vec<Route>,
        calls: AtomicUsize,
        completed: AtomicUsize,
        requests: Mutex<Vec<(String, RequestOptions)>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn ok(self, proxy_prefix: &str, url_prefix: &str, delay_ms: u64, body: &str) -> Self {
            let stats = RequestStats {
                total_time_ms: delay_ms,
                connect_time_ms: delay_ms / 2,
            };
            self.route(proxy_prefix, url_prefix, delay_ms, RequestResult::ok(200, body, stats))
        }

        pub fn fail(self, proxy_prefix: &str, url_prefix: &str, delay_ms: u64) -> Self {
            let result = RequestResult::failed(Duration::from_millis(delay_ms));
            self.route(proxy_prefix, url_prefix, delay_ms, result)
        }

        pub fn route(
            mut self,
            proxy_prefix: &str,
            url_prefix: &str,
            delay_ms: u64,
            result: RequestResult,
        ) -> Self {
            self.routes.push(Route {
                proxy_prefix: proxy_prefix.to_string(),
                url_prefix: url_prefix.to_string(),
                delay: Duration::from_millis(delay_ms),
                result,
            });
            self
        }

        /// Calls that reached the transport
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Calls that ran to completion without being cancelled
        pub fn completed(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<(String, RequestOptions)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get(&self, url: &str, options: &RequestOptions) -> RequestResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), options.clone()));

            let route = self.routes.iter().find(|r| {
                options.proxy.starts_with(&r.proxy_prefix) && url.starts_with(&r.url_prefix)
            });

            match route {
                Some(route) => {
                    tokio::time::sleep(route.delay).await;
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    route.result.clone()
                }
                None => RequestResult::failed(Duration::ZERO),
            }
        }
    }
}
