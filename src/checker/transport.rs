//! Request transport through a proxy
//!
//! `Transport` performs a single HTTP(S) call through a given proxy and never
//! errors: failures come back as `RequestResult { success: false, .. }`.
//! `RequestContext` scopes a set of calls to one verification run and can
//! abort all of them at once.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use tokio::sync::watch;
use tracing::debug;

use crate::error::{CheckError, Result};
use crate::models::{RequestOptions, RequestResult, RequestStats};

/// A single call through a proxy
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, options: &RequestOptions) -> RequestResult;
}

/// Transport backed by reqwest
pub struct ReqwestTransport;

impl ReqwestTransport {
    pub fn new() -> Self {
        Self
    }

    async fn send(&self, url: &str, options: &RequestOptions, started: Instant) -> Result<RequestResult> {
        let proxy = reqwest::Proxy::all(options.proxy.as_str())
            .map_err(|e| CheckError::InvalidProxyAddress(format!("{}: {}", options.proxy, e)))?;

        let mut builder = reqwest::Client::builder().proxy(proxy);
        if let Some(connect_timeout) = options.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let method = if options.form.is_some() {
            reqwest::Method::POST
        } else {
            reqwest::Method::GET
        };

        let mut request = client.request(method, url).headers(build_headers(&options.headers));
        if let Some(cookie) = &options.cookie {
            request = request.header(COOKIE, cookie.as_str());
        }
        if let Some(form) = &options.form {
            request = request.form(form);
        }

        let response = request.send().await?;
        let headers_at = started.elapsed();
        let status = response.status();
        let payload = response.text().await?;
        let stats = RequestStats::new(started.elapsed(), headers_at);

        if !status.is_success() && !options.ignore_errors {
            debug!("{} answered {} through {}", url, status, options.proxy);
            return Ok(RequestResult {
                success: false,
                status: Some(status.as_u16()),
                payload,
                stats,
            });
        }

        Ok(RequestResult::ok(status.as_u16(), payload, stats))
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, options: &RequestOptions) -> RequestResult {
        let started = Instant::now();
        match self.send(url, options, started).await {
            Ok(result) => result,
            Err(e) => {
                debug!("Request to {} through {} failed: {}", url, options.proxy, e);
                RequestResult::failed(started.elapsed())
            }
        }
    }
}

fn build_headers(headers: &[(String, String)]) -> HeaderMap {
    let mut header_map = HeaderMap::new();

    for (key, value) in headers {
        if let (Ok(name), Ok(val)) = (
            key.parse::<HeaderName>(),
            value.parse::<HeaderValue>(),
        ) {
            header_map.insert(name, val);
        }
    }

    header_map
}

/// Run-scoped request context
///
/// Every call issued through a context can be cancelled at once with
/// [`RequestContext::abort_all_requests`]. Aborted calls resolve to a failed
/// result; calls issued after the abort never reach the transport.
#[derive(Clone)]
pub struct RequestContext {
    transport: Arc<dyn Transport>,
    abort_tx: Arc<watch::Sender<bool>>,
}

impl RequestContext {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (abort_tx, _) = watch::channel(false);
        Self {
            transport,
            abort_tx: Arc::new(abort_tx),
        }
    }

    pub async fn get(&self, url: &str, options: &RequestOptions) -> RequestResult {
        let mut aborted = self.abort_tx.subscribe();
        if *aborted.borrow_and_update() {
            debug!("Skipping request to {}: run already aborted", url);
            return RequestResult::failed(Duration::ZERO);
        }

        let started = Instant::now();
        tokio::select! {
            biased;
            _ = wait_aborted(&mut aborted) => {
                debug!("Request to {} through {} aborted", url, options.proxy);
                RequestResult::failed(started.elapsed())
            }
            result = self.transport.get(url, options) => result,
        }
    }

    /// Cancel every outstanding call of this context. Idempotent.
    pub fn abort_all_requests(&self) {
        self.abort_tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.abort_tx.borrow()
    }
}

async fn wait_aborted(rx: &mut watch::Receiver<bool>) {
    loop {
        if rx.changed().await.is_err() {
            // Sender gone: nothing can abort us anymore.
            std::future::pending::<()>().await;
        }
        if *rx.borrow_and_update() {
            return;
        }
    }
}
