//! Website checks through a proxy
//!
//! Every website is checked independently. Any failure (transport error,
//! timeout, mismatch, missing matcher) becomes a `WebsiteOutcome::Failed`
//! entry and never escapes the validator.

use std::collections::BTreeMap;

use futures::stream::{FuturesUnordered, Stream, StreamExt};
use tracing::debug;

use crate::checker::transport::RequestContext;
use crate::error::{CheckError, Result};
use crate::models::{RequestOptions, RequestStats, WebsiteOutcome, WebsiteSpec};

#[derive(Clone)]
pub struct WebsiteValidator {
    ctx: RequestContext,
}

impl WebsiteValidator {
    pub fn new(ctx: RequestContext) -> Self {
        Self { ctx }
    }

    /// Check every website and collect the outcomes by name
    pub async fn validate_all(&self, proxy: &str, websites: &[WebsiteSpec]) -> BTreeMap<String, WebsiteOutcome> {
        self.check_each(proxy, websites).collect().await
    }

    /// Check every website concurrently, yielding outcomes as they settle
    pub fn check_each<'a>(
        &'a self,
        proxy: &'a str,
        websites: &'a [WebsiteSpec],
    ) -> impl Stream<Item = (String, WebsiteOutcome)> + Unpin + 'a {
        websites
            .iter()
            .map(move |website| async move { (website.name.clone(), self.check(proxy, website).await) })
            .collect::<FuturesUnordered<_>>()
    }

    /// Check one website, folding every failure into `WebsiteOutcome::Failed`
    pub async fn check(&self, proxy: &str, website: &WebsiteSpec) -> WebsiteOutcome {
        match self.check_website(proxy, website).await {
            Ok(stats) => WebsiteOutcome::from(stats),
            Err(e) => {
                debug!("Website check '{}' via {} failed: {}", website.name, proxy, e);
                WebsiteOutcome::Failed
            }
        }
    }

    async fn check_website(&self, proxy: &str, website: &WebsiteSpec) -> Result<RequestStats> {
        let matcher = website.matcher.as_ref().ok_or_else(|| CheckError::MissingMatcher {
            website: website.name.clone(),
        })?;

        let mut options = RequestOptions::browser_like(proxy);
        options.ignore_errors = true;
        options.connect_timeout = website.connect_timeout;
        options.timeout = website.timeout;

        let result = self.ctx.get(&website.url, &options).await;
        if !result.success {
            return Err(CheckError::Http(format!("request to {} failed", website.url)));
        }

        matcher
            .check(&result.payload, &result)
            .map(|_| result.stats)
            .map_err(|reason| CheckError::WebsiteMismatch {
                website: website.name.clone(),
                reason: reason.to_string(),
            })
    }
}
