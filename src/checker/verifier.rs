//! Verification orchestrator
//!
//! Races one protocol trial per candidate. The first trial to succeed wins,
//! every other call of the run is aborted, and the winner is enriched with
//! the proxy's country. If every trial fails the run fails.

use std::sync::Arc;

use chrono::Utc;
use futures::future::select_ok;
use tracing::{debug, info, instrument, warn};

use crate::checker::geo::CountryLookup;
use crate::checker::prober::ProtocolProber;
use crate::checker::transport::{RequestContext, Transport};
use crate::checker::trial::ProtocolTrial;
use crate::checker::validator::WebsiteValidator;
use crate::error::{CheckError, Result};
use crate::models::{FinalVerdict, ProxyTarget, TrialVerdict, WebsiteSpec};

/// Verifier configuration
#[derive(Debug, Clone, Default)]
pub struct VerifierConfig {
    /// Let a successful trial wait for all website checks instead of
    /// attaching only those already settled
    pub wait_for_websites: bool,
}

/// Proxy verifier
pub struct ProxyVerifier {
    transport: Arc<dyn Transport>,
    geo: Arc<dyn CountryLookup>,
    config: VerifierConfig,
}

impl ProxyVerifier {
    pub fn new(transport: Arc<dyn Transport>, geo: Arc<dyn CountryLookup>, config: VerifierConfig) -> Self {
        Self {
            transport,
            geo,
            config,
        }
    }

    /// Verify one proxy.
    ///
    /// Trials that succeed within the same scheduler step are ranked by the
    /// order of `target.protocols`.
    #[instrument(skip(self, target, websites), fields(proxy = %target.address()))]
    pub async fn verify(&self, target: &ProxyTarget, websites: &[WebsiteSpec]) -> Result<FinalVerdict> {
        let ctx = RequestContext::new(self.transport.clone());
        let result = self.race(&ctx, target, websites).await;

        // Winner found or candidates exhausted: nothing else of this run may proceed.
        ctx.abort_all_requests();

        let trial = result?;
        let country = self.geo.lookup_country(&target.host);

        info!(
            "Proxy {} works via {} (https: {}, country: {})",
            target.address(),
            trial.protocol,
            trial.probe.supports_https,
            country.as_deref().unwrap_or("unknown")
        );

        Ok(FinalVerdict {
            trial,
            country,
            checked_at: Utc::now(),
        })
    }

    async fn race(
        &self,
        ctx: &RequestContext,
        target: &ProxyTarget,
        websites: &[WebsiteSpec],
    ) -> Result<TrialVerdict> {
        let no_viable = || CheckError::NoViableProtocol {
            host: target.host.clone(),
            port: target.port,
        };

        if target.protocols.is_empty() {
            warn!("No protocol candidates for {}", target.address());
            return Err(no_viable());
        }

        let trial = ProtocolTrial::new(
            ProtocolProber::new(ctx.clone()),
            WebsiteValidator::new(ctx.clone()),
            self.config.wait_for_websites,
        );

        let trial = &trial;
        let trials = target.protocols.iter().map(move |&protocol| {
            Box::pin(async move {
                let result = trial.run(target, protocol, websites).await;
                if let Err(e) = &result {
                    debug!("{}", e);
                }
                result
            })
        });

        let raced = select_ok(trials).await;
        match raced {
            // The losing trials are dropped here, still in flight.
            Ok((verdict, _losers)) => Ok(verdict),
            Err(_) => {
                warn!(
                    "Proxy {} failed every protocol: {:?}",
                    target.address(),
                    target.protocols
                );
                Err(no_viable())
            }
        }
    }
}
