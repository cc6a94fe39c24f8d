//! Proxy Checker - Entry Point
//!
//! Verifies a single proxy and prints the verdict as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use proxy_checker::checker::{CountryLookup, GeoIpLookup, NoGeoLookup, ReqwestTransport};
use proxy_checker::config::LogConfig;
use proxy_checker::models::{parse_host_port, ProxyProtocol};
use proxy_checker::{CheckError, Config, ProxyVerifier, VerifierConfig};

#[derive(Parser, Debug)]
#[command(name = "proxy-checker", version, about = "Verify a proxy and the protocol it speaks")]
struct Args {
    /// Proxy address as HOST:PORT
    proxy: String,

    /// Protocol candidates to race (overrides CHECK_PROTOCOLS)
    #[arg(short, long = "protocol", value_parser = parse_protocol)]
    protocols: Vec<ProxyProtocol>,

    /// JSON file of websites to check (overrides CHECK_WEBSITES_FILE)
    #[arg(short, long)]
    websites: Option<PathBuf>,

    /// Pretty-print the verdict
    #[arg(long)]
    pretty: bool,
}

fn parse_protocol(s: &str) -> Result<ProxyProtocol, String> {
    ProxyProtocol::from_str(s).ok_or_else(|| format!("unsupported protocol: {}", s))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    init_tracing(&config.log);

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

/// 2 for bad input or configuration, 1 for a proxy that failed verification
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CheckError>() {
        Some(e) if e.is_config_error() => 2,
        _ => 1,
    }
}

async fn run(args: Args, mut config: Config) -> anyhow::Result<()> {
    if !args.protocols.is_empty() {
        config.check.protocols = args.protocols;
    }
    if args.websites.is_some() {
        config.websites.file = args.websites;
    }

    let (host, port) = parse_host_port(&args.proxy)?;
    let target = config.target(&host, port);
    let websites = config.load_websites().context("loading websites")?;

    let geo: Arc<dyn CountryLookup> = match &config.geoip.database {
        Some(path) => Arc::new(GeoIpLookup::open(path)?),
        None => Arc::new(NoGeoLookup),
    };

    let verifier = ProxyVerifier::new(
        Arc::new(ReqwestTransport::new()),
        geo,
        VerifierConfig {
            wait_for_websites: config.check.wait_for_websites,
        },
    );

    info!(
        "Checking {} via {:?} against {} websites",
        target.address(),
        target.protocols,
        websites.len()
    );

    let verdict = verifier.verify(&target, &websites).await?;

    let output = if args.pretty {
        serde_json::to_string_pretty(&verdict)?
    } else {
        serde_json::to_string(&verdict)?
    };
    println!("{}", output);

    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("proxy_checker={}", log.level).into());

    // Logs go to stderr so stdout carries only the verdict.
    if log.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
