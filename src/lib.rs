//! Proxy Checker - Concurrent Proxy Verification
//!
//! Verifies that a proxy is alive, finds the protocol it speaks and whether
//! it relays HTTPS, and optionally checks that target websites are reachable
//! through it with the expected content.
//!
//! ## Features
//!
//! - HTTP, HTTPS, SOCKS4 and SOCKS5 protocol hypotheses raced concurrently
//! - First successful protocol wins, all other in-flight requests are aborted
//! - Per-website checks by substring, regex or predicate
//! - Country lookup through a MaxMind database

pub mod checker;
pub mod config;
pub mod error;
pub mod models;

pub use checker::{ProxyVerifier, VerifierConfig};
pub use config::Config;
pub use error::{CheckError, Result};
