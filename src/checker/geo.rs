//! Country lookup for proxy addresses

use std::net::IpAddr;
use std::path::Path;

use maxminddb::{geoip2, Reader};
use tracing::debug;

use crate::error::{CheckError, Result};

/// Synchronous IP to country-code lookup
pub trait CountryLookup: Send + Sync {
    /// ISO country code of `ip`, or `None` when unknown
    fn lookup_country(&self, ip: &str) -> Option<String>;
}

/// Lookup used when no GeoIP database is configured
pub struct NoGeoLookup;

impl CountryLookup for NoGeoLookup {
    fn lookup_country(&self, _ip: &str) -> Option<String> {
        None
    }
}

/// MaxMind `.mmdb` backed lookup
pub struct GeoIpLookup {
    reader: Reader<Vec<u8>>,
}

impl GeoIpLookup {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path).map_err(|e| {
            CheckError::InvalidConfig(format!(
                "cannot open GeoIP database {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self { reader })
    }
}

impl CountryLookup for GeoIpLookup {
    fn lookup_country(&self, ip: &str) -> Option<String> {
        let ip: IpAddr = ip.trim_matches(|c| c == '[' || c == ']').parse().ok()?;

        let lookup: geoip2::Country = match self.reader.lookup(ip) {
            Ok(lookup) => lookup,
            Err(e) => {
                debug!("GeoIP lookup for {} failed: {}", ip, e);
                return None;
            }
        };

        // Anycast and satellite ranges only carry a continent.
        lookup
            .country
            .and_then(|country| country.iso_code)
            .or_else(|| lookup.continent.and_then(|continent| continent.code))
            .map(str::to_string)
    }
}
