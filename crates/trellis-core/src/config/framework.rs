use std::net::IpAddr;
use std::path::PathBuf;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// The `framework` namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Enables verbose error pages and debug-level logging.
    pub debug: bool,

    /// Log file destination.  Logs go to stderr when unset.
    pub log: Option<PathBuf>,

    /// IANA timezone identifier, e.g. `Europe/Berlin`.
    pub timezone: Option<String>,

    /// Addresses of reverse proxies allowed to signal HTTPS termination.
    pub proxies: Vec<String>,
}

impl FrameworkConfig {
    /// Parses the configured timezone.
    ///
    /// Returns `Ok(None)` when no timezone (or an empty one) is configured.
    pub fn timezone(&self) -> ConfigResult<Option<Tz>> {
        match self.timezone.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(id) => id
                .parse::<Tz>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidTimezone(id.to_string())),
        }
    }

    /// Returns `true` if `address` is one of the trusted proxies.
    ///
    /// Addresses are compared as IPs when both sides parse, so `::1` and
    /// `0:0:0:0:0:0:0:1` match; otherwise the trimmed strings must be equal.
    /// An empty address is never trusted.
    pub fn trusts(&self, address: &str) -> bool {
        let address = address.trim();
        if address.is_empty() {
            return false;
        }
        let parsed = address.parse::<IpAddr>().ok();
        self.proxies.iter().any(|proxy| {
            let proxy = proxy.trim();
            match (parsed, proxy.parse::<IpAddr>().ok()) {
                (Some(a), Some(b)) => a == b,
                _ => proxy == address,
            }
        })
    }
}
