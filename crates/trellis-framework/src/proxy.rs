//! Trusted reverse proxies terminating TLS.

use tracing::{debug, warn};
use trellis_core::{Environment, FrameworkConfig};

/// Forwarded-protocol value that marks a request as HTTPS.
const HTTPS: &str = "https";

/// Marks the request as HTTPS when a trusted proxy says so.
///
/// Scheme and port become `https` and `443` only if `X-Forwarded-Proto`
/// equals `https` **and** the remote address is one of the configured
/// proxies.  Returns whether the environment was rewritten.
pub fn apply_proxy_trust(environment: &mut Environment, config: &FrameworkConfig) -> bool {
    if environment.forwarded_proto.as_deref() != Some(HTTPS) {
        return false;
    }

    let Some(remote) = environment.remote_addr.as_deref() else {
        warn!("Ignoring forwarded protocol without a remote address");
        return false;
    };
    if !config.trusts(remote) {
        warn!(remote_addr = remote, "Ignoring forwarded protocol from untrusted address");
        return false;
    }

    debug!(remote_addr = remote, "Trusted proxy terminated TLS");
    environment.scheme = Some(HTTPS.to_string());
    environment.port = Some(443);
    true
}
