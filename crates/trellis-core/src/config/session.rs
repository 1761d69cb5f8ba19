use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// The `session` namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle expiry in seconds.
    pub expires: u64,

    /// Base64-encoded symmetric signing key.
    pub key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expires: 3600,
            key: String::new(),
        }
    }
}

impl SessionConfig {
    /// Minimum entropy of the decoded key.
    pub const MINIMUM_BITS: usize = 32;

    /// Validates the signing key and returns its decoded bytes.
    ///
    /// The key must be non-empty, canonical standard base64, and decode to at
    /// least [`MINIMUM_BITS`](Self::MINIMUM_BITS).
    pub fn validate_key(&self) -> ConfigResult<Vec<u8>> {
        if self.key.is_empty() {
            return Err(ConfigError::invalid("The session key must be specified"));
        }

        let decoded = STANDARD
            .decode(&self.key)
            .ok()
            .filter(|bytes| STANDARD.encode(bytes) == self.key)
            .ok_or_else(|| ConfigError::invalid("The session key must be base64 encoded"))?;

        if decoded.len() * 8 < Self::MINIMUM_BITS {
            return Err(ConfigError::invalid(format!(
                "The session key must have {} bits of entropy",
                Self::MINIMUM_BITS
            )));
        }

        Ok(decoded)
    }

    /// Idle expiry as a [`Duration`]; zero is rejected.
    pub fn idle_timeout(&self) -> ConfigResult<Duration> {
        if self.expires == 0 {
            return Err(ConfigError::invalid(
                "The session expiry must be greater than 0",
            ));
        }
        Ok(Duration::from_secs(self.expires))
    }
}
