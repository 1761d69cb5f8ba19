use std::time::Duration;

use trellis_core::{ConfigResult, SessionConfig};

/// The validated session signing key.
///
/// Registered as a singleton by the built-in package.  Validation runs when
/// the key is first resolved, so a framework that never touches sessions
/// composes with the default empty key.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
    bytes: Vec<u8>,
    idle_timeout: Duration,
}

impl SessionKey {
    /// Validates the key and expiry of `config`.
    pub fn from_config(config: &SessionConfig) -> ConfigResult<Self> {
        Ok(Self {
            bytes: config.validate_key()?,
            idle_timeout: config.idle_timeout()?,
        })
    }

    /// Decoded key material.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bits(&self) -> usize {
        self.bytes.len() * 8
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bits", &self.bits())
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}
