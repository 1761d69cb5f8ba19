//! Request metadata for one process invocation.
//!
//! An [`Environment`] is populated once by the process entry point (from
//! `argv` and CGI-style variables) and then threaded through composition.
//! During composition the framework may fill in missing fields: CLI
//! emulation synthesizes a method, URI and query string, and the proxy trust
//! check rewrites scheme and port.  Values that were supplied are never
//! overwritten by synthesis.

use std::fmt;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

/// Whether the process is driven from a command line or serves an HTTP request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Command-line invocation; requests are synthesized from `argv`.
    Cli,
    /// HTTP request supplied by a web server.
    #[default]
    Server,
}

impl RunMode {
    /// Detects the mode of the current process.
    ///
    /// A web server running the process as a gateway program sets
    /// `GATEWAY_INTERFACE`; without it the process was started from a shell.
    pub fn detect() -> Self {
        if std::env::var_os("GATEWAY_INTERFACE").is_some() {
            Self::Server
        } else {
            Self::Cli
        }
    }

    pub fn is_cli(self) -> bool {
        self == Self::Cli
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-level request metadata.
///
/// Every field is optional: `None` means the source did not supply it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Process argument vector; `argv[0]` is the invoked script.
    pub argv: Vec<String>,
    /// `REQUEST_METHOD`
    pub method: Option<String>,
    /// `REQUEST_URI`, path plus optional `?query`.
    pub request_uri: Option<String>,
    /// `QUERY_STRING`
    pub query_string: Option<String>,
    /// `Accept` request header.
    pub accept: Option<String>,
    /// `REQUEST_SCHEME`
    pub scheme: Option<String>,
    /// `SERVER_PORT`
    pub port: Option<u16>,
    /// `X-Forwarded-Proto` request header.
    pub forwarded_proto: Option<String>,
    /// `SCRIPT_NAME`
    pub script_name: Option<String>,
    /// `REMOTE_ADDR`
    pub remote_addr: Option<String>,
    /// Remaining request headers as `(name, value)` pairs.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: String,
}

impl Environment {
    /// Creates an environment for a command-line invocation.
    pub fn from_args<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// The invoked script, `argv[0]`.
    pub fn script(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

/// The environment shared between the composition steps and the request
/// factory, registered in the container under this type.
#[derive(Debug, Default)]
pub struct SharedEnvironment {
    inner: RwLock<Environment>,
}

impl SharedEnvironment {
    pub fn new(environment: Environment) -> Self {
        Self {
            inner: RwLock::new(environment),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Environment> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Environment> {
        self.inner.write()
    }

    /// Clones the current state.
    pub fn snapshot(&self) -> Environment {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_display() {
        assert_eq!(RunMode::Cli.to_string(), "cli");
        assert_eq!(RunMode::Server.to_string(), "server");
        assert!(RunMode::Cli.is_cli());
        assert!(!RunMode::default().is_cli());
    }

    #[test]
    fn test_from_args() {
        let env = Environment::from_args(["/test/route.php", "--verbose"]);
        assert_eq!(env.script(), Some("/test/route.php"));
        assert_eq!(env.argv.len(), 2);
        assert!(env.method.is_none());
    }

    #[test]
    fn test_shared_environment_write_through() {
        let shared = SharedEnvironment::new(Environment::default());
        shared.write().method = Some("GET".into());
        assert_eq!(shared.read().method.as_deref(), Some("GET"));
        assert_eq!(shared.snapshot().method.as_deref(), Some("GET"));
    }
}
