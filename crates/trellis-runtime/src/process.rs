//! Captures the process environment once, at startup.
//!
//! Web servers hand a request to a gateway program through variables:
//!
//! | variable | field |
//! |----------|-------|
//! | `REQUEST_METHOD` | `method` |
//! | `REQUEST_URI` | `request_uri` |
//! | `QUERY_STRING` | `query_string` |
//! | `HTTP_ACCEPT` | `accept` |
//! | `REQUEST_SCHEME` | `scheme` |
//! | `SERVER_PORT` | `port` |
//! | `HTTP_X_FORWARDED_PROTO` | `forwarded_proto` |
//! | `SCRIPT_NAME` | `script_name` |
//! | `REMOTE_ADDR` | `remote_addr` |
//! | other `HTTP_*`, `CONTENT_TYPE`, `CONTENT_LENGTH` | `headers` |
//!
//! In server mode the body is read from stdin, `CONTENT_LENGTH` bytes.

use std::io::{self, Read};

use tracing::{debug, warn};
use trellis_core::{Environment, RunMode};

/// Reads argv, the gateway variables and, in server mode, the body.
pub fn capture_environment(mode: RunMode) -> io::Result<Environment> {
    let argv = std::env::args_os().map(|arg| arg.to_string_lossy().into_owned());
    let mut environment = environment_from(argv, std::env::vars());

    if !mode.is_cli() {
        let length = content_length(&environment);
        if length > 0 {
            environment.body = read_body(io::stdin().lock(), length)?;
        }
    }

    debug!(
        %mode,
        method = environment.method.as_deref(),
        uri = environment.request_uri.as_deref(),
        headers = environment.headers.len(),
        "Environment captured"
    );
    Ok(environment)
}

/// Builds an environment from an argument vector and variables.
pub fn environment_from<A, V>(argv: A, vars: V) -> Environment
where
    A: IntoIterator<Item = String>,
    V: IntoIterator<Item = (String, String)>,
{
    let mut environment = Environment::from_args(argv);

    for (name, value) in vars {
        match name.as_str() {
            "REQUEST_METHOD" => environment.method = Some(value),
            "REQUEST_URI" => environment.request_uri = Some(value),
            "QUERY_STRING" => environment.query_string = Some(value),
            "HTTP_ACCEPT" => environment.accept = Some(value),
            "REQUEST_SCHEME" => environment.scheme = Some(value),
            "SERVER_PORT" => match value.trim().parse() {
                Ok(port) => environment.port = Some(port),
                Err(_) => warn!(value = %value, "Ignoring malformed SERVER_PORT"),
            },
            "HTTP_X_FORWARDED_PROTO" => environment.forwarded_proto = Some(value),
            "SCRIPT_NAME" => environment.script_name = Some(value),
            "REMOTE_ADDR" => environment.remote_addr = Some(value),
            "CONTENT_TYPE" | "CONTENT_LENGTH" => {
                environment.headers.push((header_name(&name), value));
            }
            _ => {
                if let Some(rest) = name.strip_prefix("HTTP_") {
                    environment.headers.push((header_name(rest), value));
                }
            }
        }
    }

    environment.headers.sort();
    environment
}

/// `X_REQUESTED_WITH` becomes `x-requested-with`.
fn header_name(variable: &str) -> String {
    variable.to_ascii_lowercase().replace('_', "-")
}

fn content_length(environment: &Environment) -> u64 {
    environment
        .headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

fn read_body(reader: impl Read, length: u64) -> io::Result<String> {
    let mut buf = Vec::new();
    reader.take(length).read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
