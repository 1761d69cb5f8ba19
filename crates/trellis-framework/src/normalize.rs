//! CLI emulation: fills in the request fields a router needs from `argv`.
//!
//! Only fields that are still `None` are synthesized; anything supplied by
//! the caller or a real web server is kept byte for byte.
//!
//! | field | synthesized value |
//! |-------|-------------------|
//! | `accept` | `text/plain` |
//! | `method` | `GET` |
//! | `request_uri` | `/` + file stem of `argv[0]` |
//! | `query_string` | parsed options, then operands keyed `0`, `1`, … |

use std::path::Path;

use tracing::debug;
use trellis_core::Environment;

use crate::command::CommandLine;
use crate::error::FrameworkResult;

/// Media type assumed for command-line clients.
pub const CLI_ACCEPT: &str = "text/plain";

/// Rewrites `environment` for a command-line invocation.
///
/// The command line is processed even when every field is preset, so a
/// grammar that rejects `argv` always surfaces as
/// [`FrameworkError::CommandParse`](crate::FrameworkError::CommandParse).
pub fn normalize_cli(
    environment: &mut Environment,
    command_line: &CommandLine,
) -> FrameworkResult<()> {
    environment
        .accept
        .get_or_insert_with(|| CLI_ACCEPT.to_string());
    environment.method.get_or_insert_with(|| "GET".to_string());

    let parsed = command_line.process().into_result()?;

    if environment.request_uri.is_none() {
        let uri = synthesize_uri(command_line.script().or(environment.script()));
        debug!(uri = %uri, "Synthesized request URI");
        environment.request_uri = Some(uri);
    }
    if environment.query_string.is_none() {
        let query = parsed.to_query()?;
        debug!(query = %query, "Synthesized query string");
        environment.query_string = Some(query);
    }

    Ok(())
}

/// `/` followed by the script's file name without its extension.
pub fn synthesize_uri(script: Option<&str>) -> String {
    let stem = script
        .and_then(|script| Path::new(script).file_stem())
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    format!("/{stem}")
}
