//! Command-line arguments for CLI invocations.
//!
//! Two levels of parsing exist:
//!
//! - [`CommandLine`] is a container service consulted once during CLI
//!   emulation.  Its result becomes the synthesized query string, so routes
//!   read CLI options the same way they read HTTP query parameters.  Without
//!   a grammar it parses leniently; packages may replace the definition with
//!   one carrying a clap grammar.
//! - [`CommandLayer`] parses `argv` strictly into a typed clap parser for a
//!   single route and hands the result to the handler via [`CommandArgs`].
//!
//! ```rust,ignore
//! #[derive(Parser, Clone)]
//! struct Greet { name: String }
//!
//! app.route_service(Method::GET, "/greet", CommandLayer::<Greet>::new().handler(greet));
//! ```

mod args;
mod layer;

pub use args::ParsedArgs;
pub use layer::{CommandArgs, CommandLayer, CommandService};

use thiserror::Error;
use tracing::debug;
use trellis_core::CommandParseError;

/// Errors raised by command routes.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// A command route was requested outside of a CLI invocation.
    #[error("this command can only be run from the command line")]
    NotCli,
}

/// Result of processing a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Success(ParsedArgs),
    Failure(CommandParseError),
}

impl ParseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn into_result(self) -> Result<ParsedArgs, CommandParseError> {
        match self {
            Self::Success(args) => Ok(args),
            Self::Failure(err) => Err(err),
        }
    }
}

/// The process argument vector plus an optional grammar.
#[derive(Debug, Clone, Default)]
pub struct CommandLine {
    argv: Vec<String>,
    grammar: Option<clap::Command>,
}

impl CommandLine {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            grammar: None,
        }
    }

    /// Parses with `grammar` instead of the lenient rules.
    pub fn with_grammar(mut self, grammar: clap::Command) -> Self {
        self.grammar = Some(grammar);
        self
    }

    /// Parses with the grammar of a clap parser type.
    pub fn with_parser<T: clap::CommandFactory>(self) -> Self {
        self.with_grammar(T::command())
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// `argv[0]`
    pub fn script(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn has_grammar(&self) -> bool {
        self.grammar.is_some()
    }

    /// Parses the arguments.
    pub fn process(&self) -> ParseOutcome {
        let result = match &self.grammar {
            Some(grammar) => args::parse_with_grammar(grammar, &self.argv),
            None => args::parse_lenient(self.argv.get(1..).unwrap_or_default()),
        };
        match result {
            Ok(parsed) => {
                debug!(
                    options = parsed.options().count(),
                    operands = parsed.operands().len(),
                    "Command line parsed"
                );
                ParseOutcome::Success(parsed)
            }
            Err(err) => {
                debug!(error = %err, "Command line rejected");
                ParseOutcome::Failure(err)
            }
        }
    }
}
