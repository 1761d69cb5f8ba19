//! `argv` parsing into options and operands.

use clap::ArgAction;
use clap::parser::ValueSource;
use trellis_core::CommandParseError;

/// Options and operands recognised on a command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    options: Vec<(String, String)>,
    operands: Vec<String>,
}

impl ParsedArgs {
    /// Named options in first-seen order.
    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Positional arguments in order.
    pub fn operands(&self) -> &[String] {
        &self.operands
    }

    /// Sets `name`, replacing an earlier value but keeping its position.
    pub fn set_option(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.options.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.options.push((name, value)),
        }
    }

    pub fn push_operand(&mut self, operand: impl Into<String>) {
        self.operands.push(operand.into());
    }

    /// All arguments as query pairs: options, then operands keyed by their
    /// index.  An option named like an index shadows that operand.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.options.clone();
        for (index, operand) in self.operands.iter().enumerate() {
            let key = index.to_string();
            if self.option(&key).is_none() {
                pairs.push((key, operand.clone()));
            }
        }
        pairs
    }

    /// URL-encodes [`to_pairs`](Self::to_pairs).
    pub fn to_query(&self) -> Result<String, serde_urlencoded::ser::Error> {
        serde_urlencoded::to_string(self.to_pairs())
    }

    fn increment_flag(&mut self, name: &str) {
        let count = self
            .option(name)
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(0);
        self.set_option(name, (count + 1).to_string());
    }
}

/// Parses `args` (without the program name) with no grammar.
///
/// `--name=value` sets an option, a bare `--name` counts as a flag, `-abc`
/// sets three short flags, and `--` ends option parsing.  Everything else is
/// an operand.
pub(crate) fn parse_lenient(args: &[String]) -> Result<ParsedArgs, CommandParseError> {
    let mut parsed = ParsedArgs::default();
    let mut options_done = false;

    for arg in args {
        if options_done || arg == "-" || !arg.starts_with('-') {
            parsed.push_operand(arg.as_str());
            continue;
        }
        if arg == "--" {
            options_done = true;
            continue;
        }

        if let Some(long) = arg.strip_prefix("--") {
            let (name, value) = match long.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (long, None),
            };
            if name.is_empty() {
                return Err(CommandParseError::new(
                    format!("error: invalid option '{arg}'"),
                    "",
                ));
            }
            match value {
                Some(value) => parsed.set_option(name, value),
                None => parsed.increment_flag(name),
            }
        } else if let Some(shorts) = arg.strip_prefix('-') {
            for short in shorts.chars() {
                parsed.increment_flag(&short.to_string());
            }
        }
    }

    Ok(parsed)
}

/// Parses `argv` (program name included) against a clap grammar.
pub(crate) fn parse_with_grammar(
    grammar: &clap::Command,
    argv: &[String],
) -> Result<ParsedArgs, CommandParseError> {
    let mut command = grammar.clone();
    let matches = match command.try_get_matches_from_mut(argv) {
        Ok(matches) => matches,
        Err(err) => {
            let help = command.render_help().to_string();
            return Err(CommandParseError::new(err.render().to_string(), help));
        }
    };

    let mut parsed = ParsedArgs::default();
    for arg in command.get_arguments() {
        let id = arg.get_id().as_str();
        if matches.value_source(id) != Some(ValueSource::CommandLine) {
            continue;
        }

        let values: Vec<String> = match arg.get_action() {
            ArgAction::SetTrue => vec!["1".to_string()],
            ArgAction::SetFalse => vec!["0".to_string()],
            ArgAction::Count => vec![matches.get_count(id).to_string()],
            ArgAction::Help | ArgAction::HelpShort | ArgAction::HelpLong | ArgAction::Version => {
                continue;
            }
            _ => matches
                .get_raw(id)
                .into_iter()
                .flatten()
                .map(|value| value.to_string_lossy().into_owned())
                .collect(),
        };

        if arg.is_positional() {
            for value in values {
                parsed.push_operand(value);
            }
        } else {
            parsed.set_option(id, values.join(","));
        }
    }

    Ok(parsed)
}
