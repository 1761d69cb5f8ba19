//! Subscriber setup with `tracing-subscriber`.
//!
//! Logs never go to stdout: in CLI mode stdout carries the response body.
//! They go to the file named by `framework.log` when set, otherwise to
//! stderr.
//!
//! ```rust,ignore
//! LoggingBuilder::from_config(&config.logging)
//!     .debug(config.framework.debug)
//!     .file(config.framework.log.clone())
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::{Level, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingConfig, SpanEventConfig, TrellisConfig};

/// Span lifecycle events to log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close: one line when a request span opens and one when
    /// it ends.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        use fmt::format::FmtSpan;

        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Installs the subscriber described by `config`.  A subscriber that is
/// already installed is kept.
pub fn init_from_config(config: &TrellisConfig) {
    LoggingBuilder::from_config(&config.logging)
        .debug(config.framework.debug)
        .file(config.framework.log.clone())
        .init();
}

/// Builds and installs the global subscriber.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    directives: Vec<String>,
    span_events: SpanEvents,
    format: LogFormat,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
    file: Option<PathBuf>,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            level: Level::INFO,
            directives: Vec::new(),
            span_events: SpanEvents::NONE,
            format: LogFormat::Compact,
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            file: None,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self::new()
            .with_level(config.level.to_tracing_level())
            .format(config.format)
            .span_events(SpanEvents::from(&config.span_events))
            .with_thread_ids(config.thread_ids)
            .with_file(config.file_location)
            .with_line_number(config.file_location);
        for (target, level) in &config.filters {
            builder = builder.directive(format!("{target}={level}"));
        }
        builder
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Lowers the default level to `debug` when `enabled`; a more verbose
    /// level is kept.
    pub fn debug(mut self, enabled: bool) -> Self {
        if enabled && self.level < Level::DEBUG {
            self.level = Level::DEBUG;
        }
        self
    }

    /// Adds a filter directive such as `trellis_framework=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    /// Writes to `path` instead of stderr.
    pub fn file(mut self, path: Option<PathBuf>) -> Self {
        self.file = path;
        self
    }

    /// Builds the filter and returns the directives it rejected along with
    /// the parse error, to be reported once a subscriber is listening.
    fn build_filter(&self) -> (EnvFilter, Vec<(String, String)>) {
        let base = self.level.as_str().to_lowercase();
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base));
        let mut rejected = Vec::new();
        for directive in &self.directives {
            match directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(err) => rejected.push((directive.clone(), err.to_string())),
            }
        }
        (filter, rejected)
    }

    /// Installs the subscriber, ignoring an already installed one.
    pub fn init(self) {
        let _ = self.try_init();
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        let (filter, rejected) = self.build_filter();
        let span_events = self.span_events.to_fmt_span();

        macro_rules! configure_layer {
            ($layer:expr) => {
                $layer
                    .with_span_events(span_events.clone())
                    .with_target(self.with_target)
                    .with_thread_ids(self.with_thread_ids)
                    .with_file(self.with_file)
                    .with_line_number(self.with_line_number)
            };
        }

        macro_rules! init_with_writer {
            ($writer:expr) => {
                match self.format {
                    #[cfg(feature = "json-log")]
                    LogFormat::Json => tracing_subscriber::registry()
                        .with(configure_layer!(fmt::layer().json().with_writer($writer)))
                        .with(filter)
                        .try_init(),
                    LogFormat::Compact => tracing_subscriber::registry()
                        .with(configure_layer!(fmt::layer().compact().with_writer($writer)))
                        .with(filter)
                        .try_init(),
                    LogFormat::Pretty => tracing_subscriber::registry()
                        .with(configure_layer!(fmt::layer().pretty().with_writer($writer)))
                        .with(filter)
                        .try_init(),
                    _ => tracing_subscriber::registry()
                        .with(configure_layer!(fmt::layer().with_writer($writer)))
                        .with(filter)
                        .try_init(),
                }
            };
        }

        let installed = match &self.file {
            Some(path) => {
                let appender = tracing_appender::rolling::never(
                    path.parent()
                        .filter(|dir| !dir.as_os_str().is_empty())
                        .unwrap_or_else(|| Path::new(".")),
                    path.file_name().unwrap_or_else(|| OsStr::new("trellis.log")),
                );
                init_with_writer!(appender)
            }
            None => init_with_writer!(std::io::stderr),
        };

        if installed.is_ok() {
            for (directive, error) in rejected {
                warn!(directive, error, "Ignoring invalid log directive");
            }
        }
        installed
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_debug_lowers_level_only() {
        assert_eq!(LoggingBuilder::new().debug(true).level, Level::DEBUG);
        assert_eq!(LoggingBuilder::new().debug(false).level, Level::INFO);
        let trace = LoggingBuilder::new().with_level(Level::TRACE).debug(true);
        assert_eq!(trace.level, Level::TRACE);
    }

    #[test]
    fn test_from_config() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            format: LogFormat::Pretty,
            file_location: true,
            filters: BTreeMap::from([("trellis_framework".to_string(), LogLevel::Trace)]),
            ..Default::default()
        };
        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, Level::WARN);
        assert_eq!(builder.format, LogFormat::Pretty);
        assert!(builder.with_file && builder.with_line_number);
        assert_eq!(builder.directives, vec!["trellis_framework=trace"]);
    }

    #[test]
    fn test_span_events_flags() {
        use fmt::format::FmtSpan;

        assert_eq!(SpanEvents::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(SpanEvents::FULL.to_fmt_span(), FmtSpan::FULL);
        assert_eq!(
            SpanEvents::LIFECYCLE.to_fmt_span(),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
    }

    #[test]
    fn test_invalid_directives_are_collected() {
        let (_, rejected) = LoggingBuilder::new()
            .directive("trellis_framework=trace")
            .directive("trellis_runtime=loud")
            .build_filter();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, "trellis_runtime=loud");
        assert!(!rejected[0].1.is_empty());
    }
}
