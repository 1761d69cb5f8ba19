//! The process entry point.
//!
//! [`Runtime`] loads configuration, installs logging, composes a
//! [`Framework`] from the registered packages and answers the single request
//! this process was started for.
//!
//! ```rust,ignore
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> RuntimeResult<()> {
//!     Runtime::new().package(Blog).execute().await
//! }
//! ```
//!
//! In CLI mode only the body is written to stdout.  In server mode the
//! output follows the gateway convention:
//!
//! ```text
//! Status: 404 Not Found
//! content-type: text/html; charset=utf-8
//!
//! <!DOCTYPE html>...
//! ```

use std::io::{self, Write};

use tracing::{debug, info, warn};
use trellis_core::{Environment, RunMode};
use trellis_framework::{Framework, FrameworkError, Package, Response};

use crate::config::{ConfigLoader, TrellisConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::package::ConfigPackage;
use crate::process::capture_environment;

/// Collects packages and process inputs; every input not set explicitly is
/// taken from the process.
#[derive(Default)]
pub struct Runtime {
    packages: Vec<Box<dyn Package>>,
    loader: Option<ConfigLoader>,
    config: Option<TrellisConfig>,
    mode: Option<RunMode>,
    environment: Option<Environment>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a package; packages compose in the order they are added.
    pub fn package(mut self, package: impl Package + 'static) -> Self {
        self.packages.push(Box::new(package));
        self
    }

    /// Loader used when no configuration is given; defaults to
    /// [`ConfigLoader::new`].
    pub fn config(mut self, loader: ConfigLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Uses `config` as is, skipping files and environment variables.
    pub fn with_config(mut self, config: TrellisConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides [`RunMode::detect`].
    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Overrides [`capture_environment`].
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Composes and dispatches without installing a subscriber or writing
    /// output.
    pub async fn run(self) -> RuntimeResult<Response> {
        let framework = self.compose()?;
        Ok(framework.run().await?)
    }

    /// Installs logging, answers the request and writes the response to
    /// stdout.
    pub async fn execute(self) -> RuntimeResult<()> {
        let mut stdout = io::stdout().lock();
        self.execute_to(&mut stdout).await?;
        stdout.flush()?;
        Ok(())
    }

    /// Like [`execute`](Self::execute), writing to `out`.
    ///
    /// A command line the grammar rejects is not an error: the message and
    /// help text are written to `out` and nothing is dispatched.
    pub async fn execute_to<W: Write>(mut self, out: &mut W) -> RuntimeResult<()> {
        let config = self.take_config()?;
        logging::init_from_config(&config);

        let mode = *self.mode.get_or_insert_with(RunMode::detect);
        self.config = Some(config);
        let framework = match self.compose() {
            Ok(framework) => framework,
            Err(RuntimeError::Framework(FrameworkError::CommandParse(err))) => {
                warn!(error = err.message(), "Command line rejected");
                out.write_all(err.render().as_bytes())?;
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        let response = framework.run().await?;
        info!(status = response.status().as_u16(), "Request answered");

        write_response(out, mode, &response)?;
        Ok(())
    }

    /// Resolves every input and builds the framework.
    pub fn compose(mut self) -> RuntimeResult<Framework> {
        let config = self.take_config()?;
        let mode = self.mode.unwrap_or_else(RunMode::detect);
        let environment = match self.environment.take() {
            Some(environment) => environment,
            None => capture_environment(mode)?,
        };
        debug!(%mode, packages = self.packages.len(), "Starting runtime");

        let config_package = ConfigPackage::new(config);
        let framework = Framework::builder()
            .package(&config_package)
            .packages(
                self.packages
                    .iter()
                    .map(|package| -> &dyn Package { package.as_ref() }),
            )
            .mode(mode)
            .environment(environment)
            .build()?;
        Ok(framework)
    }

    fn take_config(&mut self) -> RuntimeResult<TrellisConfig> {
        match self.config.take() {
            Some(config) => Ok(config),
            None => Ok(self.loader.take().unwrap_or_default().load()?),
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field(
                "packages",
                &self.packages.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("mode", &self.mode)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Writes `response` the way `mode` expects.
pub fn write_response<W: Write>(
    out: &mut W,
    mode: RunMode,
    response: &Response,
) -> io::Result<()> {
    if !mode.is_cli() {
        let status = response.status();
        write!(out, "Status: {}", status.as_u16())?;
        if let Some(reason) = status.canonical_reason() {
            write!(out, " {reason}")?;
        }
        out.write_all(b"\r\n")?;
        for (name, value) in response.headers() {
            write!(out, "{name}: ")?;
            out.write_all(value.as_bytes())?;
            out.write_all(b"\r\n")?;
        }
        out.write_all(b"\r\n")?;
    }
    out.write_all(response.body().as_bytes())
}

#[cfg(test)]
mod tests {
    use trellis_core::{DependencyRegistry, SharedEnvironment};
    use trellis_framework::http::StatusCode;
    use trellis_framework::testing::TestPackage;
    use trellis_framework::{CommandLine, FrameworkResult};

    use super::*;

    fn runtime() -> Runtime {
        Runtime::new()
            .package(TestPackage)
            .with_config(TrellisConfig::default())
    }

    #[tokio::test]
    async fn test_cli_run() {
        let response = runtime()
            .mode(RunMode::Cli)
            .environment(Environment::from_args(["/usr/local/bin/route"]))
            .run()
            .await
            .unwrap();
        assert_eq!(response.body(), "test");

        let mut out = Vec::new();
        write_response(&mut out, RunMode::Cli, &response).unwrap();
        assert_eq!(out, b"test");
    }

    #[tokio::test]
    async fn test_server_output() {
        let environment = Environment {
            method: Some("GET".into()),
            request_uri: Some("/missing".into()),
            accept: Some("text/plain".into()),
            ..Default::default()
        };
        let response = runtime()
            .mode(RunMode::Server)
            .environment(environment)
            .run()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let mut out = Vec::new();
        write_response(&mut out, RunMode::Server, &response).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Status: 404 Not Found\r\n"));
        assert!(out.contains("content-type: text/plain"));
        assert!(out.ends_with("\r\n\r\n404 Not Found\n"));
    }

    #[test]
    fn test_loaded_config_applies() {
        let mut config = TrellisConfig::default();
        config.framework.timezone = Some("Pacific/Auckland".into());
        let framework = Runtime::new()
            .with_config(config)
            .mode(RunMode::Cli)
            .environment(Environment::from_args(["x"]))
            .compose()
            .unwrap();
        assert_eq!(
            framework.timezone().map(|tz| tz.name()),
            Some("Pacific/Auckland")
        );
    }

    #[test]
    fn test_invalid_config_is_framework_error() {
        let mut config = TrellisConfig::default();
        config.framework.timezone = Some("Mars/Olympus".into());
        let err = Runtime::new()
            .with_config(config)
            .mode(RunMode::Cli)
            .environment(Environment::from_args(["x"]))
            .compose()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Framework(_)));
    }

    #[test]
    fn test_debug_lists_packages() {
        let rendered = format!("{:?}", runtime());
        assert!(rendered.contains("\"test\""));
    }

    /// Registers a command line that accepts no options at all.
    struct StrictCommandLine;

    impl Package for StrictCommandLine {
        fn name(&self) -> &str {
            "strict"
        }

        fn definitions(&self, registry: &mut DependencyRegistry) -> FrameworkResult<()> {
            registry.singleton(|c| {
                let env = c.resolve::<SharedEnvironment>()?;
                let argv = env.read().argv.clone();
                Ok(CommandLine::new(argv).with_grammar(clap::Command::new("route")))
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_rejected_command_line_prints_help() {
        let mut out = Vec::new();
        Runtime::new()
            .package(TestPackage)
            .package(StrictCommandLine)
            .with_config(TrellisConfig::default())
            .mode(RunMode::Cli)
            .environment(Environment::from_args(["/bin/route", "--unknown"]))
            .execute_to(&mut out)
            .await
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("--unknown"));
        assert!(out.contains("Usage"));
        assert!(!out.contains("test"));
    }

    #[tokio::test]
    async fn test_execute_to_writes_response() {
        let mut out = Vec::new();
        runtime()
            .mode(RunMode::Cli)
            .environment(Environment::from_args(["/usr/local/bin/route"]))
            .execute_to(&mut out)
            .await
            .unwrap();
        assert_eq!(out, b"test");
    }
}
