//! The composition orchestrator.
//!
//! [`FrameworkBuilder::build`] runs a fixed sequence over the built-in
//! package followed by the caller's packages:
//!
//! ```text
//!  1. definitions  (forward)     ─► registry
//!  2. build container            ─► immutable from here on
//!  3. resolve EventDispatcher    ─► events      (forward)
//!  4. resolve Settings           ─► settings    (forward)
//!  5. CLI emulation              (CLI mode only)
//!  6. proxy trust, timezone
//!  7. resolve Application        ─► base path   (server mode only)
//!  8. middleware   (reverse)
//!  9. routes       (forward)
//! 10. Booted event
//! ```
//!
//! Construction is all-or-nothing: the first failing hook or lookup aborts
//! it and the error is returned.

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{debug, error, info, trace};
use trellis_core::{
    Container, DependencyRegistry, Environment, EventDispatcher, FrameworkConfig,
    ResolutionResult, RunMode, Settings, SharedEnvironment,
};

use crate::application::Application;
use crate::base_path::script_base_path;
use crate::builtin::FrameworkPackage;
use crate::command::CommandLine;
use crate::error::{FrameworkError, FrameworkResult};
use crate::events::{Booted, RequestHandled};
use crate::http::{Request, Response};
use crate::normalize::normalize_cli;
use crate::package::{EventsContext, Package, SettingsContext};
use crate::proxy::apply_proxy_trust;

/// A composed application, ready to [`run`](Framework::run).
pub struct Framework {
    mode: RunMode,
    container: Arc<Container>,
    dispatcher: Arc<EventDispatcher>,
    settings: Arc<Settings>,
    app: Arc<Application>,
    environment: Arc<SharedEnvironment>,
    timezone: Option<Tz>,
}

impl Framework {
    pub fn builder<'a>() -> FrameworkBuilder<'a> {
        FrameworkBuilder::default()
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Shorthand for `container().resolve::<T>()`.
    pub fn resolve<T>(&self) -> ResolutionResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.container.resolve::<T>()
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn app(&self) -> &Application {
        &self.app
    }

    /// The environment after normalization.
    pub fn environment(&self) -> Environment {
        self.environment.snapshot()
    }

    /// The configured timezone, if any.
    pub fn timezone(&self) -> Option<Tz> {
        self.timezone
    }

    /// Resolves the inbound request and dispatches it through the application.
    pub async fn run(&self) -> FrameworkResult<Response> {
        let request = Arc::unwrap_or_clone(self.container.resolve::<Request>()?);
        let method = request.method().clone();
        let path = request.path().to_string();
        debug!(%method, path = %path, "Dispatching request");

        let response = self
            .app
            .handle(request)
            .await
            .map_err(FrameworkError::Request)?;

        self.dispatcher.dispatch(&RequestHandled {
            method,
            path,
            status: response.status(),
        });
        Ok(response)
    }
}

impl std::fmt::Debug for Framework {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framework")
            .field("mode", &self.mode)
            .field("container", &self.container)
            .field("settings", &self.settings)
            .field("app", &self.app)
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}

// ─── Builder ────────────────────────────────────────────────────────────

/// Collects packages, run mode and environment for composition.
///
/// Packages are borrowed only for the duration of [`build`](Self::build).
#[derive(Default)]
pub struct FrameworkBuilder<'a> {
    packages: Vec<&'a dyn Package>,
    mode: Option<RunMode>,
    environment: Option<Environment>,
}

impl<'a> FrameworkBuilder<'a> {
    /// Appends a package; hooks run in the order packages are added.
    pub fn package(mut self, package: &'a dyn Package) -> Self {
        self.packages.push(package);
        self
    }

    pub fn packages<I>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = &'a dyn Package>,
    {
        self.packages.extend(packages);
        self
    }

    /// Overrides the detected run mode.
    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Request metadata for this invocation; empty when not set.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Runs the composition sequence.
    pub fn build(self) -> FrameworkResult<Framework> {
        let mode = self.mode.unwrap_or_else(RunMode::detect);
        let builtin = FrameworkPackage;
        let packages: Vec<&dyn Package> = std::iter::once(&builtin as &dyn Package)
            .chain(self.packages)
            .collect();
        info!(%mode, packages = packages.len(), "Composing framework");

        let mut registry = DependencyRegistry::new();
        registry
            .instance(mode)
            .shared(Arc::new(SharedEnvironment::new(
                self.environment.unwrap_or_default(),
            )));
        for package in &packages {
            hook(*package, "definitions", package.definitions(&mut registry))?;
        }
        let container = Arc::new(registry.build());
        debug!(definitions = container.len(), "Container built");

        let dispatcher = container.resolve::<EventDispatcher>()?;
        let events = EventsContext {
            container: &container,
            dispatcher: &dispatcher,
            mode,
        };
        for package in &packages {
            hook(*package, "events", package.events(&events))?;
        }

        let settings = container.resolve::<Settings>()?;
        let ctx = SettingsContext {
            container: &container,
            settings: &settings,
            mode,
        };
        for package in &packages {
            hook(*package, "settings", package.settings(&ctx))?;
        }

        let environment = container.resolve::<SharedEnvironment>()?;
        if mode.is_cli() {
            let command_line = container.resolve::<CommandLine>()?;
            normalize_cli(&mut environment.write(), &command_line)?;
        }

        let config = settings.section::<FrameworkConfig>()?;
        apply_proxy_trust(&mut environment.write(), &config);
        let timezone = config.timezone()?;
        if let Some(tz) = timezone {
            debug!(timezone = %tz, "Timezone configured");
        }

        let app = container.resolve::<Application>()?;
        if !mode.is_cli()
            && let Some(base) = environment
                .read()
                .script_name
                .as_deref()
                .and_then(script_base_path)
        {
            app.set_base_path(base);
        }

        let framework = Framework {
            mode,
            container,
            dispatcher,
            settings,
            app,
            environment,
            timezone,
        };

        for package in packages.iter().rev() {
            hook(*package, "middleware", package.middleware(&framework))?;
        }
        for package in &packages {
            hook(*package, "routes", package.routes(&framework))?;
        }

        framework.dispatcher.dispatch(&Booted { mode });
        info!(
            %mode,
            middleware = framework.app.middleware_count(),
            routes = framework.app.route_count(),
            "Framework composed"
        );
        Ok(framework)
    }
}

/// Logs a failed hook with its package and phase.
fn hook(
    package: &dyn Package,
    phase: &'static str,
    result: FrameworkResult<()>,
) -> FrameworkResult<()> {
    match result {
        Ok(()) => {
            trace!(package = package.name(), phase, "Hook completed");
            Ok(())
        }
        Err(err) => {
            error!(package = package.name(), phase, error = %err, "Hook failed");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use http::StatusCode;
    use parking_lot::Mutex;
    use trellis_core::{BoxError, ConfigError, ResolutionError, SessionConfig};

    use super::*;
    use crate::session::SessionKey;
    use crate::testing::TestPackage;

    fn cli(argv: &[&str]) -> Environment {
        Environment::from_args(argv.iter().copied())
    }

    fn compose(
        packages: &[&dyn Package],
        mode: RunMode,
        env: Environment,
    ) -> FrameworkResult<Framework> {
        Framework::builder()
            .packages(packages.iter().copied())
            .mode(mode)
            .environment(env)
            .build()
    }

    #[tokio::test]
    async fn test_cli_end_to_end() {
        let framework =
            compose(&[&TestPackage], RunMode::Cli, cli(&["/test/route.php"])).unwrap();

        let env = framework.environment();
        assert_eq!(env.method.as_deref(), Some("GET"));
        assert_eq!(env.request_uri.as_deref(), Some("/route"));
        assert_eq!(env.accept.as_deref(), Some("text/plain"));
        assert_eq!(env.query_string.as_deref(), Some(""));

        let response = framework.run().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), "test");
    }

    #[tokio::test]
    async fn test_server_end_to_end_behind_trusted_proxy() {
        let env = Environment {
            method: Some("GET".into()),
            request_uri: Some("/test/route".into()),
            scheme: Some("http".into()),
            port: Some(80),
            forwarded_proto: Some("https".into()),
            remote_addr: Some("10.0.0.1".into()),
            script_name: Some("/test/index.php".into()),
            ..Default::default()
        };
        let framework = compose(&[&TestPackage], RunMode::Server, env).unwrap();

        let env = framework.environment();
        assert_eq!(env.scheme.as_deref(), Some("https"));
        assert_eq!(env.port, Some(443));
        assert_eq!(framework.app().base_path().as_deref(), Some("/test"));

        let response = framework.run().await.unwrap();
        assert_eq!(response.body(), "test");
    }

    #[test]
    fn test_proxy_signal_ignored_without_trust() {
        let env = Environment {
            forwarded_proto: Some("https".into()),
            remote_addr: Some("10.0.0.1".into()),
            scheme: Some("http".into()),
            port: Some(8080),
            ..Default::default()
        };
        // No TestPackage, so 10.0.0.1 is not a trusted proxy.
        let framework = compose(&[], RunMode::Server, env).unwrap();
        let env = framework.environment();
        assert_eq!(env.scheme.as_deref(), Some("http"));
        assert_eq!(env.port, Some(8080));
    }

    #[test]
    fn test_preset_fields_survive_cli_emulation() {
        let env = Environment {
            argv: vec!["/test/route.php".into(), "--x=1".into()],
            accept: Some("text/html".into()),
            method: Some("POST".into()),
            request_uri: Some("/custom".into()),
            query_string: Some("a=b".into()),
            ..Default::default()
        };
        let framework = compose(&[&TestPackage], RunMode::Cli, env.clone()).unwrap();
        assert_eq!(framework.environment(), env);
    }

    #[test]
    fn test_root_script_leaves_base_path_unset() {
        let env = Environment {
            script_name: Some("/index.php".into()),
            ..Default::default()
        };
        let framework = compose(&[], RunMode::Server, env).unwrap();
        assert_eq!(framework.app().base_path(), None);
    }

    #[test]
    fn test_base_path_ignored_in_cli_mode() {
        let env = Environment {
            argv: vec!["/test/route.php".into()],
            script_name: Some("/test/index.php".into()),
            ..Default::default()
        };
        let framework = compose(&[], RunMode::Cli, env).unwrap();
        assert_eq!(framework.app().base_path(), None);
    }

    struct Timezone(&'static str);

    impl Package for Timezone {
        fn settings(&self, ctx: &SettingsContext<'_>) -> FrameworkResult<()> {
            ctx.settings()
                .update_section(|fw: &mut FrameworkConfig| fw.timezone = Some(self.0.into()))?;
            Ok(())
        }
    }

    #[test]
    fn test_timezone() {
        let framework =
            compose(&[&Timezone("Europe/Berlin")], RunMode::Cli, cli(&["x"])).unwrap();
        assert_eq!(framework.timezone(), Some(Tz::Europe__Berlin));

        let err =
            compose(&[&Timezone("Nowhere/Special")], RunMode::Cli, cli(&["x"])).unwrap_err();
        assert!(matches!(
            err,
            FrameworkError::InvalidConfig(ConfigError::InvalidTimezone(_))
        ));
    }

    struct Define(&'static str);

    impl Package for Define {
        fn definitions(&self, registry: &mut DependencyRegistry) -> FrameworkResult<()> {
            registry.instance(self.0.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_later_definition_wins() {
        let framework =
            compose(&[&Define("a"), &Define("b")], RunMode::Cli, cli(&["x"])).unwrap();
        assert_eq!(*framework.resolve::<String>().unwrap(), "b");
    }

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn record(&self, phase: &str) -> FrameworkResult<()> {
            self.log.lock().push(format!("{phase}:{}", self.label));
            Ok(())
        }
    }

    impl Package for Recorder {
        fn definitions(&self, _: &mut DependencyRegistry) -> FrameworkResult<()> {
            self.record("definitions")
        }

        fn events(&self, _: &EventsContext<'_>) -> FrameworkResult<()> {
            self.record("events")
        }

        fn settings(&self, _: &SettingsContext<'_>) -> FrameworkResult<()> {
            self.record("settings")
        }

        fn middleware(&self, _: &Framework) -> FrameworkResult<()> {
            self.record("middleware")
        }

        fn routes(&self, _: &Framework) -> FrameworkResult<()> {
            self.record("routes")
        }
    }

    #[test]
    fn test_phase_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Recorder {
            label: "a",
            log: Arc::clone(&log),
        };
        let b = Recorder {
            label: "b",
            log: Arc::clone(&log),
        };
        compose(&[&a, &b], RunMode::Cli, cli(&["x"])).unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                "definitions:a",
                "definitions:b",
                "events:a",
                "events:b",
                "settings:a",
                "settings:b",
                "middleware:b",
                "middleware:a",
                "routes:a",
                "routes:b",
            ]
        );
    }

    struct Failing;

    impl Package for Failing {
        fn settings(&self, _: &SettingsContext<'_>) -> FrameworkResult<()> {
            Err(ConfigError::missing_field("site").into())
        }

        fn routes(&self, _: &Framework) -> FrameworkResult<()> {
            panic!("construction must stop at the failing hook");
        }
    }

    #[test]
    fn test_failing_hook_aborts() {
        let err = compose(&[&Failing], RunMode::Cli, cli(&["x"])).unwrap_err();
        assert!(matches!(
            err,
            FrameworkError::InvalidConfig(ConfigError::MissingField { .. })
        ));
    }

    struct BrokenApplication;

    impl Package for BrokenApplication {
        fn definitions(&self, registry: &mut DependencyRegistry) -> FrameworkResult<()> {
            registry.singleton::<Application, _>(|_| Err(BoxError::from("no router")));
            Ok(())
        }
    }

    #[test]
    fn test_failing_factory_is_dependency_error() {
        let err = compose(&[&BrokenApplication], RunMode::Cli, cli(&["x"])).unwrap_err();
        assert!(matches!(
            err,
            FrameworkError::Dependency(ResolutionError::Factory { .. })
        ));
    }

    struct StrictCommandLine;

    impl Package for StrictCommandLine {
        fn definitions(&self, registry: &mut DependencyRegistry) -> FrameworkResult<()> {
            registry.singleton(|c| {
                let env = c.resolve::<SharedEnvironment>()?;
                let argv = env.read().argv.clone();
                Ok(CommandLine::new(argv).with_grammar(clap::Command::new("route")))
            });
            Ok(())
        }
    }

    #[test]
    fn test_rejected_command_line_aborts() {
        let err = compose(
            &[&StrictCommandLine],
            RunMode::Cli,
            cli(&["/test/route.php", "--unknown"]),
        )
        .unwrap_err();
        match err {
            FrameworkError::CommandParse(err) => assert!(err.render().contains("Usage")),
            other => panic!("unexpected error: {other}"),
        }
    }

    struct ObserveBoot(Arc<AtomicBool>);

    impl Package for ObserveBoot {
        fn events(&self, ctx: &EventsContext<'_>) -> FrameworkResult<()> {
            let booted = Arc::clone(&self.0);
            ctx.dispatcher().listen(move |event: &Booted| {
                assert_eq!(event.mode, RunMode::Cli);
                booted.store(true, Ordering::SeqCst);
            });
            Ok(())
        }
    }

    #[test]
    fn test_booted_event() {
        let booted = Arc::new(AtomicBool::new(false));
        compose(&[&ObserveBoot(Arc::clone(&booted))], RunMode::Cli, cli(&["x"])).unwrap();
        assert!(booted.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unrouted_cli_request_renders_title_line() {
        let framework =
            compose(&[&TestPackage], RunMode::Cli, cli(&["/bin/missing"])).unwrap();
        let handled = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&handled);
        framework
            .dispatcher()
            .listen(move |event: &RequestHandled| *sink.lock() = Some(event.status));

        let response = framework.run().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.body(), "404 Not Found\n");
        assert_eq!(*handled.lock(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_session_key() {
        let framework = compose(&[&TestPackage], RunMode::Cli, cli(&["x"])).unwrap();
        assert_eq!(framework.resolve::<SessionKey>().unwrap().bits(), 256);

        let bare = compose(&[], RunMode::Cli, cli(&["x"])).unwrap();
        assert!(bare.resolve::<SessionKey>().is_err());
        assert_eq!(
            bare.settings().section::<SessionConfig>().unwrap().expires,
            3600
        );
    }
}
