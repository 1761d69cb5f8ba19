//! The package every framework starts with.
//!
//! It registers the services the orchestrator itself resolves, seeds the
//! three baseline settings namespaces, and installs the outermost
//! middleware (request span and error rendering).  Because it always runs
//! first, any later package can override its definitions or mutate its
//! settings.

use tracing::{Instrument, debug, info_span};
use trellis_core::{
    BoxError, Container, DependencyRegistry, EventDispatcher, FrameworkConfig, RunMode,
    SessionConfig, Settings, SharedEnvironment, TemplateConfig,
};

use crate::application::{Application, Next};
use crate::command::CommandLine;
use crate::error::FrameworkResult;
use crate::error_handler::{ErrorHandler, ErrorLayer};
use crate::framework::Framework;
use crate::http::{Request, Response};
use crate::package::{Package, SettingsContext};
use crate::session::SessionKey;

/// Baseline definitions, settings and middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameworkPackage;

impl Package for FrameworkPackage {
    fn name(&self) -> &str {
        "framework"
    }

    fn definitions(&self, registry: &mut DependencyRegistry) -> FrameworkResult<()> {
        registry
            .singleton(|_| Ok(Settings::new()))
            .singleton(|_| Ok(EventDispatcher::new()))
            .singleton(|_| Ok(Application::new()))
            .singleton(|_| Ok(ErrorHandler::default()))
            .singleton(|c| {
                let environment = c.resolve::<SharedEnvironment>()?;
                let argv = environment.read().argv.clone();
                Ok(CommandLine::new(argv))
            })
            .factory(request_from_environment)
            .singleton(|c| {
                let session = c.resolve::<Settings>()?.section::<SessionConfig>()?;
                Ok(SessionKey::from_config(&session)?)
            });
        Ok(())
    }

    fn settings(&self, ctx: &SettingsContext<'_>) -> FrameworkResult<()> {
        let settings = ctx.settings();
        settings.insert_section(FrameworkConfig::default())?;
        settings.insert_section(SessionConfig::default())?;
        settings.insert_section(TemplateConfig::default())?;
        Ok(())
    }

    fn middleware(&self, framework: &Framework) -> FrameworkResult<()> {
        let debug = framework.settings().section::<FrameworkConfig>()?.debug;
        let handler = framework.resolve::<ErrorHandler>()?;
        framework
            .app()
            .add(ErrorLayer::new(handler).debug(debug))
            .add_middleware(trace_request);
        Ok(())
    }
}

/// Builds the request for the current environment; transient, so it always
/// reflects the environment as normalized.
fn request_from_environment(container: &Container) -> Result<Request, BoxError> {
    let environment = container.resolve::<SharedEnvironment>()?;
    let mode = container.resolve::<RunMode>()?;
    let mut request = Request::from_environment(&environment.read())?;
    request.extensions_mut().insert(*mode);
    Ok(request)
}

async fn trace_request(request: Request, next: Next) -> Result<Response, BoxError> {
    let span = info_span!("request", method = %request.method(), path = request.path());
    async move {
        let response = next.run(request).await?;
        debug!(status = response.status().as_u16(), "Request handled");
        Ok(response)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use trellis_core::{Environment, ResolutionError};

    use super::*;

    #[test]
    fn test_seeds_baseline_namespaces() {
        let framework = Framework::builder()
            .mode(RunMode::Cli)
            .environment(Environment::from_args(["x"]))
            .build()
            .unwrap();

        assert_eq!(
            framework.settings().names(),
            vec!["framework", "session", "template"]
        );
        // Error layer plus request span.
        assert_eq!(framework.app().middleware_count(), 2);
    }

    #[test]
    fn test_request_is_transient_and_carries_mode() {
        let framework = Framework::builder()
            .mode(RunMode::Cli)
            .environment(Environment::from_args(["/bin/report"]))
            .build()
            .unwrap();

        let first = framework.resolve::<Request>().unwrap();
        let second = framework.resolve::<Request>().unwrap();
        assert!(!std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(first.path(), "/report");
        assert_eq!(first.extensions().get::<RunMode>(), Some(&RunMode::Cli));
    }

    #[test]
    fn test_session_key_validated_on_resolve() {
        let framework = Framework::builder()
            .mode(RunMode::Cli)
            .environment(Environment::from_args(["x"]))
            .build()
            .unwrap();

        let err = framework.resolve::<SessionKey>().unwrap_err();
        assert!(matches!(err, ResolutionError::Factory { .. }));
        assert!(err.to_string().contains("SessionKey"));
    }
}
