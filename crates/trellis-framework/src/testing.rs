//! A package that exercises every composition phase, for test suites.
//!
//! Compose it in CLI mode with `argv = ["/test/route.php"]` and `run()`
//! answers `test`: the route reads the attribute its own middleware set.

use trellis_core::{BoxError, DependencyRegistry, FrameworkConfig, SessionConfig};

use crate::application::Next;
use crate::error::FrameworkResult;
use crate::framework::Framework;
use crate::http::{Request, Response};
use crate::package::{Package, SettingsContext};

/// Proxy address the package trusts.
pub const TRUSTED_PROXY: &str = "10.0.0.1";

/// A valid 256-bit session key.
pub const SESSION_KEY: &str = "pXK3GNvRgiEmPsEhNNYvzdkZVBiMPHf2fLjiH/2rX7Y=";

/// Registered by [`TestPackage`] to show its definitions ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestMarker;

/// Touches every phase: a definition, two settings tweaks, one middleware
/// and one route.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestPackage;

impl Package for TestPackage {
    fn name(&self) -> &str {
        "test"
    }

    fn definitions(&self, registry: &mut DependencyRegistry) -> FrameworkResult<()> {
        registry.instance(TestMarker);
        Ok(())
    }

    fn settings(&self, ctx: &SettingsContext<'_>) -> FrameworkResult<()> {
        let settings = ctx.settings();
        settings.update_section(|fw: &mut FrameworkConfig| {
            fw.proxies.push(TRUSTED_PROXY.to_string());
        })?;
        settings.update_section(|session: &mut SessionConfig| {
            session.key = SESSION_KEY.to_string();
        })?;
        Ok(())
    }

    fn middleware(&self, framework: &Framework) -> FrameworkResult<()> {
        framework.app().add_middleware(mark_request);
        Ok(())
    }

    fn routes(&self, framework: &Framework) -> FrameworkResult<()> {
        framework.app().get("/route", echo_marker).name("test.route");
        Ok(())
    }
}

async fn mark_request(mut request: Request, next: Next) -> Result<Response, BoxError> {
    request.set_attribute("middleware", "test");
    next.run(request).await
}

async fn echo_marker(request: Request) -> String {
    request.attribute("middleware").unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use trellis_core::{Environment, RunMode};

    use super::*;

    #[test]
    fn test_every_phase_contributes() {
        let framework = Framework::builder()
            .package(&TestPackage)
            .mode(RunMode::Cli)
            .environment(Environment::from_args(["/test/route.php"]))
            .build()
            .unwrap();

        assert!(framework.container().has::<TestMarker>());
        let config = framework.settings().section::<FrameworkConfig>().unwrap();
        assert_eq!(config.proxies, vec![TRUSTED_PROXY]);
        assert_eq!(framework.app().url_for("test.route", &[]).as_deref(), Some("/route"));
        assert_eq!(framework.app().middleware_count(), 3);
    }
}
