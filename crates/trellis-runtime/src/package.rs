use tracing::debug;
use trellis_framework::{FrameworkResult, Package, SettingsContext};

use crate::config::TrellisConfig;

/// Replaces the seeded settings namespaces with loaded configuration.
///
/// The runtime composes it directly after the built-in package, so user
/// packages see the loaded values and may still adjust them.
#[derive(Debug, Clone, Default)]
pub struct ConfigPackage {
    config: TrellisConfig,
}

impl ConfigPackage {
    pub fn new(config: TrellisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrellisConfig {
        &self.config
    }
}

impl Package for ConfigPackage {
    fn name(&self) -> &str {
        "config"
    }

    fn settings(&self, ctx: &SettingsContext<'_>) -> FrameworkResult<()> {
        let settings = ctx.settings();
        settings.insert_section(self.config.framework.clone())?;
        settings.insert_section(self.config.session.clone())?;
        settings.insert_section(self.config.template.clone())?;
        debug!(namespaces = ?settings.names(), "Loaded configuration applied");
        Ok(())
    }
}
