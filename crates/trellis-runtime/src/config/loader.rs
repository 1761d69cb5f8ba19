//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config`: `trellis.toml` / `config.toml`
//! - `yaml-config`: `trellis.yaml`, `trellis.yml`, `config.yaml`, `config.yml`
//!
//! With neither enabled only defaults, environment variables and
//! programmatic overrides apply.
//!
//! # Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile file (`trellis.{profile}.toml`)
//! 3. Main file (`trellis.toml`)
//! 4. Environment variables (`TRELLIS_*`)
//! 5. Programmatic overrides ([`ConfigLoader::merge`])
//!
//! Environment variables use `__` between section and field:
//!
//! - `TRELLIS_FRAMEWORK__DEBUG=true` → `framework.debug = true`
//! - `TRELLIS_SESSION__EXPIRES=600` → `session.expires = 600`
//! - `TRELLIS_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("/etc/trellis/trellis.toml")
//!     .load()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};
use trellis_core::{ConfigError, ConfigResult};

use super::schema::TrellisConfig;

/// Prefix of the environment variables the loader reads.
pub const ENV_PREFIX: &str = "TRELLIS_";

/// Variable selecting the profile.
pub const PROFILE_VAR: &str = "TRELLIS_PROFILE";

/// Selects the profile-specific file merged under the main file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads [`PROFILE_VAR`], defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }

    /// Accepts the short forms `dev` and `prod`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" | "" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration loader.
#[derive(Debug)]
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search.  When none are added the current
    /// directory and the user config directory are searched.
    pub fn search_path(mut self, path: impl AsRef<Path>) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.  A missing file is an
    /// error.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges values over every other source.
    pub fn merge(mut self, config: TrellisConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    pub fn load(self) -> ConfigResult<TrellisConfig> {
        let profile = self.profile.clone();
        let config: TrellisConfig = self
            .build_figment()?
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        debug!(
            profile = %profile,
            debug = config.framework.debug,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(TrellisConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_file(figment, &path)?;
        } else {
            figment = self.search_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("trellis"));
        }
        paths
    }

    /// Merges the first main file found, preceded by its profile variant.
    fn search_files(&self, mut figment: Figment) -> Figment {
        #[allow(unused_mut)]
        let mut names: Vec<&str> = Vec::new();
        #[cfg(feature = "toml-config")]
        names.extend(["trellis.toml", "config.toml"]);
        #[cfg(feature = "yaml-config")]
        names.extend(["trellis.yaml", "trellis.yml", "config.yaml", "config.yml"]);

        for dir in self.resolve_search_paths() {
            for name in &names {
                let Some((stem, ext)) = name.rsplit_once('.') else {
                    continue;
                };

                let profile_path = dir.join(format!("{stem}.{}.{ext}", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile configuration");
                    figment = merge_known(figment, &profile_path);
                }

                let path = dir.join(name);
                if path.exists() {
                    info!(path = %path.display(), "Loading configuration file");
                    return merge_known(figment, &path);
                }
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

/// Merges `path`, dispatching on its extension.
fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => {
            let _ = figment;
            Err(ConfigError::Load(format!(
                "unsupported or disabled configuration file format: .{ext}"
            )))
        }
    }
}

/// [`merge_file`] for names produced by the search itself.
fn merge_known(figment: Figment, path: &Path) -> Figment {
    match merge_file(figment.clone(), path) {
        Ok(merged) => merged,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Skipping configuration file");
            figment
        }
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::LogLevel;

    fn isolated(jail: &Jail) -> ConfigLoader {
        ConfigLoader::new().search_path(jail.directory())
    }

    #[test]
    fn test_defaults_without_files() {
        Jail::expect_with(|jail| {
            let config = isolated(jail).without_env().load().map_err(|e| e.to_string())?;
            assert_eq!(config, TrellisConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("TRELLIS_FRAMEWORK__DEBUG", "true");
            jail.set_env("TRELLIS_SESSION__EXPIRES", "600");
            jail.set_env("TRELLIS_LOGGING__LEVEL", "debug");

            let config = isolated(jail).load().map_err(|e| e.to_string())?;
            assert!(config.framework.debug);
            assert_eq!(config.session.expires, 600);
            assert_eq!(config.logging.level, LogLevel::Debug);
            Ok(())
        });
    }

    #[test]
    fn test_overrides_win_over_env() {
        Jail::expect_with(|jail| {
            jail.set_env("TRELLIS_FRAMEWORK__TIMEZONE", "UTC");
            let mut wanted = TrellisConfig::default();
            wanted.framework.timezone = Some("Europe/Berlin".into());

            let config = isolated(jail).merge(wanted).load().map_err(|e| e.to_string())?;
            assert_eq!(config.framework.timezone.as_deref(), Some("Europe/Berlin"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = ConfigLoader::new()
            .without_env()
            .file("/nonexistent/trellis.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("trellis.ini", "debug = 1")?;
            let err = ConfigLoader::new()
                .without_env()
                .file(jail.directory().join("trellis.ini"))
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::Load(_)));
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse(" DEV "), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
        assert_eq!(Profile::parse("staging").to_string(), "staging");
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env(PROFILE_VAR, "production");
            assert_eq!(Profile::from_env(), Profile::Production);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_toml_profile_then_main_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "trellis.staging.toml",
                r#"
                [framework]
                timezone = "Asia/Tokyo"
                proxies = ["10.0.0.9"]
                "#,
            )?;
            jail.create_file(
                "trellis.toml",
                r#"
                [framework]
                proxies = ["10.0.0.1"]

                [session]
                expires = 120
                "#,
            )?;
            jail.set_env("TRELLIS_SESSION__EXPIRES", "90");

            let config = isolated(jail)
                .profile("staging")
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.framework.timezone.as_deref(), Some("Asia/Tokyo"));
            assert_eq!(config.framework.proxies, vec!["10.0.0.1"]);
            assert_eq!(config.session.expires, 90);
            Ok(())
        });
    }
}
