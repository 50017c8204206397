//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables TOML configuration files (`conduit.toml`, `config.toml`)
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`conduit.{profile}.toml`)
//! 3. Main config file (`conduit.toml`)
//! 4. Environment variables (`CONDUIT_*`)
//! 5. Programmatic overrides passed to [`ConfigLoader::merge`] or [`ConfigLoader::set`]
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `CONDUIT_` prefix with `__` as separator:
//!
//! - `CONDUIT_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `CONDUIT_BINDING__THROW_ON_BAD_REQUEST=true` → `binding.throw_on_bad_request = true`
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .file("./config/conduit.toml")
//!     .with_env()
//!     .set("binding.throw_on_bad_request", true)
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(feature = "toml-config")]
use figment::providers::{Format, Toml};
use figment::providers::{Env, Serialized};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::RuntimeConfig;
use super::validation::validate_config;

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the usual short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `CONDUIT_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var("CONDUIT_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
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
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds current directory to search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.search_path(cwd)
        } else {
            self
        }
    }

    /// Adds user config directory to search paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.search_path(config_dir.join("conduit"))
        } else {
            self
        }
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables loading environment variables (default: true).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a whole configuration over every other source.
    pub fn merge(mut self, config: RuntimeConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Overrides a single dotted key, such as `binding.throw_on_bad_request`,
    /// over every other source.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.overrides = self.overrides.merge(Serialized::default(key, value));
        self
    }

    /// Loads, validates and returns the configuration.
    pub fn load(self) -> ConfigResult<RuntimeConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: RuntimeConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            throw_on_bad_request = config.binding.throw_on_bad_request,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(RuntimeConfig::default()));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = Self::merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with CONDUIT_ prefix");
            figment = figment.merge(Env::prefixed("CONDUIT_").split("__"));
        }

        let overrides = std::mem::take(&mut self.overrides);
        Ok(figment.merge(overrides))
    }

    /// Only extensions enabled via feature flags are accepted.
    fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            #[cfg(feature = "toml-config")]
            "toml" => Ok(figment.merge(Toml::file(path))),
            _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if self.search_paths.is_empty() {
            let mut paths = Vec::new();
            if let Ok(cwd) = std::env::current_dir() {
                paths.push(cwd);
            }
            if let Some(config_dir) = dirs::config_dir() {
                paths.push(config_dir.join("conduit"));
            }
            paths
        } else {
            self.search_paths.clone()
        }
    }

    /// Iterates `search_paths × base_names`, merging a profile-specific
    /// variant before its base file. Stops at the first base file found.
    #[cfg(feature = "toml-config")]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    figment = merge_fn(figment, &base_path);
                    return (figment, true);
                }
            }
        }
        (figment, false)
    }

    #[cfg_attr(not(feature = "toml-config"), allow(unused_mut))]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let search_paths = self.resolve_search_paths();
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["conduit.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No configuration file found, using defaults");
        }
        figment
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;
    use crate::config::schema::{LogFormat, LogLevel};

    #[test]
    fn test_default_config() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level.as_str(), "info");
            assert!(!config.binding.throw_on_bad_request);
            Ok(())
        });
    }

    #[test]
    fn test_profile_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("CONDUIT_PROFILE", "prod");
            assert_eq!(Profile::from_env(), Profile::Production);
            jail.set_env("CONDUIT_PROFILE", "staging");
            assert_eq!(Profile::from_env(), Profile::Custom("staging".into()));
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "conduit.toml",
                r#"
                    route_parameters = ["id"]

                    [binding]
                    prefer_non_generic_enum_parse = true

                    [logging]
                    level = "debug"
                    format = "pretty"
                "#,
            )?;
            jail.set_env("CONDUIT_BINDING__THROW_ON_BAD_REQUEST", "true");
            jail.set_env("CONDUIT_LOGGING__LEVEL", "warn");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;

            assert!(config.binding.throw_on_bad_request);
            assert!(config.binding.prefer_non_generic_enum_parse);
            assert!(!config.binding.tolerate_invalid_methods);
            assert_eq!(config.logging.level, LogLevel::Warn);
            assert_eq!(config.logging.format, LogFormat::Pretty);
            assert_eq!(config.route_parameters, Some(vec!["id".to_string()]));
            Ok(())
        });
    }

    #[test]
    fn test_profile_specific_file_is_overridden_by_base() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "conduit.production.toml",
                r#"
                    [logging]
                    level = "error"
                    thread_ids = true
                "#,
            )?;
            jail.create_file(
                "conduit.toml",
                r#"
                    [logging]
                    level = "warn"
                "#,
            )?;

            let config = ConfigLoader::new()
                .profile("production")
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level, LogLevel::Warn);
            assert!(config.logging.thread_ids);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|_jail| {
            let err = ConfigLoader::new()
                .file("nowhere/conduit.toml")
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::FileNotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("conduit.ini", "level = debug")?;
            let err = ConfigLoader::new()
                .file("conduit.ini")
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
            Ok(())
        });
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "conduit.toml",
                r#"
                    [logging]
                    output = "file"
                "#,
            )?;
            let err = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_programmatic_overrides_win_over_env() {
        Jail::expect_with(|jail| {
            jail.set_env("CONDUIT_BINDING__THROW_ON_BAD_REQUEST", "false");
            let mut overrides = RuntimeConfig::default();
            overrides.binding.throw_on_bad_request = true;

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(overrides)
                .load()
                .map_err(|e| e.to_string())?;

            assert!(config.binding.throw_on_bad_request);
            Ok(())
        });
    }

    #[test]
    fn test_single_key_override_keeps_file_values() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                    [binding]
                    tolerate_invalid_methods = true

                    [logging]
                    level = "debug"
                "#,
            )?;
            jail.set_env("CONDUIT_LOGGING__LEVEL", "warn");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .set("logging.level", "error")
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.logging.level, LogLevel::Error);
            assert!(config.binding.tolerate_invalid_methods);
            assert!(!config.binding.throw_on_bad_request);
            Ok(())
        });
    }
}
