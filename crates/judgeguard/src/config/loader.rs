//! Configuration loading for judgeguard
//!
//! Handles layering the embedded defaults, config files and the environment
//! using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, Environment, File, FileFormat, Map};

use crate::config::{Config, ConfigError, ENV_PREFIX, ENV_SEPARATOR, EXAMPLE_CONFIG};

impl Config {
    /// Load configuration from a file
    ///
    /// Keys missing from the file keep their default values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load the defaults overridden by `JUDGEGUARD_*` environment variables
    ///
    /// Nested keys are separated by a double underscore, so
    /// `JUDGEGUARD_SIGNALS__OTHER_FAILURE=SIGTERM` sets
    /// `signals.other_failure`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::layered(None)
    }

    /// Like [`load`](Self::load), reading variables from `vars` instead of
    /// the process environment
    pub fn load_from_env_map(vars: Map<String, String>) -> Result<Self, ConfigError> {
        Self::layered(Some(vars))
    }

    fn layered(vars: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(vars);

        let config = ConfigBuilder::builder()
            .add_source(File::from_str(EXAMPLE_CONFIG, FileFormat::Toml))
            .add_source(environment)
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
