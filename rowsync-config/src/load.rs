use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Supported extensions for configuration files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// Trait implemented by configuration structures that require list parsing help.
pub trait Config {
    /// Keys whose values should be parsed as lists when loading the configuration.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors that can occur while loading the configuration file and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// The configuration file does not exist.
    #[error("configuration file `{0}` does not exist")]
    MissingConfigurationFile(PathBuf),

    /// The configuration file has an extension that can't be parsed.
    #[error("configuration file `{path}` has an unsupported extension; supported: {supported}")]
    UnsupportedExtension { path: PathBuf, supported: String },

    /// The configuration file existed but could not be parsed.
    #[error("failed to load configuration from `{path}`: {source}")]
    ConfigurationFileLoad {
        path: PathBuf,
        source: config::ConfigError,
    },

    /// The configuration was parsed but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads configuration from a single file and `APP_`-prefixed environment variables.
///
/// The file format is inferred from the extension (`toml`, `yaml`, `yml` or `json`).
/// Nested keys use double underscores (`APP_SINK__URL`), and list values are comma-separated.
pub fn load_config<T>(path: &Path) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !path.is_file() {
        return Err(LoadConfigError::MissingConfigurationFile(
            path.to_path_buf(),
        ));
    }

    let has_supported_extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| CONFIG_FILE_EXTENSIONS.contains(&extension));
    if !has_supported_extension {
        return Err(LoadConfigError::UnsupportedExtension {
            path: path.to_path_buf(),
            supported: CONFIG_FILE_EXTENSIONS.join(", "),
        });
    }

    let mut environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);

        for key in <T as Config>::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    let settings = config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()))
        .add_source(environment_source)
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            path: path.to_path_buf(),
            source,
        })?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}
