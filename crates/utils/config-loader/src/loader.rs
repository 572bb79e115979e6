use config::{Config, ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use std::path::PathBuf;

pub fn load_config<T>(path: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let settings = Config::builder()
        .add_source(File::from(canonical_path(path)?))
        .build()?;

    settings
        .try_deserialize::<T>()
        .map_err(|e| ConfigError::Foreign(Box::new(e)))
}

/// Load a file and layer environment variables on top of it.
///
/// Variables are matched as `{prefix}__{section}__{key}`, e.g.
/// `APP__CONCURRENCY__MAX_CORE_SIZE=4` with prefix `APP`.
pub fn load_config_with_env<T>(path: &str, prefix: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let settings = Config::builder()
        .add_source(File::from(canonical_path(path)?))
        .add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings
        .try_deserialize::<T>()
        .map_err(|e| ConfigError::Foreign(Box::new(e)))
}

fn canonical_path(path: &str) -> Result<PathBuf, ConfigError> {
    std::fs::canonicalize(PathBuf::from(path)).map_err(|e| ConfigError::Foreign(Box::new(e)))
}
