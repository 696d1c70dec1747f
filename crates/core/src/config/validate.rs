use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Catalog section exists (enforced by serde)
/// - Snapshot path and metadata directory are not empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.catalog.snapshot_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "catalog.snapshot_path cannot be empty".to_string(),
        ));
    }

    if config.metadata.directory.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "metadata.directory cannot be empty".to_string(),
        ));
    }

    if config.cache.enabled && config.cache.path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "cache.path cannot be empty when the cache is enabled".to_string(),
        ));
    }

    Ok(())
}
