use std::path::Path;

use rowsync_config::load_config;
use rowsync_config::shared::ReplicatorConfig;

use crate::error::{ReplicatorError, ReplicatorResult};

/// Loads and validates the replicator configuration stored at `path`.
pub fn load_replicator_config(path: &Path) -> ReplicatorResult<ReplicatorConfig> {
    let config = load_config::<ReplicatorConfig>(path).map_err(ReplicatorError::config)?;
    config.validate().map_err(ReplicatorError::config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_configuration_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configuration/replicator.toml");

        let config = load_replicator_config(&path).unwrap();

        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.active_tables().count(), 1);
        assert!(config.metrics.is_some());
    }
}
