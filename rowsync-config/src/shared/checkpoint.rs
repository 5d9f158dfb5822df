use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Location of the durable checkpoint file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckpointConfig {
    /// Path of the JSON file holding the last delivered id of every table.
    pub path: PathBuf,
}

impl CheckpointConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.path.as_os_str().is_empty() {
            return Err(ValidationError::invalid(
                "checkpoint.path",
                "must not be empty",
            ));
        }

        Ok(())
    }
}
