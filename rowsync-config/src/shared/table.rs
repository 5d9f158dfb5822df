use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Placeholder replaced by the inclusive lower id bound of a window.
pub const START_ID_PLACEHOLDER: &str = "##STARTID##";

/// Placeholder replaced by the exclusive upper id bound of a window.
pub const END_ID_PLACEHOLDER: &str = "##ENDID##";

const fn default_active() -> bool {
    true
}

/// Polling settings of one source table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TableConfig {
    /// Name of the source table, also the checkpoint key.
    pub name: String,
    /// Inactive tables are kept in the checkpoint file but never polled.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Checkpoint assigned to the table the first time it is seen.
    #[serde(default)]
    pub start_id: u64,
    /// Seconds to sleep between two poll cycles.
    pub interval_secs: u64,
    /// Number of ids requested by one extraction.
    pub input_rows_per_window: u64,
    /// Maximum number of records sent in one write request.
    pub output_rows_per_batch: usize,
    /// Ranged query returning `(record, clock, id)` rows, with [`START_ID_PLACEHOLDER`] and
    /// [`END_ID_PLACEHOLDER`] marking the window bounds.
    pub query: String,
}

impl TableConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let field = |name: &str| format!("tables.{}.{name}", self.name);

        if self.name.trim().is_empty() {
            return Err(ValidationError::invalid("tables.name", "must not be empty"));
        }

        if self.interval_secs == 0 {
            return Err(ValidationError::invalid(
                field("interval_secs"),
                "must be greater than 0",
            ));
        }

        if self.input_rows_per_window == 0 {
            return Err(ValidationError::invalid(
                field("input_rows_per_window"),
                "must be greater than 0",
            ));
        }

        if self.output_rows_per_batch == 0 {
            return Err(ValidationError::invalid(
                field("output_rows_per_batch"),
                "must be greater than 0",
            ));
        }

        for placeholder in [START_ID_PLACEHOLDER, END_ID_PLACEHOLDER] {
            if !self.query.contains(placeholder) {
                return Err(ValidationError::MissingPlaceholder {
                    table: self.name.clone(),
                    placeholder,
                });
            }
        }

        Ok(())
    }
}
