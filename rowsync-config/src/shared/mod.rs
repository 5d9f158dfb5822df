//! Shared configuration types for rowsync.

mod base;
mod checkpoint;
mod log;
mod metrics;
mod replicator;
mod sink;
mod source;
mod table;

pub use base::ValidationError;
pub use checkpoint::CheckpointConfig;
pub use log::LogConfig;
pub use metrics::MetricsConfig;
pub use replicator::{ReplicatorConfig, ReplicatorConfigWithoutSecrets};
pub use sink::{Precision, SinkConfig, SinkConfigWithoutSecrets};
pub use source::{SourceConfig, SourceConfigWithoutSecrets, SourceProvider};
pub use table::{END_ID_PLACEHOLDER, START_ID_PLACEHOLDER, TableConfig};
