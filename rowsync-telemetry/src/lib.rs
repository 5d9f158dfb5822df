//! Logging and metrics initialization shared by rowsync binaries and tests.

pub mod metrics;
pub mod tracing;
