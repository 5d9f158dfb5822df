//! Durable per-table progress markers.

mod base;
pub mod file;
pub mod memory;

pub use base::{Checkpoint, CheckpointStore};
