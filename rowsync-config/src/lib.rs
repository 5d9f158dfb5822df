//! Configuration types and loading for rowsync.

mod load;
pub mod shared;

pub use load::{Config, LoadConfigError, load_config};
