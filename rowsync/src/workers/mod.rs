//! Background workers polling the configured tables.

pub mod base;
pub mod poller;
pub mod pool;
