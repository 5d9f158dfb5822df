//! Helpers for testing pollers and orchestrators, mostly without a database or a sink.

pub mod database;
pub mod memory_extractor;
pub mod notify;
pub mod table;
pub mod test_destination_wrapper;
