//! Destinations receiving the extracted records.
//!
//! The [`Destination`] trait accepts one batch of sink-ready records per call. The
//! [`influxdb::InfluxDbDestination`] writes them over the InfluxDB line protocol HTTP API,
//! while [`memory::MemoryDestination`] keeps them in memory for tests.

mod base;
pub mod influxdb;
pub mod memory;

pub use base::Destination;
