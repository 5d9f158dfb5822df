//! Incremental, per-table polling of a monitoring database into a time-series store.
//!
//! Every configured table is polled by an independent worker which repeatedly:
//!
//! 1. reads the table's checkpoint, the highest id already delivered;
//! 2. runs the table's ranged query over the id window `[checkpoint, checkpoint + window)`;
//! 3. writes the returned records to the destination in bounded batches, in query order;
//! 4. advances and persists the checkpoint only after every batch was accepted;
//! 5. sleeps for the table's interval.
//!
//! A failure stops only the affected table. Records of a window that failed mid-way are delivered
//! again after a restart, so delivery is at-least-once and downstream writes are expected to be
//! idempotent.
//!
//! The main entry point is [`orchestrator::Orchestrator`], which wires a
//! [`checkpoint::CheckpointStore`], a [`source::Extractor`] and a [`destination::Destination`]
//! into one [`workers::poller::TablePoller`] per active table.

pub mod checkpoint;
pub mod concurrency;
pub mod delivery;
pub mod destination;
pub mod error;
mod macros;
pub mod metrics;
pub mod orchestrator;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod workers;
