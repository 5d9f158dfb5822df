//! Concurrency primitives shared by the orchestrator and the table pollers.
//!
//! The [`shutdown`] module implements a broadcast shutdown: a single signal reaches every
//! poller, and each poller stops at its next phase boundary.

pub mod shutdown;
