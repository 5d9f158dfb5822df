use std::future::Future;

use crate::error::SyncResult;

/// Trait for systems that can receive batches of extracted records.
///
/// Records are opaque strings produced by the source query and must be written in the order
/// given. A batch is either accepted as a whole or fails; the caller never retries on its own,
/// but the same records may be written again after a failed poll cycle, so writes should be
/// idempotent on the destination side.
pub trait Destination {
    /// Returns the name of the destination.
    fn name() -> &'static str;

    /// Propagates the shutdown signal to the destination.
    ///
    /// The default implementation is a no-op.
    fn shutdown(&self) -> impl Future<Output = SyncResult<()>> + Send {
        async { Ok(()) }
    }

    /// Writes one batch of records.
    ///
    /// Never called with an empty batch.
    fn write_records(&self, records: &[String]) -> impl Future<Output = SyncResult<()>> + Send;
}
