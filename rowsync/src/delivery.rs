//! Splitting of extracted records into bounded, ordered write requests.

use tracing::debug;

use crate::bail;
use crate::destination::Destination;
use crate::error::{ErrorKind, SyncResult};

/// Outcome of a successful [`deliver`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub batches: usize,
    pub records: usize,
}

/// Writes `records` to `destination` in consecutive chunks of at most `batch_size` records.
///
/// Chunks are written one at a time in ascending order and the first failing chunk aborts the
/// delivery. Chunks written before the failure stay written, so a retried delivery of the same
/// records writes them again.
///
/// Empty input sends nothing. A `batch_size` of 0 is rejected with [`ErrorKind::InvalidState`].
pub async fn deliver<D>(
    destination: &D,
    records: &[String],
    batch_size: usize,
) -> SyncResult<DeliveryReport>
where
    D: Destination,
{
    if batch_size == 0 {
        bail!(
            ErrorKind::InvalidState,
            "Invalid batch size",
            "The batch size must be greater than 0"
        );
    }

    let mut report = DeliveryReport::default();
    if records.is_empty() {
        return Ok(report);
    }

    let total_batches = records.len().div_ceil(batch_size);
    for (index, batch) in records.chunks(batch_size).enumerate() {
        let batch_number = index + 1;

        if let Err(err) = destination.write_records(batch).await {
            debug!(
                destination = D::name(),
                "delivery of batch ({batch_number}/{total_batches}) failed"
            );

            return Err(err);
        }

        report.batches += 1;
        report.records += batch.len();

        debug!(
            destination = D::name(),
            "delivered batch ({batch_number}/{total_batches}) of {} rows",
            batch.len()
        );
    }

    Ok(report)
}
