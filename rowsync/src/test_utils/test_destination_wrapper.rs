use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

use crate::destination::Destination;
use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;
use crate::test_utils::notify::TimedNotify;

type RecordCondition = Box<dyn Fn(&[Vec<String>]) -> bool + Send + Sync>;

struct Inner<D> {
    wrapped_destination: D,
    batches: Vec<Vec<String>>,
    conditions: Vec<(RecordCondition, Arc<Notify>)>,
    /// Number of `write_records` calls, including failed ones.
    write_attempts: u64,
    /// 1-based attempt numbers that fail without reaching the wrapped destination.
    failing_attempts: HashSet<u64>,
    shutdown_called: bool,
}

impl<D> Inner<D> {
    fn check_conditions(&mut self) {
        let batches = &self.batches;
        self.conditions.retain(|(condition, notify)| {
            let should_retain = !condition(batches);
            if !should_retain {
                notify.notify_one();
            }
            should_retain
        });
    }
}

/// Test wrapper for [`Destination`] implementations that tracks every batch.
///
/// Besides recording what flows through it, the wrapper can fail chosen write attempts and
/// notify tests once the written records satisfy a condition.
#[derive(Clone)]
pub struct TestDestinationWrapper<D> {
    inner: Arc<RwLock<Inner<D>>>,
}

impl<D> fmt::Debug for TestDestinationWrapper<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDestinationWrapper").finish_non_exhaustive()
    }
}

impl<D> TestDestinationWrapper<D> {
    /// Creates a new test wrapper around any destination implementation.
    pub fn wrap(destination: D) -> Self {
        let inner = Inner {
            wrapped_destination: destination,
            batches: Vec::new(),
            conditions: Vec::new(),
            write_attempts: 0,
            failing_attempts: HashSet::new(),
            shutdown_called: false,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Get all batches that have been written successfully.
    pub async fn get_batches(&self) -> Vec<Vec<String>> {
        self.inner.read().await.batches.clone()
    }

    /// Get all records that have been written successfully, in write order.
    pub async fn get_records(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner.batches.iter().flatten().cloned().collect()
    }

    pub async fn write_attempts(&self) -> u64 {
        self.inner.read().await.write_attempts
    }

    /// Makes the `attempt`-th call to `write_records` (counting from 1) fail.
    pub async fn fail_write_number(&self, attempt: u64) {
        self.inner.write().await.failing_attempts.insert(attempt);
    }

    /// Registers a notification that fires when the written batches match a condition.
    pub async fn notify_on_batches<F>(&self, condition: F) -> TimedNotify
    where
        F: Fn(&[Vec<String>]) -> bool + Send + Sync + 'static,
    {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.write().await;
        inner.conditions.push((Box::new(condition), notify.clone()));

        // The condition might already hold.
        inner.check_conditions();

        TimedNotify::new(notify)
    }

    /// Registers a notification that fires once at least `count` records were written.
    pub async fn wait_for_records_count(&self, count: usize) -> TimedNotify {
        self.notify_on_batches(move |batches| batches.iter().map(Vec::len).sum::<usize>() >= count)
            .await
    }

    pub async fn shutdown_called(&self) -> bool {
        self.inner.read().await.shutdown_called
    }
}

impl<D> Destination for TestDestinationWrapper<D>
where
    D: Destination + Send + Sync,
{
    fn name() -> &'static str {
        D::name()
    }

    async fn shutdown(&self) -> SyncResult<()> {
        let mut inner = self.inner.write().await;
        inner.shutdown_called = true;

        inner.wrapped_destination.shutdown().await
    }

    async fn write_records(&self, records: &[String]) -> SyncResult<()> {
        let mut inner = self.inner.write().await;
        inner.write_attempts += 1;

        if inner.failing_attempts.contains(&inner.write_attempts) {
            return Err(sync_error!(
                ErrorKind::DestinationWriteRejected,
                "Injected write failure",
                format!("Write attempt {} failed on purpose", inner.write_attempts)
            ));
        }

        inner.wrapped_destination.write_records(records).await?;
        inner.batches.push(records.to_vec());
        inner.check_conditions();

        Ok(())
    }
}
