use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::destination::Destination;
use crate::error::SyncResult;

#[derive(Debug, Default)]
struct Inner {
    batches: Vec<Vec<String>>,
}

/// In-memory destination for testing and development purposes.
///
/// Every accepted batch is kept as written, so tests can inspect both the records and how they
/// were split into requests.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every batch written so far.
    pub async fn batches(&self) -> Vec<Vec<String>> {
        self.inner.lock().await.batches.clone()
    }

    /// Returns every record written so far, in write order.
    pub async fn records(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.batches.iter().flatten().cloned().collect()
    }

    pub async fn clear(&self) {
        self.inner.lock().await.batches.clear();
    }
}

impl Destination for MemoryDestination {
    fn name() -> &'static str {
        "memory"
    }

    async fn shutdown(&self) -> SyncResult<()> {
        info!("shutting down memory destination");

        Ok(())
    }

    async fn write_records(&self, records: &[String]) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        info!(records = records.len(), "writing batch");
        inner.batches.push(records.to_vec());

        Ok(())
    }
}
