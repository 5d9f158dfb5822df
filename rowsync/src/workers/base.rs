use std::future::Future;

use crate::error::SyncResult;

/// Trait for background workers.
///
/// The generic parameter `H` is the handle returned when the worker starts and `S` is the state
/// readable through that handle.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    /// Error type returned when worker startup fails.
    type Error;

    /// Starts the worker in the background and returns a handle to it.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Handle for monitoring a running worker.
///
/// The handle stays valid after the worker completes, so its state can still be inspected.
pub trait WorkerHandle<S> {
    /// Returns the current state of the worker.
    ///
    /// Holding the state doesn't keep the worker alive or guarantee anything about its progress.
    fn state(&self) -> S;

    /// Waits for the worker to complete and returns its result.
    fn wait(self) -> impl Future<Output = SyncResult<()>> + Send;
}
