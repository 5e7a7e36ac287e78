//! Bounded execution of storage calls.
//!
//! Blocking storage work runs on tokio's blocking pool so runtime workers keep
//! serving other connections. Every call is capped by a timeout; a blocking
//! task that overruns is left to finish in the background and the caller gets
//! [`HistoryError::Timeout`].

use super::HistoryError;
use std::future::Future;
use std::time::Duration;

/// Run a blocking closure on the blocking pool and await it cooperatively.
pub(crate) async fn offload<T, F>(timeout: Duration, op: F) -> Result<T, HistoryError>
where
    F: FnOnce() -> Result<T, HistoryError> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(op);
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(HistoryError::Io(std::io::Error::other(format!(
            "storage worker failed: {join_err}"
        )))),
        Err(_) => Err(HistoryError::Timeout(timeout)),
    }
}

/// Await an already non-blocking storage call under a deadline.
#[cfg_attr(not(feature = "cassandra"), allow(dead_code))]
pub(crate) async fn bounded<T, E, Fut>(
    timeout: Duration,
    fut: Fut,
    map_err: impl FnOnce(E) -> HistoryError,
) -> Result<T, HistoryError>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(map_err),
        Err(_) => Err(HistoryError::Timeout(timeout)),
    }
}
