//! Deadline guard for privileged operations.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{Operation, ServiceError};

/// Race `future` against a `duration` timer.
///
/// The operation runs on its own task. When the timer wins only the wait is
/// abandoned: the task keeps running to completion in the background and the
/// caller gets `OperationTimedOut`.
pub async fn with_timeout<F, T>(
    operation: Operation,
    duration: Duration,
    future: F,
) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(future);
    match tokio::time::timeout(duration, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ServiceError::failed(operation, join_err)),
        Err(_) => {
            warn!(
                %operation,
                timeout_ms = duration.as_millis() as u64,
                "stopped waiting; operation continues in background"
            );
            Err(ServiceError::OperationTimedOut {
                operation,
                after: duration,
            })
        }
    }
}
