//! Timeout-guarded writes.
//!
//! A blocking write races its deadline. Whether the losing operation is
//! dropped or left running is chosen per call site with [`OnTimeout`].

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::RemoteError;

/// How a guarded write settled from the caller's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    Confirmed(T),
    TimedOut,
    Failed(RemoteError),
}

impl<T> WriteOutcome<T> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, WriteOutcome::Confirmed(_))
    }

    /// Timeout and failure both become a transient error.
    pub fn into_result(self) -> Result<T, RemoteError> {
        match self {
            WriteOutcome::Confirmed(value) => Ok(value),
            WriteOutcome::TimedOut => Err(RemoteError::Unavailable("deadline exceeded".into())),
            WriteOutcome::Failed(e) => Err(e),
        }
    }
}

/// What happens to the operation once its deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnTimeout {
    /// Drop the operation. A transport that has not committed yet never will.
    Cancel,
    /// Keep it running in the background; its late result is only logged.
    Abandon,
}

/// Race `op` against `deadline`.
pub async fn guarded_write<T, F>(
    label: &'static str,
    op: F,
    deadline: Duration,
    on_timeout: OnTimeout,
) -> WriteOutcome<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T, RemoteError>> + Send + 'static,
{
    let deadline_ms = deadline.as_millis() as u64;
    match on_timeout {
        OnTimeout::Cancel => match tokio::time::timeout(deadline, op).await {
            Ok(Ok(value)) => WriteOutcome::Confirmed(value),
            Ok(Err(e)) => {
                tracing::warn!(write = label, error = %e, "guarded write failed");
                WriteOutcome::Failed(e)
            }
            Err(_) => {
                tracing::warn!(write = label, deadline_ms, "guarded write timed out, cancelled");
                WriteOutcome::TimedOut
            }
        },
        OnTimeout::Abandon => {
            let (tx, rx) = oneshot::channel();
            tokio::spawn(async move {
                let result = op.await;
                if let Err(late) = tx.send(result) {
                    match late {
                        Ok(_) => tracing::info!(write = label, "abandoned write landed late"),
                        Err(e) => tracing::warn!(write = label, error = %e, "abandoned write failed late"),
                    }
                }
            });
            match tokio::time::timeout(deadline, rx).await {
                Ok(Ok(Ok(value))) => WriteOutcome::Confirmed(value),
                Ok(Ok(Err(e))) => {
                    tracing::warn!(write = label, error = %e, "guarded write failed");
                    WriteOutcome::Failed(e)
                }
                Ok(Err(_)) => WriteOutcome::Failed(RemoteError::Unavailable(format!(
                    "{label} task ended without a result"
                ))),
                Err(_) => {
                    tracing::warn!(write = label, deadline_ms, "guarded write timed out, left running");
                    WriteOutcome::TimedOut
                }
            }
        }
    }
}

/// Fire-and-forget write; failures are logged and otherwise ignored.
pub fn spawn_detached<F>(label: &'static str, op: F)
where
    F: Future<Output = Result<(), RemoteError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = op.await {
            tracing::warn!(write = label, error = %e, "background write failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fast_operation_is_confirmed() {
        let outcome = guarded_write(
            "fast",
            async { Ok::<_, RemoteError>(7) },
            Duration::from_millis(100),
            OnTimeout::Cancel,
        )
        .await;
        assert_eq!(outcome, WriteOutcome::Confirmed(7));
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_before_deadline_is_failed() {
        let outcome: WriteOutcome<()> = guarded_write(
            "reject",
            async { Err(RemoteError::Rejected("nope".into())) },
            Duration::from_millis(100),
            OnTimeout::Abandon,
        )
        .await;
        assert_eq!(outcome, WriteOutcome::Failed(RemoteError::Rejected("nope".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_operation_never_completes() {
        let landed = Arc::new(AtomicBool::new(false));
        let flag = landed.clone();
        let outcome = guarded_write(
            "slow",
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, RemoteError>(())
            },
            Duration::from_secs(1),
            OnTimeout::Cancel,
        )
        .await;
        assert_eq!(outcome, WriteOutcome::TimedOut);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!landed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_operation_still_completes() {
        let landed = Arc::new(AtomicBool::new(false));
        let flag = landed.clone();
        let outcome = guarded_write(
            "slow",
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, RemoteError>(())
            },
            Duration::from_secs(1),
            OnTimeout::Abandon,
        )
        .await;
        assert_eq!(outcome, WriteOutcome::TimedOut);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(landed.load(Ordering::SeqCst));
    }

    #[test]
    fn timeout_maps_to_unavailable() {
        let err = WriteOutcome::<()>::TimedOut.into_result().unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));
    }
}
