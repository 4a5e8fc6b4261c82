//! Bounded-time execution on a dedicated worker.
//!
//! One worker task owns the [`JmxSession`] and runs submitted jobs strictly
//! one after another. Callers wait for the result up to a deadline; when the
//! deadline passes the job is cancelled and its future dropped at its next
//! await point, which aborts any in-flight HTTP exchange. Side effects the
//! endpoint already started may still complete.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{FetchError, FetchResult};
use crate::session::JmxSession;

/// Queue depth between callers and the worker.
const QUEUE_DEPTH: usize = 32;

type Job = Box<dyn for<'a> FnOnce(&'a mut JmxSession) -> BoxFuture<'a, ()> + Send>;

fn into_job<F>(f: F) -> Job
where
    F: for<'a> FnOnce(&'a mut JmxSession) -> BoxFuture<'a, ()> + Send + 'static,
{
    Box::new(f)
}

struct Submission {
    job: Job,
    cancel: CancellationToken,
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn interrupted() -> FetchError {
    FetchError::operation("request was interrupted")
}

/// Runs jobs against a session with a deadline.
#[derive(Debug)]
pub struct TimeoutExecutor {
    tx: mpsc::Sender<Submission>,
    worker: JoinHandle<()>,
}

impl std::fmt::Debug for Submission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submission")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl TimeoutExecutor {
    /// Spawn the worker owning `session`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(session: JmxSession) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let worker = tokio::spawn(run_worker(session, rx));
        Self { tx, worker }
    }

    /// Run `f` on the worker, waiting at most `timeout_ms` (`<= 0` waits forever).
    ///
    /// # Errors
    ///
    /// Errors from `f` are returned as-is. A missed deadline yields
    /// `request timeout exceeded: <ms>ms`, a stopped worker
    /// `request was interrupted`, and a panic inside `f`
    /// `failed to execute operation, error: <panic>`.
    pub async fn execute<T, F>(&self, timeout_ms: i64, f: F) -> FetchResult<T>
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a mut JmxSession) -> BoxFuture<'a, FetchResult<T>> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let job = into_job(move |session| {
            Box::pin(async move {
                let outcome = AssertUnwindSafe(async move { f(session).await })
                    .catch_unwind()
                    .await;
                let result = outcome.unwrap_or_else(|panic| {
                    let message = panic_message(panic.as_ref());
                    warn!(panic = %message, "operation panicked on executor worker");
                    Err(FetchError::operation(format!(
                        "failed to execute operation, error: {message}"
                    )))
                });
                // caller may have given up already
                let _ = result_tx.send(result);
            })
        });

        self.tx
            .send(Submission {
                job,
                cancel: cancel.clone(),
            })
            .await
            .map_err(|_| interrupted())?;

        // cancels the job however this future ends
        let _guard = cancel.drop_guard();

        let received = if timeout_ms <= 0 {
            result_rx.await
        } else {
            let deadline = Duration::from_millis(timeout_ms as u64);
            match tokio::time::timeout(deadline, result_rx).await {
                Ok(received) => received,
                Err(_) => {
                    warn!(timeout_ms, "request deadline exceeded, cancelling");
                    return Err(FetchError::operation(format!(
                        "request timeout exceeded: {timeout_ms}ms"
                    )));
                }
            }
        };

        received.map_err(|_| interrupted())?
    }

    /// Whether the worker is still running.
    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }
}

async fn run_worker(mut session: JmxSession, mut rx: mpsc::Receiver<Submission>) {
    debug!("executor worker started");
    while let Some(Submission { job, cancel }) = rx.recv().await {
        if cancel.is_cancelled() {
            debug!("skipping request abandoned before it started");
            continue;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                warn!("in-flight request cancelled");
            }
            () = job(&mut session) => {}
        }
    }
    debug!("executor worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::SharedStats;
    use crate::testing::InMemoryConnector;
    use crate::value::RawValue;
    use jmxlink_protocol::JmxConfig;
    use std::sync::Arc;

    fn executor(connector: &InMemoryConnector) -> TimeoutExecutor {
        TimeoutExecutor::spawn(JmxSession::new(
            Arc::new(connector.clone()),
            SharedStats::default(),
        ))
    }

    #[tokio::test]
    async fn test_returns_job_result() {
        let executor = executor(&InMemoryConnector::new());
        let value = executor
            .execute(0, |_session| Box::pin(async { Ok(41 + 1) }))
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_typed_errors_pass_through() {
        let executor = executor(&InMemoryConnector::new());
        let err = executor
            .execute(0, |_session| {
                Box::pin(async { Err::<(), _>(FetchError::connection("lost")) })
            })
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::connection("lost"));
    }

    #[tokio::test]
    async fn test_panic_is_reported_and_worker_survives() {
        let executor = executor(&InMemoryConnector::new());
        let err = executor
            .execute(0, |_session| {
                Box::pin(async {
                    if true {
                        panic!("kaboom");
                    }
                    Ok(())
                })
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FetchError::operation("failed to execute operation, error: kaboom")
        );

        assert!(executor.is_running());
        let ok = executor
            .execute(0, |_session| Box::pin(async { Ok("still here") }))
            .await
            .unwrap();
        assert_eq!(ok, "still here");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_session_still_usable() {
        let connector = InMemoryConnector::new();
        connector.add_bean("app:type=Slow", [("Value", RawValue::Integer(5))]);
        let executor = executor(&connector);

        executor
            .execute(0, |session| {
                Box::pin(async move { session.connect(JmxConfig::new("localhost", 1)).await })
            })
            .await
            .unwrap();

        connector.set_delay(Some(Duration::from_secs(60)));
        let started = tokio::time::Instant::now();
        let err = executor
            .execute(100, |session| {
                Box::pin(async move {
                    let bean = crate::session::parse_object_name("app:type=Slow")?;
                    session.get_mbean_attribute(&bean, "Value").await
                })
            })
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::operation("request timeout exceeded: 100ms"));
        assert!(started.elapsed() < Duration::from_secs(1));

        connector.set_delay(None);
        let out = executor
            .execute(1_000, |session| {
                Box::pin(async move {
                    let bean = crate::session::parse_object_name("app:type=Slow")?;
                    session.get_mbean_attribute(&bean, "Value").await
                })
            })
            .await
            .unwrap();
        assert_eq!(out[0].as_i64(), Some(5));
    }
}
