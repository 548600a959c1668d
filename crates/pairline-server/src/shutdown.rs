//! Graceful shutdown of gateway tasks via `CancellationToken`.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default time to wait for gateway tasks after cancelling.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the gateway's cancellation token and the tasks that watch it.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Register a task to be awaited by [`graceful_shutdown`](Self::graceful_shutdown).
    pub fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Number of tracked tasks still running.
    pub fn tracked(&self) -> usize {
        self.tasks.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Cancel the token without waiting.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has started.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token and wait up to `timeout` for every tracked task.
    ///
    /// Tasks still running after the timeout are aborted.
    pub async fn graceful_shutdown(&self, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);
        self.shutdown();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        info!(
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for gateway tasks"
        );

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!("gateway shutdown timed out after {timeout:?}, aborting remaining tasks");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_not_shutting_down() {
        let coord = ShutdownCoordinator::new();
        assert!(!coord.is_shutting_down());
        assert_eq!(coord.tracked(), 0);
    }

    #[test]
    fn shutdown_cancels_every_token() {
        let coord = ShutdownCoordinator::new();
        let t1 = coord.token();
        let t2 = coord.token();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
    }

    #[tokio::test]
    async fn graceful_shutdown_awaits_tracked_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();

        coord.track(tokio::spawn(async move {
            token.cancelled().await;
            let _ = done_tx.send(());
        }));
        assert_eq!(coord.tracked(), 1);

        coord.graceful_shutdown(None).await;
        assert!(coord.is_shutting_down());
        assert!(done_rx.await.is_ok());
        assert_eq!(coord.tracked(), 0);
    }

    #[tokio::test]
    async fn graceful_shutdown_aborts_stragglers() {
        let coord = ShutdownCoordinator::new();
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });
        let abort = handle.abort_handle();
        coord.track(handle);

        coord
            .graceful_shutdown(Some(Duration::from_millis(50)))
            .await;
        assert!(coord.is_shutting_down());
        tokio::time::timeout(Duration::from_secs(1), async {
            while !abort.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn finished_tasks_are_pruned_on_track() {
        let coord = ShutdownCoordinator::new();
        let first = tokio::spawn(async {});
        while !first.is_finished() {
            tokio::task::yield_now().await;
        }
        coord.track(first);
        coord.track(tokio::spawn(std::future::pending::<()>()));
        assert_eq!(coord.tasks.lock().len(), 1);
        coord.shutdown();
    }
}
