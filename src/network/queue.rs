//! Event Queue
//!
//! Serializes concurrent inbound events into one processing order. A single
//! runner task owns the context (`C`) and drains jobs strictly FIFO, running
//! each to completion, awaits included, before starting the next.
//!
//! Pushing never blocks and is allowed at any time, including while a job is
//! suspended on I/O. The queue is unbounded.
//!
//! A job that fails or panics only fails its own [`TaskHandle`]; the runner
//! moves on to the next job.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Queue errors, as seen by a task's handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The task returned an error.
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// The task panicked.
    #[error("Task panicked")]
    TaskPanicked,

    /// The runner is gone; the task never ran.
    #[error("Event queue runner stopped")]
    RunnerStopped,
}

type Job<C> = Box<dyn for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, ()> + Send>;

fn job<C, F>(f: F) -> Job<C>
where
    F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, ()> + Send + 'static,
{
    Box::new(f)
}

/// Completion handle for one pushed task.
#[must_use = "a task handle does nothing unless joined"]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, QueueError>>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task to finish.
    pub async fn join(self) -> Result<T, QueueError> {
        self.rx.await.map_err(|_| QueueError::RunnerStopped)?
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").finish_non_exhaustive()
    }
}

/// FIFO queue of tasks over a shared context.
pub struct EventQueue<C> {
    tx: mpsc::UnboundedSender<Job<C>>,
    pending: Arc<AtomicUsize>,
}

impl<C> Clone for EventQueue<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<C: Send + 'static> EventQueue<C> {
    /// Spawn the runner over `ctx`.
    ///
    /// The runner ends once every queue clone is dropped and the backlog is
    /// drained; its join handle then yields the context back.
    pub fn start(ctx: C) -> (Self, JoinHandle<C>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<C>>();

        let runner = tokio::spawn(async move {
            let mut ctx = ctx;
            while let Some(job) = rx.recv().await {
                job(&mut ctx).await;
            }
            debug!("Event queue drained and closed");
            ctx
        });

        let queue = Self {
            tx,
            pending: Arc::new(AtomicUsize::new(0)),
        };
        (queue, runner)
    }

    /// Enqueue `task`. The returned handle resolves when it has run.
    pub fn push<T, E, F>(&self, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
        F: for<'a> FnOnce(&'a mut C) -> BoxFuture<'a, Result<T, E>> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let pending = self.pending.clone();

        let job = job(move |ctx: &mut C| {
            pending.fetch_sub(1, Ordering::SeqCst);
            Box::pin(async move {
                let result = match AssertUnwindSafe(task(ctx)).catch_unwind().await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => {
                        warn!("Queued task failed: {}", e);
                        Err(QueueError::TaskFailed(e.to_string()))
                    }
                    Err(_) => {
                        warn!("Queued task panicked");
                        Err(QueueError::TaskPanicked)
                    }
                };
                // Caller may have dropped the handle
                let _ = done_tx.send(result);
            })
        });

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!("Task pushed after the event queue stopped");
        }

        TaskHandle { rx: done_rx }
    }

    /// Tasks waiting to start.
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// True when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_completion_order() {
        let (queue, runner) = EventQueue::start(Vec::<u32>::new());

        // The first task sleeps longest; it must still finish first.
        let handles: Vec<_> = [30u64, 10, 0]
            .into_iter()
            .enumerate()
            .map(|(i, delay)| {
                queue.push(move |log: &mut Vec<u32>| {
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        log.push(i as u32);
                        Ok::<_, String>(i)
                    })
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().await.unwrap(), i);
        }

        drop(queue);
        assert_eq!(runner.await.unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_failure_only_fails_its_own_handle() {
        let (queue, _runner) = EventQueue::start(0u32);

        let failing = queue.push(|_: &mut u32| Box::pin(async { Err::<(), _>("boom") }));
        let ok = queue.push(|n: &mut u32| {
            Box::pin(async move {
                *n += 1;
                Ok::<_, String>(*n)
            })
        });

        assert_eq!(
            failing.join().await,
            Err(QueueError::TaskFailed("boom".to_string()))
        );
        assert_eq!(ok.join().await, Ok(1));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let (queue, _runner) = EventQueue::start(0u32);

        let panicking = queue.push(|n: &mut u32| {
            Box::pin(async move {
                if *n == 0 {
                    panic!("task exploded");
                }
                Ok::<_, String>(())
            })
        });
        let after = queue.push(|n: &mut u32| Box::pin(async move { Ok::<_, String>(*n + 7) }));

        assert_eq!(panicking.join().await, Err(QueueError::TaskPanicked));
        assert_eq!(after.join().await, Ok(7));
    }

    #[tokio::test]
    async fn test_push_while_draining_appends() {
        let (queue, runner) = EventQueue::start(Vec::<&'static str>::new());
        let (gate_tx, gate_rx) = oneshot::channel::<()>();

        let first = queue.push(move |log: &mut Vec<&'static str>| {
            Box::pin(async move {
                let _ = gate_rx.await;
                log.push("first");
                Ok::<_, String>(())
            })
        });

        // Let the runner pick up the first task
        tokio::task::yield_now().await;
        let second = queue.push(|log: &mut Vec<&'static str>| {
            Box::pin(async move {
                log.push("second");
                Ok::<_, String>(())
            })
        });
        assert_eq!(queue.len(), 1);

        gate_tx.send(()).unwrap();
        first.join().await.unwrap();
        second.join().await.unwrap();
        assert!(queue.is_empty());

        drop(queue);
        assert_eq!(runner.await.unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_push_after_runner_stopped() {
        let (queue, runner) = EventQueue::start(());
        runner.abort();
        let _ = runner.await;

        let handle = queue.push(|_: &mut ()| Box::pin(async { Ok::<_, String>(()) }));
        assert_eq!(handle.join().await, Err(QueueError::RunnerStopped));
    }
}
