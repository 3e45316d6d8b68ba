//! Bounded worker pool with the enqueue / wait-all / drain-on-shutdown
//! contract.
//!
//! N worker tasks share one FIFO queue; completion is tracked with a pending
//! counter and a notifier so `wait_all` blocks exactly until every enqueued
//! task reached a terminal state. Shutdown drains the queue (no preemption);
//! enqueueing after shutdown fails with [`PoolError::Closed`]. Tasks that
//! start network work should consult [`WorkerPool::cancel_flag`] between
//! connection attempts.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::PoolError;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Future handle for one enqueued task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task's result.
    pub async fn join(self) -> Result<T, PoolError> {
        self.receiver.await.map_err(|_| PoolError::Cancelled)
    }
}

pub struct WorkerPool {
    sender: Option<mpsc::UnboundedSender<Job>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
    all_done: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn a pool with `workers` worker tasks (at least one).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::unbounded_channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));
        let all_done = Arc::new(Notify::new());
        let closed = Arc::new(AtomicBool::new(false));

        let handles = (0..workers)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let pending = Arc::clone(&pending);
                let all_done = Arc::clone(&all_done);
                tokio::spawn(async move {
                    loop {
                        // Lock only for the dequeue so workers pull fairly.
                        let job = { receiver.lock().await.recv().await };
                        let Some(job) = job else {
                            debug!(worker_id, "worker pool queue closed, worker exiting");
                            break;
                        };
                        job.await;
                        if pending.fetch_sub(1, Ordering::AcqRel) == 1 {
                            all_done.notify_waiters();
                        }
                    }
                })
            })
            .collect();

        Self {
            sender: Some(sender),
            workers: handles,
            pending,
            all_done,
            closed,
        }
    }

    /// Tasks observing this flag must not start new network connections
    /// once it is set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    /// Submit a task; non-blocking. Returns a handle resolving to the
    /// task's output.
    pub fn enqueue<F, T>(&self, future: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        let sender = self.sender.as_ref().ok_or(PoolError::Closed)?;

        let (result_tx, result_rx) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::AcqRel);

        let job: Job = Box::pin(async move {
            let result = future.await;
            // Receiver may have been dropped; the task still counts as done.
            let _ = result_tx.send(result);
        });

        if sender.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(PoolError::Closed);
        }
        Ok(TaskHandle {
            receiver: result_rx,
        })
    }

    /// Block until every enqueued task has terminated.
    pub async fn wait_all(&self) {
        loop {
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            let notified = self.all_done.notified();
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Begin shutdown, drain outstanding tasks, and join the workers.
    pub async fn shutdown(mut self) {
        self.closed.store(true, Ordering::Release);
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_tasks_run_and_return_results() {
        let pool = WorkerPool::new(4);
        let mut handles = Vec::new();
        for i in 0..32u64 {
            handles.push(pool.enqueue(async move { i * 2 }).unwrap());
        }
        let mut sum = 0;
        for handle in handles {
            sum += handle.join().await.unwrap();
        }
        assert_eq!(sum, (0..32u64).map(|i| i * 2).sum());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_all_blocks_until_done() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.enqueue(async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.wait_all().await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_all_on_idle_pool_returns_immediately() {
        let pool = WorkerPool::new(2);
        pool.wait_all().await;
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_single_worker_preserves_fifo_order() {
        let pool = WorkerPool::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..8u32 {
            let order = Arc::clone(&order);
            pool.enqueue(async move {
                order.lock().await.push(i);
            })
            .unwrap();
        }
        pool.wait_all().await;
        assert_eq!(*order.lock().await, (0..8).collect::<Vec<_>>());
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_fails() {
        let pool = WorkerPool::new(1);
        let flag = pool.cancel_flag();
        pool.shutdown().await;
        assert!(flag.load(Ordering::Acquire));
        // The pool value is consumed by shutdown; verify via a fresh pool's
        // cancel flag semantics instead.
        let pool = WorkerPool::new(1);
        pool.cancel_flag().store(true, Ordering::Release);
        let err = pool.enqueue(async { 1 }).unwrap_err();
        assert_eq!(err, PoolError::Closed);
    }

    #[tokio::test]
    async fn test_shutdown_drains_outstanding_tasks() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..6 {
            let counter = Arc::clone(&counter);
            pool.enqueue(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown().await;
        assert_eq!(counter.load(Ordering::SeqCst), 6);
    }
}
