//! Bounded worker pool running cache rebuilds off the request path.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type RebuildJob = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Fixed-size pool of rebuild workers fed by a bounded queue.
///
/// Queue-full policy is reject-and-log: [`RebuildPool::try_submit`] returns
/// false and drops the job, and the caller releases whatever lock gated the
/// rebuild so the entry is not left lock-blocked until the lock TTL lapses.
///
/// Dropping the pool (or calling [`RebuildPool::shutdown`]) closes the
/// queue; workers finish the jobs already accepted and exit.
pub struct RebuildPool {
    tx: mpsc::Sender<RebuildJob>,
    workers: Vec<JoinHandle<()>>,
}

impl RebuildPool {
    /// Spawn `workers` tasks sharing a queue of at most `queue_depth`
    /// pending jobs. Must be called from within a Tokio runtime.
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel::<RebuildJob>(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..workers.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let job = { rx.lock().await.recv().await };
                        match job {
                            Some(job) => {
                                debug!(worker, "running rebuild job");
                                job.await;
                            }
                            None => break,
                        }
                    }
                })
            })
            .collect();

        Self { tx, workers }
    }

    /// Submit a rebuild. Returns false when the queue is full or the pool
    /// is shut down; the job is dropped, never queued elsewhere.
    pub fn try_submit<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.tx.try_send(Box::pin(job)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("rebuild queue full, job rejected");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("rebuild pool is shut down, job rejected");
                false
            }
        }
    }

    /// Close the queue and wait for in-flight jobs to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}
