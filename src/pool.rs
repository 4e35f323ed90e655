use crate::config::ConfigError;
use crate::connector;
use crate::types::{ScanResult, ScanTask};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Multi-consumer end of the bounded task queue shared by all workers.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    rx: Arc<Mutex<mpsc::Receiver<ScanTask>>>,
}

impl TaskQueue {
    /// Create a bounded queue. Dropping every sender closes it.
    pub fn bounded(capacity: usize) -> (mpsc::Sender<ScanTask>, TaskQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            TaskQueue {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// Next task, or `None` once the queue is empty and closed.
    pub async fn next(&self) -> Option<ScanTask> {
        self.rx.lock().await.recv().await
    }
}

/// A fixed set of workers draining one `TaskQueue`.
#[derive(Debug)]
pub struct WorkerPool {
    workers: JoinSet<u64>,
}

impl WorkerPool {
    /// Spawn exactly `worker_count` workers. Each holds its own clone of `results`.
    pub fn spawn(
        queue: TaskQueue,
        results: &mpsc::Sender<ScanResult>,
        worker_count: usize,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, ConfigError> {
        if worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }
        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            workers.spawn(worker(
                id,
                queue.clone(),
                results.clone(),
                timeout,
                cancel.clone(),
            ));
        }
        debug!(workers = worker_count, "worker pool started");
        Ok(Self { workers })
    }

    /// Wait for every worker to exit and return the number of tasks processed.
    pub async fn join(mut self) -> u64 {
        let mut processed = 0;
        while let Some(res) = self.workers.join_next().await {
            match res {
                Ok(n) => processed += n,
                Err(e) => error!(error = %e, "scan worker failed"),
            }
        }
        processed
    }
}

async fn worker(
    id: usize,
    queue: TaskQueue,
    results: mpsc::Sender<ScanResult>,
    timeout: Duration,
    cancel: CancellationToken,
) -> u64 {
    let mut processed = 0;
    while let Some(task) = queue.next().await {
        let result = connector::probe(&task, timeout, &cancel).await;
        processed += 1;
        if results.send(result).await.is_err() {
            // Aggregator is gone; nobody will read further results.
            break;
        }
    }
    debug!(worker = id, processed, "worker drained queue");
    processed
}
