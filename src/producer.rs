use crate::config::PortSpec;
use crate::scanner::SharedProgress;
use crate::types::ScanTask;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const PROGRESS_EVERY: u16 = 100;

/// Feed every port of `ports` for `target` into the queue, then close it by dropping `tx`.
///
/// Returns how many tasks were dispatched. This is short of `ports.len()` only if the
/// scan was cancelled or every worker went away.
pub async fn produce(
    target: Arc<str>,
    ports: PortSpec,
    tx: mpsc::Sender<ScanTask>,
    cancel: CancellationToken,
    progress: Option<SharedProgress>,
) -> u64 {
    let mut dispatched = 0u64;
    match ports {
        PortSpec::List(list) => {
            for port in list {
                if !dispatch(&tx, &cancel, ScanTask::new(target.clone(), port)).await {
                    break;
                }
                dispatched += 1;
                bump(&progress);
            }
        }
        PortSpec::Range { start, end } => {
            for port in start..=end {
                if !dispatch(&tx, &cancel, ScanTask::new(target.clone(), port)).await {
                    break;
                }
                dispatched += 1;
                bump(&progress);
                if port % PROGRESS_EVERY == 0 {
                    debug!(host = %target, port, end, "dispatch progress");
                }
            }
        }
    }
    debug!(host = %target, dispatched, "task queue closed");
    dispatched
}

async fn dispatch(
    tx: &mpsc::Sender<ScanTask>,
    cancel: &CancellationToken,
    task: ScanTask,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tx.send(task).await.is_ok()
}

fn bump(progress: &Option<SharedProgress>) {
    if let Some(p) = progress {
        p.dispatched.fetch_add(1, Ordering::Relaxed);
    }
}
