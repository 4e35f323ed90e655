use crate::scanner::SharedProgress;
use crate::types::ScanResult;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tracing::info;

/// Drained view of one target's result stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    /// Open results in arrival order.
    pub open: Vec<ScanResult>,
    pub total_seen: u64,
}

/// Consume `results` until every sender is dropped.
pub async fn aggregate(
    host: &str,
    mut results: mpsc::Receiver<ScanResult>,
    progress: Option<&SharedProgress>,
) -> Aggregate {
    let mut agg = Aggregate::default();
    while let Some(result) = results.recv().await {
        agg.total_seen += 1;
        if let Some(p) = progress {
            p.completed.fetch_add(1, Ordering::Relaxed);
        }
        if result.is_open() {
            info!(
                host,
                port = result.port,
                banner = result.banner.as_deref().unwrap_or(""),
                "port open"
            );
            if let Some(p) = progress {
                p.open_count.fetch_add(1, Ordering::Relaxed);
            }
            agg.open.push(result);
        }
    }
    agg
}
