use crate::aggregator;
use crate::config::{ConfigError, PortSpec, ScanConfig};
use crate::pool::{TaskQueue, WorkerPool};
use crate::producer;
use crate::types::{ScanResult, ScanSummary};
use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::{bail, Context, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Scan every configured target, one after another, and return one summary per target.
///
/// - The configuration is validated before anything is spawned.
/// - Within a target, `config.workers` tasks probe ports concurrently.
/// - Each target gets its own task queue and result channel.
pub async fn scan_targets(config: &ScanConfig) -> Result<Vec<ScanSummary>> {
    scan_targets_internal(config, CancellationToken::new(), None, |_| {}).await
}

/// Variant that accepts a `CancellationToken` to allow external cancellation.
///
/// Once cancelled, the current target finishes with whatever was dispatched and no
/// further targets are started.
pub async fn scan_targets_with_cancel(
    config: &ScanConfig,
    cancel: CancellationToken,
) -> Result<Vec<ScanSummary>> {
    scan_targets_internal(config, cancel, None, |_| {}).await
}

/// Counters readable while a scan is running. Cumulative across targets.
#[derive(Clone, Debug)]
pub struct SharedProgress {
    pub dispatched: Arc<AtomicU64>,
    pub completed: Arc<AtomicU64>,
    pub open_count: Arc<AtomicU64>,
    /// Position in `ScanConfig::targets` of the target being swept.
    pub target_index: Arc<AtomicUsize>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self {
            dispatched: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
            open_count: Arc::new(AtomicU64::new(0)),
            target_index: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn target_index(&self) -> usize {
        self.target_index.load(Ordering::Relaxed)
    }
}

impl Default for SharedProgress {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn scan_targets_with_shared(
    config: &ScanConfig,
    cancel: CancellationToken,
    shared: SharedProgress,
) -> Result<Vec<ScanSummary>> {
    scan_targets_internal(config, cancel, Some(shared), |_| {}).await
}

/// Like `scan_targets_with_shared` but hands each summary to `on_summary` as soon as
/// its target completes.
pub async fn scan_targets_each<F>(
    config: &ScanConfig,
    cancel: CancellationToken,
    shared: Option<SharedProgress>,
    on_summary: F,
) -> Result<Vec<ScanSummary>>
where
    F: FnMut(&ScanSummary),
{
    scan_targets_internal(config, cancel, shared, on_summary).await
}

async fn scan_targets_internal<F>(
    config: &ScanConfig,
    cancel: CancellationToken,
    shared: Option<SharedProgress>,
    mut on_summary: F,
) -> Result<Vec<ScanSummary>>
where
    F: FnMut(&ScanSummary),
{
    config.validate()?;

    let mut summaries = Vec::with_capacity(config.targets.len());
    for (idx, target) in config.targets.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(remaining = config.targets.len() - summaries.len(), "scan cancelled");
            break;
        }
        if let Some(p) = &shared {
            p.target_index.store(idx, Ordering::Relaxed);
        }
        let summary = scan_target(target, config, cancel.clone(), shared.clone()).await?;
        on_summary(&summary);
        summaries.push(summary);
    }
    Ok(summaries)
}

/// Sweep one target: producer, worker pool and completion watcher run concurrently
/// while the current task drains the result stream. Surrounding whitespace in
/// `target` is ignored.
pub async fn scan_target(
    target: &str,
    config: &ScanConfig,
    cancel: CancellationToken,
    shared: Option<SharedProgress>,
) -> Result<ScanSummary> {
    config.validate_sweep()?;
    let target = target.trim();
    if target.is_empty() {
        return Err(ConfigError::EmptyTarget.into());
    }
    let ports = config.port_spec();
    let started_at = now_iso_like();
    let start = Instant::now();
    let host: Arc<str> = Arc::from(target);

    let (task_tx, queue) = TaskQueue::bounded(config.workers);
    let (result_tx, result_rx) = mpsc::channel::<ScanResult>(config.workers);

    let pool = WorkerPool::spawn(
        queue,
        &result_tx,
        config.workers,
        config.timeout,
        cancel.clone(),
    )?;
    let producer = tokio::spawn(producer::produce(
        host.clone(),
        ports.clone(),
        task_tx,
        cancel.clone(),
        shared.clone(),
    ));

    // The watcher owns the last result sender and drops it only after every worker
    // has been joined, which is what closes the result stream.
    let watcher = tokio::spawn(async move {
        let processed = pool.join().await;
        drop(result_tx);
        processed
    });

    let agg = aggregator::aggregate(target, result_rx, shared.as_ref()).await;
    let dispatched = producer.await.context("task producer failed")?;
    let processed = watcher.await.context("completion watcher failed")?;
    let time_taken = start.elapsed();

    if agg.total_seen != dispatched || processed != dispatched {
        bail!(
            "result count mismatch for {target}: dispatched {dispatched}, processed {processed}, aggregated {}",
            agg.total_seen
        );
    }
    if !cancel.is_cancelled() && dispatched != ports.len() {
        bail!(
            "dispatched {dispatched} of {} tasks for {target}",
            ports.len()
        );
    }

    let (start_port, end_port) = match ports {
        PortSpec::Range { start, end } => (Some(start), Some(end)),
        PortSpec::List(_) => (None, None),
    };
    let summary = ScanSummary {
        target: target.to_string(),
        start_port,
        end_port,
        ports_scanned: dispatched,
        open_ports: agg.open.len() as u64,
        time_taken,
        started_at,
        results: agg.open,
    };
    info!(
        host = target,
        scanned = summary.ports_scanned,
        open = summary.open_ports,
        elapsed_ms = time_taken.as_millis() as u64,
        "target complete"
    );
    Ok(summary)
}

fn now_iso_like() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
