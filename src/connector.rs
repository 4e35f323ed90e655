use crate::types::{ScanResult, ScanTask};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Upper bound on the bytes captured as a banner.
pub const BANNER_CAP: usize = 1024;

/// Probe one address with a TCP connect bounded by `timeout`.
///
/// - Any connect failure (refused, unreachable, resolution, timeout) is reported as closed.
/// - On success, one read bounded by a fresh `timeout` window is attempted for a banner.
/// - The stream is dropped before returning on every path.
/// - A fired `cancel` token resolves the probe as closed.
pub async fn probe(task: &ScanTask, timeout: Duration, cancel: &CancellationToken) -> ScanResult {
    let connect = time::timeout(timeout, TcpStream::connect((&*task.host, task.port)));
    let connect_res = tokio::select! {
        biased;
        _ = cancel.cancelled() => return ScanResult::closed(task.port),
        res = connect => res,
    };

    let mut stream = match connect_res {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            trace!(addr = %task, error = %e, "connect failed");
            return ScanResult::closed(task.port);
        }
        Err(_elapsed) => {
            trace!(addr = %task, "connect timed out");
            return ScanResult::closed(task.port);
        }
    };

    let banner = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        banner = read_banner(&mut stream, timeout) => banner,
    };
    ScanResult::open(task.port, banner)
}

/// Try a single read of up to `BANNER_CAP` bytes and convert to a trimmed lossy UTF-8 string.
async fn read_banner(stream: &mut TcpStream, timeout: Duration) -> Option<String> {
    let mut buf = vec![0u8; BANNER_CAP];
    match time::timeout(timeout, stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => {
            let s = String::from_utf8_lossy(&buf[..n]);
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    }
}
