use port_sweep::config::{ConfigError, ScanConfig};
use port_sweep::scanner::{self, SharedProgress};
use port_sweep::types::{PortState, ScanResult};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Listener on an ephemeral port that greets every connection with `greeting`.
async fn greeting_listener(greeting: &'static [u8]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let _ = sock.write_all(greeting).await;
            });
        }
    });
    port
}

/// Listener that accepts and keeps connections open without ever writing.
async fn silent_listener() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((sock, _)) = listener.accept().await {
            held.push(sock);
        }
    });
    port
}

/// A port that was just bound and released, so nothing listens on it.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn local(ports: Vec<u16>) -> ScanConfig {
    ScanConfig::new(["127.0.0.1"])
        .with_ports(ports)
        .with_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn explicit_ports_report_open_port_with_banner() {
    let open = greeting_listener(b"HELLO\r\n").await;
    let closed = closed_port().await;

    let summaries = scanner::scan_targets(&local(vec![closed, open])).await.unwrap();
    assert_eq!(summaries.len(), 1);
    let s = &summaries[0];
    assert_eq!(s.target, "127.0.0.1");
    assert_eq!(s.ports_scanned, 2);
    assert_eq!(s.open_ports, 1);
    assert_eq!(s.start_port, None);
    assert_eq!(s.end_port, None);
    assert_eq!(s.results, vec![ScanResult::open(open, Some("HELLO".into()))]);
}

#[tokio::test]
async fn reversed_range_rejected_before_dispatch() {
    let progress = SharedProgress::new();
    let cfg = ScanConfig::new(["127.0.0.1"]).with_range(1, 0);
    let err = scanner::scan_targets_with_shared(&cfg, CancellationToken::new(), progress.clone())
        .await
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ConfigError>(),
        Some(&ConfigError::InvalidRange { start: 1, end: 0 })
    );
    assert_eq!(progress.dispatched.load(std::sync::atomic::Ordering::Relaxed), 0);
}

#[tokio::test]
async fn zero_workers_rejected() {
    let cfg = local(vec![80]).with_workers(0);
    let err = scanner::scan_targets(&cfg).await.unwrap_err();
    assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::NoWorkers));
}

#[tokio::test]
async fn worker_count_does_not_change_counts() {
    let open = greeting_listener(b"SSH-2.0-fixture\n").await;
    let mut ports = vec![open, open];
    for _ in 0..5 {
        ports.push(closed_port().await);
    }

    for workers in [1, 10, 1000] {
        let cfg = local(ports.clone()).with_workers(workers);
        let s = scanner::scan_targets(&cfg).await.unwrap().remove(0);
        assert_eq!(s.ports_scanned, 7, "workers={workers}");
        assert_eq!(s.open_ports, 2, "workers={workers}");
        assert_eq!(s.results.len() as u64, s.open_ports);
        assert!(s.results.iter().all(|r| r.state == PortState::Open && r.port == open));
    }
}

#[tokio::test]
async fn range_mode_counts_every_port() {
    let open = greeting_listener(b"HI").await;
    let end = open.saturating_add(20);
    let expected = u64::from(end - open) + 1;

    for workers in [1, 10, 1000] {
        let cfg = ScanConfig::new(["127.0.0.1"])
            .with_range(open, end)
            .with_workers(workers)
            .with_timeout(Duration::from_secs(2));
        let s = scanner::scan_targets(&cfg).await.unwrap().remove(0);
        assert_eq!(s.start_port, Some(open));
        assert_eq!(s.end_port, Some(end));
        assert_eq!(s.ports_scanned, expected);
        assert_eq!(s.results.len() as u64, s.open_ports);
        assert!(s.results.iter().all(ScanResult::is_open));
        assert!(s.results.iter().any(|r| r.port == open));
    }
}

#[tokio::test]
async fn silent_service_is_open_without_banner() {
    let port = silent_listener().await;
    let cfg = local(vec![port]).with_timeout(Duration::from_millis(300));

    let s = scanner::scan_targets(&cfg).await.unwrap().remove(0);
    assert_eq!(s.results, vec![ScanResult::open(port, None)]);
    assert!(s.time_taken < Duration::from_secs(2));
}

#[tokio::test]
async fn repeated_scans_classify_the_same() {
    let open = greeting_listener(b"HELLO").await;
    let closed = closed_port().await;
    let cfg = local(vec![open, closed]);

    let first = scanner::scan_targets(&cfg).await.unwrap().remove(0);
    let second = scanner::scan_targets(&cfg).await.unwrap().remove(0);
    assert_eq!(first.results, second.results);
    assert_eq!(first.open_ports, second.open_ports);
}

#[tokio::test]
async fn targets_scanned_in_order_with_progress() {
    let open = greeting_listener(b"HELLO").await;
    let cfg = ScanConfig::new(["127.0.0.1", "127.0.0.1"])
        .with_ports(vec![open, closed_port().await, closed_port().await])
        .with_timeout(Duration::from_secs(2));
    let progress = SharedProgress::new();

    let mut seen = Vec::new();
    let summaries = scanner::scan_targets_each(
        &cfg,
        CancellationToken::new(),
        Some(progress.clone()),
        |s| seen.push(s.ports_scanned),
    )
    .await
    .unwrap();

    assert_eq!(summaries.len(), 2);
    assert_eq!(seen, vec![3, 3]);
    assert_eq!(progress.completed(), 6);
    assert_eq!(progress.open_count.load(std::sync::atomic::Ordering::Relaxed), 2);
}

#[tokio::test]
async fn cancelled_scan_starts_no_targets() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let summaries = scanner::scan_targets_with_cancel(&local(vec![1, 2, 3]), cancel)
        .await
        .unwrap();
    assert!(summaries.is_empty());
}

#[tokio::test]
async fn unresolvable_host_is_all_closed() {
    let cfg = ScanConfig::new(["no-such-host.invalid"])
        .with_ports(vec![80, 443])
        .with_timeout(Duration::from_secs(2));
    let s = scanner::scan_targets(&cfg).await.unwrap().remove(0);
    assert_eq!(s.ports_scanned, 2);
    assert_eq!(s.open_ports, 0);
    assert!(s.results.is_empty());
}

#[tokio::test]
async fn cancel_mid_sweep_keeps_counts_consistent_and_skips_later_targets() {
    let port = silent_listener().await;
    let cfg = ScanConfig::new(["127.0.0.1", "127.0.0.1"])
        .with_ports(vec![port; 200])
        .with_workers(4)
        .with_timeout(Duration::from_secs(2));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let summaries = scanner::scan_targets_with_cancel(&cfg, cancel).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(summaries.len(), 1);
    let s = &summaries[0];
    assert!(s.ports_scanned > 0 && s.ports_scanned < 200, "scanned {}", s.ports_scanned);
    assert_eq!(s.open_ports, s.results.len() as u64);
    assert!(s.results.iter().all(ScanResult::is_open));
}

#[tokio::test]
async fn scan_target_trims_and_rejects_blank_host() {
    let open = greeting_listener(b"HELLO").await;
    let cfg = local(vec![open]);

    let s = scanner::scan_target("  127.0.0.1 ", &cfg, CancellationToken::new(), None)
        .await
        .unwrap();
    assert_eq!(s.target, "127.0.0.1");
    assert_eq!(s.open_ports, 1);

    let err = scanner::scan_target("   ", &cfg, CancellationToken::new(), None)
        .await
        .unwrap_err();
    assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::EmptyTarget));
}

#[tokio::test]
async fn progress_tracks_current_target_index() {
    let cfg = ScanConfig::new(["127.0.0.1", "127.0.0.1", "127.0.0.1"])
        .with_ports(vec![closed_port().await])
        .with_timeout(Duration::from_secs(2));
    let progress = SharedProgress::new();

    let mut indexes = Vec::new();
    let observed = progress.clone();
    scanner::scan_targets_each(&cfg, CancellationToken::new(), Some(progress), |_| {
        indexes.push(observed.target_index())
    })
    .await
    .unwrap();
    assert_eq!(indexes, vec![0, 1, 2]);
}
