use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use port_sweep::config::{ScanConfig, DEFAULT_END_PORT, DEFAULT_START_PORT, DEFAULT_WORKERS};
use port_sweep::ports;
use port_sweep::scanner::{self, SharedProgress};
use port_sweep::{output, targets};

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// port-sweep — concurrent TCP connect prober with best-effort banner capture.
#[derive(Debug, Clone, Parser)]
#[command(name = "port-sweep", version, about, long_about = None)]
struct Cli {
    /// Comma separated hosts, IPs or IPv4 CIDR blocks.
    #[arg(long, default_value = "scanme.nmap.org")]
    targets: String,

    /// First port of the range (ignored when explicit ports are given).
    #[arg(long = "start-port", default_value_t = DEFAULT_START_PORT)]
    start_port: u16,

    /// Last port of the range, inclusive.
    #[arg(long = "end-port", default_value_t = DEFAULT_END_PORT)]
    end_port: u16,

    /// Comma separated explicit ports or ranges, e.g. `22,80,8000-8010`.
    #[arg(long)]
    ports: Option<String>,

    /// File with one port or range per line; `#` starts a comment.
    #[arg(long = "ports-file")]
    ports_file: Option<PathBuf>,

    /// Number of concurrent workers.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Connect and banner read timeout in seconds.
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Print each summary as JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Also write all summaries as a pretty JSON array to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// More log output (debug).
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = build_config(&cli)?;
    config.validate()?;

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    let progress = SharedProgress::new();
    let ticker = (!cli.json).then(|| spawn_ticker(&config, progress.clone(), cancel.clone()));

    let json = cli.json;
    let result = scanner::scan_targets_each(&config, cancel.clone(), Some(progress), |summary| {
        if json {
            match output::render_json(summary) {
                Ok(doc) => println!("{doc}"),
                Err(e) => error!("{e:#}"),
            }
        } else {
            eprintln!();
            print!("{}", output::render_text(summary));
        }
    })
    .await;

    if let Some(t) = ticker {
        t.abort();
    }
    let summaries = result?;

    if let Some(path) = cli.output.as_deref() {
        output::write_json(path, &summaries)?;
        info!(path = %path.display(), "wrote JSON results");
    }
    Ok(())
}

fn init_logging(cli: &Cli) {
    let default = if cli.verbose {
        "port_sweep=debug"
    } else if cli.quiet {
        "port_sweep=warn"
    } else {
        "port_sweep=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_config(cli: &Cli) -> Result<ScanConfig> {
    let explicit_ports =
        ports::collect_explicit_ports(cli.ports.as_deref(), cli.ports_file.as_deref())?;

    Ok(ScanConfig {
        targets: targets::parse_targets(&cli.targets)?,
        start_port: cli.start_port,
        end_port: cli.end_port,
        explicit_ports,
        workers: cli.workers,
        timeout: Duration::from_secs(cli.timeout),
    })
}

/// `\rScanning <target>: done/total` on stderr until aborted.
fn spawn_ticker(
    config: &ScanConfig,
    progress: SharedProgress,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let per_target = config.port_spec().len();
    let targets = config.targets.clone();
    tokio::spawn(async move {
        let total_all = per_target * targets.len() as u64;
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let completed = progress.completed();
                    let idx = progress.target_index().min(targets.len().saturating_sub(1));
                    let done = completed.saturating_sub(per_target * idx as u64).min(per_target);
                    eprint!("\rScanning {}: {done}/{per_target}...", targets[idx].trim());
                    let _ = std::io::stderr().flush();
                    if completed >= total_all {
                        break;
                    }
                }
            }
        }
    })
}
