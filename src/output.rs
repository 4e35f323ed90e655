use crate::types::ScanSummary;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;

const BANNER_WIDTH: usize = 60;

/// Human readable block for one target.
pub fn render_text(summary: &ScanSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nScan Summary:");
    let _ = writeln!(out, "Target: {}", summary.target);
    if let (Some(start), Some(end)) = (summary.start_port, summary.end_port) {
        let _ = writeln!(out, "Port range: {start}-{end}");
    }
    let _ = writeln!(out, "Ports scanned: {}", summary.ports_scanned);
    let _ = writeln!(out, "Open ports: {}", summary.open_ports);
    let _ = writeln!(out, "Time taken: {:?}", summary.time_taken);

    if summary.results.is_empty() {
        return out;
    }

    let port_w = summary
        .results
        .iter()
        .map(|r| r.port.to_string().len())
        .max()
        .unwrap_or(0)
        .max("port".len());
    let _ = writeln!(out, "\nOpen Ports:");
    let _ = writeln!(out, "  {:>port_w$}  banner", "port");
    let _ = writeln!(out, "  {:-<port_w$}  {:-<6}", "", "");
    for r in &summary.results {
        let banner = banner_snippet(r.banner.as_deref().unwrap_or(""));
        let _ = writeln!(out, "  {:>port_w$}  {}", r.port, banner);
    }
    out
}

/// Pretty JSON document for one target.
pub fn render_json(summary: &ScanSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize scan summary")
}

/// Write every summary as one pretty JSON array.
pub fn write_json(path: &Path, summaries: &[ScanSummary]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create output file: {}", path.display()))?;
    serde_json::to_writer_pretty(file, summaries)
        .with_context(|| format!("failed to write JSON to {}", path.display()))?;
    Ok(())
}

fn banner_snippet(banner: &str) -> String {
    let escaped = banner.replace('\n', "\\n").replace('\r', "\\r");
    if escaped.chars().count() > BANNER_WIDTH {
        escaped.chars().take(BANNER_WIDTH).collect()
    } else {
        escaped
    }
}
