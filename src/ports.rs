use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Ports parsed from user input, plus the entries that were skipped.
///
/// Duplicates are kept: every listed port is dispatched as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortList {
    pub ports: Vec<u16>,
    pub rejected: Vec<String>,
}

impl PortList {
    pub fn extend(&mut self, other: PortList) {
        self.ports.extend(other.ports);
        self.rejected.extend(other.rejected);
    }
}

/// Parse a comma separated port list such as `"22, 80, 8000-8002"`.
///
/// Malformed entries are logged and skipped individually; the rest still parse.
pub fn parse_port_list(s: &str) -> PortList {
    let mut out = PortList::default();
    for raw in s.split(',') {
        let entry = raw.trim();
        if entry.is_empty() {
            continue;
        }
        parse_entry(entry, &mut out);
    }
    out
}

/// Parse ports file content.
///
/// Supported formats per line:
/// - single port number: `80`
/// - inclusive range: `8000-8010`
/// - several entries separated by commas
/// - comments: everything after `#` is ignored
/// - whitespace and blank lines are ignored
pub fn parse_ports_str(s: &str) -> PortList {
    let mut out = PortList::default();
    for raw_line in s.lines() {
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }
        out.extend(parse_port_list(line));
    }
    out
}

/// Load a ports list from a file path. Errors only if the file cannot be read.
pub fn load_ports_from_path(path: impl AsRef<Path>) -> Result<PortList> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read ports file: {}", path.as_ref().display()))?;
    Ok(parse_ports_str(&content))
}

/// Combine the `--ports` list and the ports file, in that order.
///
/// Returns an empty list when neither was given (range mode). Errors when ports were
/// supplied but every entry was rejected, instead of silently falling back to the range.
pub fn collect_explicit_ports(list: Option<&str>, file: Option<&Path>) -> Result<Vec<u16>> {
    let mut explicit = PortList::default();
    if let Some(list) = list {
        explicit.extend(parse_port_list(list));
    }
    if let Some(path) = file {
        explicit.extend(load_ports_from_path(path)?);
    }
    let supplied = list.is_some() || file.is_some();
    if supplied && explicit.ports.is_empty() {
        bail!(
            "no valid ports in the supplied port list (rejected: {})",
            explicit.rejected.join(", ")
        );
    }
    Ok(explicit.ports)
}

fn parse_entry(entry: &str, out: &mut PortList) {
    let parsed = match entry.split_once('-') {
        Some((a, b)) => parse_range(a.trim(), b.trim()),
        None => parse_port_str(entry).map(|p| vec![p]),
    };
    match parsed {
        Ok(ports) => out.ports.extend(ports),
        Err(e) => {
            warn!(entry, error = %e, "skipping invalid port entry");
            out.rejected.push(entry.to_string());
        }
    }
}

fn parse_range(a: &str, b: &str) -> Result<Vec<u16>> {
    let start = parse_port_str(a).with_context(|| format!("invalid start in range: {a}"))?;
    let end = parse_port_str(b).with_context(|| format!("invalid end in range: {b}"))?;
    if start > end {
        bail!("invalid range {start}-{end} (start > end)");
    }
    Ok((start..=end).collect())
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
