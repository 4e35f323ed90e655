use anyhow::{bail, Context, Result};
use ipnet::{IpNet, Ipv4Net};
use std::net::{IpAddr, Ipv4Addr};

/// Smallest IPv4 prefix accepted for expansion (65534 hosts).
pub const MIN_CIDR_PREFIX: u8 = 16;

/// Split a comma separated target list and expand any CIDR blocks.
///
/// Hostnames and IP literals pass through untouched; `10.0.0.0/30` becomes its host
/// addresses. Blank entries are dropped. IPv6 blocks and IPv4 blocks wider than
/// `/MIN_CIDR_PREFIX` are rejected.
pub fn parse_targets(s: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for raw in s.split(',') {
        let t = raw.trim();
        if t.is_empty() {
            continue;
        }
        if t.contains('/') {
            let net: IpNet = t.parse().with_context(|| format!("invalid CIDR: {t}"))?;
            match net {
                IpNet::V6(_) => bail!("IPv6 CIDR blocks are not supported: {t}"),
                IpNet::V4(n4) if n4.prefix_len() < MIN_CIDR_PREFIX => {
                    bail!("CIDR block {t} is too large (smallest prefix is /{MIN_CIDR_PREFIX})")
                }
                IpNet::V4(_) => {}
            }
            out.extend(expand_cidr_to_ips(net).into_iter().map(|ip| ip.to_string()));
        } else {
            out.push(t.to_string());
        }
    }
    Ok(out)
}

/// Expand a CIDR into individual IP addresses suitable for host scanning.
///
/// For IPv4, excludes the network and broadcast addresses; /31 and /32 yield their
/// addresses as-is. IPv6 blocks are not expanded and return an empty list.
pub fn expand_cidr_to_ips(cidr: IpNet) -> Vec<IpAddr> {
    match cidr {
        IpNet::V4(n4) => expand_ipv4net_hosts(n4)
            .into_iter()
            .map(IpAddr::V4)
            .collect(),
        IpNet::V6(_) => Vec::new(),
    }
}

fn expand_ipv4net_hosts(net: Ipv4Net) -> Vec<Ipv4Addr> {
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    if net.prefix_len() >= 31 {
        return (start..=end).map(Ipv4Addr::from).collect();
    }
    (start + 1..end).map(Ipv4Addr::from).collect()
}
