//! Field validators applied when an entity field is assigned.
//!
//! Every validator returns the accepted value or an
//! [`Error::Validation`] naming the field, so setters can validate first
//! and only then store.

use crate::config::{AgentConfig, Bounds};
use crate::{Error, Result};
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("hostname pattern is valid")
});

/// Networks an agent may never report as its address.
const EXCLUDED_NETWORKS: [(Ipv4Addr, u8, &str); 6] = [
    (Ipv4Addr::new(0, 0, 0, 0), 8, "unspecified"),
    (Ipv4Addr::new(127, 0, 0, 0), 8, "loopback"),
    (Ipv4Addr::new(169, 254, 0, 0), 16, "link-local"),
    (Ipv4Addr::new(224, 0, 0, 0), 4, "multicast"),
    (Ipv4Addr::new(240, 0, 0, 0), 4, "reserved"),
    (Ipv4Addr::new(255, 255, 255, 255), 32, "broadcast"),
];

/// Resource limits for agents, built from validated configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentLimits {
    pub port: Bounds<i64>,
    pub cpus: Bounds<i64>,
    pub ram: Bounds<i64>,
}

impl AgentLimits {
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        config.port.check("agent.port")?;
        config.cpus.check("agent.cpus")?;
        config.ram.check("agent.ram")?;
        Ok(Self {
            port: config.port,
            cpus: config.cpus,
            ram: config.ram,
        })
    }
}

impl Default for AgentLimits {
    fn default() -> Self {
        let config = AgentConfig::default();
        Self {
            port: config.port,
            cpus: config.cpus,
            ram: config.ram,
        }
    }
}

pub fn validate_hostname(value: &str) -> Result<String> {
    if value.is_empty() {
        return Err(Error::validation("hostname", "must not be empty"));
    }
    if !HOSTNAME.is_match(value) {
        return Err(Error::validation(
            "hostname",
            format!("{value:?} is not a valid hostname"),
        ));
    }
    Ok(value.to_string())
}

/// Parse a dotted-quad address and reject unroutable ranges.
pub fn validate_ip(field: &'static str, value: &str) -> Result<Ipv4Addr> {
    let addr: Ipv4Addr = value
        .parse()
        .map_err(|_| Error::validation(field, format!("{value:?} is not an IPv4 address")))?;
    check_ip(field, addr)
}

/// Reject an already parsed address that falls in an unroutable range.
pub fn check_ip(field: &'static str, addr: Ipv4Addr) -> Result<Ipv4Addr> {
    if let Some(kind) = excluded_network(addr) {
        return Err(Error::validation(
            field,
            format!("{addr} is a {kind} address"),
        ));
    }
    Ok(addr)
}

fn excluded_network(addr: Ipv4Addr) -> Option<&'static str> {
    let bits = u32::from(addr);
    EXCLUDED_NETWORKS
        .iter()
        .find(|(network, prefix, _)| {
            let mask = u32::MAX.checked_shl(32 - u32::from(*prefix)).unwrap_or(0);
            bits & mask == u32::from(*network) & mask
        })
        .map(|(_, _, kind)| *kind)
}

pub fn validate_range(field: &'static str, value: i64, bounds: &Bounds<i64>) -> Result<i64> {
    if bounds.contains(value) {
        return Ok(value);
    }
    Err(Error::validation(
        field,
        format!("{value} is not between {} and {}", bounds.min, bounds.max),
    ))
}

/// Allocation fractions live in `0..=1`.
pub fn validate_fraction(field: &'static str, value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        return Ok(value);
    }
    Err(Error::validation(
        field,
        format!("{value} is not between 0 and 1"),
    ))
}
