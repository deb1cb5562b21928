//! Local validation of frontend attributes.
//!
//! Checks run before any remote call so obviously broken specs never reach the
//! API. The remote still has the last word (e.g. on zone names).

use std::collections::BTreeSet;
use std::net::IpAddr;

use ipnet::IpNet;
use thiserror::Error;

/// Validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Service name is required")]
    ServiceNameRequired,

    #[error("Zone is required")]
    ZoneRequired,

    #[error("At least one port is required")]
    PortRequired,

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid port range: {0}")]
    InvalidPortRange(String),

    #[error("Invalid CIDR in {field}: {value}")]
    InvalidCidr { field: &'static str, value: String },

    #[error("HSTS requires SSL to be enabled")]
    HstsWithoutSsl,

    #[error("Service name cannot change from '{current}' to '{requested}'")]
    ServiceNameImmutable { current: String, requested: String },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Parse an address or CIDR into its canonical network form.
///
/// Bare addresses become host routes (`/32`, `/128`) and host bits are cleared,
/// so `8.8.8.8` and `8.8.8.8/32` compare equal.
pub fn canonical_cidr(field: &'static str, value: &str) -> Result<IpNet> {
    let trimmed = value.trim();
    let net = match trimmed.parse::<IpNet>() {
        Ok(net) => net,
        Err(_) => trimmed
            .parse::<IpAddr>()
            .map(IpNet::from)
            .map_err(|_| ValidationError::InvalidCidr {
                field,
                value: value.to_string(),
            })?,
    };
    Ok(net.trunc())
}

/// Canonicalize a list of CIDRs into a set.
pub fn canonical_cidr_set(field: &'static str, values: &[String]) -> Result<BTreeSet<IpNet>> {
    values.iter().map(|v| canonical_cidr(field, v)).collect()
}
