//! Frontend desired state and observed state.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validation::{self, ValidationError};

/// Remote-assigned frontend identifier.
pub type FrontendId = i64;

/// A single listening port or an inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortSpec {
    Single(u16),
    Range(u16, u16),
}

impl PortSpec {
    pub fn start(&self) -> u16 {
        match self {
            PortSpec::Single(p) => *p,
            PortSpec::Range(lo, _) => *lo,
        }
    }

    pub fn end(&self) -> u16 {
        match self {
            PortSpec::Single(p) => *p,
            PortSpec::Range(_, hi) => *hi,
        }
    }
}

impl Ord for PortSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.start(), self.end()).cmp(&(other.start(), other.end()))
    }
}

impl PartialOrd for PortSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn parse_port(s: &str) -> Result<u16, ValidationError> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(ValidationError::InvalidPort(s.to_string())),
        Ok(p) => Ok(p),
    }
}

impl FromStr for PortSpec {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('-') {
            Some((lo, hi)) => {
                let range_err = |_| ValidationError::InvalidPortRange(s.to_string());
                let lo = parse_port(lo).map_err(range_err)?;
                let hi = parse_port(hi).map_err(range_err)?;
                match lo.cmp(&hi) {
                    Ordering::Less => Ok(PortSpec::Range(lo, hi)),
                    Ordering::Equal => Ok(PortSpec::Single(lo)),
                    Ordering::Greater => Err(ValidationError::InvalidPortRange(s.to_string())),
                }
            }
            None => parse_port(s).map(PortSpec::Single),
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Single(p) => write!(f, "{}", p),
            PortSpec::Range(lo, hi) => write!(f, "{}-{}", lo, hi),
        }
    }
}

/// Ordered set of port specifications.
///
/// Declared order is kept for the wire form (`"22280,22443"`); comparisons go
/// through [`PortList::normalized`] because the remote may reorder entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PortList(Vec<PortSpec>);

impl PortList {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if s.trim().is_empty() {
            return Err(ValidationError::PortRequired);
        }
        let mut ports: Vec<PortSpec> = Vec::new();
        for part in s.split(',') {
            let spec: PortSpec = part.parse()?;
            if !ports.contains(&spec) {
                ports.push(spec);
            }
        }
        Ok(Self(ports))
    }

    /// Comma-joined wire form.
    pub fn to_wire(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Order-insensitive form used for drift comparison.
    pub fn normalized(&self) -> BTreeSet<PortSpec> {
        self.0.iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortSpec> {
        self.0.iter()
    }
}

impl FromStr for PortList {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PortList::parse(s)
    }
}

impl TryFrom<String> for PortList {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        PortList::parse(&s)
    }
}

impl From<PortList> for String {
    fn from(p: PortList) -> Self {
        p.to_wire()
    }
}

impl fmt::Display for PortList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Desired state of an HTTP frontend, as declared by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendSpec {
    /// Parent load-balancer service. Immutable after creation.
    pub service_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub zone: String,
    pub port: PortList,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub hsts: bool,
    /// Client CIDRs allowed to connect. Empty means no restriction.
    #[serde(default)]
    pub allowed_source: Vec<String>,
    /// Failover IPs the frontend listens on.
    #[serde(default)]
    pub dedicated_ipfo: Vec<String>,
    /// Header injection templates; placeholders are resolved remotely.
    #[serde(default)]
    pub http_header: Vec<String>,
    /// Weak reference to the default farm.
    #[serde(default)]
    pub default_farm_id: Option<i64>,
    #[serde(default)]
    pub default_ssl_id: Option<i64>,
    #[serde(default)]
    pub redirect_location: Option<String>,
}

impl FrontendSpec {
    pub fn new(service_name: impl Into<String>, zone: impl Into<String>, port: PortList) -> Self {
        Self {
            service_name: service_name.into(),
            zone: zone.into(),
            port,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.service_name.trim().is_empty() {
            return Err(ValidationError::ServiceNameRequired);
        }
        if self.zone.trim().is_empty() {
            return Err(ValidationError::ZoneRequired);
        }
        if self.port.is_empty() {
            return Err(ValidationError::PortRequired);
        }
        validation::canonical_cidr_set("allowed_source", &self.allowed_source)?;
        validation::canonical_cidr_set("dedicated_ipfo", &self.dedicated_ipfo)?;
        if self.hsts && !self.ssl {
            return Err(ValidationError::HstsWithoutSsl);
        }
        Ok(())
    }
}

/// Observed remote state of an HTTP frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendState {
    pub id: FrontendId,
    pub service_name: String,
    pub display_name: Option<String>,
    pub zone: String,
    pub port: PortList,
    pub ssl: bool,
    pub disabled: bool,
    pub hsts: bool,
    pub allowed_source: Vec<String>,
    pub dedicated_ipfo: Vec<String>,
    pub http_header: Vec<String>,
    pub default_farm_id: Option<i64>,
    pub default_ssl_id: Option<i64>,
    pub redirect_location: Option<String>,
}

impl FrontendState {
    /// The attribute set that would reproduce this state.
    pub fn to_spec(&self) -> FrontendSpec {
        FrontendSpec {
            service_name: self.service_name.clone(),
            display_name: self.display_name.clone(),
            zone: self.zone.clone(),
            port: self.port.clone(),
            ssl: self.ssl,
            disabled: self.disabled,
            hsts: self.hsts,
            allowed_source: self.allowed_source.clone(),
            dedicated_ipfo: self.dedicated_ipfo.clone(),
            http_header: self.http_header.clone(),
            default_farm_id: self.default_farm_id,
            default_ssl_id: self.default_ssl_id,
            redirect_location: self.redirect_location.clone(),
        }
    }

    /// Ownership test for the sweeper. A blank prefix owns nothing.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        !prefix.trim().is_empty()
            && self
                .display_name
                .as_deref()
                .is_some_and(|name| name.starts_with(prefix))
    }
}
