//! Declared vs observed comparison after a write.
//!
//! Values are normalized before comparison so remote canonicalization (port
//! order, bare addresses turned into `/32`) is not reported as drift.

use std::collections::BTreeSet;
use std::fmt::Debug;

use crate::model::{FrontendSpec, FrontendState, PortSpec};
use crate::validation::canonical_cidr;

/// Which write produced the observed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    /// Empty collections were omitted from the POST body, so the remote may
    /// have filled in defaults for them.
    Create,
    /// Every field was sent and must match.
    Update,
}

/// One field whose observed value differs from the declared one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    pub field: &'static str,
    pub declared: String,
    pub observed: String,
}

/// Canonical strings for a CIDR list; entries that do not parse are kept
/// verbatim so they still compare unequal to anything valid.
fn cidr_set(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| match canonical_cidr("", v) {
            Ok(net) => net.to_string(),
            Err(_) => v.trim().to_string(),
        })
        .collect()
}

fn ports(set: &BTreeSet<PortSpec>) -> String {
    set.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

struct Checker {
    drifts: Vec<Drift>,
}

impl Checker {
    fn field<T: PartialEq + Debug>(&mut self, field: &'static str, declared: T, observed: T) {
        if declared != observed {
            self.drifts.push(Drift {
                field,
                declared: format!("{:?}", declared),
                observed: format!("{:?}", observed),
            });
        }
    }
}

/// Every field that drifted, in declaration order.
pub fn detect(spec: &FrontendSpec, state: &FrontendState, mode: VerifyMode) -> Vec<Drift> {
    let mut check = Checker { drifts: Vec::new() };
    let exempt = |values: &[String]| mode == VerifyMode::Create && values.is_empty();

    check.field("display_name", &spec.display_name, &state.display_name);
    check.field("zone", &spec.zone, &state.zone);

    let (declared, observed) = (spec.port.normalized(), state.port.normalized());
    if declared != observed {
        check.drifts.push(Drift {
            field: "port",
            declared: ports(&declared),
            observed: ports(&observed),
        });
    }

    check.field("ssl", spec.ssl, state.ssl);
    check.field("disabled", spec.disabled, state.disabled);
    check.field("hsts", spec.hsts, state.hsts);

    if !exempt(spec.allowed_source.as_slice()) {
        check.field(
            "allowed_source",
            cidr_set(&spec.allowed_source),
            cidr_set(&state.allowed_source),
        );
    }
    if !exempt(spec.dedicated_ipfo.as_slice()) {
        check.field(
            "dedicated_ipfo",
            cidr_set(&spec.dedicated_ipfo),
            cidr_set(&state.dedicated_ipfo),
        );
    }
    if !exempt(spec.http_header.as_slice()) {
        check.field("http_header", &spec.http_header, &state.http_header);
    }

    check.field("default_farm_id", spec.default_farm_id, state.default_farm_id);
    check.field("default_ssl_id", spec.default_ssl_id, state.default_ssl_id);
    check.field(
        "redirect_location",
        &spec.redirect_location,
        &state.redirect_location,
    );

    check.drifts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PortList;

    fn spec() -> FrontendSpec {
        FrontendSpec {
            display_name: Some("tf-test-update".to_string()),
            allowed_source: vec!["8.8.8.8/32".to_string()],
            http_header: vec![
                "X-Ip-Header %ci".to_string(),
                "X-Port-Header %cp".to_string(),
            ],
            ..FrontendSpec::new("lb-1", "all", PortList::parse("22280,22443").unwrap())
        }
    }

    fn observed(spec: &FrontendSpec) -> FrontendState {
        FrontendState {
            id: 1,
            service_name: spec.service_name.clone(),
            display_name: spec.display_name.clone(),
            zone: spec.zone.clone(),
            port: spec.port.clone(),
            ssl: spec.ssl,
            disabled: spec.disabled,
            hsts: spec.hsts,
            allowed_source: spec.allowed_source.clone(),
            dedicated_ipfo: spec.dedicated_ipfo.clone(),
            http_header: spec.http_header.clone(),
            default_farm_id: spec.default_farm_id,
            default_ssl_id: spec.default_ssl_id,
            redirect_location: spec.redirect_location.clone(),
        }
    }

    #[test]
    fn test_identical_state_has_no_drift() {
        let spec = spec();
        assert!(detect(&spec, &observed(&spec), VerifyMode::Update).is_empty());
    }

    #[test]
    fn test_remote_canonicalization_is_not_drift() {
        let spec = FrontendSpec {
            allowed_source: vec!["8.8.8.8".to_string()],
            ..spec()
        };
        let mut state = observed(&spec);
        state.port = PortList::parse("22443,22280").unwrap();
        state.allowed_source = vec!["8.8.8.8/32".to_string()];

        assert!(detect(&spec, &state, VerifyMode::Update).is_empty());
    }

    #[test]
    fn test_dropped_field_is_reported() {
        let spec = spec();
        let mut state = observed(&spec);
        state.allowed_source.clear();

        let drifts = detect(&spec, &state, VerifyMode::Update);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].field, "allowed_source");
        assert!(drifts[0].declared.contains("8.8.8.8/32"));
    }

    #[test]
    fn test_header_order_matters() {
        let spec = spec();
        let mut state = observed(&spec);
        state.http_header.reverse();

        let drifts = detect(&spec, &state, VerifyMode::Update);
        assert_eq!(drifts[0].field, "http_header");
    }

    #[test]
    fn test_create_exempts_omitted_collections() {
        let spec = FrontendSpec::new("lb-1", "all", PortList::parse("80").unwrap());
        let mut state = observed(&spec);
        state.allowed_source = vec!["0.0.0.0/0".to_string()];

        assert!(detect(&spec, &state, VerifyMode::Create).is_empty());
        assert_eq!(detect(&spec, &state, VerifyMode::Update).len(), 1);
    }

    #[test]
    fn test_port_drift_reports_sorted_sets() {
        let spec = spec();
        let mut state = observed(&spec);
        state.port = PortList::parse("22280").unwrap();

        let drifts = detect(&spec, &state, VerifyMode::Update);
        assert_eq!(
            drifts[0],
            Drift {
                field: "port",
                declared: "22280,22443".to_string(),
                observed: "22280".to_string(),
            }
        );
    }
}
