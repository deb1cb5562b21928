//! JSON documents exchanged with `/ipLoadbalancing/{service}/http/frontend`.

use serde::{Deserialize, Serialize};

use crate::model::{FrontendId, FrontendSpec, FrontendState, PortList};
use crate::validation::ValidationError;

/// Request body for POST and PUT.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub zone: String,
    pub port: String,
    pub ssl: bool,
    pub disabled: bool,
    pub hsts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_source: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedicated_ipfo: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_header: Option<Vec<String>>,
    pub default_farm_id: Option<i64>,
    pub default_ssl_id: Option<i64>,
    pub redirect_location: Option<String>,
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

impl FrontendBody {
    /// Body for POST: empty collections are omitted so remote defaults apply.
    pub fn for_create(spec: &FrontendSpec) -> Self {
        Self {
            display_name: spec.display_name.clone(),
            zone: spec.zone.clone(),
            port: spec.port.to_wire(),
            ssl: spec.ssl,
            disabled: spec.disabled,
            hsts: spec.hsts,
            allowed_source: non_empty(&spec.allowed_source),
            dedicated_ipfo: non_empty(&spec.dedicated_ipfo),
            http_header: non_empty(&spec.http_header),
            default_farm_id: spec.default_farm_id,
            default_ssl_id: spec.default_ssl_id,
            redirect_location: spec.redirect_location.clone(),
        }
    }

    /// Body for PUT: the remote replaces the whole document, so every
    /// collection is sent, empty ones included, to clear previous values.
    pub fn for_update(spec: &FrontendSpec) -> Self {
        Self {
            allowed_source: Some(spec.allowed_source.clone()),
            dedicated_ipfo: Some(spec.dedicated_ipfo.clone()),
            http_header: Some(spec.http_header.clone()),
            ..Self::for_create(spec)
        }
    }
}

/// Frontend document returned by GET and POST.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendRecord {
    pub frontend_id: FrontendId,
    #[serde(default)]
    pub display_name: Option<String>,
    pub zone: String,
    pub port: String,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub hsts: bool,
    #[serde(default)]
    pub allowed_source: Option<Vec<String>>,
    #[serde(default)]
    pub dedicated_ipfo: Option<Vec<String>>,
    #[serde(default)]
    pub http_header: Option<Vec<String>>,
    #[serde(default)]
    pub default_farm_id: Option<i64>,
    #[serde(default)]
    pub default_ssl_id: Option<i64>,
    #[serde(default)]
    pub redirect_location: Option<String>,
}

impl FrontendRecord {
    /// Convert into local state. A missing collection means "no entries".
    pub fn into_state(self, service_name: &str) -> Result<FrontendState, ValidationError> {
        Ok(FrontendState {
            id: self.frontend_id,
            service_name: service_name.to_string(),
            display_name: self.display_name,
            zone: self.zone,
            port: PortList::parse(&self.port)?,
            ssl: self.ssl,
            disabled: self.disabled,
            hsts: self.hsts,
            allowed_source: self.allowed_source.unwrap_or_default(),
            dedicated_ipfo: self.dedicated_ipfo.unwrap_or_default(),
            http_header: self.http_header.unwrap_or_default(),
            default_farm_id: self.default_farm_id,
            default_ssl_id: self.default_ssl_id,
            redirect_location: self.redirect_location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn basic_spec() -> FrontendSpec {
        FrontendSpec {
            display_name: Some("tf-test-basic".to_string()),
            ssl: true,
            disabled: true,
            ..FrontendSpec::new("lb-1", "all", PortList::parse("22280").unwrap())
        }
    }

    #[test]
    fn test_create_body_omits_empty_collections() {
        let body = serde_json::to_value(FrontendBody::for_create(&basic_spec())).unwrap();
        assert_eq!(body["port"], "22280");
        assert_eq!(body["displayName"], "tf-test-basic");
        assert!(body.get("allowedSource").is_none());
        assert!(body.get("httpHeader").is_none());
        assert!(body.get("dedicatedIpfo").is_none());
    }

    #[test]
    fn test_create_body_keeps_non_empty_collections() {
        let mut spec = basic_spec();
        spec.allowed_source = vec!["8.8.8.8/32".to_string()];
        spec.http_header = vec!["X-Ip-Header %ci".to_string()];
        let body = serde_json::to_value(FrontendBody::for_create(&spec)).unwrap();
        assert_eq!(body["allowedSource"], json!(["8.8.8.8/32"]));
        assert_eq!(body["httpHeader"], json!(["X-Ip-Header %ci"]));
    }

    #[test]
    fn test_update_body_sends_empty_collections() {
        let body = serde_json::to_value(FrontendBody::for_update(&basic_spec())).unwrap();
        assert_eq!(body["allowedSource"], json!([]));
        assert_eq!(body["httpHeader"], json!([]));
        assert_eq!(body["dedicatedIpfo"], json!([]));
        assert!(body["defaultFarmId"].is_null());
    }

    #[test]
    fn test_record_into_state() {
        let record: FrontendRecord = serde_json::from_value(json!({
            "frontendId": 7,
            "displayName": "tf-test-basic",
            "zone": "all",
            "port": "22280,22443",
            "ssl": false,
            "disabled": false,
            "allowedSource": ["8.8.8.8/32"],
            "httpHeader": null,
            "defaultFarmId": 12
        }))
        .unwrap();

        let state = record.into_state("lb-1").unwrap();
        assert_eq!(state.id, 7);
        assert_eq!(state.service_name, "lb-1");
        assert_eq!(state.port.to_wire(), "22280,22443");
        assert_eq!(state.allowed_source, vec!["8.8.8.8/32".to_string()]);
        assert!(state.http_header.is_empty());
        assert_eq!(state.default_farm_id, Some(12));
    }

    #[test]
    fn test_record_with_bad_port_fails() {
        let record: FrontendRecord = serde_json::from_value(json!({
            "frontendId": 7,
            "zone": "all",
            "port": "eighty"
        }))
        .unwrap();
        assert!(record.into_state("lb-1").is_err());
    }
}
