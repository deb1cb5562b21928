//! In-memory store behind the fake API.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Zones accepted on create and update.
pub const ZONES: &[&str] = &["all", "gra", "rbx", "sbg", "bhs"];

/// Stored frontend, serialized as the remote returns it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frontend {
    pub frontend_id: i64,
    pub display_name: Option<String>,
    pub zone: String,
    pub port: String,
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

/// POST and PUT body. Anything missing is reset to its default.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrontendInput {
    pub display_name: Option<String>,
    pub zone: String,
    pub port: String,
    pub ssl: bool,
    pub disabled: bool,
    pub hsts: bool,
    pub allowed_source: Option<Vec<String>>,
    pub dedicated_ipfo: Option<Vec<String>>,
    pub http_header: Option<Vec<String>>,
    pub default_farm_id: Option<i64>,
    pub default_ssl_id: Option<i64>,
    pub redirect_location: Option<String>,
}

/// Failure returned by the store, rendered as `{"message", "class"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct MockError {
    pub status: StatusCode,
    pub message: String,
}

impl MockError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn class(&self) -> &'static str {
        match self.status {
            StatusCode::NOT_FOUND => "Client::NotFound",
            StatusCode::CONFLICT => "Client::Conflict::AlreadyExists",
            StatusCode::UNAUTHORIZED => "Client::Unauthorized",
            StatusCode::FORBIDDEN => "Client::Forbidden",
            StatusCode::TOO_MANY_REQUESTS => "Client::TooManyRequests",
            s if s.is_client_error() => "Client::BadRequest",
            _ => "Server::InternalServerError",
        }
    }
}

/// A queued failure for matching requests.
#[derive(Debug, Clone)]
struct Fault {
    method: Method,
    path: Option<String>,
    status: StatusCode,
    remaining: u32,
}

#[derive(Default)]
struct Inner {
    services: BTreeMap<String, BTreeMap<i64, Frontend>>,
    next_id: i64,
    faults: Vec<Fault>,
    dropped: BTreeSet<String>,
    requests: u64,
}

/// Shared handle to the fake remote.
#[derive(Clone, Default)]
pub struct MockState {
    inner: Arc<RwLock<Inner>>,
}

fn canonical_ports(port: &str) -> Result<String, MockError> {
    let invalid = || MockError::bad_request(format!("Invalid port specification: {}", port));
    if port.trim().is_empty() {
        return Err(invalid());
    }

    let parse = |s: &str| match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(invalid()),
        Ok(p) => Ok(p),
    };

    let mut ranges = BTreeSet::new();
    for part in port.split(',') {
        let range = match part.split_once('-') {
            Some((lo, hi)) => (parse(lo)?, parse(hi)?),
            None => {
                let p = parse(part)?;
                (p, p)
            }
        };
        if range.0 > range.1 {
            return Err(invalid());
        }
        ranges.insert(range);
    }

    Ok(ranges
        .into_iter()
        .map(|(lo, hi)| {
            if lo == hi {
                lo.to_string()
            } else {
                format!("{}-{}", lo, hi)
            }
        })
        .collect::<Vec<_>>()
        .join(","))
}

fn canonical_cidrs(field: &str, values: Option<Vec<String>>) -> Result<Vec<String>, MockError> {
    values
        .unwrap_or_default()
        .iter()
        .map(|v| {
            let v = v.trim();
            v.parse::<IpNet>()
                .or_else(|_| v.parse::<IpAddr>().map(IpNet::from))
                .map(|net| net.trunc().to_string())
                .map_err(|_| MockError::bad_request(format!("Invalid {}: {}", field, v)))
        })
        .collect()
}

impl Inner {
    fn frontends(&self, service: &str) -> Result<&BTreeMap<i64, Frontend>, MockError> {
        self.services.get(service).ok_or_else(|| {
            MockError::new(
                StatusCode::NOT_FOUND,
                format!("The requested object (serviceName = {}) does not exist", service),
            )
        })
    }

    fn frontends_mut(&mut self, service: &str) -> Result<&mut BTreeMap<i64, Frontend>, MockError> {
        self.services.get_mut(service).ok_or_else(|| {
            MockError::new(
                StatusCode::NOT_FOUND,
                format!("The requested object (serviceName = {}) does not exist", service),
            )
        })
    }

    /// Validate and canonicalize an input into a stored frontend.
    fn build(&self, id: i64, input: FrontendInput) -> Result<Frontend, MockError> {
        if !ZONES.contains(&input.zone.as_str()) {
            return Err(MockError::bad_request(format!("Invalid zone: {}", input.zone)));
        }
        if input.hsts && !input.ssl {
            return Err(MockError::bad_request("HSTS requires SSL"));
        }

        let mut frontend = Frontend {
            frontend_id: id,
            display_name: input.display_name,
            zone: input.zone,
            port: canonical_ports(&input.port)?,
            ssl: input.ssl,
            disabled: input.disabled,
            hsts: input.hsts,
            allowed_source: canonical_cidrs("allowedSource", input.allowed_source)?,
            dedicated_ipfo: canonical_cidrs("dedicatedIpfo", input.dedicated_ipfo)?,
            http_header: input.http_header.unwrap_or_default(),
            default_farm_id: input.default_farm_id,
            default_ssl_id: input.default_ssl_id,
            redirect_location: input.redirect_location,
        };

        for field in &self.dropped {
            match field.as_str() {
                "displayName" => frontend.display_name = None,
                "ssl" => frontend.ssl = false,
                "disabled" => frontend.disabled = false,
                "hsts" => frontend.hsts = false,
                "allowedSource" => frontend.allowed_source.clear(),
                "dedicatedIpfo" => frontend.dedicated_ipfo.clear(),
                "httpHeader" => frontend.http_header.clear(),
                "defaultFarmId" => frontend.default_farm_id = None,
                "defaultSslId" => frontend.default_ssl_id = None,
                "redirectLocation" => frontend.redirect_location = None,
                _ => {}
            }
        }
        Ok(frontend)
    }

    fn check_duplicate(&self, service: &str, candidate: &Frontend) -> Result<(), MockError> {
        let clash = self.frontends(service)?.values().any(|f| {
            f.frontend_id != candidate.frontend_id
                && f.zone == candidate.zone
                && f.port == candidate.port
        });
        if clash {
            return Err(MockError::new(
                StatusCode::CONFLICT,
                format!(
                    "A frontend already listens on port {} in zone {}",
                    candidate.port, candidate.zone
                ),
            ));
        }
        Ok(())
    }
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State with the given services already provisioned.
    pub async fn with_services<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = Self::new();
        for service in services {
            state.add_service(service).await;
        }
        state
    }

    pub async fn add_service(&self, service: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.services.entry(service.into()).or_default();
    }

    /// Fail the next `count` requests with `method` with `status`.
    pub async fn fail_next(&self, method: Method, status: u16, count: u32) {
        self.push_fault(method, None, status, count).await;
    }

    /// Like [`MockState::fail_next`], restricted to one request path.
    pub async fn fail_path(&self, method: Method, path: impl Into<String>, status: u16, count: u32) {
        self.push_fault(method, Some(path.into()), status, count).await;
    }

    async fn push_fault(&self, method: Method, path: Option<String>, status: u16, count: u32) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut inner = self.inner.write().await;
        inner.faults.push(Fault {
            method,
            path,
            status,
            remaining: count,
        });
    }

    /// Accept the wire field but never store it, like a remote that ignores it.
    pub async fn drop_field(&self, field: impl Into<String>) {
        let mut inner = self.inner.write().await;
        inner.dropped.insert(field.into());
    }

    /// Number of requests received so far, injected failures included.
    pub async fn request_count(&self) -> u64 {
        self.inner.read().await.requests
    }

    /// Count the request and return the injected failure for it, if any.
    pub async fn record_request(&self, method: &Method, path: &str) -> Option<MockError> {
        let mut inner = self.inner.write().await;
        inner.requests += 1;

        let fault = inner.faults.iter_mut().find(|f| {
            f.remaining > 0 && f.method == *method && f.path.as_deref().is_none_or(|p| p == path)
        })?;
        fault.remaining -= 1;
        Some(MockError::new(
            fault.status,
            format!("Injected failure for {} {}", method, path),
        ))
    }

    pub async fn list(&self, service: &str) -> Result<Vec<i64>, MockError> {
        let inner = self.inner.read().await;
        Ok(inner.frontends(service)?.keys().copied().collect())
    }

    pub async fn get(&self, service: &str, id: i64) -> Result<Frontend, MockError> {
        let inner = self.inner.read().await;
        inner.frontends(service)?.get(&id).cloned().ok_or_else(|| {
            MockError::new(
                StatusCode::NOT_FOUND,
                format!("The requested object (frontendId = {}) does not exist", id),
            )
        })
    }

    pub async fn create(&self, service: &str, input: FrontendInput) -> Result<Frontend, MockError> {
        let mut inner = self.inner.write().await;
        inner.frontends(service)?;

        let id = inner.next_id + 1;
        let frontend = inner.build(id, input)?;
        inner.check_duplicate(service, &frontend)?;

        inner.next_id = id;
        inner
            .frontends_mut(service)?
            .insert(id, frontend.clone());
        Ok(frontend)
    }

    pub async fn replace(
        &self,
        service: &str,
        id: i64,
        input: FrontendInput,
    ) -> Result<(), MockError> {
        let mut inner = self.inner.write().await;
        if !inner.frontends(service)?.contains_key(&id) {
            return Err(MockError::new(
                StatusCode::NOT_FOUND,
                format!("The requested object (frontendId = {}) does not exist", id),
            ));
        }

        let frontend = inner.build(id, input)?;
        inner.check_duplicate(service, &frontend)?;
        inner.frontends_mut(service)?.insert(id, frontend);
        Ok(())
    }

    pub async fn delete(&self, service: &str, id: i64) -> Result<(), MockError> {
        let mut inner = self.inner.write().await;
        inner.frontends_mut(service)?.remove(&id).map(|_| ()).ok_or_else(|| {
            MockError::new(
                StatusCode::NOT_FOUND,
                format!("The requested object (frontendId = {}) does not exist", id),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(zone: &str, port: &str) -> FrontendInput {
        FrontendInput {
            zone: zone.to_string(),
            port: port.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_canonical_ports_sorts_and_dedupes() {
        assert_eq!(canonical_ports("22443,22280").unwrap(), "22280,22443");
        assert_eq!(canonical_ports("80,80,8000-8010").unwrap(), "80,8000-8010");
        assert!(canonical_ports("90-80").is_err());
        assert!(canonical_ports("http").is_err());
        assert!(canonical_ports("").is_err());
    }

    #[test]
    fn test_canonical_cidrs_adds_prefix() {
        let out = canonical_cidrs("allowedSource", Some(vec!["8.8.8.8".to_string()])).unwrap();
        assert_eq!(out, vec!["8.8.8.8/32".to_string()]);
        assert!(canonical_cidrs("allowedSource", Some(vec!["x".to_string()])).is_err());
    }

    #[tokio::test]
    async fn test_ids_increase_monotonically() {
        let state = MockState::with_services(["lb-1"]).await;
        let a = state.create("lb-1", input("all", "80")).await.unwrap();
        state.delete("lb-1", a.frontend_id).await.unwrap();
        let b = state.create("lb-1", input("all", "80")).await.unwrap();
        assert!(b.frontend_id > a.frontend_id);
    }

    #[tokio::test]
    async fn test_duplicate_zone_and_port_conflicts() {
        let state = MockState::with_services(["lb-1"]).await;
        state.create("lb-1", input("all", "80")).await.unwrap();
        let err = state.create("lb-1", input("all", "80")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);

        state.create("lb-1", input("gra", "80")).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_service_and_zone() {
        let state = MockState::with_services(["lb-1"]).await;
        let err = state.create("lb-9", input("all", "80")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = state.create("lb-1", input("mars", "80")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.class(), "Client::BadRequest");
    }

    #[tokio::test]
    async fn test_faults_are_consumed_in_order() {
        let state = MockState::new();
        state.fail_next(Method::DELETE, 503, 2).await;

        assert!(state.record_request(&Method::GET, "/x").await.is_none());
        for _ in 0..2 {
            let err = state.record_request(&Method::DELETE, "/x").await.unwrap();
            assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        }
        assert!(state.record_request(&Method::DELETE, "/x").await.is_none());
        assert_eq!(state.request_count().await, 4);
    }

    #[tokio::test]
    async fn test_path_fault_only_matches_its_path() {
        let state = MockState::new();
        state.fail_path(Method::GET, "/a", 500, 1).await;

        assert!(state.record_request(&Method::GET, "/b").await.is_none());
        assert!(state.record_request(&Method::GET, "/a").await.is_some());
    }

    #[tokio::test]
    async fn test_dropped_field_is_not_stored() {
        let state = MockState::with_services(["lb-1"]).await;
        state.drop_field("allowedSource").await;

        let mut req = input("all", "80");
        req.allowed_source = Some(vec!["8.8.8.8/32".to_string()]);
        let created = state.create("lb-1", req).await.unwrap();
        assert!(created.allowed_source.is_empty());
    }
}
