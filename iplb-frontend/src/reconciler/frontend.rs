//! HTTP frontend reconciler.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::Reconciler;
use super::drift::{self, VerifyMode};
use crate::client::ApiClient;
use crate::error::{FrontendError, Operation, Result, Target};
use crate::model::{FrontendId, FrontendSpec, FrontendState};
use crate::retry::{RetryConfig, RetryError, retry_with_budget};
use crate::validation::ValidationError;
use crate::wire::{FrontendBody, FrontendRecord};

/// Result of a delete that tolerates an already missing frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyDeleted,
}

fn collection_path(service: &str) -> String {
    format!("/ipLoadbalancing/{}/http/frontend", service)
}

fn frontend_path(service: &str, id: FrontendId) -> String {
    format!("/ipLoadbalancing/{}/http/frontend/{}", service, id)
}

fn decode<T: DeserializeOwned>(op: Operation, target: &Target, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| FrontendError::Decode {
        op,
        target: target.clone(),
        message: e.to_string(),
    })
}

fn to_body(op: Operation, target: &Target, body: &FrontendBody) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| FrontendError::Decode {
        op,
        target: target.clone(),
        message: e.to_string(),
    })
}

/// Reconciler for `/ipLoadbalancing/{service}/http/frontend`.
#[derive(Clone)]
pub struct FrontendReconciler {
    client: Arc<dyn ApiClient>,
}

impl FrontendReconciler {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self { client }
    }

    /// Ids of every frontend under `service`.
    pub async fn list(&self, service: &str) -> Result<Vec<FrontendId>> {
        let target = Target::service(service);
        let value = self
            .client
            .get(&collection_path(service))
            .await
            .map_err(|e| FrontendError::from_api(Operation::List, target.clone(), e))?;
        let ids: Vec<FrontendId> = decode(Operation::List, &target, value)?;
        debug!(service, count = ids.len(), "Listed frontends");
        Ok(ids)
    }

    /// Delete through the retry wrapper. A frontend that is already gone
    /// counts as deleted.
    pub async fn delete_with_retry(
        &self,
        service: &str,
        id: FrontendId,
        retry: &RetryConfig,
    ) -> std::result::Result<DeleteOutcome, RetryError<FrontendError>> {
        let name = format!("delete {}", Target::frontend(service, id));
        match retry_with_budget(retry, &name, || self.delete(service, id)).await {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(RetryError::Fatal(e)) if e.is_not_found() => {
                info!(service, frontend_id = id, "Frontend already deleted");
                Ok(DeleteOutcome::AlreadyDeleted)
            }
            Err(e) => Err(e),
        }
    }

    /// Read back after a write and fail on the first drifted field.
    async fn verify(
        &self,
        op: Operation,
        spec: &FrontendSpec,
        id: FrontendId,
        mode: VerifyMode,
    ) -> Result<FrontendState> {
        let state = self.fetch(op, &spec.service_name, id).await?;
        if let Some(d) = drift::detect(spec, &state, mode).into_iter().next() {
            warn!(
                service = %spec.service_name,
                frontend_id = id,
                field = d.field,
                declared = %d.declared,
                observed = %d.observed,
                "Frontend drifted after {}", op
            );
            return Err(FrontendError::Inconsistent {
                op,
                target: Target::frontend(&spec.service_name, id),
                field: d.field,
                declared: d.declared,
                observed: d.observed,
            });
        }
        Ok(state)
    }

    async fn fetch(&self, op: Operation, service: &str, id: FrontendId) -> Result<FrontendState> {
        let target = Target::frontend(service, id);
        let value = self
            .client
            .get(&frontend_path(service, id))
            .await
            .map_err(|e| FrontendError::from_api(op, target.clone(), e))?;
        let record: FrontendRecord = decode(op, &target, value)?;
        record
            .into_state(service)
            .map_err(|e| FrontendError::Decode {
                op,
                target,
                message: e.to_string(),
            })
    }
}

#[async_trait]
impl Reconciler for FrontendReconciler {
    type Spec = FrontendSpec;
    type State = FrontendState;
    type Id = FrontendId;

    async fn create(&self, spec: &FrontendSpec) -> Result<FrontendState> {
        let service = spec.service_name.as_str();
        let target = Target::service(service);
        spec.validate()
            .map_err(|e| FrontendError::invalid(Operation::Create, target.clone(), e))?;

        info!(service, port = %spec.port, zone = %spec.zone, "Creating frontend");

        let body = to_body(Operation::Create, &target, &FrontendBody::for_create(spec))?;
        let value = self
            .client
            .post(&collection_path(service), body)
            .await
            .map_err(|e| FrontendError::from_api(Operation::Create, target.clone(), e))?;
        let created: FrontendRecord = decode(Operation::Create, &target, value)?;
        let id = created.frontend_id;

        info!(service, frontend_id = id, "Frontend created");
        self.verify(Operation::Create, spec, id, VerifyMode::Create)
            .await
    }

    async fn read(&self, service: &str, id: FrontendId) -> Result<FrontendState> {
        debug!(service, frontend_id = id, "Reading frontend");
        self.fetch(Operation::Read, service, id).await
    }

    async fn update(
        &self,
        service: &str,
        id: FrontendId,
        spec: &FrontendSpec,
    ) -> Result<FrontendState> {
        let target = Target::frontend(service, id);
        spec.validate()
            .map_err(|e| FrontendError::invalid(Operation::Update, target.clone(), e))?;
        if spec.service_name != service {
            return Err(FrontendError::invalid(
                Operation::Update,
                target,
                ValidationError::ServiceNameImmutable {
                    current: service.to_string(),
                    requested: spec.service_name.clone(),
                },
            ));
        }

        let current = self.fetch(Operation::Update, service, id).await?;
        let drifted = drift::detect(spec, &current, VerifyMode::Update);
        if drifted.is_empty() {
            debug!(service, frontend_id = id, "Frontend already matches, replacing anyway");
        } else {
            let fields: Vec<&str> = drifted.iter().map(|d| d.field).collect();
            info!(service, frontend_id = id, ?fields, "Updating frontend");
        }

        let body = to_body(Operation::Update, &target, &FrontendBody::for_update(spec))?;
        self.client
            .put(&frontend_path(service, id), body)
            .await
            .map_err(|e| FrontendError::from_api(Operation::Update, target, e))?;

        self.verify(Operation::Update, spec, id, VerifyMode::Update)
            .await
    }

    async fn delete(&self, service: &str, id: FrontendId) -> Result<()> {
        info!(service, frontend_id = id, "Deleting frontend");
        self.client
            .delete(&frontend_path(service, id))
            .await
            .map_err(|e| {
                FrontendError::from_api(Operation::Delete, Target::frontend(service, id), e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiError, Method};
    use crate::error::ErrorKind;
    use crate::model::PortList;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Client that records calls and never answers successfully.
    #[derive(Default)]
    struct RecordingClient {
        calls: AtomicU32,
        status: u16,
        bodies: Mutex<Vec<Value>>,
    }

    impl RecordingClient {
        fn failing(status: u16) -> Self {
            Self {
                status,
                ..Default::default()
            }
        }

        fn fail(&self, method: Method, path: &str) -> ApiError {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ApiError::Status {
                method,
                path: path.to_string(),
                status: self.status,
                message: "injected".to_string(),
            }
        }
    }

    #[async_trait]
    impl ApiClient for RecordingClient {
        async fn get(&self, path: &str) -> std::result::Result<Value, ApiError> {
            Err(self.fail(Method::Get, path))
        }

        async fn post(&self, path: &str, body: Value) -> std::result::Result<Value, ApiError> {
            self.bodies.lock().unwrap().push(body);
            Err(self.fail(Method::Post, path))
        }

        async fn put(&self, path: &str, body: Value) -> std::result::Result<(), ApiError> {
            self.bodies.lock().unwrap().push(body);
            Err(self.fail(Method::Put, path))
        }

        async fn delete(&self, path: &str) -> std::result::Result<(), ApiError> {
            Err(self.fail(Method::Delete, path))
        }
    }

    fn spec() -> FrontendSpec {
        FrontendSpec::new("lb-1", "all", PortList::parse("22280").unwrap())
    }

    #[test]
    fn test_paths() {
        assert_eq!(collection_path("lb-1"), "/ipLoadbalancing/lb-1/http/frontend");
        assert_eq!(frontend_path("lb-1", 9), "/ipLoadbalancing/lb-1/http/frontend/9");
    }

    #[tokio::test]
    async fn test_invalid_spec_makes_no_remote_call() {
        let client = Arc::new(RecordingClient::failing(500));
        let reconciler = FrontendReconciler::new(client.clone());

        let mut bad = spec();
        bad.allowed_source = vec!["nope".to_string()];
        let err = reconciler.create(&bad).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidSpec);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_update_rejects_service_change() {
        let client = Arc::new(RecordingClient::failing(500));
        let reconciler = FrontendReconciler::new(client.clone());

        let err = reconciler.update("lb-2", 4, &spec()).await.unwrap_err();
        assert!(matches!(
            err,
            FrontendError::InvalidSpec {
                source: ValidationError::ServiceNameImmutable { .. },
                ..
            }
        ));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_error_carries_context() {
        let client = Arc::new(RecordingClient::failing(400));
        let reconciler = FrontendReconciler::new(client.clone());

        let err = reconciler.create(&spec()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteRejected);
        assert_eq!(err.operation(), Operation::Create);
        assert_eq!(err.target(), &Target::service("lb-1"));

        let bodies = client.bodies.lock().unwrap();
        assert_eq!(bodies[0]["port"], json!("22280"));
        assert!(bodies[0].get("allowedSource").is_none());
    }

    #[tokio::test]
    async fn test_delete_with_retry_treats_not_found_as_success() {
        let client = Arc::new(RecordingClient::failing(404));
        let reconciler = FrontendReconciler::new(client.clone());

        let outcome = reconciler
            .delete_with_retry("lb-1", 3, &RetryConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::AlreadyDeleted);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delete_with_retry_surfaces_denied() {
        let client = Arc::new(RecordingClient::failing(403));
        let reconciler = FrontendReconciler::new(client);

        let err = reconciler
            .delete_with_retry("lb-1", 3, &RetryConfig::default())
            .await
            .unwrap_err();
        assert!(!err.is_exhausted());
        assert_eq!(err.last().kind(), ErrorKind::Denied);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_with_retry_gives_up_on_persistent_busy() {
        let client = Arc::new(RecordingClient::failing(423));
        let reconciler = FrontendReconciler::new(client.clone());

        let err = reconciler
            .delete_with_retry("lb-1", 3, &RetryConfig::with_budget(std::time::Duration::from_secs(20)))
            .await
            .unwrap_err();
        assert!(err.is_exhausted());
        assert!(client.calls.load(Ordering::SeqCst) > 1);
    }
}
