//! HTTP implementation of [`ApiClient`] on top of reqwest.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{ApiClient, ApiError, Method};
use crate::config::ApiConfig;

/// Error document returned by the remote on failure.
#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    message: String,
    #[serde(default)]
    class: Option<String>,
}

/// Client for the remote load-balancer REST API.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RestClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::from_reqwest(Method::Get, "/", e))?;

        Ok(Self {
            http,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.into(), &url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, %path, "Sending request");
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(method, path, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_reqwest(method, path, e))?;

        if !status.is_success() {
            debug!(%method, %path, status = status.as_u16(), "Request failed");
            return Err(ApiError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                message: remote_message(&bytes, status),
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ApiError::Decode {
                method,
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    fn require_body(method: Method, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        body.ok_or_else(|| ApiError::Decode {
            method,
            path: path.to_string(),
            message: "empty response body".to_string(),
        })
    }
}

/// Extract the human readable message from an error response.
fn remote_message(bytes: &[u8], status: reqwest::StatusCode) -> String {
    if let Ok(body) = serde_json::from_slice::<RemoteErrorBody>(bytes) {
        return match body.class {
            Some(class) => format!("{} ({})", body.message, class),
            None => body.message,
        };
    }

    let text = String::from_utf8_lossy(bytes).trim().to_string();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        text
    }
}

#[async_trait]
impl ApiClient for RestClient {
    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        let body = self.send(Method::Get, path, None).await?;
        Self::require_body(Method::Get, path, body)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        let response = self.send(Method::Post, path, Some(&body)).await?;
        Self::require_body(Method::Post, path, response)
    }

    async fn put(&self, path: &str, body: Value) -> Result<(), ApiError> {
        self.send(Method::Put, path, Some(&body)).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::Delete, path, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_remote_message_prefers_json_message() {
        let body = br#"{"message":"Invalid port 99999","class":"Client::BadRequest"}"#;
        assert_eq!(
            remote_message(body, StatusCode::BAD_REQUEST),
            "Invalid port 99999 (Client::BadRequest)"
        );
    }

    #[test]
    fn test_remote_message_falls_back_to_text_then_reason() {
        assert_eq!(
            remote_message(b"  upstream busy \n", StatusCode::SERVICE_UNAVAILABLE),
            "upstream busy"
        );
        assert_eq!(
            remote_message(b"", StatusCode::SERVICE_UNAVAILABLE),
            "Service Unavailable"
        );
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let config = ApiConfig::new("http://127.0.0.1:8080/1.0/");
        let client = RestClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8080/1.0");
    }

    #[tokio::test]
    async fn test_malformed_endpoint_is_invalid_request() {
        let client = RestClient::new(&ApiConfig::new("not a url")).unwrap();

        let err = client.delete("/ipLoadbalancing/lb-1/http/frontend/1").await.unwrap_err();
        assert!(matches!(err, ApiError::Invalid { .. }), "got {err}");
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidRequest);
    }
}
