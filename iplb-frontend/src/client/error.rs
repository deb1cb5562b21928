//! Transport-level errors returned by [`ApiClient`](super::ApiClient) implementations.

use thiserror::Error;

use super::Method;
use crate::error::{ErrorKind, classify_status};

/// A failed call against the remote API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The remote answered with a non-success status.
    #[error("{method} {path}: HTTP {status}: {message}")]
    Status {
        method: Method,
        path: String,
        status: u16,
        message: String,
    },

    /// The request did not complete in time.
    #[error("{method} {path}: request timed out")]
    Timeout { method: Method, path: String },

    /// Connection-level failure (refused, reset, DNS).
    #[error("{method} {path}: transport error: {message}")]
    Transport {
        method: Method,
        path: String,
        message: String,
    },

    /// The request could not be formed or followed (bad endpoint URL,
    /// redirect loop). Sending it again fails the same way.
    #[error("{method} {path}: invalid request: {message}")]
    Invalid {
        method: Method,
        path: String,
        message: String,
    },

    /// The remote answered but the body could not be decoded.
    #[error("{method} {path}: malformed response: {message}")]
    Decode {
        method: Method,
        path: String,
        message: String,
    },
}

impl ApiError {
    pub fn from_reqwest(method: Method, path: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout {
                method,
                path: path.to_string(),
            }
        } else if err.is_decode() {
            ApiError::Decode {
                method,
                path: path.to_string(),
                message: err.to_string(),
            }
        } else if err.is_connect() || err.is_request() || err.is_body() {
            ApiError::Transport {
                method,
                path: path.to_string(),
                message: err.to_string(),
            }
        } else {
            ApiError::Invalid {
                method,
                path: path.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Map this failure onto the frontend error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Status { status, .. } => classify_status(*status),
            ApiError::Timeout { .. } | ApiError::Transport { .. } => ErrorKind::Retryable,
            ApiError::Invalid { .. } => ErrorKind::InvalidRequest,
            ApiError::Decode { .. } => ErrorKind::Decode,
        }
    }

    /// Message suitable for surfacing verbatim to the operator.
    pub fn message(&self) -> String {
        match self {
            ApiError::Status { message, .. }
            | ApiError::Transport { message, .. }
            | ApiError::Invalid { message, .. }
            | ApiError::Decode { message, .. } => message.clone(),
            ApiError::Timeout { .. } => "request timed out".to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{RetryPolicy, retry_policy};

    fn status(code: u16) -> ApiError {
        ApiError::Status {
            method: Method::Get,
            path: "/ipLoadbalancing/lb/http/frontend/1".to_string(),
            status: code,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_status_errors_use_status_classification() {
        assert_eq!(status(404).kind(), ErrorKind::NotFound);
        assert_eq!(status(409).kind(), ErrorKind::Conflict);
        assert_eq!(status(503).kind(), ErrorKind::Retryable);
    }

    #[test]
    fn test_timeouts_and_transport_failures_are_retryable() {
        let timeout = ApiError::Timeout {
            method: Method::Delete,
            path: "/x".to_string(),
        };
        let transport = ApiError::Transport {
            method: Method::Delete,
            path: "/x".to_string(),
            message: "connection reset".to_string(),
        };
        assert_eq!(timeout.kind(), ErrorKind::Retryable);
        assert_eq!(transport.kind(), ErrorKind::Retryable);
    }

    #[test]
    fn test_unbuildable_request_is_not_retryable() {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        assert!(err.is_builder());

        let api = ApiError::from_reqwest(Method::Delete, "/x", err);
        assert!(matches!(api, ApiError::Invalid { .. }));
        assert_eq!(api.kind(), ErrorKind::InvalidRequest);
        assert_eq!(retry_policy(api.kind()), RetryPolicy::Fail);
        assert!(api.to_string().contains("invalid request"));
    }

    #[test]
    fn test_display_carries_method_path_and_message() {
        let msg = status(400).to_string();
        assert!(msg.contains("GET"));
        assert!(msg.contains("/ipLoadbalancing/lb/http/frontend/1"));
        assert!(msg.contains("HTTP 400"));
        assert!(msg.contains("boom"));
    }
}
