//! Frontend error types.
//!
//! Every remote failure is classified into an [`ErrorKind`] by a pure function of
//! the HTTP status ([`classify_status`]), so retry decisions never depend on the
//! transport.

use std::fmt;

use thiserror::Error;

use crate::client::ApiError;
use crate::model::FrontendId;
use crate::validation::ValidationError;

/// Error categories driving caller and retry behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The service or frontend does not exist remotely; drop the local record.
    NotFound,
    /// The remote refused the attribute set (bad port syntax, unknown zone).
    RemoteRejected,
    /// Duplicate or contention on the remote side.
    Conflict,
    /// Credentials were refused.
    Denied,
    /// Rate limiting, locked resource, timeout; eligible for bounded retry.
    Retryable,
    /// Observed state differs from declared state after a write.
    Inconsistent,
    /// Local validation failed before any remote call.
    InvalidSpec,
    /// The request could not be formed locally (bad endpoint URL).
    InvalidRequest,
    /// The remote returned a document we could not decode.
    Decode,
}

/// Map an HTTP status code onto the error taxonomy.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        401 | 403 => ErrorKind::Denied,
        408 | 423 | 429 => ErrorKind::Retryable,
        500 | 502 | 503 | 504 => ErrorKind::Retryable,
        _ => ErrorKind::RemoteRejected,
    }
}

/// Reconciler operation an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        })
    }
}

/// The service and, once assigned, the frontend an operation targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub service: String,
    pub id: Option<FrontendId>,
}

impl Target {
    pub fn service(service: &str) -> Self {
        Self {
            service: service.to_string(),
            id: None,
        }
    }

    pub fn frontend(service: &str, id: FrontendId) -> Self {
        Self {
            service: service.to_string(),
            id: Some(id),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}/http/frontend/{}", self.service, id),
            None => write!(f, "{}/http/frontend", self.service),
        }
    }
}

/// Errors surfaced by frontend reconciliation.
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("{op} {target}: not found: {message}")]
    NotFound {
        op: Operation,
        target: Target,
        message: String,
    },

    #[error("{op} {target}: rejected by remote: {message}")]
    RemoteRejected {
        op: Operation,
        target: Target,
        message: String,
    },

    #[error("{op} {target}: conflict: {message}")]
    Conflict {
        op: Operation,
        target: Target,
        message: String,
    },

    #[error("{op} {target}: permission denied: {message}")]
    Denied {
        op: Operation,
        target: Target,
        message: String,
    },

    #[error("{op} {target}: transient failure: {message}")]
    Retryable {
        op: Operation,
        target: Target,
        message: String,
    },

    #[error("{op} {target}: {field} inconsistent after write: declared {declared}, observed {observed}")]
    Inconsistent {
        op: Operation,
        target: Target,
        field: &'static str,
        declared: String,
        observed: String,
    },

    #[error("{op} {target}: invalid spec: {source}")]
    InvalidSpec {
        op: Operation,
        target: Target,
        #[source]
        source: ValidationError,
    },

    #[error("{op} {target}: request not sent: {message}")]
    InvalidRequest {
        op: Operation,
        target: Target,
        message: String,
    },

    #[error("{op} {target}: malformed response: {message}")]
    Decode {
        op: Operation,
        target: Target,
        message: String,
    },
}

impl FrontendError {
    /// Attach operation context to a transport error.
    pub fn from_api(op: Operation, target: Target, err: ApiError) -> Self {
        let message = err.message();
        match err.kind() {
            ErrorKind::NotFound => FrontendError::NotFound {
                op,
                target,
                message,
            },
            ErrorKind::RemoteRejected => FrontendError::RemoteRejected {
                op,
                target,
                message,
            },
            ErrorKind::Conflict => FrontendError::Conflict {
                op,
                target,
                message,
            },
            ErrorKind::Denied => FrontendError::Denied {
                op,
                target,
                message,
            },
            ErrorKind::Retryable => FrontendError::Retryable {
                op,
                target,
                message,
            },
            ErrorKind::InvalidRequest => FrontendError::InvalidRequest {
                op,
                target,
                message,
            },
            ErrorKind::Inconsistent | ErrorKind::InvalidSpec | ErrorKind::Decode => {
                FrontendError::Decode {
                    op,
                    target,
                    message: err.to_string(),
                }
            }
        }
    }

    pub fn invalid(op: Operation, target: Target, source: ValidationError) -> Self {
        FrontendError::InvalidSpec { op, target, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FrontendError::NotFound { .. } => ErrorKind::NotFound,
            FrontendError::RemoteRejected { .. } => ErrorKind::RemoteRejected,
            FrontendError::Conflict { .. } => ErrorKind::Conflict,
            FrontendError::Denied { .. } => ErrorKind::Denied,
            FrontendError::Retryable { .. } => ErrorKind::Retryable,
            FrontendError::Inconsistent { .. } => ErrorKind::Inconsistent,
            FrontendError::InvalidSpec { .. } => ErrorKind::InvalidSpec,
            FrontendError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            FrontendError::Decode { .. } => ErrorKind::Decode,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            FrontendError::NotFound { op, .. }
            | FrontendError::RemoteRejected { op, .. }
            | FrontendError::Conflict { op, .. }
            | FrontendError::Denied { op, .. }
            | FrontendError::Retryable { op, .. }
            | FrontendError::Inconsistent { op, .. }
            | FrontendError::InvalidSpec { op, .. }
            | FrontendError::InvalidRequest { op, .. }
            | FrontendError::Decode { op, .. } => *op,
        }
    }

    pub fn target(&self) -> &Target {
        match self {
            FrontendError::NotFound { target, .. }
            | FrontendError::RemoteRejected { target, .. }
            | FrontendError::Conflict { target, .. }
            | FrontendError::Denied { target, .. }
            | FrontendError::Retryable { target, .. }
            | FrontendError::Inconsistent { target, .. }
            | FrontendError::InvalidSpec { target, .. }
            | FrontendError::InvalidRequest { target, .. }
            | FrontendError::Decode { target, .. } => target,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type for frontend operations.
pub type Result<T> = std::result::Result<T, FrontendError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Method;

    #[test]
    fn test_classify_status_table() {
        let cases = [
            (400, ErrorKind::RemoteRejected),
            (401, ErrorKind::Denied),
            (403, ErrorKind::Denied),
            (404, ErrorKind::NotFound),
            (408, ErrorKind::Retryable),
            (409, ErrorKind::Conflict),
            (422, ErrorKind::RemoteRejected),
            (423, ErrorKind::Retryable),
            (429, ErrorKind::Retryable),
            (460, ErrorKind::RemoteRejected),
            (500, ErrorKind::Retryable),
            (502, ErrorKind::Retryable),
            (503, ErrorKind::Retryable),
            (504, ErrorKind::Retryable),
            (501, ErrorKind::RemoteRejected),
        ];
        for (status, kind) in cases {
            assert_eq!(classify_status(status), kind, "status {status}");
        }
    }

    #[test]
    fn test_from_api_keeps_context() {
        let api = ApiError::Status {
            method: Method::Post,
            path: "/ipLoadbalancing/lb-1/http/frontend".to_string(),
            status: 400,
            message: "Invalid zone mars".to_string(),
        };
        let err = FrontendError::from_api(Operation::Create, Target::service("lb-1"), api);

        assert_eq!(err.kind(), ErrorKind::RemoteRejected);
        assert_eq!(err.operation(), Operation::Create);
        assert_eq!(err.target().service, "lb-1");
        assert_eq!(
            err.to_string(),
            "create lb-1/http/frontend: rejected by remote: Invalid zone mars"
        );
    }

    #[test]
    fn test_target_display() {
        assert_eq!(Target::frontend("lb-1", 42).to_string(), "lb-1/http/frontend/42");
        assert_eq!(Target::service("lb-1").to_string(), "lb-1/http/frontend");
    }
}
