//! Reconciliation and cleanup of IP load-balancer HTTP frontends.
//!
//! - [`reconciler::FrontendReconciler`]: create, read, update and delete one
//!   frontend against an eventually consistent remote API, verifying the
//!   remote converged after every write
//! - [`sweeper::Sweeper`]: delete frontends left behind by interrupted test runs
//! - [`retry`]: bounded retry with a wall-clock budget

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod reconciler;
pub mod retry;
pub mod sweeper;
pub mod validation;
pub mod wire;

pub use client::{ApiClient, ApiError, RestClient};
pub use config::{ApiConfig, SweepConfig};
pub use error::{ErrorKind, FrontendError, Operation, Target};
pub use model::{FrontendId, FrontendSpec, FrontendState, PortList, PortSpec};
pub use reconciler::{DeleteOutcome, FrontendReconciler, Reconciler};
pub use retry::{RetryConfig, RetryError, RetryPolicy, retry_policy, retry_with_budget};
pub use sweeper::{SweepError, SweepReport, SweepState, Sweeper};
pub use validation::ValidationError;
