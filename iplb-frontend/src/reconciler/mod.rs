//! Reconcilers for remote resource types.
//!
//! A reconciler maps declared state onto remote CRUD calls and verifies the
//! remote converged to it.

pub mod drift;
pub mod frontend;

use async_trait::async_trait;

use crate::error::Result;

pub use frontend::{DeleteOutcome, FrontendReconciler};

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Declared state.
    type Spec: Send + Sync;
    /// Observed remote state.
    type State;
    /// Remote-assigned identifier.
    type Id: Copy + Send + Sync;

    /// Create the resource and return its verified state.
    async fn create(&self, spec: &Self::Spec) -> Result<Self::State>;

    /// Fetch the current remote state.
    async fn read(&self, service: &str, id: Self::Id) -> Result<Self::State>;

    /// Replace the resource with `spec` and return its verified state.
    async fn update(&self, service: &str, id: Self::Id, spec: &Self::Spec) -> Result<Self::State>;

    /// Delete the resource. A single attempt; see [`FrontendReconciler::delete_with_retry`].
    async fn delete(&self, service: &str, id: Self::Id) -> Result<()>;
}
