//! Sweeper for frontends left behind by interrupted test runs.
//!
//! The sweep walks an explicit state machine:
//!
//! ```text
//! Disabled ──────────────────────────────────────────────┐
//! Enumerating ─> Inspecting ─> Filtering ─> Deleting ─┐  │
//!                    ^             │                  │  │
//!                    └─────────────┴──────────────────┘  │
//!                    │ (no ids left)                     v
//!                    └──────────────────────────────> Done
//! ```
//!
//! Any remote failure aborts the run. Ids not yet processed are carried by the
//! error so a later run picks them up.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::SweepConfig;
use crate::error::FrontendError;
use crate::model::{FrontendId, FrontendState};
use crate::reconciler::{DeleteOutcome, FrontendReconciler, Reconciler};
use crate::retry::RetryError;

/// Position of a sweep run.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepState {
    /// No service configured; nothing to do.
    Disabled,
    /// About to list the frontends of `service`.
    Enumerating { service: String },
    /// About to read the next pending frontend.
    Inspecting {
        service: String,
        pending: VecDeque<FrontendId>,
    },
    /// Deciding whether `frontend` belongs to a test run.
    Filtering {
        service: String,
        pending: VecDeque<FrontendId>,
        frontend: FrontendState,
    },
    /// About to delete `id`.
    Deleting {
        service: String,
        pending: VecDeque<FrontendId>,
        id: FrontendId,
    },
    Done,
}

impl SweepState {
    pub fn name(&self) -> &'static str {
        match self {
            SweepState::Disabled => "disabled",
            SweepState::Enumerating { .. } => "enumerating",
            SweepState::Inspecting { .. } => "inspecting",
            SweepState::Filtering { .. } => "filtering",
            SweepState::Deleting { .. } => "deleting",
            SweepState::Done => "done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, SweepState::Done)
    }
}

impl fmt::Display for SweepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Counters of a finished sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Frontends returned by the listing
    pub found: usize,
    /// Frontends read successfully
    pub inspected: usize,
    /// Frontends without the test prefix, left untouched
    pub kept: usize,
    pub deleted: usize,
    /// Deletes that found the frontend already gone
    pub already_gone: usize,
    /// Deletes skipped because of dry-run
    pub would_delete: usize,
}

/// A sweep aborted before reaching `Done`.
#[derive(Debug, Error)]
pub enum SweepError {
    /// An empty prefix matches every frontend of the service.
    #[error("sweep of {service}: refusing to run with an empty name prefix")]
    EmptyPrefix { service: String },

    #[error("sweep of {service}: listing frontends failed: {source}")]
    Enumerate {
        service: String,
        #[source]
        source: FrontendError,
    },

    #[error("sweep of {service}: reading frontend {id} failed, {} left unswept: {source}", .pending.len())]
    Inspect {
        service: String,
        id: FrontendId,
        /// Ids not processed, including `id`
        pending: Vec<FrontendId>,
        #[source]
        source: FrontendError,
    },

    #[error("sweep of {service}: deleting frontend {id} failed, {} left unswept: {source}", .pending.len())]
    Delete {
        service: String,
        id: FrontendId,
        /// Ids not processed, including `id`
        pending: Vec<FrontendId>,
        #[source]
        source: RetryError<FrontendError>,
    },
}

impl SweepError {
    /// Ids a later run still has to look at. Empty when listing failed.
    pub fn unswept(&self) -> &[FrontendId] {
        match self {
            SweepError::EmptyPrefix { .. } | SweepError::Enumerate { .. } => &[],
            SweepError::Inspect { pending, .. } | SweepError::Delete { pending, .. } => pending,
        }
    }

    pub fn service(&self) -> &str {
        match self {
            SweepError::EmptyPrefix { service }
            | SweepError::Enumerate { service, .. }
            | SweepError::Inspect { service, .. }
            | SweepError::Delete { service, .. } => service,
        }
    }
}

fn with_current(id: FrontendId, pending: VecDeque<FrontendId>) -> Vec<FrontendId> {
    std::iter::once(id).chain(pending).collect()
}

/// Deletes prefixed frontends of one service.
pub struct Sweeper {
    reconciler: FrontendReconciler,
    config: SweepConfig,
}

impl Sweeper {
    pub fn new(reconciler: FrontendReconciler, config: SweepConfig) -> Self {
        Self { reconciler, config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// `Disabled` unless a non-blank service is configured.
    pub fn initial_state(&self) -> SweepState {
        match self.service() {
            Some(service) => SweepState::Enumerating {
                service: service.to_string(),
            },
            None => SweepState::Disabled,
        }
    }

    fn service(&self) -> Option<&str> {
        self.config
            .service
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn check_prefix(&self, service: &str) -> Result<(), SweepError> {
        if self.config.prefix.trim().is_empty() {
            return Err(SweepError::EmptyPrefix {
                service: service.to_string(),
            });
        }
        Ok(())
    }

    /// Advance one transition. `Done` is terminal and returned unchanged.
    pub async fn step(
        &self,
        state: SweepState,
        report: &mut SweepReport,
    ) -> Result<SweepState, SweepError> {
        match state {
            SweepState::Disabled => {
                info!("No service configured, skipping frontend sweep");
                Ok(SweepState::Done)
            }

            SweepState::Enumerating { service } => {
                self.check_prefix(&service)?;
                let ids = match self.reconciler.list(&service).await {
                    Ok(ids) => ids,
                    Err(source) => return Err(SweepError::Enumerate { service, source }),
                };
                report.found = ids.len();
                info!(service = %service, count = ids.len(), "Found frontends to inspect");
                Ok(SweepState::Inspecting {
                    service,
                    pending: ids.into(),
                })
            }

            SweepState::Inspecting {
                service,
                mut pending,
            } => {
                let Some(id) = pending.pop_front() else {
                    return Ok(SweepState::Done);
                };
                match self.reconciler.read(&service, id).await {
                    Ok(frontend) => {
                        report.inspected += 1;
                        Ok(SweepState::Filtering {
                            service,
                            pending,
                            frontend,
                        })
                    }
                    Err(source) => Err(SweepError::Inspect {
                        pending: with_current(id, pending),
                        service,
                        id,
                        source,
                    }),
                }
            }

            SweepState::Filtering {
                service,
                pending,
                frontend,
            } => {
                self.check_prefix(&service)?;
                if frontend.has_prefix(&self.config.prefix) {
                    Ok(SweepState::Deleting {
                        service,
                        pending,
                        id: frontend.id,
                    })
                } else {
                    debug!(
                        service = %service,
                        frontend_id = frontend.id,
                        display_name = ?frontend.display_name,
                        "Keeping frontend without test prefix"
                    );
                    report.kept += 1;
                    Ok(SweepState::Inspecting { service, pending })
                }
            }

            SweepState::Deleting {
                service,
                pending,
                id,
            } => {
                if self.config.dry_run {
                    info!(service = %service, frontend_id = id, "Would delete frontend (dry run)");
                    report.would_delete += 1;
                    return Ok(SweepState::Inspecting { service, pending });
                }

                match self
                    .reconciler
                    .delete_with_retry(&service, id, &self.config.retry)
                    .await
                {
                    Ok(DeleteOutcome::Deleted) => report.deleted += 1,
                    Ok(DeleteOutcome::AlreadyDeleted) => report.already_gone += 1,
                    Err(source) => {
                        return Err(SweepError::Delete {
                            pending: with_current(id, pending),
                            service,
                            id,
                            source,
                        });
                    }
                }
                Ok(SweepState::Inspecting { service, pending })
            }

            SweepState::Done => Ok(SweepState::Done),
        }
    }

    /// Run the sweep to completion.
    pub async fn sweep(&self) -> Result<SweepReport, SweepError> {
        let mut report = SweepReport::default();
        let mut state = self.initial_state();

        while !state.is_done() {
            let from = state.name();
            state = match self.step(state, &mut report).await {
                Ok(next) => next,
                Err(e) => {
                    error!(service = e.service(), unswept = e.unswept().len(), "Sweep aborted: {}", e);
                    return Err(e);
                }
            };
            debug!(from, to = state.name(), "Sweep transition");
        }

        if let Some(service) = self.service() {
            info!(
                service = %service,
                found = report.found,
                kept = report.kept,
                deleted = report.deleted,
                already_gone = report.already_gone,
                would_delete = report.would_delete,
                "Sweep finished"
            );
        }
        Ok(report)
    }
}
