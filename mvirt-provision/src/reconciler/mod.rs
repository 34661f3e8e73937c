//! Provision reconciler.
//!
//! One pass per trigger: fetch the record, classify its declared phase,
//! dispatch the matching handler (exactly one provider call), and on success
//! write the observed phase back. Desired state is never modified here, and
//! nothing is cached between passes.

pub mod table;

pub use table::{Handler, OperationTable};

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::clients::{ProviderClient, ProviderError};
use crate::phase::{DesiredPhase, Phase};
use crate::record::{ProvisionStatus, RecordKey, ResourceRecord};
use crate::store::{RecordStore, StoreError};

/// Reasons a reconciliation pass failed.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to fetch {key}: {source}")]
    Fetch {
        key: RecordKey,
        #[source]
        source: StoreError,
    },

    #[error("no action defined for phase '{phase}' on {key}")]
    UnrecognizedPhase { key: RecordKey, phase: String },

    #[error("{operation} failed for {key}: {source}")]
    Provider {
        key: RecordKey,
        phase: Phase,
        operation: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("failed to record observed phase for {key}: {source}")]
    StatusWrite {
        key: RecordKey,
        #[source]
        source: StoreError,
    },

    #[error("reconciliation of {key} cancelled")]
    Cancelled { key: RecordKey },
}

impl ReconcileError {
    /// Whether the host scheduler should retry with backoff.
    ///
    /// A failed status write is not transient: the provider call it reports
    /// already happened, and retrying would issue it again.
    pub fn is_transient(&self) -> bool {
        match self {
            ReconcileError::Fetch { source, .. } => !matches!(source, StoreError::Invalid(_)),
            ReconcileError::UnrecognizedPhase { .. } => false,
            ReconcileError::Provider { source, .. } => source.is_transient(),
            ReconcileError::StatusWrite { .. } => false,
            ReconcileError::Cancelled { .. } => true,
        }
    }

    /// The provider's own error, if this failure came from the provider call.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            ReconcileError::Provider { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// What a successful pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The record no longer exists; nothing to do.
    RecordGone,
    /// The phase's provider operation succeeded.
    Applied {
        phase: Phase,
        /// False when the observed-state write was dropped (record changed or
        /// vanished concurrently).
        status_written: bool,
    },
}

/// Drives provision records toward their declared phase.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    provider: Arc<dyn ProviderClient>,
    table: OperationTable,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        provider: Arc<dyn ProviderClient>,
        table: OperationTable,
    ) -> Self {
        Self {
            store,
            provider,
            table,
        }
    }

    pub fn table(&self) -> &OperationTable {
        &self.table
    }

    /// Run one pass for `key` with no cancellation.
    pub async fn reconcile(&self, key: &RecordKey) -> Result<Outcome, ReconcileError> {
        self.reconcile_until(key, std::future::pending()).await
    }

    /// Run one pass for `key`, abandoning the provider call if `cancelled`
    /// completes first.
    pub async fn reconcile_until<F>(
        &self,
        key: &RecordKey,
        cancelled: F,
    ) -> Result<Outcome, ReconcileError>
    where
        F: Future<Output = ()> + Send,
    {
        info!(%key, "Reconciling provision");

        let record = match self.store.get(key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(%key, "Provision not found, ignoring");
                return Ok(Outcome::RecordGone);
            }
            Err(e) => {
                error!(%key, "Failed to get provision: {}", e);
                return Err(ReconcileError::Fetch {
                    key: key.clone(),
                    source: e,
                });
            }
        };

        let desired = DesiredPhase::parse(&record.spec.phase);
        let Some(handler) = self.table.resolve(&desired) else {
            error!(
                %key,
                phase = %record.spec.phase,
                "No action defined for the current phase"
            );
            return Err(ReconcileError::UnrecognizedPhase {
                key: key.clone(),
                phase: record.spec.phase.clone(),
            });
        };
        let phase = handler.phase;

        let request = handler.shape(&record.spec);
        info!(%key, %phase, operation = request.operation(), "Dispatching");

        let result = tokio::select! {
            biased;
            _ = cancelled => {
                warn!(%key, %phase, "Reconciliation cancelled, abandoning provider call");
                return Err(ReconcileError::Cancelled { key: key.clone() });
            }
            result = handler.invoke(self.provider.as_ref(), &request) => result,
        };

        let response = result.map_err(|e| {
            error!(%key, %phase, "Failed to {}: {}", request.operation(), e);
            ReconcileError::Provider {
                key: key.clone(),
                phase,
                operation: request.operation(),
                source: e,
            }
        })?;

        debug!(
            %key,
            request_id = %response.request_id,
            instances = response.server_instance_list.len(),
            "Provider accepted {}",
            request.operation()
        );

        let server_instance_no = match phase {
            Phase::Create => response
                .server_instance_list
                .first()
                .map(|s| s.server_instance_no.clone())
                .or_else(|| record.status.server_instance_no.clone()),
            _ => record.status.server_instance_no.clone(),
        };

        let status_written = self
            .write_observed(&record, phase, server_instance_no)
            .await?;

        Ok(Outcome::Applied {
            phase,
            status_written,
        })
    }

    async fn write_observed(
        &self,
        record: &ResourceRecord,
        phase: Phase,
        server_instance_no: Option<String>,
    ) -> Result<bool, ReconcileError> {
        let status = ProvisionStatus {
            phase: Some(phase),
            server_instance_no,
            observed_generation: record.generation,
            last_reconciled_at: Some(chrono::Utc::now().to_rfc3339()),
        };

        match self
            .store
            .update_status(&record.key, record.resource_version, status)
            .await
        {
            Ok(_) => Ok(true),
            Err(StoreError::Conflict(msg)) => {
                debug!(key = %record.key, "Dropping observed phase write: {}", msg);
                Ok(false)
            }
            Err(StoreError::NotFound(_)) => {
                debug!(key = %record.key, "Provision deleted before observed phase was written");
                Ok(false)
            }
            Err(e) => {
                error!(key = %record.key, "Failed to write observed phase: {}", e);
                Err(ReconcileError::StatusWrite {
                    key: record.key.clone(),
                    source: e,
                })
            }
        }
    }
}
