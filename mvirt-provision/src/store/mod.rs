//! Record storage.
//!
//! The store exclusively owns persistence of provision records. The
//! reconciler reads a fresh copy each pass and writes observed state back
//! with an optimistic version check.

pub mod error;
pub mod event;
pub mod manifest;
pub mod memory;

pub use error::{Result, StoreError};
pub use event::RecordEvent;
pub use memory::MemoryStore;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::record::{ProvisionSpec, ProvisionStatus, RecordKey, ResourceRecord};

/// Store trait for provision records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get a record by key. `Ok(None)` when it does not exist.
    async fn get(&self, key: &RecordKey) -> Result<Option<ResourceRecord>>;

    /// List records, optionally within one namespace.
    async fn list(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>>;

    /// Create a record or replace its spec. Status is preserved.
    async fn apply(&self, key: RecordKey, spec: ProvisionSpec) -> Result<ResourceRecord>;

    /// Replace the spec of an existing record, but only if it has not changed
    /// since `resource_version` was read.
    ///
    /// Fails with `Conflict` on a stale version and `NotFound` if the record
    /// does not exist. An unchanged spec is a no-op.
    async fn update_spec(
        &self,
        key: &RecordKey,
        resource_version: u64,
        spec: ProvisionSpec,
    ) -> Result<ResourceRecord>;

    /// Write observed state.
    ///
    /// Fails with `Conflict` if the record changed since `resource_version`
    /// was read, and with `NotFound` if it was deleted meanwhile.
    async fn update_status(
        &self,
        key: &RecordKey,
        resource_version: u64,
        status: ProvisionStatus,
    ) -> Result<ResourceRecord>;

    /// Delete a record.
    async fn delete(&self, key: &RecordKey) -> Result<()>;

    /// Subscribe to record change events.
    fn subscribe(&self) -> broadcast::Receiver<RecordEvent>;
}
