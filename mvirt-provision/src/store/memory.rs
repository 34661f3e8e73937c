//! In-memory record store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use super::{RecordEvent, RecordStore, Result, StoreError};
use crate::record::{ProvisionSpec, ProvisionStatus, RecordKey, ResourceRecord};

const EVENT_CAPACITY: usize = 256;

/// Record store backed by a map behind a lock.
pub struct MemoryStore {
    records: RwLock<BTreeMap<RecordKey, ResourceRecord>>,
    events: broadcast::Sender<RecordEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            records: RwLock::new(BTreeMap::new()),
            events,
        }
    }

    fn emit(&self, event: RecordEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<ResourceRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn list(&self, namespace: Option<&str>) -> Result<Vec<ResourceRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| namespace.is_none_or(|ns| r.key.namespace == ns))
            .cloned()
            .collect())
    }

    async fn apply(&self, key: RecordKey, spec: ProvisionSpec) -> Result<ResourceRecord> {
        if key.namespace.is_empty() || key.name.is_empty() {
            return Err(StoreError::Invalid(format!(
                "namespace and name are required, got '{}'",
                key
            )));
        }

        let mut records = self.records.write().await;
        let record = match records.get_mut(&key) {
            Some(existing) if existing.spec == spec => {
                debug!(%key, "Spec unchanged, nothing to apply");
                return Ok(existing.clone());
            }
            Some(existing) => {
                existing.spec = spec;
                existing.generation += 1;
                existing.resource_version += 1;
                existing.clone()
            }
            None => {
                let record = ResourceRecord::new(key.clone(), spec);
                records.insert(key, record.clone());
                record
            }
        };
        drop(records);

        debug!(key = %record.key, generation = record.generation, "Record applied");
        self.emit(RecordEvent::Applied(record.clone()));
        Ok(record)
    }

    async fn update_spec(
        &self,
        key: &RecordKey,
        resource_version: u64,
        spec: ProvisionSpec,
    ) -> Result<ResourceRecord> {
        let mut records = self.records.write().await;
        let existing = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if existing.resource_version != resource_version {
            return Err(StoreError::Conflict(format!(
                "{}: resource version {} is stale (current {})",
                key, resource_version, existing.resource_version
            )));
        }
        if existing.spec == spec {
            debug!(%key, "Spec unchanged, nothing to apply");
            return Ok(existing.clone());
        }

        existing.spec = spec;
        existing.generation += 1;
        existing.resource_version += 1;
        let record = existing.clone();
        drop(records);

        debug!(%key, generation = record.generation, "Record spec updated");
        self.emit(RecordEvent::Applied(record.clone()));
        Ok(record)
    }

    async fn update_status(
        &self,
        key: &RecordKey,
        resource_version: u64,
        status: ProvisionStatus,
    ) -> Result<ResourceRecord> {
        let mut records = self.records.write().await;
        let existing = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if existing.resource_version != resource_version {
            return Err(StoreError::Conflict(format!(
                "{}: resource version {} is stale (current {})",
                key, resource_version, existing.resource_version
            )));
        }

        existing.status = status;
        existing.resource_version += 1;
        let record = existing.clone();
        drop(records);

        self.emit(RecordEvent::StatusUpdated(record.clone()));
        Ok(record)
    }

    async fn delete(&self, key: &RecordKey) -> Result<()> {
        let removed = self.records.write().await.remove(key);
        match removed {
            Some(_) => {
                self.emit(RecordEvent::Deleted(key.clone()));
                Ok(())
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;

    fn spec(phase: &str) -> ProvisionSpec {
        ProvisionSpec {
            phase: phase.to_string(),
            ..Default::default()
        }
    }

    fn key(name: &str) -> RecordKey {
        RecordKey::new("default", name)
    }

    #[tokio::test]
    async fn test_apply_creates_and_emits() {
        let store = MemoryStore::new();
        let mut events = store.subscribe();

        let record = store.apply(key("vm-1"), spec("Create")).await.unwrap();
        assert_eq!(record.generation, 1);

        match events.recv().await.unwrap() {
            RecordEvent::Applied(r) => assert_eq!(r.key, key("vm-1")),
            other => panic!("Unexpected event: {:?}", other),
        }
        assert!(store.get(&key("vm-1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_apply_same_spec_is_noop() {
        let store = MemoryStore::new();
        store.apply(key("vm-1"), spec("Create")).await.unwrap();
        let mut events = store.subscribe();

        let record = store.apply(key("vm-1"), spec("Create")).await.unwrap();
        assert_eq!(record.generation, 1);
        assert_eq!(record.resource_version, 1);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_apply_changed_spec_bumps_generation_and_keeps_status() {
        let store = MemoryStore::new();
        let record = store.apply(key("vm-1"), spec("Create")).await.unwrap();
        store
            .update_status(
                &key("vm-1"),
                record.resource_version,
                ProvisionStatus {
                    phase: Some(Phase::Create),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = store.apply(key("vm-1"), spec("Stop")).await.unwrap();
        assert_eq!(record.generation, 2);
        assert_eq!(record.resource_version, 3);
        assert_eq!(record.status.phase, Some(Phase::Create));
    }

    #[tokio::test]
    async fn test_apply_requires_name() {
        let store = MemoryStore::new();
        let result = store.apply(RecordKey::new("default", ""), spec("")).await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_update_status_conflict_on_stale_version() {
        let store = MemoryStore::new();
        let record = store.apply(key("vm-1"), spec("Create")).await.unwrap();
        store.apply(key("vm-1"), spec("Stop")).await.unwrap();

        let result = store
            .update_status(&key("vm-1"), record.resource_version, ProvisionStatus::default())
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_spec_rejects_write_based_on_stale_read() {
        let store = MemoryStore::new();
        let read = store.apply(key("vm-1"), spec("Create")).await.unwrap();

        // Someone else replaces the spec after our read.
        let mut concurrent = spec("Create");
        concurrent.vpc_no = "vpc-2".to_string();
        store.apply(key("vm-1"), concurrent.clone()).await.unwrap();

        let result = store
            .update_spec(&key("vm-1"), read.resource_version, spec("Stop"))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let stored = store.get(&key("vm-1")).await.unwrap().unwrap();
        assert_eq!(stored.spec, concurrent);
    }

    #[tokio::test]
    async fn test_update_spec_with_current_version_applies() {
        let store = MemoryStore::new();
        let read = store.apply(key("vm-1"), spec("Create")).await.unwrap();
        let mut events = store.subscribe();

        let record = store
            .update_spec(&key("vm-1"), read.resource_version, spec("Stop"))
            .await
            .unwrap();
        assert_eq!(record.spec.phase, "Stop");
        assert_eq!(record.generation, 2);
        assert!(matches!(events.recv().await.unwrap(), RecordEvent::Applied(_)));

        let missing = store.update_spec(&key("ghost"), 1, spec("Stop")).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_status_missing_record() {
        let store = MemoryStore::new();
        let result = store
            .update_status(&key("ghost"), 1, ProvisionStatus::default())
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_emits_and_removes() {
        let store = MemoryStore::new();
        store.apply(key("vm-1"), spec("Create")).await.unwrap();
        let mut events = store.subscribe();

        store.delete(&key("vm-1")).await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), RecordEvent::Deleted(k) if k == key("vm-1")));
        assert!(store.get(&key("vm-1")).await.unwrap().is_none());
        assert!(matches!(
            store.delete(&key("vm-1")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_namespace() {
        let store = MemoryStore::new();
        store.apply(key("vm-1"), spec("")).await.unwrap();
        store
            .apply(RecordKey::new("other", "vm-2"), spec(""))
            .await
            .unwrap();

        assert_eq!(store.list(None).await.unwrap().len(), 2);
        let other = store.list(Some("other")).await.unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].key.name, "vm-2");
    }
}
