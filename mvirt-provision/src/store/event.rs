//! Events emitted by record changes.

use crate::record::{RecordKey, ResourceRecord};

/// Events dispatched to store subscribers.
#[derive(Debug, Clone)]
pub enum RecordEvent {
    /// A record was created or its spec changed.
    Applied(ResourceRecord),
    /// The controller wrote observed state. Never re-triggers reconciliation.
    StatusUpdated(ResourceRecord),
    /// A record was removed.
    Deleted(RecordKey),
}

impl RecordEvent {
    pub fn key(&self) -> &RecordKey {
        match self {
            RecordEvent::Applied(r) | RecordEvent::StatusUpdated(r) => &r.key,
            RecordEvent::Deleted(k) => k,
        }
    }
}
