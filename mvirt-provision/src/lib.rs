//! mvirt-provision: declarative server provisioning against Ncloud.
//!
//! A provision record declares a lifecycle phase (Create, Update, Stop,
//! Delete, Get). The controller watches records and, for each change, runs
//! one reconciliation pass that issues the matching provider operation and
//! records the observed phase on success.

pub mod clients;
pub mod controller;
pub mod phase;
pub mod reconciler;
pub mod record;
pub mod request;
pub mod rest;
pub mod store;

pub use clients::{DryRunProvider, NcloudClient, NcloudConfig, ProviderClient, ProviderError};
pub use controller::{Controller, ControllerConfig};
pub use phase::{DesiredPhase, Phase};
pub use reconciler::{OperationTable, Outcome, ReconcileError, Reconciler};
pub use record::{ProvisionSpec, ProvisionStatus, RecordKey, ResourceRecord};
pub use store::{MemoryStore, RecordEvent, RecordStore, StoreError};
