//! Provision records: the desired-state document a user edits and the
//! observed state the controller writes back.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::phase::Phase;

/// Unique identifier of a provision record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub namespace: String,
    pub name: String,
}

impl RecordKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Server image and flavor selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSpec {
    /// OS image product code (e.g. `SW.VSVR.OS.LNX64.CNTOS.0810.B050`)
    pub image_product_code: String,
    /// Server flavor product code
    pub product_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkInterfaceSpec {
    /// Ordinal of the primary network interface
    pub order: u32,
}

/// Desired state, owned by whoever edits the record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisionSpec {
    /// Declared lifecycle phase. Kept as the raw string so that invalid values
    /// reach the reconciler and are reported instead of being dropped at parse time.
    pub phase: String,
    pub server: ServerSpec,
    pub vpc_no: String,
    pub subnet_no: String,
    pub network_interface: NetworkInterfaceSpec,
    #[serde(rename = "accessControlGroupNoListN")]
    pub access_control_group_no_list: Vec<String>,
    /// Provider-assigned server number (stop/delete target)
    pub server_no: String,
    /// Provider-assigned server instance number (update target)
    pub server_instance_no: String,
    pub region_code: String,
}

/// Observed state, written only by the controller after a successful pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisionStatus {
    /// Last phase whose provider operation completed successfully
    pub phase: Option<Phase>,
    /// First server instance number reported by the provider for that operation
    pub server_instance_no: Option<String>,
    /// Spec generation the observation belongs to
    pub observed_generation: u64,
    pub last_reconciled_at: Option<String>,
}

/// A provision record as held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub key: RecordKey,
    /// Bumped on every spec change
    pub generation: u64,
    /// Bumped on every write (spec or status); used for optimistic concurrency
    pub resource_version: u64,
    pub spec: ProvisionSpec,
    #[serde(default)]
    pub status: ProvisionStatus,
}

impl ResourceRecord {
    pub fn new(key: RecordKey, spec: ProvisionSpec) -> Self {
        Self {
            key,
            generation: 1,
            resource_version: 1,
            spec,
            status: ProvisionStatus::default(),
        }
    }
}
