//! Loading `Provision` manifests from YAML files.
//!
//! ```yaml
//! apiVersion: vm.cloudclub.io/v1
//! kind: Provision
//! metadata:
//!   name: vm-1
//!   namespace: default
//! spec:
//!   phase: Create
//!   server:
//!     imageProductCode: SW.VSVR.OS.LNX64.CNTOS.0810.B050
//!   vpcNo: "1234"
//!   subnetNo: "5678"
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use super::{RecordStore, Result, StoreError};
use crate::record::{ProvisionSpec, RecordKey};

pub const KIND: &str = "Provision";

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

/// One `Provision` document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionManifest {
    #[serde(default)]
    pub api_version: String,
    pub kind: String,
    pub metadata: ManifestMetadata,
    #[serde(default)]
    pub spec: ProvisionSpec,
}

impl ProvisionManifest {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.metadata.namespace, &self.metadata.name)
    }
}

/// Parse all documents in a YAML string. Documents of other kinds are skipped.
pub fn parse(contents: &str) -> Result<Vec<ProvisionManifest>> {
    let mut manifests = Vec::new();
    for document in serde_yaml::Deserializer::from_str(contents) {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| StoreError::Invalid(e.to_string()))?;
        if value.is_null() {
            continue;
        }

        let kind = value.get("kind").and_then(|k| k.as_str()).unwrap_or("");
        if kind != KIND {
            warn!(kind, "Skipping non-Provision document");
            continue;
        }

        let manifest: ProvisionManifest =
            serde_yaml::from_value(value).map_err(|e| StoreError::Invalid(e.to_string()))?;
        manifests.push(manifest);
    }
    Ok(manifests)
}

/// Read every `*.yaml`/`*.yml` file in `dir`, sorted by file name.
pub async fn load_dir(dir: &Path) -> Result<Vec<ProvisionManifest>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| StoreError::Internal(format!("{}: {}", dir.display(), e)))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::Internal(format!("{}: {}", dir.display(), e)))?
    {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if is_yaml {
            paths.push(path);
        }
    }
    paths.sort();

    let mut manifests = Vec::new();
    for path in paths {
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::Internal(format!("{}: {}", path.display(), e)))?;
        let parsed = parse(&contents)
            .map_err(|e| StoreError::Invalid(format!("{}: {}", path.display(), e)))?;
        info!("Loaded {} manifest(s) from {}", parsed.len(), path.display());
        manifests.extend(parsed);
    }
    Ok(manifests)
}

/// Apply manifests to the store in order. Returns the number applied.
pub async fn apply_all(store: &dyn RecordStore, manifests: Vec<ProvisionManifest>) -> Result<usize> {
    let count = manifests.len();
    for manifest in manifests {
        let key = manifest.key();
        store.apply(key, manifest.spec).await?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const TWO_DOCS: &str = r#"
apiVersion: vm.cloudclub.io/v1
kind: Provision
metadata:
  name: vm-1
spec:
  phase: Create
  server:
    imageProductCode: SW.VSVR.OS.LNX64.CNTOS.0810.B050
  vpcNo: vpc-1
  subnetNo: subnet-1
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: unrelated
---
apiVersion: vm.cloudclub.io/v1
kind: Provision
metadata:
  name: vm-2
  namespace: team-a
spec:
  phase: Stop
  serverNo: "42"
"#;

    #[test]
    fn test_parse_skips_other_kinds() {
        let manifests = parse(TWO_DOCS).unwrap();
        assert_eq!(manifests.len(), 2);

        assert_eq!(manifests[0].key(), RecordKey::new("default", "vm-1"));
        assert_eq!(manifests[0].spec.vpc_no, "vpc-1");
        assert_eq!(
            manifests[0].spec.server.image_product_code,
            "SW.VSVR.OS.LNX64.CNTOS.0810.B050"
        );

        assert_eq!(manifests[1].key(), RecordKey::new("team-a", "vm-2"));
        assert_eq!(manifests[1].spec.server_no, "42");
    }

    #[test]
    fn test_parse_rejects_bad_provision() {
        let result = parse("kind: Provision\nspec: {}\n");
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_load_dir_and_apply() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), TWO_DOCS).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "kind: Provision").unwrap();

        let manifests = load_dir(dir.path()).await.unwrap();
        assert_eq!(manifests.len(), 2);

        let store = MemoryStore::new();
        let applied = apply_all(&store, manifests).await.unwrap();
        assert_eq!(applied, 2);
        assert_eq!(store.list(None).await.unwrap().len(), 2);
    }
}
