//! Clients for the compute provider.
//!
//! - `ncloud`: signed HTTP client for the Ncloud VPC server API
//! - `dry_run`: logs requests without touching the provider

pub mod dry_run;
pub mod error;
pub mod ncloud;
pub mod signature;

pub use dry_run::DryRunProvider;
pub use error::{ProviderError, Result};
pub use ncloud::{NcloudClient, NcloudConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::request::{
    CreateServerRequest, DeleteServerRequest, ListServerRequest, OperationRequest,
    StopServerRequest, UpdateServerRequest,
};

/// Provider code/name pair (e.g. instance status `RUN` / `running`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CommonCode {
    pub code: String,
    pub code_name: String,
}

/// Server instance as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerInstance {
    pub server_instance_no: String,
    pub server_name: String,
    pub server_instance_status: CommonCode,
    pub server_instance_operation: CommonCode,
    pub vpc_no: String,
    pub subnet_no: String,
    pub server_product_code: String,
    pub server_image_product_code: String,
}

/// Common response body of every server instance operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerInstanceList {
    pub request_id: String,
    pub return_code: String,
    pub return_message: String,
    pub total_rows: u64,
    pub server_instance_list: Vec<ServerInstance>,
}

/// One method per provider operation. Every call is a single
/// request/response pair; implementations never poll or retry.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn create_server(&self, req: &CreateServerRequest) -> Result<ServerInstanceList>;

    async fn update_server(&self, req: &UpdateServerRequest) -> Result<ServerInstanceList>;

    async fn stop_server(&self, req: &StopServerRequest) -> Result<ServerInstanceList>;

    async fn delete_server(&self, req: &DeleteServerRequest) -> Result<ServerInstanceList>;

    async fn list_servers(&self, req: &ListServerRequest) -> Result<ServerInstanceList>;
}

/// Route a tagged request to the matching provider method.
pub async fn execute(
    provider: &dyn ProviderClient,
    req: &OperationRequest,
) -> Result<ServerInstanceList> {
    match req {
        OperationRequest::Create(r) => provider.create_server(r).await,
        OperationRequest::Update(r) => provider.update_server(r).await,
        OperationRequest::Stop(r) => provider.stop_server(r).await,
        OperationRequest::Delete(r) => provider.delete_server(r).await,
        OperationRequest::List(r) => provider.list_servers(r).await,
    }
}
