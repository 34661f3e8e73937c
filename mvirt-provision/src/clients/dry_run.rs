//! Provider that only logs what it would have sent.

use async_trait::async_trait;
use tracing::info;

use super::{ProviderClient, Result, ServerInstanceList};
use crate::request::{
    CreateServerRequest, DeleteServerRequest, ListServerRequest, StopServerRequest,
    UpdateServerRequest,
};

/// Logs each request and answers with an empty list.
#[derive(Debug, Clone, Default)]
pub struct DryRunProvider;

impl DryRunProvider {
    fn respond(&self) -> ServerInstanceList {
        ServerInstanceList {
            return_code: "0".to_string(),
            return_message: "dry-run".to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ProviderClient for DryRunProvider {
    async fn create_server(&self, req: &CreateServerRequest) -> Result<ServerInstanceList> {
        info!(?req, "dry-run: create-instance");
        Ok(self.respond())
    }

    async fn update_server(&self, req: &UpdateServerRequest) -> Result<ServerInstanceList> {
        info!(?req, "dry-run: change-instance-spec");
        Ok(self.respond())
    }

    async fn stop_server(&self, req: &StopServerRequest) -> Result<ServerInstanceList> {
        info!(?req, "dry-run: stop-instance");
        Ok(self.respond())
    }

    async fn delete_server(&self, req: &DeleteServerRequest) -> Result<ServerInstanceList> {
        info!(?req, "dry-run: terminate-instance");
        Ok(self.respond())
    }

    async fn list_servers(&self, req: &ListServerRequest) -> Result<ServerInstanceList> {
        info!(?req, "dry-run: describe-instance-list");
        Ok(self.respond())
    }
}
