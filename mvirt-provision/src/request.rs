//! Per-operation provider requests.
//!
//! Each request carries only the fields its operation needs. Empty strings are
//! kept as-is when shaping; `missing_fields` reports them so the provider
//! client can reject the request before it goes out.

use crate::phase::Phase;

/// Request to create a server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateServerRequest {
    pub server_image_product_code: String,
    pub vpc_no: String,
    pub subnet_no: String,
    pub network_interface_order: u32,
    pub access_control_group_no_list: Vec<String>,
    pub server_product_code: String,
}

/// Request to change a server instance's flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateServerRequest {
    pub server_instance_no: String,
    pub server_product_code: String,
}

/// Request to stop a server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopServerRequest {
    pub server_no: String,
}

/// Request to terminate a server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteServerRequest {
    pub server_no: String,
}

/// Request to list server instances in a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListServerRequest {
    /// Empty means the client's configured region.
    pub region_code: String,
}

/// One shaped request, tagged by operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationRequest {
    Create(CreateServerRequest),
    Update(UpdateServerRequest),
    Stop(StopServerRequest),
    Delete(DeleteServerRequest),
    List(ListServerRequest),
}

impl OperationRequest {
    /// The phase this request serves.
    pub fn phase(&self) -> Phase {
        match self {
            OperationRequest::Create(_) => Phase::Create,
            OperationRequest::Update(_) => Phase::Update,
            OperationRequest::Stop(_) => Phase::Stop,
            OperationRequest::Delete(_) => Phase::Delete,
            OperationRequest::List(_) => Phase::Get,
        }
    }

    /// Provider operation name, as used in logs.
    pub fn operation(&self) -> &'static str {
        match self {
            OperationRequest::Create(_) => "create-instance",
            OperationRequest::Update(_) => "change-instance-spec",
            OperationRequest::Stop(_) => "stop-instance",
            OperationRequest::Delete(_) => "terminate-instance",
            OperationRequest::List(_) => "describe-instance-list",
        }
    }

    /// Names of required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let mut require = |value: &str, name: &'static str| {
            if value.trim().is_empty() {
                missing.push(name);
            }
        };

        match self {
            OperationRequest::Create(r) => {
                require(&r.server_image_product_code, "serverImageProductCode");
                require(&r.vpc_no, "vpcNo");
                require(&r.subnet_no, "subnetNo");
                // The provider would otherwise pick its default flavor.
                require(&r.server_product_code, "serverProductCode");
            }
            OperationRequest::Update(r) => {
                require(&r.server_instance_no, "serverInstanceNo");
                require(&r.server_product_code, "serverProductCode");
            }
            OperationRequest::Stop(r) => require(&r.server_no, "serverNo"),
            OperationRequest::Delete(r) => require(&r.server_no, "serverNo"),
            // Region falls back to the client's configured region.
            OperationRequest::List(_) => {}
        }

        missing
    }
}
