//! Phase → handler table.
//!
//! Built once when the reconciler is constructed. Lookup by `Phase` is total;
//! only an unrecognized declared phase has no handler.

use crate::clients::{self, ProviderClient, Result, ServerInstanceList};
use crate::phase::{DesiredPhase, Phase};
use crate::record::ProvisionSpec;
use crate::request::{
    CreateServerRequest, DeleteServerRequest, ListServerRequest, OperationRequest,
    StopServerRequest, UpdateServerRequest,
};

type ShapeFn = fn(&ProvisionSpec) -> OperationRequest;

/// Shapes a request from a spec and hands it to the provider.
#[derive(Clone, Copy)]
pub struct Handler {
    pub phase: Phase,
    shape: ShapeFn,
}

impl Handler {
    /// Populate this handler's request from the spec. Pure.
    pub fn shape(&self, spec: &ProvisionSpec) -> OperationRequest {
        (self.shape)(spec)
    }

    /// Issue exactly one provider call for `request`.
    pub async fn invoke(
        &self,
        provider: &dyn ProviderClient,
        request: &OperationRequest,
    ) -> Result<ServerInstanceList> {
        clients::execute(provider, request).await
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler").field("phase", &self.phase).finish()
    }
}

/// Fixed mapping from phase to handler.
#[derive(Debug, Clone)]
pub struct OperationTable {
    handlers: [Handler; 5],
}

impl OperationTable {
    pub fn new() -> Self {
        // Order must follow `Phase::index`.
        Self {
            handlers: [
                Handler {
                    phase: Phase::Create,
                    shape: shape_create,
                },
                Handler {
                    phase: Phase::Update,
                    shape: shape_update,
                },
                Handler {
                    phase: Phase::Stop,
                    shape: shape_stop,
                },
                Handler {
                    phase: Phase::Delete,
                    shape: shape_delete,
                },
                Handler {
                    phase: Phase::Get,
                    shape: shape_get,
                },
            ],
        }
    }

    pub fn lookup(&self, phase: Phase) -> &Handler {
        &self.handlers[phase.index()]
    }

    /// Handler for a declared phase; `None` only for `Unrecognized`.
    pub fn resolve(&self, desired: &DesiredPhase) -> Option<&Handler> {
        match desired {
            DesiredPhase::Known(phase) => Some(self.lookup(*phase)),
            DesiredPhase::Unrecognized(_) => None,
        }
    }

    /// Supported phases in table order.
    pub fn phases(&self) -> impl Iterator<Item = Phase> + '_ {
        self.handlers.iter().map(|h| h.phase)
    }
}

impl Default for OperationTable {
    fn default() -> Self {
        Self::new()
    }
}

fn shape_create(spec: &ProvisionSpec) -> OperationRequest {
    OperationRequest::Create(CreateServerRequest {
        server_image_product_code: spec.server.image_product_code.clone(),
        vpc_no: spec.vpc_no.clone(),
        subnet_no: spec.subnet_no.clone(),
        network_interface_order: spec.network_interface.order,
        access_control_group_no_list: spec.access_control_group_no_list.clone(),
        server_product_code: spec.server.product_code.clone(),
    })
}

fn shape_update(spec: &ProvisionSpec) -> OperationRequest {
    OperationRequest::Update(UpdateServerRequest {
        server_instance_no: spec.server_instance_no.clone(),
        server_product_code: spec.server.product_code.clone(),
    })
}

fn shape_stop(spec: &ProvisionSpec) -> OperationRequest {
    OperationRequest::Stop(StopServerRequest {
        server_no: spec.server_no.clone(),
    })
}

fn shape_delete(spec: &ProvisionSpec) -> OperationRequest {
    OperationRequest::Delete(DeleteServerRequest {
        server_no: spec.server_no.clone(),
    })
}

fn shape_get(spec: &ProvisionSpec) -> OperationRequest {
    OperationRequest::List(ListServerRequest {
        region_code: spec.region_code.clone(),
    })
}
