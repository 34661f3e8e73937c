//! Shared test utilities for mvirt-provision integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mvirt_provision::clients::{ProviderClient, Result, ServerInstance, ServerInstanceList};
use mvirt_provision::request::{
    CreateServerRequest, DeleteServerRequest, ListServerRequest, OperationRequest,
    StopServerRequest, UpdateServerRequest,
};
use mvirt_provision::rest::{AppState, create_router};
use mvirt_provision::store::{RecordEvent, Result as StoreResult};
use mvirt_provision::{
    MemoryStore, OperationTable, ProviderError, ProvisionSpec, ProvisionStatus, RecordKey,
    RecordStore, Reconciler, ResourceRecord, StoreError,
};
use reqwest::{Client, Response as ReqwestResponse};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Provider that records every request and answers from a script.
#[derive(Default)]
pub struct RecordingProvider {
    calls: Mutex<Vec<OperationRequest>>,
    /// Errors returned (in order) before falling back to success
    failures: Mutex<VecDeque<ProviderError>>,
    /// Artificial latency per call
    delay: Mutex<Option<Duration>>,
    /// Every call fails transiently while set
    unavailable: AtomicBool,
}

impl RecordingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, error: ProviderError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<OperationRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Poll until at least `n` calls were recorded.
    pub async fn wait_for_calls(&self, n: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.call_count() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.call_count() >= n
    }

    async fn record(&self, request: OperationRequest) -> Result<ServerInstanceList> {
        self.calls.lock().unwrap().push(request);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProviderError::Transient("service unavailable".to_string()));
        }
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        Ok(ServerInstanceList {
            request_id: "req-test".to_string(),
            return_code: "0".to_string(),
            return_message: "success".to_string(),
            total_rows: 1,
            server_instance_list: vec![ServerInstance {
                server_instance_no: "srv-100".to_string(),
                ..Default::default()
            }],
        })
    }
}

#[async_trait]
impl ProviderClient for RecordingProvider {
    async fn create_server(&self, req: &CreateServerRequest) -> Result<ServerInstanceList> {
        self.record(OperationRequest::Create(req.clone())).await
    }

    async fn update_server(&self, req: &UpdateServerRequest) -> Result<ServerInstanceList> {
        self.record(OperationRequest::Update(req.clone())).await
    }

    async fn stop_server(&self, req: &StopServerRequest) -> Result<ServerInstanceList> {
        self.record(OperationRequest::Stop(req.clone())).await
    }

    async fn delete_server(&self, req: &DeleteServerRequest) -> Result<ServerInstanceList> {
        self.record(OperationRequest::Delete(req.clone())).await
    }

    async fn list_servers(&self, req: &ListServerRequest) -> Result<ServerInstanceList> {
        self.record(OperationRequest::List(req.clone())).await
    }
}

pub fn key(name: &str) -> RecordKey {
    RecordKey::new("default", name)
}

pub fn spec_with_phase(phase: &str) -> ProvisionSpec {
    ProvisionSpec {
        phase: phase.to_string(),
        ..Default::default()
    }
}

/// The create scenario record: image, VPC and subnet populated.
pub fn create_spec() -> ProvisionSpec {
    let mut spec = spec_with_phase("Create");
    spec.server.image_product_code = "SW.VSVR.OS.LNX64.CNTOS.0810.B050".to_string();
    spec.vpc_no = "vpc-1".to_string();
    spec.subnet_no = "subnet-1".to_string();
    spec
}

/// Memory store whose reads and status writes can be made to fail.
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    fail_get: AtomicBool,
    fail_update_status: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_get(&self, fail: bool) {
        self.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_update_status(&self, fail: bool) {
        self.fail_update_status.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn get(&self, key: &RecordKey) -> StoreResult<Option<ResourceRecord>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("backend unavailable".to_string()));
        }
        self.inner.get(key).await
    }

    async fn list(&self, namespace: Option<&str>) -> StoreResult<Vec<ResourceRecord>> {
        self.inner.list(namespace).await
    }

    async fn apply(&self, key: RecordKey, spec: ProvisionSpec) -> StoreResult<ResourceRecord> {
        self.inner.apply(key, spec).await
    }

    async fn update_spec(
        &self,
        key: &RecordKey,
        resource_version: u64,
        spec: ProvisionSpec,
    ) -> StoreResult<ResourceRecord> {
        self.inner.update_spec(key, resource_version, spec).await
    }

    async fn update_status(
        &self,
        key: &RecordKey,
        resource_version: u64,
        status: ProvisionStatus,
    ) -> StoreResult<ResourceRecord> {
        if self.fail_update_status.load(Ordering::SeqCst) {
            return Err(StoreError::Internal("disk full".to_string()));
        }
        self.inner
            .update_status(key, resource_version, status)
            .await
    }

    async fn delete(&self, key: &RecordKey) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    fn subscribe(&self) -> broadcast::Receiver<RecordEvent> {
        self.inner.subscribe()
    }
}

/// Store + recording provider + reconciler wired together.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<RecordingProvider>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let provider = RecordingProvider::new();
        let reconciler = Arc::new(Reconciler::new(
            store.clone() as Arc<dyn RecordStore>,
            provider.clone() as Arc<dyn ProviderClient>,
            OperationTable::new(),
        ));
        Self {
            store,
            provider,
            reconciler,
        }
    }
}

/// Like `Harness`, but over a `FailingStore`.
pub struct FailingHarness {
    pub store: Arc<FailingStore>,
    pub provider: Arc<RecordingProvider>,
    pub reconciler: Arc<Reconciler>,
}

impl FailingHarness {
    pub fn new() -> Self {
        let store = FailingStore::new();
        let provider = RecordingProvider::new();
        let reconciler = Arc::new(Reconciler::new(
            store.clone() as Arc<dyn RecordStore>,
            provider.clone() as Arc<dyn ProviderClient>,
            OperationTable::new(),
        ));
        Self {
            store,
            provider,
            reconciler,
        }
    }
}

/// REST API server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<MemoryStore>,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let app_state = Arc::new(AppState {
            store: store.clone() as Arc<dyn RecordStore>,
        });
        let router = create_router(app_state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server error");
        });

        Self {
            addr,
            client: Client::new(),
            store,
            shutdown_tx,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    pub async fn get(&self, path: &str) -> ReqwestResponse {
        self.client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn put_json<T: Serialize>(&self, path: &str, body: &T) -> ReqwestResponse {
        self.client
            .put(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn patch_json<T: Serialize>(&self, path: &str, body: &T) -> ReqwestResponse {
        self.client
            .patch(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn delete(&self, path: &str) -> ReqwestResponse {
        self.client
            .delete(format!("{}{}", self.base_url(), path))
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}
