//! Client for the Ncloud VPC server API (`/vserver/v2`).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use super::signature::{self, HEADER_ACCESS_KEY, HEADER_SIGNATURE, HEADER_TIMESTAMP};
use super::{ProviderClient, ProviderError, Result, ServerInstanceList};
use crate::request::{
    CreateServerRequest, DeleteServerRequest, ListServerRequest, OperationRequest,
    StopServerRequest, UpdateServerRequest,
};

pub const DEFAULT_API_URL: &str = "https://ncloud.apigw.ntruss.com";

const CREATE_SERVER_INSTANCES: &str = "createServerInstances";
const CHANGE_SERVER_INSTANCE_SPEC: &str = "changeServerInstanceSpec";
const STOP_SERVER_INSTANCES: &str = "stopServerInstances";
const TERMINATE_SERVER_INSTANCES: &str = "terminateServerInstances";
const GET_SERVER_INSTANCE_LIST: &str = "getServerInstanceList";

/// Connection settings for the Ncloud API gateway.
#[derive(Debug, Clone)]
pub struct NcloudConfig {
    pub api_url: String,
    pub region_code: String,
    pub access_key: String,
    pub secret_key: String,
    pub timeout: Duration,
}

impl Default for NcloudConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            region_code: "KR".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Signed HTTP client for server instance operations.
#[derive(Debug, Clone)]
pub struct NcloudClient {
    config: Arc<NcloudConfig>,
    http: reqwest::Client,
}

impl NcloudClient {
    pub fn new(config: NcloudConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Transient(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// Reject requests with empty required fields before any I/O.
    fn preflight(&self, req: OperationRequest) -> Result<()> {
        let missing = req.missing_fields();
        if missing.is_empty() {
            return Ok(());
        }
        warn!(
            operation = req.operation(),
            ?missing,
            "Rejecting request with missing fields"
        );
        Err(ProviderError::MalformedRequest(format!(
            "{}: missing {}",
            req.operation(),
            missing.join(", ")
        )))
    }

    fn build_url(&self, action: &str, region_code: &str, params: &[(String, String)]) -> Result<Url> {
        let base = self.config.api_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/vserver/v2/{}", base, action))
            .map_err(|e| ProviderError::MalformedRequest(format!("invalid API URL: {}", e)))?;

        let region = if region_code.is_empty() {
            self.config.region_code.as_str()
        } else {
            region_code
        };

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("regionCode", region);
            for (k, v) in params {
                query.append_pair(k, v);
            }
            query.append_pair("responseFormatType", "json");
        }

        Ok(url)
    }

    async fn call(
        &self,
        action: &str,
        region_code: &str,
        params: Vec<(String, String)>,
    ) -> Result<ServerInstanceList> {
        let url = self.build_url(action, region_code, &params)?;
        let uri = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };
        let timestamp = chrono::Utc::now().timestamp_millis();
        let sig = signature::sign(
            "GET",
            &uri,
            timestamp,
            &self.config.access_key,
            &self.config.secret_key,
        )?;

        debug!(action, %uri, "Calling Ncloud API");

        let response = self
            .http
            .get(url)
            .header(HEADER_TIMESTAMP, timestamp.to_string())
            .header(HEADER_ACCESS_KEY, &self.config.access_key)
            .header(HEADER_SIGNATURE, sig)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("{}: {}", action, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transient(format!("{}: failed to read body: {}", action, e)))?;

        if !status.is_success() {
            return Err(classify_failure(action, status, &body));
        }

        let list = decode_response(action, &body)?;
        if !list.return_code.is_empty() && list.return_code != "0" {
            return Err(ProviderError::MalformedRequest(format!(
                "{}: returnCode {}: {}",
                action, list.return_code, list.return_message
            )));
        }

        debug!(
            action,
            request_id = %list.request_id,
            total_rows = list.total_rows,
            "Ncloud API call succeeded"
        );
        Ok(list)
    }
}

#[async_trait]
impl ProviderClient for NcloudClient {
    async fn create_server(&self, req: &CreateServerRequest) -> Result<ServerInstanceList> {
        self.preflight(OperationRequest::Create(req.clone()))?;

        let mut params = vec![
            (
                "serverImageProductCode".to_string(),
                req.server_image_product_code.clone(),
            ),
            ("vpcNo".to_string(), req.vpc_no.clone()),
            ("subnetNo".to_string(), req.subnet_no.clone()),
            (
                "networkInterfaceList.1.networkInterfaceOrder".to_string(),
                req.network_interface_order.to_string(),
            ),
        ];
        for (i, acg) in req.access_control_group_no_list.iter().enumerate() {
            params.push((
                format!("networkInterfaceList.1.accessControlGroupNoList.{}", i + 1),
                acg.clone(),
            ));
        }
        params.push(("serverProductCode".to_string(), req.server_product_code.clone()));

        self.call(CREATE_SERVER_INSTANCES, "", params).await
    }

    async fn update_server(&self, req: &UpdateServerRequest) -> Result<ServerInstanceList> {
        self.preflight(OperationRequest::Update(req.clone()))?;
        let params = vec![
            ("serverInstanceNo".to_string(), req.server_instance_no.clone()),
            ("serverProductCode".to_string(), req.server_product_code.clone()),
        ];
        self.call(CHANGE_SERVER_INSTANCE_SPEC, "", params).await
    }

    async fn stop_server(&self, req: &StopServerRequest) -> Result<ServerInstanceList> {
        self.preflight(OperationRequest::Stop(req.clone()))?;
        let params = vec![("serverInstanceNoList.1".to_string(), req.server_no.clone())];
        self.call(STOP_SERVER_INSTANCES, "", params).await
    }

    async fn delete_server(&self, req: &DeleteServerRequest) -> Result<ServerInstanceList> {
        self.preflight(OperationRequest::Delete(req.clone()))?;
        let params = vec![("serverInstanceNoList.1".to_string(), req.server_no.clone())];
        self.call(TERMINATE_SERVER_INSTANCES, "", params).await
    }

    async fn list_servers(&self, req: &ListServerRequest) -> Result<ServerInstanceList> {
        self.call(GET_SERVER_INSTANCE_LIST, &req.region_code, Vec::new())
            .await
    }
}

/// Unwraps `{"<action>Response": {...}}`.
fn decode_response(action: &str, body: &str) -> Result<ServerInstanceList> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::Decode(format!("{}: {}", action, e)))?;

    let inner = value
        .as_object()
        .and_then(|obj| {
            obj.iter()
                .find(|(k, _)| k.ends_with("Response"))
                .map(|(_, v)| v.clone())
        })
        .ok_or_else(|| ProviderError::Decode(format!("{}: missing response envelope", action)))?;

    serde_json::from_value(inner).map_err(|e| ProviderError::Decode(format!("{}: {}", action, e)))
}

/// Extracts the provider's error message from either error envelope.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    if let Some(err) = value.get("responseError") {
        let code = err.get("returnCode").and_then(Value::as_str).unwrap_or("");
        let msg = err.get("returnMessage").and_then(Value::as_str).unwrap_or("");
        return format!("{} {}", code, msg).trim().to_string();
    }
    if let Some(err) = value.get("error") {
        let code = err.get("errorCode").and_then(Value::as_str).unwrap_or("");
        let msg = err.get("message").and_then(Value::as_str).unwrap_or("");
        return format!("{} {}", code, msg).trim().to_string();
    }

    body.trim().to_string()
}

fn classify_failure(action: &str, status: StatusCode, body: &str) -> ProviderError {
    let msg = format!("{} ({}): {}", action, status.as_u16(), error_message(body));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(msg),
        StatusCode::NOT_FOUND => ProviderError::NotFound(msg),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::Transient(msg),
        StatusCode::BAD_REQUEST => {
            let lower = msg.to_ascii_lowercase();
            if lower.contains("quota") || lower.contains("limit exceeded") {
                ProviderError::QuotaExceeded(msg)
            } else {
                ProviderError::MalformedRequest(msg)
            }
        }
        s if s.is_server_error() => ProviderError::Transient(msg),
        _ => ProviderError::MalformedRequest(msg),
    }
}
