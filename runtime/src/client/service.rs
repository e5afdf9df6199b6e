//! Build service transport.
//!
//! [`BuildService`] is the seam between the client logic (retry, polling)
//! and the network. Each method performs exactly one attempt; retries are
//! layered on top by the caller.

use std::time::Duration;

use a3s_forge_core::api::{
    ContainerInspectRequest, ContainerInspectResponse, ContainerStatusResponse, ServiceInfo,
    ServiceInfoResponse, SubmitContainerRequest, SubmitContainerResponse,
};
use a3s_forge_core::error::{ForgeError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Submit endpoint.
pub const SUBMIT_PATH: &str = "/v1alpha2/container";
/// Inspect endpoint.
pub const INSPECT_PATH: &str = "/v1alpha1/inspect";
/// Service info endpoint.
pub const SERVICE_INFO_PATH: &str = "/service-info";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status codes treated as temporary unavailability.
pub const RETRYABLE_STATUS: [u16; 4] = [429, 502, 503, 504];

/// Remote build service operations, one attempt each.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Submit a container request.
    async fn submit(&self, request: &SubmitContainerRequest) -> Result<SubmitContainerResponse>;

    /// Fetch the current status of a submitted request.
    async fn container_status(&self, request_id: &str) -> Result<ContainerStatusResponse>;

    /// Inspect a container image.
    async fn inspect(&self, request: &ContainerInspectRequest) -> Result<ContainerInspectResponse>;

    /// Service identification.
    async fn service_info(&self) -> Result<ServiceInfo>;
}

/// Path of the status endpoint for a request.
pub fn status_path(request_id: &str) -> String {
    format!("{}/{}/status", SUBMIT_PATH, request_id)
}

/// HTTP implementation of [`BuildService`].
#[derive(Debug, Clone)]
pub struct HttpBuildService {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpBuildService {
    /// Create a client for the service at `endpoint` (trailing `/` ignored).
    pub fn new(endpoint: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(format!("a3s-forge/{}", a3s_forge_core::VERSION))
            .build()
            .map_err(|e| ForgeError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Self::with_client(endpoint, http)
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(endpoint: &str, http: reqwest::Client) -> Result<Self> {
        let endpoint = endpoint.trim().trim_end_matches('/');
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ForgeError::Config(format!(
                "Endpoint must start with http:// or https:// - offending value: {}",
                endpoint
            )));
        }
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Send one request and decode a 200 response.
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ForgeError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ForgeError::Transport(format!("failed to read response: {}", e)))?;

        tracing::debug!(status, bytes = body.len(), "Build service response");
        classify(status, body)
    }
}

/// Map a status code and body to a decoded payload or a typed error.
fn classify<T: DeserializeOwned>(status: u16, body: String) -> Result<T> {
    match status {
        200 => serde_json::from_str(&body).map_err(|e| {
            ForgeError::protocol(Some(status), format!("unable to decode response: {}", e))
        }),
        s if RETRYABLE_STATUS.contains(&s) => Err(ForgeError::ServiceUnavailable { status, body }),
        _ => Err(ForgeError::protocol(Some(status), body)),
    }
}

#[async_trait]
impl BuildService for HttpBuildService {
    async fn submit(&self, request: &SubmitContainerRequest) -> Result<SubmitContainerResponse> {
        let url = self.url(SUBMIT_PATH);
        tracing::debug!(url = %url, "Submitting container request");
        self.send(self.http.post(&url).json(request)).await
    }

    async fn container_status(&self, request_id: &str) -> Result<ContainerStatusResponse> {
        let url = self.url(&status_path(request_id));
        tracing::debug!(url = %url, "Fetching container status");
        self.send(self.http.get(&url)).await
    }

    async fn inspect(&self, request: &ContainerInspectRequest) -> Result<ContainerInspectResponse> {
        let url = self.url(INSPECT_PATH);
        tracing::debug!(url = %url, image = %request.container_image, "Inspecting container");
        self.send(self.http.post(&url).json(request)).await
    }

    async fn service_info(&self) -> Result<ServiceInfo> {
        let url = self.url(SERVICE_INFO_PATH);
        let response: ServiceInfoResponse = self.send(self.http.get(&url)).await?;
        Ok(response.service_info)
    }
}
