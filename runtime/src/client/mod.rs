//! Build service client.
//!
//! [`ForgeClient`] wraps a [`BuildService`] with the retry executor for every
//! call and the completion poller for awaited requests.

pub mod cancel;
pub mod poll;
pub mod retry;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use a3s_forge_core::api::{
    AwaitedContainerResponse, BuildStatus, ContainerInspectRequest, ContainerInspectResponse,
    ContainerStatusResponse, ServiceInfo, SubmitContainerRequest, SubmitContainerResponse,
};
use a3s_forge_core::config::{ForgeConfig, PollConfig, RetryConfig};
use a3s_forge_core::error::{ForgeError, Result};

pub use cancel::{CancelHandle, CancelSignal};
pub use poll::{CompletionPoller, PollOutcome, PollState};
pub use service::{BuildService, HttpBuildService};

/// What to do after a successful submit when completion is awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwaitDecision {
    /// The response already carries the outcome
    Terminal(bool),
    /// Poll the status of this request
    Poll(String),
    /// Nothing is pending
    Nothing,
}

impl AwaitDecision {
    /// Decide from a submit response.
    ///
    /// A build or mirror reported without a request id cannot be tracked and
    /// is a protocol error.
    pub fn from_response(response: &SubmitContainerResponse) -> Result<Self> {
        if let Some(succeeded) = response.succeeded {
            return Ok(AwaitDecision::Terminal(succeeded));
        }
        if let Some(request_id) = response.request_id.as_deref().filter(|id| !id.is_empty()) {
            return Ok(AwaitDecision::Poll(request_id.to_string()));
        }
        if response.build_id.is_some() || response.mirror_id.is_some() {
            return Err(ForgeError::protocol(
                None,
                "response reports a pending build without a request id",
            ));
        }
        Ok(AwaitDecision::Nothing)
    }
}

/// Result of [`ForgeClient::submit_and_await`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Nothing to wait for; the response is reported as-is
    Submitted(SubmitContainerResponse),
    /// Final state reached
    Awaited(AwaitedContainerResponse),
}

/// Build service client with retry and polling.
#[derive(Clone)]
pub struct ForgeClient {
    service: Arc<dyn BuildService>,
    retry: RetryConfig,
    poll: PollConfig,
}

impl ForgeClient {
    pub fn new(service: Arc<dyn BuildService>, retry: RetryConfig, poll: PollConfig) -> Self {
        Self {
            service,
            retry,
            poll,
        }
    }

    /// HTTP client for the configured endpoint.
    pub fn from_config(config: &ForgeConfig) -> Result<Self> {
        let service = HttpBuildService::new(&config.endpoint)?;
        Ok(Self::new(
            Arc::new(service),
            config.retry.clone(),
            config.poll.clone(),
        ))
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Submit a container request.
    pub async fn submit(&self, request: &SubmitContainerRequest) -> Result<SubmitContainerResponse> {
        let response = retry::execute(&self.retry, ForgeError::is_retryable, || {
            self.service.submit(request)
        })
        .await?;
        tracing::info!(
            request_id = response.request_id.as_deref().unwrap_or("-"),
            target_image = response.target_image.as_deref().unwrap_or("-"),
            "Container request submitted"
        );
        Ok(response)
    }

    /// Fetch the status of a request once.
    pub async fn status(&self, request_id: &str) -> Result<ContainerStatusResponse> {
        retry::execute(&self.retry, ForgeError::is_retryable, || {
            self.service.container_status(request_id)
        })
        .await
    }

    pub async fn inspect(&self, request: &ContainerInspectRequest) -> Result<ContainerInspectResponse> {
        retry::execute(&self.retry, ForgeError::is_retryable, || {
            self.service.inspect(request)
        })
        .await
    }

    pub async fn service_info(&self) -> Result<ServiceInfo> {
        retry::execute(&self.retry, ForgeError::is_retryable, || {
            self.service.service_info()
        })
        .await
    }

    /// Poll `request_id` until a terminal state.
    ///
    /// Timeouts and cancellation are returned as errors.
    pub async fn await_completion(
        &self,
        request_id: &str,
        timeout: Duration,
        cancel: &CancelSignal,
    ) -> Result<(BuildStatus, ContainerStatusResponse)> {
        let poller = CompletionPoller::new(&self.poll, self.retry.clone()).with_timeout(timeout);
        match poller.poll(self.service.as_ref(), request_id, cancel).await? {
            PollOutcome::Completed(status) => Ok((BuildStatus::Completed, status)),
            PollOutcome::Failed(status) => Ok((BuildStatus::Failed, status)),
            PollOutcome::TimedOut { elapsed, .. } => Err(ForgeError::Timeout {
                request_id: request_id.to_string(),
                waited: elapsed,
            }),
            PollOutcome::Cancelled => Err(ForgeError::Cancelled),
        }
    }

    /// Submit, then wait for completion when the response leaves something
    /// pending.
    pub async fn submit_and_await(
        &self,
        request: &SubmitContainerRequest,
        timeout: Duration,
        cancel: &CancelSignal,
    ) -> Result<SubmitOutcome> {
        let response = self.submit(request).await?;

        match AwaitDecision::from_response(&response)? {
            AwaitDecision::Terminal(succeeded) => {
                let status = if succeeded {
                    BuildStatus::Completed
                } else {
                    BuildStatus::Failed
                };
                Ok(SubmitOutcome::Awaited(AwaitedContainerResponse {
                    response,
                    status,
                    duration: None,
                    vulnerabilities: None,
                    reason: None,
                    details_uri: None,
                }))
            }
            AwaitDecision::Poll(request_id) => {
                let (status, detail) = self.await_completion(&request_id, timeout, cancel).await?;
                tracing::info!(request_id = %request_id, status = %status, "Container request finished");
                Ok(SubmitOutcome::Awaited(AwaitedContainerResponse::new(
                    response, status, &detail,
                )))
            }
            AwaitDecision::Nothing => Ok(SubmitOutcome::Submitted(response)),
        }
    }
}
