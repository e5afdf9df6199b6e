//! Completion polling for submitted container requests.

use std::time::Duration;

use a3s_forge_core::api::{BuildStatus, ContainerStatusResponse};
use a3s_forge_core::config::{PollConfig, RetryConfig};
use a3s_forge_core::error::{ForgeError, Result};
use tokio::time::Instant;

use super::cancel::CancelSignal;
use super::retry;
use super::service::BuildService;

/// How a poll session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Terminal COMPLETED status
    Completed(ContainerStatusResponse),
    /// Terminal FAILED status, carrying reason and details URI
    Failed(ContainerStatusResponse),
    /// Deadline reached while still pending
    TimedOut {
        elapsed: Duration,
        last: Option<ContainerStatusResponse>,
    },
    /// Cancellation requested
    Cancelled,
}

/// Per-session polling state.
#[derive(Debug, Clone)]
pub struct PollState {
    pub start: Instant,
    /// `None` when the timeout is too large to represent as an instant.
    pub deadline: Option<Instant>,
    pub last_status: Option<ContainerStatusResponse>,
    pub ticks: u32,
}

impl PollState {
    fn new(timeout: Duration) -> Self {
        let start = Instant::now();
        Self {
            start,
            deadline: start.checked_add(timeout),
            last_status: None,
            ticks: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Polls the status endpoint until a terminal state, the deadline or
/// cancellation.
#[derive(Debug, Clone)]
pub struct CompletionPoller {
    interval: Duration,
    timeout: Duration,
    retry: RetryConfig,
}

impl CompletionPoller {
    pub fn new(poll: &PollConfig, retry: RetryConfig) -> Self {
        Self {
            interval: poll.interval(),
            timeout: poll.timeout(),
            retry,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for `request_id` to reach a terminal state.
    ///
    /// Every status call goes through the retry executor. Malformed payloads
    /// and unexpected status codes are returned as errors immediately.
    pub async fn poll(
        &self,
        service: &dyn BuildService,
        request_id: &str,
        cancel: &CancelSignal,
    ) -> Result<PollOutcome> {
        let mut state = PollState::new(self.timeout);
        tracing::debug!(
            request_id,
            interval_secs = self.interval.as_secs_f64(),
            timeout_secs = self.timeout.as_secs(),
            "Awaiting container completion"
        );

        loop {
            if cancel.is_cancelled() {
                return Ok(PollOutcome::Cancelled);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
                result = retry::execute(&self.retry, ForgeError::is_retryable, || {
                    service.container_status(request_id)
                }) => result?,
            };
            state.ticks += 1;

            let build_status = status.build_status()?;
            tracing::debug!(
                request_id,
                tick = state.ticks,
                status = %build_status,
                elapsed_secs = state.elapsed().as_secs(),
                "Container status"
            );

            match build_status {
                BuildStatus::Completed => return Ok(PollOutcome::Completed(status)),
                BuildStatus::Failed => return Ok(PollOutcome::Failed(status)),
                BuildStatus::Pending => {
                    state.last_status = Some(status);
                    if state.expired() {
                        return Ok(PollOutcome::TimedOut {
                            elapsed: state.elapsed(),
                            last: state.last_status,
                        });
                    }
                }
            }
        }
    }
}
