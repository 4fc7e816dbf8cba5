//! Release processing poller.
//!
//! After commit the service processes the package asynchronously. The poller is
//! a small state machine: it stays in [`PollState::Polling`] until the service
//! reports the release as ready, reports a processing error, or the attempt
//! bound is reached. Status requests are paced by a fixed interval and every
//! wait races the cancellation token.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::client::AppClient;
use crate::config::PollingConfig;
use crate::error::{ApiError, Error, Result};
use crate::types::{Event, ReleaseStatus};

/// Source of processing status for a committed upload
#[async_trait::async_trait]
pub(crate) trait ReleaseStatusSource: Send + Sync {
    async fn release_status(&self, id: &str) -> std::result::Result<ReleaseStatus, ApiError>;
}

#[async_trait::async_trait]
impl ReleaseStatusSource for AppClient {
    async fn release_status(&self, id: &str) -> std::result::Result<ReleaseStatus, ApiError> {
        self.get(&["uploads", "releases", id]).await
    }
}

/// Poller states
#[derive(Debug)]
pub(crate) enum PollState {
    /// Waiting for processing; `attempt` status requests issued so far
    Polling { attempt: u32 },
    /// Processing finished with this release-distinct-id
    Ready(i64),
    /// Terminal failure
    Failed(Error),
}

/// Fixed-interval, bounded status poller
#[derive(Clone, Copy, Debug)]
pub(crate) struct ReleasePoller {
    interval: Duration,
    max_attempts: u32,
}

impl ReleasePoller {
    pub(crate) fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub(crate) fn from_config(config: &PollingConfig) -> Self {
        Self::new(config.interval, config.max_attempts)
    }

    /// Poll the processing status of `id` until it is ready.
    ///
    /// The first request is issued one interval after the call.
    pub(crate) async fn run<S>(
        &self,
        source: &S,
        id: &str,
        event_tx: &broadcast::Sender<Event>,
        cancel: &CancellationToken,
    ) -> Result<i64>
    where
        S: ReleaseStatusSource + ?Sized,
    {
        let start = Instant::now()
            .checked_add(self.interval)
            .ok_or_else(|| Error::Config {
                message: format!("polling interval {:?} is out of range", self.interval),
                key: Some("polling.interval".to_string()),
            })?;
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut state = PollState::Polling { attempt: 0 };
        loop {
            state = match state {
                PollState::Polling { attempt } => {
                    self.step(source, id, attempt, &mut ticker, event_tx, cancel)
                        .await
                }
                PollState::Ready(release_distinct_id) => return Ok(release_distinct_id),
                PollState::Failed(error) => return Err(error),
            };
        }
    }

    async fn step<S>(
        &self,
        source: &S,
        id: &str,
        attempt: u32,
        ticker: &mut Interval,
        event_tx: &broadcast::Sender<Event>,
        cancel: &CancellationToken,
    ) -> PollState
    where
        S: ReleaseStatusSource + ?Sized,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollState::Failed(Error::Polling { attempts: attempt }),
            _ = ticker.tick() => {}
        }

        let attempt = attempt + 1;
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollState::Failed(Error::Polling { attempts: attempt }),
            response = source.release_status(id) => response,
        };

        event_tx
            .send(Event::PollAttempt {
                attempt,
                max_attempts: self.max_attempts,
                status: response.as_ref().ok().map(|s| s.upload_status.clone()),
            })
            .ok();
        self.transition(attempt, response)
    }

    /// Next state after the `attempt`-th status response
    pub(crate) fn transition(
        &self,
        attempt: u32,
        response: std::result::Result<ReleaseStatus, ApiError>,
    ) -> PollState {
        match response {
            Ok(status) if status.is_ready() => match status.release_distinct_id {
                Some(release_distinct_id) => PollState::Ready(release_distinct_id),
                None => PollState::Failed(Error::PollingFailed {
                    attempts: attempt,
                    reason: "release is ready but carries no release id".to_string(),
                }),
            },
            Ok(status) if status.is_failed() => PollState::Failed(Error::PollingFailed {
                attempts: attempt,
                reason: status
                    .error_details
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| "service reported a processing error".to_string()),
            }),
            Ok(status) => {
                tracing::debug!(attempt, upload_status = %status.upload_status, "Release not ready yet");
                self.keep_polling(attempt)
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Release status request failed");
                self.keep_polling(attempt)
            }
        }
    }

    fn keep_polling(&self, attempt: u32) -> PollState {
        if attempt >= self.max_attempts {
            PollState::Failed(Error::PollingFailed {
                attempts: attempt,
                reason: format!("release was not ready after {} status requests", attempt),
            })
        } else {
            PollState::Polling { attempt }
        }
    }
}
