//! Publication pipeline.
//!
//! [`Publisher`] owns the HTTP client, configuration and event channel. Each
//! [`Publisher::publish`] call runs the stages in `orchestration` with its own
//! cancellation token; stages live in focused submodules:
//!
//! - `validation`: local checks before any remote call
//! - `resource`: upload slot allocation and transfer URLs
//! - `metadata`: file metadata and chunk plan negotiation
//! - `chunks`: byte range planning and sequential reads
//! - `transfer`: parallel chunk transfer with fail-fast cancellation
//! - `completion`: finish notification and release commit
//! - `poll`: processing status state machine
//! - `distribute`: group distribution
//! - `release`: release details lookup

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::client::AppCenterClient;
use crate::config::Config;
use crate::error::{Result, Stage};
use crate::types::{Event, PublishedRelease, ReleaseDetails, UploadTask};

mod chunks;
mod completion;
mod context;
mod distribute;
mod metadata;
mod orchestration;
mod poll;
mod release;
mod resource;
mod transfer;
mod validation;

use context::PublishContext;

/// Publishes packages to the distribution service (cloneable, shares the client and event channel)
#[derive(Clone)]
pub struct Publisher {
    client: AppCenterClient,
    config: Arc<Config>,
    event_tx: broadcast::Sender<Event>,
}

impl Publisher {
    /// Create a publisher from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = AppCenterClient::new(&config.api)?;
        Self::with_client(client, config)
    }

    /// Create a publisher around an existing client.
    ///
    /// `config.api` is ignored: the client's own base URL, token and timeout
    /// are used, so only the transfer and polling settings are checked.
    pub fn with_client(client: AppCenterClient, config: Config) -> Result<Self> {
        config.validate_pipeline()?;

        // Buffer enough events for a large transfer so slow subscribers rarely lag
        let (event_tx, _rx) = broadcast::channel(1000);

        Ok(Self {
            client,
            config: Arc::new(config),
            event_tx,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to publication events.
    ///
    /// Events from every run on this publisher are delivered to every subscriber.
    /// A subscriber that falls behind by more than 1000 events observes
    /// `RecvError::Lagged` and misses the oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Run the full pipeline for `task` and return the published release.
    ///
    /// Cancelling `cancel` stops the run at the next await point: outside the
    /// polling stage the result is [`crate::Error::Cancelled`], while waiting for
    /// processing it is [`crate::Error::Polling`]. A distribution failure is
    /// returned as is; the release stays committed.
    pub async fn publish(
        &self,
        task: &UploadTask,
        cancel: CancellationToken,
    ) -> Result<PublishedRelease> {
        tracing::info!(
            owner = %task.owner_name,
            app = %task.app_name,
            file = %task.path().display(),
            "Starting publication"
        );
        let ctx = self.context(&task.owner_name, &task.app_name, cancel);
        orchestration::run_publication(&ctx, task).await
    }

    /// Fetch the details of a published release.
    pub async fn release_details(
        &self,
        owner_name: &str,
        app_name: &str,
        release_distinct_id: i64,
    ) -> Result<ReleaseDetails> {
        let ctx = self.context(owner_name, app_name, CancellationToken::new());
        let details = release::fetch_release_details(&ctx.app, release_distinct_id).await;
        ctx.observe(Stage::Details, details)
    }

    fn context(&self, owner_name: &str, app_name: &str, cancel: CancellationToken) -> PublishContext {
        PublishContext {
            app: self.client.for_app(owner_name, app_name),
            config: Arc::clone(&self.config),
            event_tx: self.event_tx.clone(),
            cancel,
        }
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("client", &self.client)
            .field("transfer", &self.config.transfer)
            .field("polling", &self.config.polling)
            .finish_non_exhaustive()
    }
}
