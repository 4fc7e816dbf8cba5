//! Per-run publication context: client scope, configuration, events and cancellation.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::client::AppClient;
use crate::config::Config;
use crate::error::{Error, Result, Stage};
use crate::types::Event;

/// Everything one publication run needs, cloned out of the [`super::Publisher`]
pub(crate) struct PublishContext {
    pub(crate) app: AppClient,
    pub(crate) config: Arc<Config>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) cancel: CancellationToken,
}

impl PublishContext {
    /// Send an event; having no subscriber is fine.
    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Run a single-request stage, racing it against cancellation.
    pub(crate) async fn run_stage<T, F>(&self, stage: Stage, stage_future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled { stage }),
            result = stage_future => result,
        };
        self.observe(stage, result)
    }

    /// Report the outcome of a stage that handles cancellation itself.
    pub(crate) fn observe<T>(&self, stage: Stage, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::error!(
                owner = %self.app.owner_name(),
                app = %self.app.app_name(),
                stage = %stage,
                error = %e,
                "Publication failed"
            );
            self.emit(Event::Failed {
                stage,
                error: e.to_string(),
            });
        }
        result
    }
}
