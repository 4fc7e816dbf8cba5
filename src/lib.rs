//! # appcenter-publish
//!
//! Upload and publication pipeline for App Center style distribution services.
//!
//! A single [`Publisher::publish`] call turns a local package (`.apk`, `.ipa`,
//! `.aab`, `.msix`, ...) into a published release:
//!
//! 1. reserve an upload slot
//! 2. attach file metadata (which negotiates the chunk size)
//! 3. transfer the file in parallel chunks
//! 4. signal completion and commit the release
//! 5. poll until the service reports the release as ready
//! 6. optionally distribute the release to a named group
//!
//! ## Quick Start
//!
//! ```no_run
//! use appcenter_publish::{Config, Publisher, UploadTask};
//! use appcenter_publish::config::ApiConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         api: ApiConfig {
//!             api_token: "my-api-token".to_string(),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!
//!     let publisher = Publisher::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = publisher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let task = UploadTask::new("my-org", "my-app", "build/app-release.apk")
//!         .with_group("Beta Testers");
//!     let release = publisher.publish(&task, CancellationToken::new()).await?;
//!     println!("published release {}", release.release_distinct_id);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP client for the distribution service
pub mod client;
/// Configuration types
pub mod config;
/// File extension to content-type mapping
pub mod content_type;
/// Error types
pub mod error;
/// Core types and events
pub mod types;
/// Upload and publication pipeline (decomposed into focused submodules)
pub mod upload;

// Re-export commonly used types
pub use client::AppCenterClient;
pub use config::Config;
pub use error::{ApiError, Error, Result, Stage};
pub use types::{
    Chunk, DistributionGroup, Event, PublishedRelease, ReleaseDetails, ReleaseOptions,
    ReleaseStatus, TransferOutcome, UploadMetadata, UploadResource, UploadTask,
};
pub use upload::Publisher;

use tokio_util::sync::CancellationToken;

/// Helper function to run one publication with graceful signal handling.
///
/// The pipeline runs with a cancellation token that is triggered when a
/// termination signal arrives. Chunk workers stop picking up new chunks and the
/// poller aborts between ticks, so the call returns promptly with
/// [`Error::Cancelled`] or [`Error::Polling`].
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use appcenter_publish::{Config, Publisher, UploadTask, publish_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let publisher = Publisher::new(Config::default())?;
///     let task = UploadTask::new("owner", "app", "app.apk");
///
///     let release = publish_with_shutdown(&publisher, &task).await?;
///     println!("release {}", release.release_distinct_id);
///
///     Ok(())
/// }
/// ```
pub async fn publish_with_shutdown(
    publisher: &Publisher,
    task: &UploadTask,
) -> Result<PublishedRelease> {
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        signal_cancel.cancel();
    });

    let result = publisher.publish(task, cancel).await;
    signal_task.abort();
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal, cancelling publication");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C), cancelling publication");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C), cancelling publication");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal, cancelling publication");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal, cancelling publication");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
