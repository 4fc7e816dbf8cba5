//! Error types for appcenter-publish
//!
//! This module provides the error taxonomy for the publication pipeline:
//! - One [`Error`] variant per failing pipeline stage, with the cause chained
//! - [`ApiError`] for transport and status failures of individual HTTP calls
//! - [`Stage`] to identify where a run stopped
//! - Machine-readable error codes for callers that map errors to exit codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for appcenter-publish operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for appcenter-publish
///
/// Every pipeline stage fails with its own variant so the caller can tell where
/// a run stopped. Underlying causes are kept as sources, never replaced.
#[derive(Debug, Error)]
pub enum Error {
    /// Local input file missing, unreadable, or missing required build metadata
    #[error("input file error: {}: {reason}", .path.display())]
    InputFile {
        /// The file that was requested for upload
        path: PathBuf,
        /// Why the file was rejected
        reason: String,
    },

    /// Upload slot allocation failed
    #[error("upload request error: {0}")]
    UploadRequest(#[source] ApiError),

    /// Applying metadata to the upload slot failed
    #[error("apply metadata error: {0}")]
    Metadata(#[source] ApiError),

    /// Reading the file into chunks failed, or the negotiated chunk plan is inconsistent
    #[error("chunking error: {reason}")]
    Chunking {
        /// What went wrong while building chunks
        reason: String,
        /// Underlying I/O error, if any
        #[source]
        source: Option<std::io::Error>,
    },

    /// A chunk transfer failed (the first failure of the transfer)
    #[error("failed to upload chunk {block_number}: {source}")]
    ChunkUpload {
        /// 1-based block number of the failed chunk
        block_number: u32,
        /// The transport or status error
        #[source]
        source: ApiError,
    },

    /// Transport or status error from a stage that does not wrap its errors
    /// (completion, commit, distribution, release details)
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Cancellation was signalled while waiting for the release to be processed
    #[error("cancelled while waiting for the release to be ready (after {attempts} attempts)")]
    Polling {
        /// Number of status requests issued before cancellation
        attempts: u32,
    },

    /// The release never became ready, or the service reported a processing failure
    #[error("polling failed after {attempts} attempts: {reason}")]
    PollingFailed {
        /// Number of status requests issued
        attempts: u32,
        /// Why polling gave up
        reason: String,
    },

    /// The run was cancelled outside of the polling stage
    #[error("publication cancelled during {stage}")]
    Cancelled {
        /// Stage that was running when cancellation was observed
        stage: Stage,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api.api_token")
        key: Option<String>,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Failure of a single HTTP call to the distribution service
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, timeout, or other transport-level failure
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("HTTP error {status}{}: {message}", .code.as_deref().map(|c| format!(" {c}")).unwrap_or_default())]
    Status {
        /// HTTP status code
        status: u16,
        /// Service error code (e.g., "NotFound"), when the body carried one
        code: Option<String>,
        /// Service message, or the raw body when it was not structured
        message: String,
    },

    /// 2xx response whose body reports `"error": true`
    #[error("request rejected{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Rejected {
        /// Service error code, if provided
        code: Option<String>,
        /// Service message
        message: String,
    },

    /// Response body could not be decoded
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// A request URL could not be built from the service-provided parts
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// HTTP status code of a [`ApiError::Status`] error
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the service answered 404
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Pipeline stage, used to identify where a run stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Local validation of the upload task
    Validation,
    /// Upload slot allocation
    UploadRequest,
    /// Metadata application
    Metadata,
    /// Chunk construction and transfer
    Transfer,
    /// Completion notification
    Finish,
    /// Release commit
    Commit,
    /// Waiting for the release to be processed
    Polling,
    /// Distribution to a group
    Distribution,
    /// Release details lookup
    Details,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::UploadRequest => "upload request",
            Stage::Metadata => "metadata",
            Stage::Transfer => "chunk transfer",
            Stage::Finish => "upload finish",
            Stage::Commit => "release commit",
            Stage::Polling => "polling",
            Stage::Distribution => "distribution",
            Stage::Details => "release details",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Pipeline stage this error belongs to, when it can be told from the variant alone.
    ///
    /// [`Error::Api`] is shared by several stages; the pipeline reports the
    /// stage alongside it in [`crate::types::Event::Failed`].
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::InputFile { .. } => Some(Stage::Validation),
            Error::UploadRequest(_) => Some(Stage::UploadRequest),
            Error::Metadata(_) => Some(Stage::Metadata),
            Error::Chunking { .. } | Error::ChunkUpload { .. } => Some(Stage::Transfer),
            Error::Polling { .. } | Error::PollingFailed { .. } => Some(Stage::Polling),
            Error::Cancelled { stage } => Some(*stage),
            Error::Api(_)
            | Error::Config { .. }
            | Error::Serialization(_)
            | Error::Other(_) => None,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InputFile { .. } => "input_file_error",
            Error::UploadRequest(_) => "upload_request_error",
            Error::Metadata(_) => "metadata_error",
            Error::Chunking { .. } => "chunking_error",
            Error::ChunkUpload { .. } => "chunk_upload_error",
            Error::Api(ApiError::Transport(_)) => "network_error",
            Error::Api(ApiError::Status { status: 404, .. }) => "not_found",
            Error::Api(_) => "api_error",
            Error::Polling { .. } => "polling_error",
            Error::PollingFailed { .. } => "polling_failed",
            Error::Cancelled { .. } => "cancelled",
            Error::Config { .. } => "config_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    pub(crate) fn chunking(reason: impl Into<String>) -> Self {
        Error::Chunking {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn input_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InputFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Error body returned by the service on non-2xx responses
///
/// Field casing differs between endpoints, so both spellings are accepted.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StatusErrorBody {
    #[serde(default, alias = "Code")]
    pub(crate) code: Option<String>,
    #[serde(default, alias = "Message")]
    pub(crate) message: Option<String>,
}
