//! Core types for appcenter-publish

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Stage;

/// Upload status reported once the service has finished processing a release
pub const STATUS_READY_TO_BE_PUBLISHED: &str = "readyToBePublished";

/// Upload status reported when the service failed to process a release
pub const STATUS_ERROR: &str = "error";

/// Upload status sent to commit a fully transferred upload
pub const STATUS_UPLOAD_FINISHED: &str = "uploadFinished";

/// Optional release information sent when requesting an upload slot
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOptions {
    /// Existing release to attach the upload to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_id: Option<i64>,

    /// Build version (e.g. "1.4.0"); required for some package types
    #[serde(default, skip_serializing_if = "is_blank")]
    pub build_version: Option<String>,

    /// Build number (e.g. "142"); required for some package types
    #[serde(default, skip_serializing_if = "is_blank")]
    pub build_number: Option<String>,
}

impl ReleaseOptions {
    /// Build version, ignoring empty strings
    pub fn build_version(&self) -> Option<&str> {
        non_blank(self.build_version.as_deref())
    }

    /// Build number, ignoring empty strings
    pub fn build_number(&self) -> Option<&str> {
        non_blank(self.build_number.as_deref())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    non_blank(value.as_deref()).is_none()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Immutable description of what to publish
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTask {
    /// Owner (user or organization) of the app
    pub owner_name: String,
    /// App name as used in API paths
    pub app_name: String,
    /// Local package to upload
    pub file_path: PathBuf,
    /// Distribution group to share the release with (skipped when None or empty)
    #[serde(default)]
    pub group_name: Option<String>,
    /// Optional release metadata
    #[serde(default)]
    pub options: ReleaseOptions,
}

impl UploadTask {
    /// Create a task for the given owner, app and file
    pub fn new(
        owner_name: impl Into<String>,
        app_name: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            owner_name: owner_name.into(),
            app_name: app_name.into(),
            file_path: file_path.into(),
            group_name: None,
            options: ReleaseOptions::default(),
        }
    }

    /// Distribute the release to this group once it is ready
    pub fn with_group(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    /// Set the build version
    pub fn with_build_version(mut self, build_version: impl Into<String>) -> Self {
        self.options.build_version = Some(build_version.into());
        self
    }

    /// Set the build number
    pub fn with_build_number(mut self, build_number: impl Into<String>) -> Self {
        self.options.build_number = Some(build_number.into());
        self
    }

    /// Attach the upload to an existing release
    pub fn with_release_id(mut self, release_id: i64) -> Self {
        self.options.release_id = Some(release_id);
        self
    }

    /// Target distribution group, ignoring empty names
    pub fn distribution_group(&self) -> Option<&str> {
        non_blank(self.group_name.as_deref())
    }

    /// File name sent to the service
    pub fn file_name(&self) -> Option<&str> {
        self.file_path.file_name().and_then(|n| n.to_str())
    }

    /// Local file path
    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Upload slot issued by the service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResource {
    /// Upload id, used to commit and poll the release
    pub id: String,
    /// Package asset id, used in domain-scoped transfer endpoints
    pub package_asset_id: String,
    /// Base URL of the transfer endpoints
    pub upload_domain: String,
    /// Session token for the transfer endpoints
    pub token: String,
    /// Session token, URL-encoded by the service
    #[serde(default)]
    pub url_encoded_token: String,
}

/// Service response after attaching file metadata to an upload slot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    /// Metadata session id
    #[serde(default)]
    pub id: String,
    /// Negotiated chunk size in bytes
    pub chunk_size: u64,
    /// Block numbers the service expects; its length is the chunk count
    #[serde(default)]
    pub chunk_list: Vec<u32>,
    /// Number of blob partitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob_partitions: Option<u32>,
    /// Whether the service asks for the upload to restart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_restart: Option<bool>,
    /// Service status code (e.g. "Success")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
}

impl UploadMetadata {
    /// Number of chunks the file must be split into
    pub fn chunk_count(&self) -> usize {
        self.chunk_list.len()
    }
}

/// One contiguous byte range of the package, ready to transfer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based block number
    pub block_number: u32,
    /// Transfer endpoint for this block
    pub url: url::Url,
    /// Raw bytes of the range
    pub data: Vec<u8>,
}

/// Summary of a successful chunk transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// Number of chunks acknowledged by the service
    pub chunks: usize,
    /// Number of bytes transferred
    pub bytes: u64,
}

/// Processing status of a committed upload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStatus {
    /// Upload id
    #[serde(default)]
    pub id: String,
    /// Processing status (e.g. "uploadFinished", "readyToBePublished", "error")
    #[serde(default)]
    pub upload_status: String,
    /// Failure details reported with the "error" status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    /// Release id, present once processing is complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_distinct_id: Option<i64>,
}

impl ReleaseStatus {
    /// Processing finished and the release can be published
    pub fn is_ready(&self) -> bool {
        self.upload_status == STATUS_READY_TO_BE_PUBLISHED
    }

    /// Processing failed on the service side
    pub fn is_failed(&self) -> bool {
        self.upload_status == STATUS_ERROR
    }
}

/// Distribution group as returned by the service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionGroup {
    /// Group id
    pub id: String,
    /// Group name
    #[serde(default)]
    pub name: String,
    /// Origin of the group (e.g. "appcenter")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Result of a successful publication
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRelease {
    /// Release id assigned by the service
    pub release_distinct_id: i64,
    /// Upload id the release was committed under
    pub upload_id: String,
    /// Group the release was distributed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distributed_to: Option<String>,
}

/// Details of a published release
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDetails {
    /// Release id
    pub id: i64,
    /// App name
    #[serde(default)]
    pub app_name: String,
    /// App display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_display_name: Option<String>,
    /// Build version
    #[serde(default)]
    pub version: String,
    /// User-facing version
    #[serde(default)]
    pub short_version: String,
    /// Package size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Bundle identifier / package name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_identifier: Option<String>,
    /// Upload time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    /// Direct download URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Install URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_url: Option<String>,
    /// Whether the release is enabled
    #[serde(default)]
    pub enabled: bool,
}

/// Event emitted during a publication run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Upload slot allocated
    UploadRequested {
        /// Upload id
        upload_id: String,
    },

    /// Metadata applied, chunk plan negotiated
    MetadataApplied {
        /// Negotiated chunk size in bytes
        chunk_size: u64,
        /// Number of chunks
        chunk_count: usize,
    },

    /// One chunk acknowledged by the service
    ChunkUploaded {
        /// 1-based block number
        block_number: u32,
        /// Chunks acknowledged so far
        uploaded: usize,
        /// Total chunks in the transfer
        total: usize,
    },

    /// All chunks acknowledged
    TransferComplete {
        /// Number of chunks
        chunks: usize,
        /// Number of bytes
        bytes: u64,
    },

    /// Completion signalled to the service
    UploadFinished {
        /// Upload id
        upload_id: String,
    },

    /// Release committed, processing started
    ReleaseCommitted {
        /// Id polled for the processing status
        id: String,
    },

    /// One status request issued while waiting for processing
    PollAttempt {
        /// 1-based attempt number
        attempt: u32,
        /// Attempt bound
        max_attempts: u32,
        /// Status reported by the service, if the request succeeded
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },

    /// Release processed and ready
    ReleaseReady {
        /// Release id
        release_distinct_id: i64,
    },

    /// Release shared with a distribution group
    Distributed {
        /// Group name
        group: String,
        /// Release id
        release_distinct_id: i64,
    },

    /// The run stopped with an error
    Failed {
        /// Stage that failed
        stage: Stage,
        /// Error message
        error: String,
    },
}
