//! Completion notification and release commit.
//!
//! Neither stage wraps its errors: transport and status failures surface as
//! [`Error::Api`](crate::Error::Api).

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::{AppCenterClient, AppClient, TransferBody};
use crate::error::Result;
use crate::types::{STATUS_UPLOAD_FINISHED, UploadResource};

/// `POST {domain}/upload/finished/{package_asset_id}?token=…`, no payload.
///
/// A 2xx body carrying `"error": true` is a failure.
pub(crate) async fn finish_upload(client: &AppCenterClient, resource: &UploadResource) -> Result<()> {
    let url = resource.transfer_url("finished", &[])?;
    client.post_transfer(url, TransferBody::Empty).await?;
    tracing::debug!(upload_id = %resource.id, "Upload finished");
    Ok(())
}

#[derive(Serialize)]
struct CommitBody<'a> {
    upload_status: &'a str,
    id: &'a str,
}

#[derive(Deserialize)]
struct CommitResponse {
    id: String,
    #[serde(default)]
    upload_status: Option<String>,
}

/// `PATCH uploads/releases/{upload_id}` marking the upload as finished.
///
/// Returns the id to poll for the processing status.
pub(crate) async fn commit_release(app: &AppClient, upload_id: &str) -> Result<String> {
    let body = CommitBody {
        upload_status: STATUS_UPLOAD_FINISHED,
        id: upload_id,
    };
    let response: CommitResponse = app
        .request(Method::PATCH, &["uploads", "releases", upload_id], Some(&body))
        .await?;
    tracing::debug!(
        id = %response.id,
        upload_status = response.upload_status.as_deref().unwrap_or_default(),
        "Release committed"
    );
    Ok(response.id)
}
