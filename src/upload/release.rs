//! Release details lookup.

use crate::client::AppClient;
use crate::error::Result;
use crate::types::ReleaseDetails;

/// `GET releases/{release_distinct_id}`
pub(crate) async fn fetch_release_details(
    app: &AppClient,
    release_distinct_id: i64,
) -> Result<ReleaseDetails> {
    let release = release_distinct_id.to_string();
    Ok(app.get(&["releases", release.as_str()]).await?)
}
