//! Distribution of a processed release to a named group.

use reqwest::Method;
use serde::Serialize;
use serde::de::IgnoredAny;

use crate::client::AppClient;
use crate::error::Result;
use crate::types::DistributionGroup;

#[derive(Serialize)]
struct GroupAssignment<'a> {
    id: &'a str,
    mandatory_update: bool,
    notify_testers: bool,
}

/// Resolve `group_name` and share release `release_distinct_id` with it.
///
/// Both calls surface their errors unmodified. Testers are never notified and
/// the update is never mandatory.
pub(crate) async fn distribute_release(
    app: &AppClient,
    release_distinct_id: i64,
    group_name: &str,
) -> Result<DistributionGroup> {
    let group: DistributionGroup = app.get(&["distribution_groups", group_name]).await?;
    tracing::debug!(group = %group_name, group_id = %group.id, "Distribution group resolved");

    let release = release_distinct_id.to_string();
    let body = GroupAssignment {
        id: &group.id,
        mandatory_update: false,
        notify_testers: false,
    };
    let _: IgnoredAny = app
        .request(Method::POST, &["releases", release.as_str(), "groups"], Some(&body))
        .await?;

    Ok(group)
}
