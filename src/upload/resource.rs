//! Upload slot allocation and the domain-scoped transfer URLs derived from it.

use reqwest::Method;
use url::Url;

use crate::client::AppClient;
use crate::error::{ApiError, Error, Result};
use crate::types::{ReleaseOptions, UploadResource};

/// Request a new upload slot for the app.
///
/// `POST uploads/releases` with the release options as JSON body; empty
/// options serialize to `{}`.
pub(crate) async fn request_upload(
    app: &AppClient,
    options: &ReleaseOptions,
) -> Result<UploadResource> {
    let resource: UploadResource = app
        .request(Method::POST, &["uploads", "releases"], Some(options))
        .await
        .map_err(Error::UploadRequest)?;

    tracing::debug!(
        upload_id = %resource.id,
        package_asset_id = %resource.package_asset_id,
        upload_domain = %resource.upload_domain,
        "Upload slot allocated"
    );
    Ok(resource)
}

impl UploadResource {
    /// URL of a transfer endpoint: `{upload_domain}/upload/{endpoint}/{package_asset_id}`
    /// followed by `query` and the session token.
    pub(crate) fn transfer_url(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<Url, ApiError> {
        let mut url = Url::parse(&self.upload_domain)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.upload_domain, e)))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.upload_domain.clone()))?
            .pop_if_empty()
            .push("upload")
            .push(endpoint)
            .push(&self.package_asset_id);
        url.query_pairs_mut()
            .extend_pairs(query)
            .append_pair("token", &self.token);
        Ok(url)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{API_TOKEN_HEADER, AppCenterClient};
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resource(domain: &str) -> UploadResource {
        UploadResource {
            id: "upload-1".to_string(),
            package_asset_id: "asset-1".to_string(),
            upload_domain: domain.to_string(),
            token: "sv=2019&sig=a/b+c".to_string(),
            url_encoded_token: "sv%3D2019%26sig%3Da%2Fb%2Bc".to_string(),
        }
    }

    #[test]
    fn transfer_url_encodes_token_and_query() {
        let url = resource("https://file.appcenter.ms/")
            .transfer_url("upload_chunk", &[("block_number", "3")])
            .unwrap();

        assert_eq!(url.path(), "/upload/upload_chunk/asset-1");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("block_number".to_string(), "3".to_string()),
                ("token".to_string(), "sv=2019&sig=a/b+c".to_string()),
            ]
        );
    }

    #[test]
    fn transfer_url_rejects_bad_domain() {
        let err = resource("not a domain")
            .transfer_url("finished", &[])
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn request_upload_posts_release_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/apps/owner/app/uploads/releases"))
            .and(header(API_TOKEN_HEADER, "t"))
            .and(body_json(serde_json::json!({ "build_version": "1.0" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "upload-1",
                "package_asset_id": "asset-1",
                "upload_domain": "https://file.appcenter.ms",
                "token": "tok",
                "url_encoded_token": "tok"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let app = AppCenterClient::with_http_client(reqwest::Client::new(), &server.uri(), "t")
            .unwrap()
            .for_app("owner", "app");
        let options = ReleaseOptions {
            build_version: Some("1.0".to_string()),
            ..ReleaseOptions::default()
        };

        let resource = request_upload(&app, &options).await.unwrap();

        assert_eq!(resource.id, "upload-1");
        assert_eq!(resource.package_asset_id, "asset-1");
    }

    #[tokio::test]
    async fn request_upload_failure_is_wrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "code": "Unauthorized",
                "message": "bad token"
            })))
            .mount(&server)
            .await;

        let app = AppCenterClient::with_http_client(reqwest::Client::new(), &server.uri(), "t")
            .unwrap()
            .for_app("owner", "app");

        let err = request_upload(&app, &ReleaseOptions::default())
            .await
            .unwrap_err();

        match err {
            Error::UploadRequest(ApiError::Status { status, .. }) => assert_eq!(status, 401),
            other => panic!("expected upload request error, got {other:?}"),
        }
    }
}
