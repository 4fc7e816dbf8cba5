//! Attach file metadata to an upload slot and negotiate the chunk plan.

use serde::Serialize;

use crate::client::AppCenterClient;
use crate::error::{Error, Result};
use crate::types::{ReleaseOptions, UploadMetadata, UploadResource};

/// What the service needs to know about the package before chunks flow
#[derive(Clone, Debug)]
pub(crate) struct FileDescriptor<'a> {
    pub(crate) file_name: &'a str,
    pub(crate) file_size: u64,
    pub(crate) content_type: Option<&'a str>,
}

#[derive(Serialize)]
struct MetadataBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    build_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build_number: Option<&'a str>,
}

/// `POST {domain}/upload/set_metadata/{package_asset_id}`
///
/// The build version/number body is only sent when at least one is set.
pub(crate) async fn apply_metadata(
    client: &AppCenterClient,
    resource: &UploadResource,
    file: &FileDescriptor<'_>,
    options: &ReleaseOptions,
) -> Result<UploadMetadata> {
    let file_size = file.file_size.to_string();
    let mut query = vec![("file_name", file.file_name), ("file_size", file_size.as_str())];
    if let Some(content_type) = file.content_type {
        query.push(("content_type", content_type));
    }
    let url = resource
        .transfer_url("set_metadata", &query)
        .map_err(Error::Metadata)?;

    let body = MetadataBody {
        build_version: options.build_version(),
        build_number: options.build_number(),
    };
    let body = if body.build_version.is_some() || body.build_number.is_some() {
        Some(serde_json::to_value(&body)?)
    } else {
        None
    };

    let metadata: UploadMetadata = client
        .post_transfer_json(url, body)
        .await
        .map_err(Error::Metadata)?;

    tracing::debug!(
        chunk_size = metadata.chunk_size,
        chunk_count = metadata.chunk_count(),
        status_code = metadata.status_code.as_deref().unwrap_or_default(),
        "Metadata applied"
    );
    Ok(metadata)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::API_TOKEN_HEADER;
    use crate::error::ApiError;
    use wiremock::matchers::{body_json, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn client() -> AppCenterClient {
        AppCenterClient::with_http_client(reqwest::Client::new(), "https://api.example.com", "t")
            .unwrap()
    }

    fn resource(server: &MockServer) -> UploadResource {
        UploadResource {
            id: "upload-1".to_string(),
            package_asset_id: "asset-1".to_string(),
            upload_domain: server.uri(),
            token: "tok".to_string(),
            url_encoded_token: "tok".to_string(),
        }
    }

    fn metadata_response() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "m1",
            "chunk_size": 4194304,
            "chunk_list": [1, 2, 3],
            "resume_restart": false,
            "status_code": "Success"
        }))
    }

    #[tokio::test]
    async fn sends_file_facts_in_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload/set_metadata/asset-1"))
            .and(query_param("file_name", "app release.apk"))
            .and(query_param("file_size", "10485760"))
            .and(query_param("token", "tok"))
            .and(query_param("content_type", "application/vnd.android.package-archive"))
            .respond_with(metadata_response())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(header_exists(API_TOKEN_HEADER))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let file = FileDescriptor {
            file_name: "app release.apk",
            file_size: 10 * 1024 * 1024,
            content_type: Some("application/vnd.android.package-archive"),
        };

        let metadata = apply_metadata(&client(), &resource(&server), &file, &ReleaseOptions::default())
            .await
            .unwrap();

        assert_eq!(metadata.chunk_count(), 3);
        assert_eq!(metadata.chunk_size, 4194304);

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        assert!(requests[0].body.is_empty(), "no body without build metadata");
    }

    #[tokio::test]
    async fn content_type_omitted_when_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(metadata_response())
            .mount(&server)
            .await;

        let file = FileDescriptor {
            file_name: "pkg",
            file_size: 1,
            content_type: None,
        };
        apply_metadata(&client(), &resource(&server), &file, &ReleaseOptions::default())
            .await
            .unwrap();

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        assert!(
            !requests[0]
                .url
                .query_pairs()
                .any(|(key, _)| key == "content_type")
        );
    }

    #[tokio::test]
    async fn sends_build_metadata_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "build_version": "1.2.3",
                "build_number": "42"
            })))
            .respond_with(metadata_response())
            .expect(1)
            .mount(&server)
            .await;

        let options = ReleaseOptions {
            release_id: None,
            build_version: Some("1.2.3".to_string()),
            build_number: Some("42".to_string()),
        };
        let file = FileDescriptor {
            file_name: "app.dmg",
            file_size: 1,
            content_type: None,
        };

        apply_metadata(&client(), &resource(&server), &file, &options)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failure_is_wrapped_as_metadata_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid token"))
            .mount(&server)
            .await;

        let file = FileDescriptor {
            file_name: "app.apk",
            file_size: 1,
            content_type: None,
        };
        let err = apply_metadata(&client(), &resource(&server), &file, &ReleaseOptions::default())
            .await
            .unwrap_err();

        match err {
            Error::Metadata(ApiError::Status { status, message, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid token");
            }
            other => panic!("expected metadata error, got {other:?}"),
        }
    }
}
