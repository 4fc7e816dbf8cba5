//! Mock distribution service backed by wiremock.
//!
//! The same server plays the API base and the upload domain.

use std::time::Duration;

use appcenter_publish::config::{ApiConfig, PollingConfig, TransferConfig};
use appcenter_publish::{Config, Publisher};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const OWNER: &str = "owner";
pub const APP: &str = "app";
pub const API_TOKEN: &str = "test-token";
pub const UPLOAD_ID: &str = "upload-1";
pub const ASSET_ID: &str = "asset-1";
pub const SESSION_TOKEN: &str = "session-token";

pub struct MockService {
    pub server: MockServer,
}

impl MockService {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn config(&self) -> Config {
        Config {
            api: ApiConfig {
                base_url: self.server.uri(),
                api_token: API_TOKEN.to_string(),
                request_timeout: Duration::from_secs(10),
            },
            transfer: TransferConfig { workers: Some(4) },
            polling: PollingConfig {
                interval: Duration::from_millis(10),
                max_attempts: 60,
            },
        }
    }

    pub fn publisher(&self) -> Publisher {
        Publisher::new(self.config()).expect("test config must be valid")
    }

    fn api_path(&self, rest: &str) -> String {
        format!("/apps/{OWNER}/{APP}/{rest}")
    }

    pub async fn mount_upload_slot(&self) {
        Mock::given(method("POST"))
            .and(path(self.api_path("uploads/releases")))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": UPLOAD_ID,
                "package_asset_id": ASSET_ID,
                "upload_domain": self.server.uri(),
                "token": SESSION_TOKEN,
                "url_encoded_token": SESSION_TOKEN
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_metadata(&self, chunk_size: usize, chunk_count: u32) {
        Mock::given(method("POST"))
            .and(path(format!("/upload/set_metadata/{ASSET_ID}")))
            .and(query_param("token", SESSION_TOKEN))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "metadata-1",
                "chunk_size": chunk_size,
                "chunk_list": (1..=chunk_count).collect::<Vec<_>>(),
                "resume_restart": false,
                "status_code": "Success"
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_chunks(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/upload/upload_chunk/{ASSET_ID}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "error": false })),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn mount_finish(&self, times: u64) {
        Mock::given(method("POST"))
            .and(path(format!("/upload/finished/{ASSET_ID}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "error": false })),
            )
            .expect(times)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_commit(&self, committed_id: &str, times: u64) {
        Mock::given(method("PATCH"))
            .and(path(self.api_path(&format!("uploads/releases/{UPLOAD_ID}"))))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": committed_id,
                "upload_status": "uploadFinished"
            })))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Answer `processing` `pending` times, then `readyToBePublished` with `release_id`
    pub async fn mount_status(&self, committed_id: &str, pending: u64, release_id: i64) {
        let status_path = self.api_path(&format!("uploads/releases/{committed_id}"));
        if pending > 0 {
            Mock::given(method("GET"))
                .and(path(status_path.clone()))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "id": committed_id,
                    "upload_status": "processing"
                })))
                .up_to_n_times(pending)
                .expect(pending)
                .mount(&self.server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path(status_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": committed_id,
                "upload_status": "readyToBePublished",
                "release_distinct_id": release_id
            })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Everything up to and including commit for a package split in `chunk_count` chunks
    pub async fn mount_upload_flow(&self, chunk_size: usize, chunk_count: u32, committed_id: &str) {
        self.mount_upload_slot().await;
        self.mount_metadata(chunk_size, chunk_count).await;
        self.mount_chunks().await;
        self.mount_finish(1).await;
        self.mount_commit(committed_id, 1).await;
    }

    /// Chunk requests received so far as (block number, body), sorted by block
    pub async fn chunk_requests(&self) -> Vec<(u32, Vec<u8>)> {
        let requests = self.server.received_requests().await.unwrap_or_default();
        let mut chunks: Vec<(u32, Vec<u8>)> = requests
            .into_iter()
            .filter(|r| r.url.path().starts_with("/upload/upload_chunk/"))
            .map(|r| {
                let block = r
                    .url
                    .query_pairs()
                    .find(|(k, _)| k == "block_number")
                    .and_then(|(_, v)| v.parse().ok())
                    .expect("chunk request without block number");
                (block, r.body)
            })
            .collect();
        chunks.sort_by_key(|(block, _)| *block);
        chunks
    }

    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or_default()
    }
}
