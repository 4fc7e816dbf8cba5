//! HTTP client for the distribution service.
//!
//! Two kinds of endpoints are called:
//! - **API endpoints** under `{base_url}/apps/{owner}/{app}/...`, authenticated
//!   with the static `X-API-Token` header ([`AppClient`])
//! - **Transfer endpoints** under the upload domain issued with the upload slot,
//!   authenticated by the per-session token in the query string
//!   ([`AppCenterClient::post_transfer`])

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ApiConfig;
use crate::error::{ApiError, Error, Result, StatusErrorBody};

/// Header carrying the static API token
pub const API_TOKEN_HEADER: &str = "X-API-Token";

/// Shared HTTP client (cloneable, the underlying connection pool is shared)
#[derive(Clone)]
pub struct AppCenterClient {
    http: reqwest::Client,
    base_url: Url,
    api_token: Arc<str>,
}

impl AppCenterClient {
    /// Build a client from the API configuration
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(api.request_timeout)
            .build()
            .map_err(ApiError::from)?;
        Self::with_http_client(http, &api.base_url, &api.api_token)
    }

    /// Build a client around an existing `reqwest::Client`
    pub fn with_http_client(http: reqwest::Client, base_url: &str, api_token: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| Error::Config {
            message: format!("invalid API base URL '{}': {}", base_url, e),
            key: Some("api.base_url".to_string()),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("API base URL '{}' cannot carry a path", base_url),
                key: Some("api.base_url".to_string()),
            });
        }
        Ok(Self {
            http,
            base_url,
            api_token: Arc::from(api_token),
        })
    }

    /// Scope the client to one app
    pub fn for_app(&self, owner_name: &str, app_name: &str) -> AppClient {
        AppClient {
            client: self.clone(),
            owner_name: owner_name.to_string(),
            app_name: app_name.to_string(),
        }
    }

    /// POST to a transfer endpoint (no API token header).
    ///
    /// A 2xx response whose body reports `"error": true` is turned into
    /// [`ApiError::Rejected`].
    pub(crate) async fn post_transfer(
        &self,
        url: Url,
        body: TransferBody,
    ) -> std::result::Result<TransferResponse, ApiError> {
        tracing::debug!(url = %redact_query(&url), "Transfer request");
        let request = self.http.post(url);
        let request = match body {
            TransferBody::Empty => request,
            TransferBody::Bytes(bytes) => request
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes),
        };
        let response: Option<TransferResponse> = send(request).await?;
        response.unwrap_or_default().into_accepted()
    }

    /// POST to a transfer endpoint and decode an arbitrary JSON response
    pub(crate) async fn post_transfer_json<R: DeserializeOwned>(
        &self,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> std::result::Result<R, ApiError> {
        tracing::debug!(url = %redact_query(&url), "Transfer request");
        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        send(request).await
    }
}

impl std::fmt::Debug for AppCenterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCenterClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Client scoped to one owner/app pair
#[derive(Clone, Debug)]
pub struct AppClient {
    client: AppCenterClient,
    owner_name: String,
    app_name: String,
}

impl AppClient {
    /// Underlying shared client
    pub fn client(&self) -> &AppCenterClient {
        &self.client
    }

    /// Owner name used in API paths
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    /// App name used in API paths
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// URL of an app-relative API path, one percent-encoded segment per element
    pub fn url(&self, segments: &[&str]) -> std::result::Result<Url, ApiError> {
        let mut url = self.client.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ApiError::InvalidUrl(self.client.base_url.to_string()))?;
            path.pop_if_empty()
                .push("apps")
                .push(&self.owner_name)
                .push(&self.app_name)
                .extend(segments);
        }
        Ok(url)
    }

    /// Send an authenticated API request with an optional JSON body
    pub async fn request<B, R>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> std::result::Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(segments)?;
        tracing::debug!(method = %method, url = %url, "API request");
        let mut request = self
            .client
            .http
            .request(method, url)
            .header(API_TOKEN_HEADER, self.client.api_token.as_ref());
        if let Some(body) = body {
            request = request.json(body);
        }
        send(request).await
    }

    /// Authenticated GET
    pub async fn get<R: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> std::result::Result<R, ApiError> {
        self.request::<(), R>(Method::GET, segments, None).await
    }
}

/// Payload of a transfer request
#[derive(Debug)]
pub(crate) enum TransferBody {
    Empty,
    Bytes(Vec<u8>),
}

/// Response body of the chunk and finish transfer endpoints
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct TransferResponse {
    #[serde(default)]
    pub(crate) error: bool,
    #[serde(default)]
    pub(crate) error_code: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) chunk_num: Option<u32>,
}

impl TransferResponse {
    fn into_accepted(self) -> std::result::Result<Self, ApiError> {
        if self.error {
            return Err(ApiError::Rejected {
                code: self.error_code,
                message: self.message.unwrap_or_default(),
            });
        }
        Ok(self)
    }
}

async fn send<R: DeserializeOwned>(request: RequestBuilder) -> std::result::Result<R, ApiError> {
    let response = request.send().await?;
    read_response(response).await
}

async fn read_response<R: DeserializeOwned>(
    response: Response,
) -> std::result::Result<R, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(status_error(status.as_u16(), &body));
    }

    tracing::trace!(body = %redact_body(&body), "Response");

    // Empty bodies decode as JSON null so `()`, `Option<T>` and `Value` responses work
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(&body)?)
}

/// Render a response body for logs with every `*token*` field value masked
fn redact_body(body: &[u8]) -> String {
    fn mask(value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, field) in map.iter_mut() {
                    if key.to_ascii_lowercase().contains("token") {
                        *field = serde_json::Value::String("[redacted]".to_string());
                    } else {
                        mask(field);
                    }
                }
            }
            serde_json::Value::Array(items) => items.iter_mut().for_each(mask),
            _ => {}
        }
    }

    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(mut value) => {
            mask(&mut value);
            value.to_string()
        }
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Build a status error from a non-2xx body, falling back to the raw body as message
fn status_error(status: u16, body: &[u8]) -> ApiError {
    match serde_json::from_slice::<StatusErrorBody>(body) {
        Ok(parsed) if parsed.code.is_some() || parsed.message.is_some() => ApiError::Status {
            status,
            code: parsed.code,
            message: parsed.message.unwrap_or_default(),
        },
        _ => ApiError::Status {
            status,
            code: None,
            message: String::from_utf8_lossy(body).trim().to_string(),
        },
    }
}

/// Strip the query string (it carries the session token) before logging a URL
fn redact_query(url: &Url) -> String {
    let mut redacted = url.clone();
    redacted.set_query(None);
    redacted.to_string()
}
