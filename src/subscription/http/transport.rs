//! HTTP transport for the hello endpoint.
//!
//! The transport performs the request and decodes the body as JSON; it does not
//! validate the payload. Validation happens in the [`QueryClient`] so every query
//! goes through its [`Schema`](super::schema::Schema).

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use super::config::ApiConfig;
use super::key::QueryKey;
use super::query::{Query, QueryClient, QueryError};
use super::schema::HelloPayload;

/// Performs a GET request to `url` and decodes the response body as JSON.
///
/// # Errors
///
/// - [`QueryError::Network`] if the request cannot be sent or the body cannot be read
/// - [`QueryError::Status`] for any non-2xx status; the body is not read
/// - [`QueryError::Decode`] if the body is not valid JSON
pub async fn fetch_json(http: &reqwest::Client, url: &str) -> Result<Value, QueryError> {
    let response = http
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| QueryError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(QueryError::Status { status });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| QueryError::Network(e.to_string()))?;

    serde_json::from_slice(&body).map_err(|e| QueryError::Decode(e.to_string()))
}

/// Client for the hello resource at `{base_url}/hello`.
#[derive(Debug, Clone)]
pub struct HelloApi {
    http: reqwest::Client,
    config: ApiConfig,
}

impl HelloApi {
    /// Path of the hello resource below the base URL.
    pub const PATH: &'static str = "hello";

    /// Creates a client for the API described by `config`.
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Creates a client reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: ApiConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    /// The cache key of the hello query.
    #[must_use]
    pub fn query_key() -> QueryKey {
        QueryKey::new("rust-hello")
    }

    /// The full URL of the hello resource.
    #[must_use]
    pub fn url(&self) -> String {
        self.config.endpoint(Self::PATH)
    }

    /// Fetches the raw hello payload.
    ///
    /// # Errors
    ///
    /// See [`fetch_json`].
    pub async fn fetch(&self) -> Result<Value, QueryError> {
        fetch_json(&self.http, &self.url()).await
    }

    /// Returns a fetcher performing [`HelloApi::fetch`], for use with a query.
    pub fn fetcher(
        &self,
    ) -> impl Fn() -> BoxFuture<'static, Result<Value, QueryError>> + Send + Sync + 'static {
        let http = self.http.clone();
        let url = self.url();
        move || -> BoxFuture<'static, Result<Value, QueryError>> {
            let http = http.clone();
            let url = url.clone();
            Box::pin(async move { fetch_json(&http, &url).await })
        }
    }
}

/// Creates the hello query backed by `api`.
#[must_use]
pub fn hello_query(api: &HelloApi, client: Arc<QueryClient>) -> Query<HelloPayload> {
    Query::new(HelloApi::query_key(), api.fetcher(), client)
}
