/// HTTP client for a JSON document API
///
/// Documents live under `{base_url}/documents/{path}`:
/// - `PUT` with `?merge=true|false` upserts a document
/// - `POST` to a collection appends and answers `{"id": "..."}`
/// - `GET` reads a document, `404` meaning it does not exist

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::remote::{paths, DocumentStore, RemoteError, WriteMode};

#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    id: String,
}

impl HttpDocumentStore {
    /// Create a client for `base_url` (e.g. "https://store.example.org/v1")
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(RemoteError::Request)?;
        Self::with_client(base_url, token, client)
    }

    /// Create a store with a custom reqwest Client
    pub fn with_client(
        base_url: &str,
        token: Option<String>,
        client: Client,
    ) -> Result<Self, RemoteError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(RemoteError::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        Ok(Self { client, base_url, token })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn document_url(&self, path: &str) -> Result<String, RemoteError> {
        Ok(format!("{}/documents/{}", self.base_url, paths::normalize(path)?))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<reqwest::Response, RemoteError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| RemoteError::NotReachable {
                url: url.to_string(),
                source: e,
            })
    }

    async fn api_error(response: reqwest::Response) -> RemoteError {
        let status = response.status();
        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| status.to_string());

        RemoteError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn set(&self, path: &str, data: Value, mode: WriteMode) -> Result<(), RemoteError> {
        let url = self.document_url(path)?;
        let request = self
            .client
            .put(&url)
            .query(&[("merge", mode.is_merge())])
            .json(&data);

        let response = self.send(&url, request).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String, RemoteError> {
        let url = self.document_url(collection)?;
        let request = self.client.post(&url).json(&data);

        let response = self.send(&url, request).await?;
        if response.status().is_success() {
            let created: AddResponse = response.json().await.map_err(RemoteError::Request)?;
            Ok(created.id)
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError> {
        let url = self.document_url(path)?;
        let request = self.client.get(&url);

        let response = self.send(&url, request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                Ok(Some(response.json().await.map_err(RemoteError::Request)?))
            }
            _ => Err(Self::api_error(response).await),
        }
    }
}
