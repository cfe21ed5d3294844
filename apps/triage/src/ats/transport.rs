use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::AtsError;

/// Listing and history calls.
const LIST_TIMEOUT: Duration = Duration::from_secs(30);
/// Artifact content downloads.
const CONTENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Raw access to the ATS REST API.
///
/// Both methods map HTTP 404 to `Ok(None)`; every other non-success status is
/// an error. Callers decide what an absent resource means for them.
#[async_trait]
pub trait AtsTransport: Send + Sync {
    async fn get_json(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Option<Value>, AtsError>;

    async fn get_bytes(&self, path: &str) -> Result<Option<Bytes>, AtsError>;
}

/// `reqwest`-backed transport with query-string API-key authentication.
/// One instance per process; the inner client pools connections.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, AtsError> {
        let client = Client::builder().timeout(LIST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .query(&[("api_key", self.api_key.as_str())])
    }

    /// Sends the request and maps 404 to `None`. The single place where
    /// not-found handling lives.
    async fn fetch_optional(
        &self,
        request: RequestBuilder,
        path: &str,
    ) -> Result<Option<Response>, AtsError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!("ATS returned 404 for {path}");
            return Ok(None);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AtsError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                message,
            });
        }

        Ok(Some(response))
    }
}

#[async_trait]
impl AtsTransport for HttpTransport {
    async fn get_json(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Option<Value>, AtsError> {
        let request = self.get(path).query(query);
        match self.fetch_optional(request, path).await? {
            Some(response) => Ok(Some(response.json::<Value>().await?)),
            None => Ok(None),
        }
    }

    async fn get_bytes(&self, path: &str) -> Result<Option<Bytes>, AtsError> {
        let request = self.get(path).timeout(CONTENT_TIMEOUT);
        match self.fetch_optional(request, path).await? {
            Some(response) => Ok(Some(response.bytes().await?)),
            None => Ok(None),
        }
    }
}
