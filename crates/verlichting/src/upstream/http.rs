use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::client::select_target;
use super::client::Upstream;
use super::UpstreamError;
use crate::entity::deserialize_all;
use crate::entity::RawEntity;
use crate::routing::ServiceCall;

/// Controller client over its REST API, authenticated with a long-lived token.
pub struct HttpUpstream {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for HttpUpstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpUpstream")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl HttpUpstream {
    /// Create a client for the controller at `base_url` (e.g. `http://homeassistant:8123`).
    ///
    /// Every request is bounded by `timeout`.
    pub fn new(base_url: &str, token: String, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and read the whole body, mapping every failure to an [`UpstreamError`].
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<Vec<u8>, UpstreamError> {
        debug!("Upstream request: {}", endpoint);

        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        // The body of an error response is not assumed to be parseable
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| UpstreamError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        Ok(body.to_vec())
    }

    fn decode<T: DeserializeOwned>(body: &[u8], endpoint: &str) -> Result<T, UpstreamError> {
        serde_json::from_slice(body).map_err(|source| UpstreamError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// Decode a JSON array of entities, treating an empty body as an empty array.
    ///
    /// Only a body that is not an array fails; elements that are not valid
    /// state records are dropped one by one.
    fn decode_entities(body: &[u8], endpoint: &str) -> Result<Vec<RawEntity>, UpstreamError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let values: Vec<serde_json::Value> = Self::decode(body, endpoint)?;
        Ok(deserialize_all(values, RawEntity::from_value))
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch_all(&self) -> Result<Vec<RawEntity>, UpstreamError> {
        let endpoint = "GET /api/states";
        let body = self
            .send(self.http.get(self.url("/api/states")), endpoint)
            .await?;

        let entities = Self::decode_entities(&body, endpoint)?;
        debug!("Fetched {} entities", entities.len());
        Ok(entities)
    }

    async fn fetch_one(&self, entity_id: &str) -> Result<RawEntity, UpstreamError> {
        let path = format!("/api/states/{entity_id}");
        let endpoint = format!("GET {path}");
        let body = self.send(self.http.get(self.url(&path)), &endpoint).await?;

        Self::decode(&body, &endpoint)
    }

    async fn invoke(&self, call: &ServiceCall) -> Result<Option<RawEntity>, UpstreamError> {
        let path = call.path();
        let endpoint = format!("POST {path}");
        let request = self.http.post(self.url(&path)).json(&call.body());
        let body = self.send(request, &endpoint).await?;

        let entities = Self::decode_entities(&body, &endpoint)?;
        Ok(select_target(entities, &call.entity_id))
    }
}
