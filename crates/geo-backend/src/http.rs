//! HTTP/JSON client for the geospatial compute service.
//!
//! Each operation is a `POST {base_url}/v1/{operation}` with a JSON body;
//! authentication is a `GET {base_url}/v1/session`. A bearer token is sent
//! when configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use urban_common::Geometry;

use crate::backend::GeoBackend;
use crate::error::{BackendError, Result};
use crate::types::{
    CollectionQuery, ImageHandle, Reducer, ReductionValues, TimeSeriesRecord, VisParams,
};

/// Configuration for [`HttpGeoBackend`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpBackendConfig {
    /// Service root, e.g. `https://geo.example.org`.
    pub base_url: String,
    /// Bearer token; usually supplied through the environment.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    /// Whole-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            token: None,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Serialize)]
struct ReduceBody<'a> {
    handle: &'a ImageHandle,
    reducer: Reducer,
    geometry: &'a Geometry,
    scale: f64,
}

#[derive(Deserialize)]
struct ReduceResponse {
    #[serde(default)]
    values: ReductionValues,
}

#[derive(Serialize)]
struct TimeSeriesBody<'a> {
    handle: &'a ImageHandle,
    geometry: &'a Geometry,
    scale: f64,
}

#[derive(Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    records: Vec<TimeSeriesRecord>,
}

#[derive(Serialize)]
struct ThumbnailBody<'a> {
    handle: &'a ImageHandle,
    vis: &'a VisParams,
    region: &'a Geometry,
}

#[derive(Deserialize)]
struct ThumbnailResponse {
    url: String,
}

#[derive(Serialize)]
struct FeaturesBody<'a> {
    handle: &'a ImageHandle,
}

/// Backend reached over HTTP.
pub struct HttpGeoBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpGeoBackend {
    /// Create a new client with the given configuration.
    pub fn new(config: HttpBackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| BackendError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    fn url(&self, operation: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), operation)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post<B, R>(&self, operation: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(operation);
        debug!(url = %url, "Backend request");

        let response = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(operation, status = status.as_u16(), "Backend request failed");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Auth(message),
                _ => BackendError::query(status.as_u16(), message),
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl GeoBackend for HttpGeoBackend {
    #[instrument(skip(self), fields(base_url = %self.config.base_url))]
    async fn authenticate(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(self.url("session")))
            .send()
            .await
            .map_err(|e| match BackendError::from(e) {
                BackendError::Timeout => BackendError::Connection("session request timed out".into()),
                BackendError::Query { message, .. } => BackendError::Connection(message),
                other => other,
            })?;

        match response.status() {
            status if status.is_success() => {
                info!("Backend session established");
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(BackendError::Auth(
                response.text().await.unwrap_or_default(),
            )),
            status => Err(BackendError::Connection(format!(
                "session check returned {}",
                status
            ))),
        }
    }

    #[instrument(skip(self, query), fields(collection = %query.collection_id))]
    async fn query(&self, query: &CollectionQuery) -> Result<ImageHandle> {
        self.post("query", query).await
    }

    #[instrument(skip(self, handle, geometry), fields(handle = %handle.id))]
    async fn reduce_region(
        &self,
        handle: &ImageHandle,
        reducer: Reducer,
        geometry: &Geometry,
        scale: f64,
    ) -> Result<ReductionValues> {
        let body = ReduceBody {
            handle,
            reducer,
            geometry,
            scale,
        };
        let response: ReduceResponse = self.post("reduce", &body).await?;
        Ok(response.values)
    }

    #[instrument(skip(self, handle, geometry), fields(handle = %handle.id))]
    async fn region_time_series(
        &self,
        handle: &ImageHandle,
        geometry: &Geometry,
        scale: f64,
    ) -> Result<Vec<TimeSeriesRecord>> {
        let body = TimeSeriesBody {
            handle,
            geometry,
            scale,
        };
        let response: TimeSeriesResponse = self.post("timeseries", &body).await?;
        Ok(response.records)
    }

    #[instrument(skip(self, handle, vis, region), fields(handle = %handle.id))]
    async fn render_thumbnail(
        &self,
        handle: &ImageHandle,
        vis: &VisParams,
        region: &Geometry,
    ) -> Result<String> {
        let body = ThumbnailBody {
            handle,
            vis,
            region,
        };
        let response: ThumbnailResponse = self.post("thumbnail", &body).await?;
        Ok(response.url)
    }

    #[instrument(skip(self, handle), fields(handle = %handle.id))]
    async fn fetch_features(&self, handle: &ImageHandle) -> Result<serde_json::Value> {
        let features: serde_json::Value = self.post("features", &FeaturesBody { handle }).await?;
        if features.get("type").and_then(|t| t.as_str()) != Some("FeatureCollection") {
            return Err(BackendError::Decode(
                "expected a GeoJSON FeatureCollection".to_string(),
            ));
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let backend = HttpGeoBackend::new(HttpBackendConfig {
            base_url: "http://geo.local/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(backend.url("query"), "http://geo.local/v1/query");
    }

    #[test]
    fn test_config_defaults() {
        let config: HttpBackendConfig =
            serde_json::from_str(r#"{"base_url": "http://geo.local"}"#).unwrap();
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert!(config.token.is_none());
    }
}
