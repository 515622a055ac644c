//! Application state for the dashboard API.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use dashboard_core::{Dashboard, DashboardConfig};
use geo_backend::{GeoBackend, HttpGeoBackend};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

/// Shared application state.
pub struct AppState {
    /// Connected dashboard; immutable and shared by all requests.
    pub dashboard: Dashboard,

    /// Prometheus renderer, absent when no recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Load configuration, connect to the backend over HTTP and
    /// authenticate.
    ///
    /// `GEO_BACKEND_URL` and `GEO_BACKEND_TOKEN` override the configured
    /// backend endpoint and credentials.
    pub async fn new(config_path: impl AsRef<Path>) -> Result<Self> {
        let mut config = DashboardConfig::load(config_path)?;

        if let Ok(url) = std::env::var("GEO_BACKEND_URL") {
            config.backend.base_url = url;
        }
        if let Ok(token) = std::env::var("GEO_BACKEND_TOKEN") {
            config.backend.token = Some(token);
        }

        info!(backend = %config.backend.base_url, "Connecting to geospatial backend");
        let backend = HttpGeoBackend::new(config.backend.clone())
            .context("Failed to create backend client")?;

        Self::with_backend(config, Arc::new(backend)).await
    }

    /// Connect with an explicit backend implementation.
    pub async fn with_backend(config: DashboardConfig, backend: Arc<dyn GeoBackend>) -> Result<Self> {
        let dashboard = Dashboard::connect(config, backend).await?;
        Ok(Self {
            dashboard,
            prometheus: None,
        })
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}
