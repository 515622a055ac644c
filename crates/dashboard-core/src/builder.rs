//! Layer building: one backend round trip per request.

use std::time::Duration;

use geo_backend::{GeoBackend, HandleKind, ImageHandle, VisParams};
use metrics::counter;
use serde::{Serialize, Serializer};
use tracing::{debug, error, instrument, warn};
use urban_common::{
    BoundingBox, DashboardError, DashboardResult, LayerFailure, LayerFailureView, LayerKind,
    LayerStyle,
};

use crate::config::DashboardConfig;
use crate::deadline::with_deadline;
use crate::resolver::LayerRequest;

/// What the map widget draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerArtifact {
    /// Image overlay stretched over `bounds`.
    Raster { url: String },
    /// GeoJSON feature collection.
    Vector { features: serde_json::Value },
}

/// A styled layer ready for the map widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderableLayer {
    pub kind: LayerKind,
    pub name: String,
    pub artifact: LayerArtifact,
    pub style: LayerStyle,
    pub opacity: f32,
    pub bounds: BoundingBox,
    pub popup: String,
    pub attribution: String,
    /// Backend asset the layer was rendered from.
    #[serde(skip)]
    pub source: ImageHandle,
}

/// Result of building one layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "layer", rename_all = "snake_case")]
pub enum LayerOutcome {
    Rendered(RenderableLayer),
    Failed(#[serde(serialize_with = "serialize_failure")] LayerFailure),
}

fn serialize_failure<S: Serializer>(failure: &LayerFailure, serializer: S) -> Result<S::Ok, S::Error> {
    LayerFailureView::from(failure).serialize(serializer)
}

impl LayerOutcome {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerOutcome::Rendered(layer) => layer.kind,
            LayerOutcome::Failed(failure) => failure.kind,
        }
    }

    pub fn layer(&self) -> Option<&RenderableLayer> {
        match self {
            LayerOutcome::Rendered(layer) => Some(layer),
            LayerOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&LayerFailure> {
        match self {
            LayerOutcome::Rendered(_) => None,
            LayerOutcome::Failed(failure) => Some(failure),
        }
    }
}

/// Builds [`RenderableLayer`]s against a backend.
pub struct LayerBuilder<'a> {
    backend: &'a dyn GeoBackend,
    config: &'a DashboardConfig,
}

impl<'a> LayerBuilder<'a> {
    pub fn new(backend: &'a dyn GeoBackend, config: &'a DashboardConfig) -> Self {
        Self { backend, config }
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.config.pipeline.backend_timeout_secs)
    }

    /// Build every request in order.
    ///
    /// A failing layer never stops the others. A lost backend connection
    /// does: it is recorded for its layer and no further layers are tried.
    pub async fn build_all(&self, requests: &[LayerRequest]) -> Vec<LayerOutcome> {
        let mut outcomes = Vec::with_capacity(requests.len());

        for request in requests {
            match self.build(request).await {
                Ok(layer) => outcomes.push(LayerOutcome::Rendered(layer)),
                Err(failure) => {
                    let fatal = failure.error.is_fatal();
                    outcomes.push(LayerOutcome::Failed(failure));
                    if fatal {
                        error!(
                            skipped = requests.len() - outcomes.len(),
                            "Backend connection lost, skipping remaining layers"
                        );
                        break;
                    }
                }
            }
        }

        outcomes
    }

    /// Query the backend for `request` and render it.
    #[instrument(skip(self, request), fields(kind = %request.kind))]
    pub async fn build(&self, request: &LayerRequest) -> Result<RenderableLayer, LayerFailure> {
        match self.try_build(request).await {
            Ok(layer) => {
                counter!("dashboard_layers_built_total", "kind" => request.kind.id()).increment(1);
                debug!(handle = %layer.source.id, "Layer built");
                Ok(layer)
            }
            Err(e) => {
                counter!(
                    "dashboard_layer_failures_total",
                    "kind" => request.kind.id(),
                    "code" => e.code()
                )
                .increment(1);
                warn!(error = %e, "Layer build failed");
                Err(LayerFailure::new(request.kind, e))
            }
        }
    }

    async fn try_build(&self, request: &LayerRequest) -> DashboardResult<RenderableLayer> {
        let limit = self.deadline();
        let handle = with_deadline(limit, self.backend.query(&request.query)).await?;

        let artifact = match handle.kind {
            HandleKind::Raster => {
                let vis = VisParams::from_style(
                    &request.style,
                    request.query.output_band(),
                    self.config.pipeline.thumbnail_dimensions,
                );
                let url = with_deadline(
                    limit,
                    self.backend
                        .render_thumbnail(&handle, &vis, &request.query.clip),
                )
                .await?;
                LayerArtifact::Raster { url }
            }
            HandleKind::Vector => {
                let features = with_deadline(limit, self.backend.fetch_features(&handle)).await?;
                LayerArtifact::Vector { features }
            }
        };

        if request.kind.is_vector() != matches!(artifact, LayerArtifact::Vector { .. }) {
            return Err(DashboardError::BackendQuery(format!(
                "backend returned a {:?} handle for {}",
                handle.kind, request.kind
            )));
        }

        Ok(RenderableLayer {
            kind: request.kind,
            name: request.title.clone(),
            artifact,
            style: request.style.clone(),
            opacity: self.config.pipeline.layer_opacity,
            bounds: self.config.aoi.bounds(),
            popup: popup_text(request),
            attribution: request.kind.attribution().to_string(),
            source: handle,
        })
    }
}

/// Popup text: title, dates for temporal layers, selected classes for
/// partial categorical selections.
fn popup_text(request: &LayerRequest) -> String {
    let mut text = request.title.clone();
    if let Some(range) = &request.date_range {
        text.push_str(&format!(" ({} to {})", range.start, range.end));
    }
    let domain = urban_common::StyleKey::domain(request.kind).len();
    if !request.categories.is_empty() && request.categories.len() < domain {
        let labels: Vec<&str> = request.categories.iter().map(|k| k.label()).collect();
        text.push_str(": ");
        text.push_str(&labels.join(", "));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{LayerSelection, SelectionResolver, UiState};
    use test_utils::FakeBackend;
    use urban_common::DateRange;

    fn requests(config: &DashboardConfig, selections: Vec<LayerSelection>) -> Vec<LayerRequest> {
        let state = selections
            .into_iter()
            .fold(UiState::new(DateRange::from_years(2023, 2023).unwrap()), |s, sel| {
                s.with(sel)
            });
        SelectionResolver::new(config).resolve(&state).requests
    }

    #[tokio::test]
    async fn test_raster_layer_gets_overlay_url() {
        let config = DashboardConfig::default();
        let backend = FakeBackend::new();
        let reqs = requests(&config, vec![LayerSelection::enabled(LayerKind::Ndvi)]);

        let layer = LayerBuilder::new(&backend, &config).build(&reqs[0]).await.unwrap();
        match &layer.artifact {
            LayerArtifact::Raster { url } => assert!(url.ends_with(".png")),
            other => panic!("expected raster, got {:?}", other),
        }
        assert_eq!(layer.name, "NDVI");
        assert_eq!(layer.opacity, 0.7);
        assert_eq!(layer.bounds, config.aoi.bounds());
        assert_eq!(layer.popup, "NDVI (2023-01-01 to 2023-12-31)");
    }

    #[tokio::test]
    async fn test_roads_layer_is_vector() {
        let config = DashboardConfig::default();
        let backend = FakeBackend::new();
        let reqs = requests(
            &config,
            vec![LayerSelection::enabled(LayerKind::Roads).with_categories(["Highway"])],
        );

        let layer = LayerBuilder::new(&backend, &config).build(&reqs[0]).await.unwrap();
        assert!(matches!(layer.artifact, LayerArtifact::Vector { .. }));
        assert_eq!(layer.popup, "Roads: Highway");
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let config = DashboardConfig::default();
        let backend = FakeBackend::new().fail_collection(
            &config.catalog.temperature.collection_id,
            "quota exceeded",
        );
        let reqs = requests(
            &config,
            vec![
                LayerSelection::enabled(LayerKind::LandUse),
                LayerSelection::enabled(LayerKind::Temperature),
                LayerSelection::enabled(LayerKind::Ndvi),
            ],
        );

        let outcomes = LayerBuilder::new(&backend, &config).build_all(&reqs).await;
        let kinds: Vec<LayerKind> = outcomes.iter().map(LayerOutcome::kind).collect();
        assert_eq!(
            kinds,
            vec![LayerKind::LandUse, LayerKind::Temperature, LayerKind::Ndvi]
        );
        assert!(outcomes[0].layer().is_some());
        assert_eq!(outcomes[1].failure().unwrap().error.code(), "BackendQueryError");
        assert!(outcomes[2].layer().is_some());
    }

    #[tokio::test]
    async fn test_connection_loss_stops_remaining_layers() {
        let config = DashboardConfig::default();
        let backend = FakeBackend::new()
            .disconnect_collection(&config.catalog.land_use.collection_id, "reset by peer");
        let reqs = requests(
            &config,
            vec![
                LayerSelection::enabled(LayerKind::LandUse),
                LayerSelection::enabled(LayerKind::Ndvi),
            ],
        );

        let outcomes = LayerBuilder::new(&backend, &config).build_all(&reqs).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].failure().unwrap().error.is_fatal());
        assert_eq!(backend.queries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let mut config = DashboardConfig::default();
        config.pipeline.backend_timeout_secs = 2;
        let backend = FakeBackend::new().delay_collection(
            &config.catalog.ndvi.collection_id,
            Duration::from_secs(10),
        );
        let reqs = requests(&config, vec![LayerSelection::enabled(LayerKind::Ndvi)]);

        let failure = LayerBuilder::new(&backend, &config)
            .build(&reqs[0])
            .await
            .unwrap_err();
        assert!(matches!(failure.error, DashboardError::Timeout(2)));
    }

    #[tokio::test]
    async fn test_thumbnail_vis_uses_output_band_and_palette() {
        let config = DashboardConfig::default();
        let backend = FakeBackend::new();
        let reqs = requests(&config, vec![LayerSelection::enabled(LayerKind::Ndvi)]);
        LayerBuilder::new(&backend, &config).build(&reqs[0]).await.unwrap();

        let vis = backend
            .calls()
            .into_iter()
            .find_map(|call| match call {
                test_utils::RecordedCall::Thumbnail { vis, .. } => Some(vis),
                _ => None,
            })
            .unwrap();
        assert_eq!(vis.bands, vec!["NDVI"]);
        assert_eq!((vis.min, vis.max), (Some(-1.0), Some(1.0)));
        assert_eq!(vis.dimensions, 1024);
    }

    #[test]
    fn test_failed_outcome_serializes_as_view() {
        let outcome = LayerOutcome::Failed(LayerFailure::new(
            LayerKind::Temperature,
            DashboardError::BackendQuery("quota".into()),
        ));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["layer"]["code"], "BackendQueryError");
        assert_eq!(json["layer"]["kind"], "temperature");
    }
}
