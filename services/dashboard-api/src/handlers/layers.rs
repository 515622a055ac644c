//! Layer catalog and page configuration handlers.

use std::sync::Arc;

use axum::{extract::Extension, Json};
use serde::Serialize;
use urban_common::{
    AreaOfInterest, BoundingBox, CategoryEntry, DateRange, LayerKind, StyleKey, YearBounds,
};

use crate::state::AppState;

/// One toggle in the layer control.
#[derive(Debug, Serialize)]
pub struct LayerInfo {
    pub kind: LayerKind,
    pub title: &'static str,
    pub attribution: &'static str,
    pub collection_id: String,
    pub vector: bool,
    pub temporal: bool,
    /// Options for the multi-select, empty for continuous layers.
    pub categories: Vec<CategoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct LayersResponse {
    pub layers: Vec<LayerInfo>,
}

/// GET /api/layers - Layer kinds in render order with their filter options.
pub async fn layers_handler(Extension(state): Extension<Arc<AppState>>) -> Json<LayersResponse> {
    let catalog = &state.dashboard.config().catalog;

    let layers = LayerKind::ALL
        .into_iter()
        .map(|kind| LayerInfo {
            kind,
            title: kind.title(),
            attribution: kind.attribution(),
            collection_id: catalog.source(kind).collection_id.clone(),
            vector: kind.is_vector(),
            temporal: kind.is_temporal(),
            categories: StyleKey::domain(kind)
                .into_iter()
                .map(CategoryEntry::from)
                .collect(),
        })
        .collect();

    Json(LayersResponse { layers })
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub title: String,
    pub aoi: AreaOfInterest,
    pub bounds: BoundingBox,
    /// `[[south, west], [north, east]]` for the map widget's fit-bounds.
    pub map_bounds: [[f64; 2]; 2],
    pub years: YearBounds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_date_range: Option<DateRange>,
    pub layer_opacity: f32,
    pub urban_density_threshold: f64,
}

/// GET /api/config - Page title, map extent and slider setup.
pub async fn config_handler(Extension(state): Extension<Arc<AppState>>) -> Json<ConfigResponse> {
    let config = state.dashboard.config();

    Json(ConfigResponse {
        title: config.title.clone(),
        aoi: config.aoi.clone(),
        bounds: config.aoi.bounds(),
        map_bounds: config.aoi.bounds().to_lat_lon_corners(),
        years: config.years,
        default_date_range: config.default_date_range().ok(),
        layer_opacity: config.pipeline.layer_opacity,
        urban_density_threshold: config.pipeline.urban_density_threshold,
    })
}
