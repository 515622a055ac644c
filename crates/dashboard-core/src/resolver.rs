//! Selection resolution: UI snapshot in, ordered backend requests out.

use std::collections::BTreeMap;

use geo_backend::{ClassInterval, CollectionQuery, Compositor, Derivation};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use urban_common::{
    DashboardError, DashboardResult, DateRange, GradientStyle, LayerFailure, LayerKind,
    LayerStyle, StyleKey, ValueRange, VegetationDensity,
};

use crate::config::{DashboardConfig, LayerSource};

/// Output band of the NDVI derivation.
pub const NDVI_BAND: &str = "NDVI";

/// Output band of the vegetation density classification.
pub const DENSITY_BAND: &str = "density";

/// Immutable snapshot of every widget value at the start of a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    /// Sidebar year range, used by temporal layers without their own dates.
    pub date_range: DateRange,
    #[serde(default)]
    pub selections: Vec<LayerSelection>,
}

impl UiState {
    pub fn new(date_range: DateRange) -> Self {
        Self {
            date_range,
            selections: Vec::new(),
        }
    }

    /// Every layer enabled with no filters, as on first page load.
    pub fn all_enabled(date_range: DateRange) -> Self {
        Self {
            date_range,
            selections: LayerKind::ALL.into_iter().map(LayerSelection::enabled).collect(),
        }
    }

    pub fn with(mut self, selection: LayerSelection) -> Self {
        self.selections.push(selection);
        self
    }
}

/// One layer toggle and its filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSelection {
    pub kind: LayerKind,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub filters: SelectionFilters,
}

impl LayerSelection {
    pub fn enabled(kind: LayerKind) -> Self {
        Self {
            kind,
            enabled: true,
            filters: SelectionFilters::default(),
        }
    }

    pub fn disabled(kind: LayerKind) -> Self {
        Self {
            enabled: false,
            ..Self::enabled(kind)
        }
    }

    pub fn with_dates(mut self, range: DateRange) -> Self {
        self.filters.date_range = Some(range);
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.filters.threshold = Some(threshold);
        self
    }
}

/// Per-layer filter values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    /// Raw multi-select values. `None` selects the whole domain; an empty
    /// list selects nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    /// Built-up probability threshold (urban density only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

/// A fully resolved, enabled layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerRequest {
    pub kind: LayerKind,
    pub title: String,
    pub query: CollectionQuery,
    pub style: LayerStyle,
    /// Date range applied to the query, if the layer is temporal.
    pub date_range: Option<DateRange>,
    /// Selected categories, empty for continuous layers.
    pub categories: Vec<StyleKey>,
}

/// Resolver output: requests in priority order plus rejected layers.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub requests: Vec<LayerRequest>,
    pub rejected: Vec<LayerFailure>,
}

/// Turns a [`UiState`] into [`LayerRequest`]s using the configured catalog.
pub struct SelectionResolver<'a> {
    config: &'a DashboardConfig,
}

impl<'a> SelectionResolver<'a> {
    pub fn new(config: &'a DashboardConfig) -> Self {
        Self { config }
    }

    /// Resolve every enabled selection.
    ///
    /// The last selection of a kind wins. Output follows [`LayerKind`]
    /// priority order whatever the input order.
    pub fn resolve(&self, state: &UiState) -> Resolution {
        let mut latest: BTreeMap<LayerKind, &LayerSelection> = BTreeMap::new();
        for selection in &state.selections {
            if latest.insert(selection.kind, selection).is_some() {
                debug!(kind = %selection.kind, "Duplicate selection, keeping the last one");
            }
        }

        let mut resolution = Resolution::default();
        for (kind, selection) in latest {
            if !selection.enabled {
                continue;
            }

            match self.resolve_selection(selection, state) {
                Ok(Some(request)) => resolution.requests.push(request),
                Ok(None) => debug!(kind = %kind, "Empty category selection, nothing to render"),
                Err(e) => {
                    if e.is_defect() {
                        error!(kind = %kind, error = %e, "Style key outside the closed domain");
                    } else {
                        warn!(kind = %kind, error = %e, "Layer selection rejected");
                    }
                    resolution.rejected.push(LayerFailure::new(kind, e));
                }
            }
        }

        resolution
    }

    /// Resolve one selection. `Ok(None)` means an explicitly empty
    /// category selection.
    pub fn resolve_selection(
        &self,
        selection: &LayerSelection,
        state: &UiState,
    ) -> DashboardResult<Option<LayerRequest>> {
        let kind = selection.kind;

        if let Some(own) = &selection.filters.date_range {
            own.validate()?;
        }
        let date_range = if kind.is_temporal() {
            let range = selection.filters.date_range.unwrap_or(state.date_range);
            range.validate()?;
            Some(range)
        } else {
            None
        };

        let categories = match self.categories(selection)? {
            Some(keys) => keys,
            None => return Ok(None),
        };

        let source = self.config.catalog.source(kind);
        let clip = self.config.aoi.geometry();
        let mut query = CollectionQuery::new(&source.collection_id, source.source, clip)
            .with_bands(source.bands.iter().cloned());
        if let Some(range) = &date_range {
            query = query.with_dates(range);
        }

        let pipeline = &self.config.pipeline;
        let codes: Vec<u16> = categories.iter().map(StyleKey::code).collect();

        let (query, style) = match kind {
            LayerKind::LandUse => (
                query
                    .with_composite(Compositor::First)
                    .with_derivation(Derivation::ClassMask {
                        band: band(source, kind, 0)?,
                        values: codes,
                    }),
                LayerStyle::categorical(&categories),
            ),
            LayerKind::Temperature => (
                query.with_composite(Compositor::Mean),
                LayerStyle::Gradient(GradientStyle::soil_temperature()),
            ),
            LayerKind::Ndvi => (
                self.cloud_filtered(query, source)
                    .with_composite(Compositor::Median)
                    .with_derivation(Derivation::NormalizedDifference {
                        nir: band(source, kind, 0)?,
                        red: band(source, kind, 1)?,
                        output: NDVI_BAND.to_string(),
                        clamp: ValueRange::NDVI,
                    }),
                LayerStyle::Gradient(GradientStyle::ndvi_within(pipeline.ndvi_range)),
            ),
            LayerKind::Vegetation => (
                self.cloud_filtered(query, source)
                    .with_composite(Compositor::Median)
                    .with_derivation(Derivation::ClassifyNormalizedDifference {
                        nir: band(source, kind, 0)?,
                        red: band(source, kind, 1)?,
                        output: DENSITY_BAND.to_string(),
                        classes: density_classes(),
                        retain: codes,
                    }),
                LayerStyle::categorical(&categories),
            ),
            LayerKind::Roads => {
                let property = source.property.clone().ok_or_else(|| {
                    DashboardError::Config("roads source has no class property".to_string())
                })?;
                (
                    query.with_property_filter(property, codes),
                    LayerStyle::lines(&categories),
                )
            }
            LayerKind::UrbanDensity => {
                let threshold = selection
                    .filters
                    .threshold
                    .unwrap_or(pipeline.urban_density_threshold);
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(DashboardError::InvalidParameter {
                        param: "threshold".to_string(),
                        message: format!("{} is not a probability in [0, 1]", threshold),
                    });
                }
                (
                    query
                        .with_composite(Compositor::Mean)
                        .with_derivation(Derivation::ThresholdMask {
                            band: band(source, kind, 0)?,
                            min: threshold,
                        }),
                    LayerStyle::Gradient(GradientStyle::built_up(threshold)),
                )
            }
        };

        Ok(Some(LayerRequest {
            kind,
            title: kind.title().to_string(),
            query,
            style,
            date_range,
            categories,
        }))
    }

    /// Parsed categories, or `None` for an explicitly empty selection.
    fn categories(&self, selection: &LayerSelection) -> DashboardResult<Option<Vec<StyleKey>>> {
        let kind = selection.kind;
        if !kind.is_categorical() {
            return Ok(Some(Vec::new()));
        }

        match &selection.filters.categories {
            None => Ok(Some(StyleKey::domain(kind))),
            Some(raw) if raw.is_empty() => Ok(None),
            Some(raw) => {
                let mut keys = raw
                    .iter()
                    .map(|value| StyleKey::parse(kind, value))
                    .collect::<DashboardResult<Vec<_>>>()?;
                keys.sort();
                keys.dedup();
                Ok(Some(keys))
            }
        }
    }

    fn cloud_filtered(&self, query: CollectionQuery, source: &LayerSource) -> CollectionQuery {
        match &source.cloud_property {
            Some(property) => {
                query.with_cloud_filter(property, self.config.pipeline.cloud_cover_max_percent)
            }
            None => query,
        }
    }
}

fn band(source: &LayerSource, kind: LayerKind, index: usize) -> DashboardResult<String> {
    source.bands.get(index).cloned().ok_or_else(|| {
        DashboardError::Config(format!(
            "{} source {} has no band #{}",
            kind, source.collection_id, index
        ))
    })
}

fn density_classes() -> Vec<ClassInterval> {
    VegetationDensity::ALL
        .into_iter()
        .map(|density| {
            let interval = density.ndvi_interval();
            ClassInterval {
                value: density.code(),
                min: interval.min,
                max: interval.max,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use geo_backend::SourceKind;
    use urban_common::{LandCoverClass, RoadType};

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
    }

    fn ui() -> UiState {
        UiState::new(DateRange::from_years(2020, 2024).unwrap())
    }

    #[test]
    fn test_disabled_selection_yields_nothing() {
        let config = DashboardConfig::default();
        let state = LayerKind::ALL
            .into_iter()
            .fold(ui(), |s, kind| s.with(LayerSelection::disabled(kind)));

        let resolution = SelectionResolver::new(&config).resolve(&state);
        assert!(resolution.requests.is_empty());
        assert!(resolution.rejected.is_empty());
    }

    #[test]
    fn test_reversed_range_rejects_only_that_layer() {
        let config = DashboardConfig::default();
        let state = ui()
            .with(LayerSelection::enabled(LayerKind::Ndvi).with_dates(range((2023, 6, 1), (2023, 1, 1))))
            .with(LayerSelection::enabled(LayerKind::LandUse));

        let resolution = SelectionResolver::new(&config).resolve(&state);
        assert_eq!(resolution.requests.len(), 1);
        assert_eq!(resolution.requests[0].kind, LayerKind::LandUse);
        assert_eq!(resolution.rejected.len(), 1);
        assert_eq!(resolution.rejected[0].kind, LayerKind::Ndvi);
        assert_eq!(resolution.rejected[0].error.code(), "InvalidRangeError");
    }

    #[test]
    fn test_range_past_slider_years_still_resolves() {
        let config = DashboardConfig::default();
        let state = ui()
            .with(LayerSelection::enabled(LayerKind::Ndvi).with_dates(range((2025, 1, 1), (2025, 6, 1))))
            .with(LayerSelection::enabled(LayerKind::Temperature).with_dates(range((2010, 1, 1), (2011, 1, 1))));

        let resolution = SelectionResolver::new(&config).resolve(&state);
        assert!(resolution.rejected.is_empty());
        assert_eq!(resolution.requests.len(), 2);
        let ndvi = resolution
            .requests
            .iter()
            .find(|r| r.kind == LayerKind::Ndvi)
            .unwrap();
        assert_eq!(ndvi.date_range, Some(range((2025, 1, 1), (2025, 6, 1))));
    }

    #[test]
    fn test_empty_categories_is_silent_noop() {
        let config = DashboardConfig::default();
        let state = ui()
            .with(LayerSelection::enabled(LayerKind::Roads).with_categories(Vec::<String>::new()))
            .with(LayerSelection::enabled(LayerKind::LandUse).with_categories(Vec::<String>::new()));

        let resolution = SelectionResolver::new(&config).resolve(&state);
        assert!(resolution.requests.is_empty());
        assert!(resolution.rejected.is_empty());
    }

    #[test]
    fn test_missing_categories_selects_whole_domain() {
        let config = DashboardConfig::default();
        let state = ui().with(LayerSelection::enabled(LayerKind::LandUse));
        let request = &SelectionResolver::new(&config).resolve(&state).requests[0];

        assert_eq!(request.categories.len(), LandCoverClass::ALL.len());
        match &request.query.derivation {
            Some(Derivation::ClassMask { band, values }) => {
                assert_eq!(band, "Map");
                assert_eq!(values.len(), 11);
            }
            other => panic!("expected class mask, got {:?}", other),
        }
        assert_eq!(request.query.composite, Compositor::First);
        assert!(request.query.date_filter.is_none());
    }

    #[test]
    fn test_unknown_category_is_style_key_error() {
        let config = DashboardConfig::default();
        let state = ui().with(
            LayerSelection::enabled(LayerKind::Vegetation).with_categories(["High", "Extreme"]),
        );
        let resolution = SelectionResolver::new(&config).resolve(&state);
        assert!(resolution.requests.is_empty());
        assert_eq!(resolution.rejected[0].error.code(), "UnknownStyleKeyError");
    }

    #[test]
    fn test_last_duplicate_wins() {
        let config = DashboardConfig::default();
        let state = ui()
            .with(LayerSelection::enabled(LayerKind::Roads))
            .with(LayerSelection::disabled(LayerKind::Roads));
        assert!(SelectionResolver::new(&config).resolve(&state).requests.is_empty());

        let state = ui()
            .with(LayerSelection::disabled(LayerKind::Roads))
            .with(LayerSelection::enabled(LayerKind::Roads).with_categories(["highway"]));
        let requests = SelectionResolver::new(&config).resolve(&state).requests;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].categories, vec![StyleKey::RoadType(RoadType::Highway)]);
    }

    #[test]
    fn test_order_is_priority_order() {
        let config = DashboardConfig::default();
        let mut kinds = LayerKind::ALL.to_vec();
        kinds.reverse();
        let state = kinds
            .into_iter()
            .fold(ui(), |s, kind| s.with(LayerSelection::enabled(kind)));

        let order: Vec<LayerKind> = SelectionResolver::new(&config)
            .resolve(&state)
            .requests
            .iter()
            .map(|r| r.kind)
            .collect();
        assert_eq!(order, LayerKind::ALL.to_vec());
    }

    #[test]
    fn test_ndvi_query_filters_clouds_and_clamps() {
        let config = DashboardConfig::default();
        let dates = range((2023, 1, 1), (2023, 6, 1));
        let state = ui().with(LayerSelection::enabled(LayerKind::Ndvi).with_dates(dates));
        let request = &SelectionResolver::new(&config).resolve(&state).requests[0];

        let cloud = request.query.cloud_filter.as_ref().unwrap();
        assert_eq!(cloud.property, "CLOUDY_PIXEL_PERCENTAGE");
        assert_eq!(cloud.max_percent, 20.0);
        assert_eq!(request.query.composite, Compositor::Median);
        assert_eq!(request.date_range, Some(dates));

        let filter = request.query.date_filter.as_ref().unwrap();
        assert_eq!(filter.start, "2023-01-01");
        assert_eq!(filter.end, "2023-06-02");

        match &request.query.derivation {
            Some(Derivation::NormalizedDifference { nir, red, clamp, .. }) => {
                assert_eq!((nir.as_str(), red.as_str()), ("B8", "B4"));
                assert_eq!(*clamp, ValueRange::NDVI);
            }
            other => panic!("expected normalized difference, got {:?}", other),
        }
    }

    #[test]
    fn test_ndvi_style_range_is_clamped() {
        let mut config = DashboardConfig::default();
        config.pipeline.ndvi_range = ValueRange::new(-3.0, 5.0);
        let state = ui().with(LayerSelection::enabled(LayerKind::Ndvi));
        let request = &SelectionResolver::new(&config).resolve(&state).requests[0];

        match &request.style {
            LayerStyle::Gradient(gradient) => assert_eq!(gradient.range, ValueRange::NDVI),
            other => panic!("expected gradient, got {:?}", other),
        }
    }

    #[test]
    fn test_vegetation_classes_and_retained_codes() {
        let config = DashboardConfig::default();
        let state = ui().with(
            LayerSelection::enabled(LayerKind::Vegetation).with_categories(["high", "Low"]),
        );
        let request = &SelectionResolver::new(&config).resolve(&state).requests[0];

        match &request.query.derivation {
            Some(Derivation::ClassifyNormalizedDifference { classes, retain, .. }) => {
                assert_eq!(classes.len(), 3);
                assert_eq!(retain, &vec![1, 3]);
            }
            other => panic!("expected classification, got {:?}", other),
        }
        assert_eq!(request.style.palette_hex(), vec!["#ffffcc", "#005a32"]);
    }

    #[test]
    fn test_roads_is_property_filtered_vector() {
        let config = DashboardConfig::default();
        let state = ui().with(
            LayerSelection::enabled(LayerKind::Roads).with_categories(["Secondary", "Highway"]),
        );
        let request = &SelectionResolver::new(&config).resolve(&state).requests[0];

        assert_eq!(request.query.source, SourceKind::FeatureCollection);
        let filter = request.query.property_filter.as_ref().unwrap();
        assert_eq!(filter.property, "GP_RTP");
        assert_eq!(filter.values, vec![1, 3]);
        assert!(matches!(request.style, LayerStyle::Lines { .. }));
    }

    #[test]
    fn test_urban_density_threshold_bounds() {
        let config = DashboardConfig::default();
        let ok = ui().with(LayerSelection::enabled(LayerKind::UrbanDensity).with_threshold(0.3));
        let request = &SelectionResolver::new(&config).resolve(&ok).requests[0];
        assert_eq!(
            request.query.derivation,
            Some(Derivation::ThresholdMask {
                band: "built".into(),
                min: 0.3
            })
        );

        let bad = ui().with(LayerSelection::enabled(LayerKind::UrbanDensity).with_threshold(1.5));
        let resolution = SelectionResolver::new(&config).resolve(&bad);
        assert_eq!(resolution.rejected[0].error.code(), "InvalidParameterError");
    }

    #[test]
    fn test_every_query_is_clipped_to_aoi() {
        let config = DashboardConfig::default();
        let state = UiState::all_enabled(DateRange::from_years(2020, 2024).unwrap());
        let expected = config.aoi.geometry();
        for request in SelectionResolver::new(&config).resolve(&state).requests {
            assert_eq!(request.query.clip, expected, "{} not clipped", request.kind);
        }
    }

    #[test]
    fn test_ui_state_deserializes_legacy_kind_names() {
        let json = r#"{
            "date_range": {"start": "2020-01-01", "end": "2024-12-31"},
            "selections": [
                {"kind": "climate", "enabled": true},
                {"kind": "density", "enabled": true, "filters": {"threshold": 0.6}}
            ]
        }"#;
        let state: UiState = serde_json::from_str(json).unwrap();
        assert_eq!(state.selections[0].kind, LayerKind::Temperature);
        assert_eq!(state.selections[1].filters.threshold, Some(0.6));
    }
}
