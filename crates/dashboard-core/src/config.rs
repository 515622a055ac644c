//! Dashboard configuration loading and types.
//!
//! Loaded from a single YAML file. Every field has a default, so an empty
//! or missing file yields the Erbil dashboard as originally published.

use std::path::Path;

use anyhow::{bail, Context, Result};
use geo_backend::{HttpBackendConfig, SourceKind};
use serde::{Deserialize, Serialize};
use urban_common::{AreaOfInterest, DateRange, LayerKind, ValueRange, YearBounds};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Page title.
    #[serde(default = "default_title")]
    pub title: String,

    /// The area every layer is clipped to.
    #[serde(default)]
    pub aoi: AreaOfInterest,

    /// Years the range slider offers.
    #[serde(default)]
    pub years: YearBounds,

    /// Initial slider position `[start_year, end_year]`.
    #[serde(default = "default_year_range")]
    pub default_years: [i32; 2],

    /// Processing constants.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Backend collections per layer.
    #[serde(default)]
    pub catalog: LayerCatalog,

    /// Backend connection.
    #[serde(default)]
    pub backend: HttpBackendConfig,
}

fn default_title() -> String {
    "Erbil Urban Analysis".to_string()
}

fn default_year_range() -> [i32; 2] {
    [2020, 2024]
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            aoi: AreaOfInterest::default(),
            years: YearBounds::default(),
            default_years: default_year_range(),
            pipeline: PipelineConfig::default(),
            catalog: LayerCatalog::default(),
            backend: HttpBackendConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from a YAML file.
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                "Dashboard config {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read: {:?}", path))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse: {:?}", path))?;

        tracing::info!(
            title = %config.title,
            aoi = %config.aoi.name,
            "Loaded dashboard config from {:?}",
            path
        );
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.default_date_range()
            .with_context(|| "default_years is not a valid range")?;

        let p = &self.pipeline;
        if !(0.0..=100.0).contains(&p.cloud_cover_max_percent) {
            bail!(
                "pipeline.cloud_cover_max_percent must be within 0-100, got {}",
                p.cloud_cover_max_percent
            );
        }
        if p.stats_scale_m <= 0.0 {
            bail!("pipeline.stats_scale_m must be positive");
        }
        if p.backend_timeout_secs == 0 {
            bail!("pipeline.backend_timeout_secs must be positive");
        }
        if !(0.0..=1.0).contains(&p.urban_density_threshold) {
            bail!("pipeline.urban_density_threshold must be within 0-1");
        }
        if !(0.0..=1.0).contains(&p.layer_opacity) {
            bail!("pipeline.layer_opacity must be within 0-1");
        }

        for kind in LayerKind::ALL {
            let source = self.catalog.source(kind);
            if source.collection_id.trim().is_empty() {
                bail!("catalog.{}.collection_id is empty", kind.id());
            }
            let needed = match kind {
                LayerKind::Roads => 0,
                LayerKind::Ndvi | LayerKind::Vegetation => 2,
                _ => 1,
            };
            if source.bands.len() < needed {
                bail!(
                    "catalog.{} needs at least {} band(s), has {}",
                    kind.id(),
                    needed,
                    source.bands.len()
                );
            }
            if kind == LayerKind::Roads && source.property.is_none() {
                bail!("catalog.roads.property is required");
            }
        }
        Ok(())
    }

    /// The slider's initial range as whole calendar years.
    pub fn default_date_range(&self) -> urban_common::DashboardResult<DateRange> {
        let [start, end] = self.default_years;
        let range = DateRange::from_years(start, end).ok_or_else(|| {
            urban_common::DashboardError::Config(format!("years {}-{} out of range", start, end))
        })?;
        range.validate_within(&self.years)?;
        Ok(range)
    }
}

/// Processing constants for the render pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Optical images above this cloud cover are dropped before
    /// compositing. Images exactly at the threshold are kept.
    #[serde(default = "default_cloud_cover_max")]
    pub cloud_cover_max_percent: f64,

    /// Reduction sampling resolution in meters.
    #[serde(default = "default_stats_scale")]
    pub stats_scale_m: f64,

    /// Upper bound for any single backend call.
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,

    /// Longest edge of rendered overlays in pixels.
    #[serde(default = "default_thumbnail_dimensions")]
    pub thumbnail_dimensions: u32,

    /// Overlay opacity handed to the map widget.
    #[serde(default = "default_layer_opacity")]
    pub layer_opacity: f32,

    /// Built-up probability threshold used when the UI sends none.
    #[serde(default = "default_urban_density_threshold")]
    pub urban_density_threshold: f64,

    /// NDVI styling bounds; clamped to `[-1, 1]` when applied.
    #[serde(default = "default_ndvi_range")]
    pub ndvi_range: ValueRange,
}

fn default_cloud_cover_max() -> f64 {
    20.0
}

fn default_stats_scale() -> f64 {
    30.0
}

fn default_backend_timeout() -> u64 {
    30
}

fn default_thumbnail_dimensions() -> u32 {
    1024
}

fn default_layer_opacity() -> f32 {
    0.7
}

fn default_urban_density_threshold() -> f64 {
    0.5
}

fn default_ndvi_range() -> ValueRange {
    ValueRange::NDVI
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cloud_cover_max_percent: default_cloud_cover_max(),
            stats_scale_m: default_stats_scale(),
            backend_timeout_secs: default_backend_timeout(),
            thumbnail_dimensions: default_thumbnail_dimensions(),
            layer_opacity: default_layer_opacity(),
            urban_density_threshold: default_urban_density_threshold(),
            ndvi_range: default_ndvi_range(),
        }
    }
}

/// Where a layer's data lives on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSource {
    pub collection_id: String,
    pub source: SourceKind,
    /// Bands to select. NDVI sources list near-infrared first, then red.
    #[serde(default)]
    pub bands: Vec<String>,
    /// Image property holding cloud cover percentage (optical sources).
    #[serde(default)]
    pub cloud_property: Option<String>,
    /// Feature property holding the class code (vector sources).
    #[serde(default)]
    pub property: Option<String>,
}

impl LayerSource {
    fn raster(collection_id: &str, bands: &[&str]) -> Self {
        Self {
            collection_id: collection_id.to_string(),
            source: SourceKind::ImageCollection,
            bands: bands.iter().map(|b| b.to_string()).collect(),
            cloud_property: None,
            property: None,
        }
    }

    fn sentinel2() -> Self {
        Self {
            cloud_property: Some("CLOUDY_PIXEL_PERCENTAGE".to_string()),
            ..Self::raster("COPERNICUS/S2_SR_HARMONIZED", &["B8", "B4"])
        }
    }
}

/// Backend collections for every layer kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerCatalog {
    #[serde(default = "default_land_use")]
    pub land_use: LayerSource,
    #[serde(default = "default_temperature")]
    pub temperature: LayerSource,
    #[serde(default = "LayerSource::sentinel2")]
    pub ndvi: LayerSource,
    #[serde(default = "LayerSource::sentinel2")]
    pub vegetation: LayerSource,
    #[serde(default = "default_roads")]
    pub roads: LayerSource,
    #[serde(default = "default_urban_density")]
    pub urban_density: LayerSource,
}

fn default_land_use() -> LayerSource {
    LayerSource::raster("ESA/WorldCover/v200", &["Map"])
}

fn default_temperature() -> LayerSource {
    LayerSource::raster("NASA/GLDAS/V021/NOAH/G025/T3H", &["SoilTMP0_10cm_inst"])
}

fn default_roads() -> LayerSource {
    LayerSource {
        collection_id: "projects/sat-io/open-datasets/GRIP4/Middle-East-Central-Asia".to_string(),
        source: SourceKind::FeatureCollection,
        bands: Vec::new(),
        cloud_property: None,
        property: Some("GP_RTP".to_string()),
    }
}

fn default_urban_density() -> LayerSource {
    LayerSource::raster("GOOGLE/DYNAMICWORLD/V1", &["built"])
}

impl Default for LayerCatalog {
    fn default() -> Self {
        Self {
            land_use: default_land_use(),
            temperature: default_temperature(),
            ndvi: LayerSource::sentinel2(),
            vegetation: LayerSource::sentinel2(),
            roads: default_roads(),
            urban_density: default_urban_density(),
        }
    }
}

impl LayerCatalog {
    pub fn source(&self, kind: LayerKind) -> &LayerSource {
        match kind {
            LayerKind::LandUse => &self.land_use,
            LayerKind::Temperature => &self.temperature,
            LayerKind::Ndvi => &self.ndvi,
            LayerKind::Vegetation => &self.vegetation,
            LayerKind::Roads => &self.roads,
            LayerKind::UrbanDensity => &self.urban_density,
        }
    }
}
