//! Request and response types exchanged with the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use urban_common::{DateRange, Geometry, LayerStyle, ValueRange};

/// What kind of asset a collection id names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Image,
    ImageCollection,
    FeatureCollection,
}

/// Half-open date filter `[start, end)` in ISO `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateFilter {
    pub start: String,
    pub end: String,
}

impl From<&DateRange> for DateFilter {
    fn from(range: &DateRange) -> Self {
        let (start, end) = range.to_filter_bounds();
        Self { start, end }
    }
}

/// Drop images whose cloud cover property exceeds a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudFilter {
    /// Image metadata property holding the cloud percentage.
    pub property: String,
    /// Images with `property > max_percent` are excluded; an image exactly
    /// at the threshold is kept.
    pub max_percent: f64,
}

impl CloudFilter {
    /// Whether an image with this cloud percentage survives the filter.
    pub fn keeps(&self, cloud_percent: f64) -> bool {
        cloud_percent <= self.max_percent
    }
}

/// Keep features whose `property` is one of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub property: String,
    pub values: Vec<u16>,
}

/// Temporal aggregation applied after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compositor {
    /// Keep the collection as individual images (time series sources).
    #[default]
    None,
    First,
    Median,
    Mean,
}

/// Band math computed server-side on the composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Derivation {
    /// `(nir - red) / (nir + red)`, clamped to `clamp`, written to `output`.
    NormalizedDifference {
        nir: String,
        red: String,
        output: String,
        clamp: ValueRange,
    },
    /// Mask `band` to pixels whose value is in `values`.
    ClassMask { band: String, values: Vec<u16> },
    /// Normalized difference, then bucket into `classes` (value for each
    /// `[min, max)` interval) and mask to the `retain` values.
    ClassifyNormalizedDifference {
        nir: String,
        red: String,
        output: String,
        classes: Vec<ClassInterval>,
        retain: Vec<u16>,
    },
    /// Mask `band` to pixels with value `>= min`.
    ThresholdMask { band: String, min: f64 },
}

/// One bucket of a classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInterval {
    pub value: u16,
    pub min: f64,
    pub max: f64,
}

/// A fully resolved backend query.
///
/// `clip` is not optional: every layer is restricted to the area of
/// interest before it is rendered or reduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionQuery {
    pub collection_id: String,
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_filter: Option<DateFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_filter: Option<CloudFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bands: Vec<String>,
    #[serde(default)]
    pub composite: Compositor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation: Option<Derivation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_filter: Option<PropertyFilter>,
    pub clip: Geometry,
}

impl CollectionQuery {
    /// Start a query for `collection_id` clipped to `clip`.
    pub fn new(collection_id: impl Into<String>, source: SourceKind, clip: Geometry) -> Self {
        Self {
            collection_id: collection_id.into(),
            source,
            date_filter: None,
            cloud_filter: None,
            bands: Vec::new(),
            composite: Compositor::None,
            derivation: None,
            property_filter: None,
            clip,
        }
    }

    pub fn with_dates(mut self, range: &DateRange) -> Self {
        self.date_filter = Some(DateFilter::from(range));
        self
    }

    pub fn with_cloud_filter(mut self, property: impl Into<String>, max_percent: f64) -> Self {
        self.cloud_filter = Some(CloudFilter {
            property: property.into(),
            max_percent,
        });
        self
    }

    pub fn with_bands<I, S>(mut self, bands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bands = bands.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_composite(mut self, composite: Compositor) -> Self {
        self.composite = composite;
        self
    }

    pub fn with_derivation(mut self, derivation: Derivation) -> Self {
        self.derivation = Some(derivation);
        self
    }

    pub fn with_property_filter(mut self, property: impl Into<String>, values: Vec<u16>) -> Self {
        self.property_filter = Some(PropertyFilter {
            property: property.into(),
            values,
        });
        self
    }

    /// Band holding the values a reduction should read.
    pub fn output_band(&self) -> Option<&str> {
        match &self.derivation {
            Some(Derivation::NormalizedDifference { output, .. })
            | Some(Derivation::ClassifyNormalizedDifference { output, .. }) => Some(output),
            Some(Derivation::ClassMask { band, .. }) | Some(Derivation::ThresholdMask { band, .. }) => {
                Some(band)
            }
            None => self.bands.first().map(String::as_str),
        }
    }
}

/// Whether a handle refers to pixels or features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleKind {
    Raster,
    Vector,
}

/// Opaque reference to a computed asset on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageHandle {
    pub id: String,
    pub kind: HandleKind,
    #[serde(default)]
    pub bands: Vec<String>,
}

/// Spatial aggregation operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    #[default]
    Mean,
    Median,
    Min,
    Max,
    Sum,
}

/// Result of a region reduction: band name to value. A band present with
/// `None` means the reduction ran but produced no value (e.g. fully masked).
pub type ReductionValues = BTreeMap<String, Option<f64>>;

/// One record of a regional time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub values: ReductionValues,
}

/// Visualization parameters for thumbnail rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisParams {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub palette: Vec<String>,
    /// Class values for categorical rasters, parallel to `palette`. When
    /// present the backend remaps pixel `values[i]` to `i` before applying
    /// `min..max`, so each class lands exactly on its own palette entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<u16>,
    /// Longest edge of the rendered image in pixels.
    pub dimensions: u32,
}

impl VisParams {
    /// Derive visualization parameters from a resolved layer style.
    pub fn from_style(style: &LayerStyle, band: Option<&str>, dimensions: u32) -> Self {
        let (min, max, values) = match style {
            LayerStyle::Gradient(gradient) => {
                (Some(gradient.range.min), Some(gradient.range.max), Vec::new())
            }
            // Class codes are not evenly spaced, so stretch over palette
            // indices rather than raw codes.
            LayerStyle::Categorical { entries } | LayerStyle::Lines { entries } => {
                let values: Vec<u16> = entries.iter().map(|e| e.value).collect();
                let top = values.len().saturating_sub(1) as f64;
                (Some(0.0), Some(top), values)
            }
        };

        Self {
            bands: band.map(|b| vec![b.to_string()]).unwrap_or_default(),
            min,
            max,
            palette: style.palette_hex(),
            values,
            dimensions,
        }
    }

    /// Palette entry a pixel value renders with: class values are remapped
    /// to their index, then stretched linearly over `min..max`. `None` when
    /// the value is not a listed class or lands between palette entries.
    pub fn palette_color(&self, value: f64) -> Option<&str> {
        let value = if self.values.is_empty() {
            value
        } else {
            self.values.iter().position(|v| *v as f64 == value)? as f64
        };
        let (min, max) = (self.min?, self.max?);
        let last = self.palette.len().checked_sub(1)?;
        let position = if max > min {
            (value - min) / (max - min) * last as f64
        } else {
            0.0
        };
        if position < 0.0 || position > last as f64 || position.fract() != 0.0 {
            return None;
        }
        self.palette.get(position as usize).map(String::as_str)
    }
}
