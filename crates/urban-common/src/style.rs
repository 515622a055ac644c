//! Style resolution for dashboard layers.
//!
//! Every categorical domain is a closed enum with an exhaustive color
//! mapping. Raw strings coming from multi-select widgets are parsed into
//! those enums once; anything outside the declared domain is rejected with
//! `UnknownStyleKey` instead of falling back to a default color.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{DashboardError, DashboardResult, LayerKind};

/// An RGBA color, serialized as `#rrggbb` (or `#rrggbbaa` when translucent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex(s: &str) -> DashboardResult<Self> {
        let hex = s.trim_start_matches('#');
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|c| u8::from_str_radix(c, 16).ok())
                .ok_or_else(|| DashboardError::InvalidParameter {
                    param: "color".to_string(),
                    message: format!("'{}' is not a hex color", s),
                })
        };

        match hex.len() {
            6 => Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Ok(Self {
                r: channel(0..2)?,
                g: channel(2..4)?,
                b: channel(4..6)?,
                a: channel(6..8)?,
            }),
            _ => Err(DashboardError::InvalidParameter {
                param: "color".to_string(),
                message: format!("'{}' is not a hex color", s),
            }),
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Linear interpolation between two colors, `t` clamped to `[0, 1]`.
    pub fn lerp(&self, other: &Color, t: f64) -> Color {
        let t = t.clamp(0.0, 1.0);
        let lerp_u8 =
            |a: u8, b: u8| -> u8 { ((a as f64) * (1.0 - t) + (b as f64) * t).round() as u8 };

        Color {
            r: lerp_u8(self.r, other.r),
            g: lerp_u8(self.g, other.g),
            b: lerp_u8(self.b, other.b),
            a: lerp_u8(self.a, other.a),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = DashboardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

/// Closed numeric interval used for styling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// Full NDVI domain.
    pub const NDVI: ValueRange = ValueRange { min: -1.0, max: 1.0 };

    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into the range. NaN maps to `min`.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    /// Restrict this range to lie inside `outer`.
    pub fn within(&self, outer: &ValueRange) -> ValueRange {
        let min = outer.clamp(self.min);
        let max = outer.clamp(self.max);
        if min <= max {
            ValueRange { min, max }
        } else {
            ValueRange { min: max, max: min }
        }
    }
}

/// Continuous palette spread evenly between `range.min` and `range.max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStyle {
    pub range: ValueRange,
    pub palette: Vec<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

impl GradientStyle {
    /// Red to green NDVI ramp over the full `[-1, 1]` domain.
    pub fn ndvi() -> Self {
        Self::ndvi_within(ValueRange::NDVI)
    }

    /// NDVI ramp with custom bounds; the bounds are clamped to `[-1, 1]`.
    pub fn ndvi_within(range: ValueRange) -> Self {
        Self {
            range: range.within(&ValueRange::NDVI),
            palette: vec![
                Color::rgb(0xd7, 0x30, 0x27),
                Color::rgb(0xfe, 0xe0, 0x8b),
                Color::rgb(0x1a, 0x98, 0x50),
            ],
            units: None,
        }
    }

    /// Soil temperature in Kelvin, 0 to 45 degC.
    pub fn soil_temperature() -> Self {
        Self {
            range: ValueRange::new(273.15, 318.15),
            palette: vec![
                Color::rgb(0x31, 0x36, 0x95),
                Color::rgb(0x74, 0xad, 0xd1),
                Color::rgb(0xff, 0xff, 0xbf),
                Color::rgb(0xf4, 0x6d, 0x43),
                Color::rgb(0xa5, 0x00, 0x26),
            ],
            units: Some("K".to_string()),
        }
    }

    /// Built-up probability from `threshold` to 1.
    pub fn built_up(threshold: f64) -> Self {
        Self {
            range: ValueRange::new(threshold.clamp(0.0, 1.0), 1.0),
            palette: vec![
                Color::rgb(0xff, 0xf5, 0xeb),
                Color::rgb(0xfd, 0x8d, 0x3c),
                Color::rgb(0x7f, 0x27, 0x04),
            ],
            units: Some("probability".to_string()),
        }
    }

    /// Color for a value. Values outside the range are clamped first, so
    /// styling never sees anything beyond the declared bounds.
    pub fn color_at(&self, value: f64) -> Color {
        let Some(first) = self.palette.first() else {
            return Color::transparent();
        };
        if self.palette.len() == 1 || self.range.max <= self.range.min {
            return *first;
        }

        let value = self.range.clamp(value);
        let t = (value - self.range.min) / (self.range.max - self.range.min);
        let segments = (self.palette.len() - 1) as f64;
        let position = t * segments;
        let index = (position.floor() as usize).min(self.palette.len() - 2);
        self.palette[index].lerp(&self.palette[index + 1], position - index as f64)
    }
}

fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// ESA WorldCover v200 land cover classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandCoverClass {
    TreeCover,
    Shrubland,
    Grassland,
    Cropland,
    BuiltUp,
    BareSparse,
    SnowIce,
    Water,
    HerbaceousWetland,
    Mangroves,
    MossLichen,
}

impl LandCoverClass {
    pub const ALL: [LandCoverClass; 11] = [
        LandCoverClass::TreeCover,
        LandCoverClass::Shrubland,
        LandCoverClass::Grassland,
        LandCoverClass::Cropland,
        LandCoverClass::BuiltUp,
        LandCoverClass::BareSparse,
        LandCoverClass::SnowIce,
        LandCoverClass::Water,
        LandCoverClass::HerbaceousWetland,
        LandCoverClass::Mangroves,
        LandCoverClass::MossLichen,
    ];

    /// Pixel value in the `Map` band.
    pub fn code(&self) -> u16 {
        match self {
            LandCoverClass::TreeCover => 10,
            LandCoverClass::Shrubland => 20,
            LandCoverClass::Grassland => 30,
            LandCoverClass::Cropland => 40,
            LandCoverClass::BuiltUp => 50,
            LandCoverClass::BareSparse => 60,
            LandCoverClass::SnowIce => 70,
            LandCoverClass::Water => 80,
            LandCoverClass::HerbaceousWetland => 90,
            LandCoverClass::Mangroves => 95,
            LandCoverClass::MossLichen => 100,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LandCoverClass::TreeCover => "Tree cover",
            LandCoverClass::Shrubland => "Shrubland",
            LandCoverClass::Grassland => "Grassland",
            LandCoverClass::Cropland => "Cropland",
            LandCoverClass::BuiltUp => "Built-up",
            LandCoverClass::BareSparse => "Bare / sparse vegetation",
            LandCoverClass::SnowIce => "Snow and ice",
            LandCoverClass::Water => "Permanent water bodies",
            LandCoverClass::HerbaceousWetland => "Herbaceous wetland",
            LandCoverClass::Mangroves => "Mangroves",
            LandCoverClass::MossLichen => "Moss and lichen",
        }
    }

    /// Official WorldCover legend colors.
    pub fn color(&self) -> Color {
        match self {
            LandCoverClass::TreeCover => Color::rgb(0x00, 0x64, 0x00),
            LandCoverClass::Shrubland => Color::rgb(0xff, 0xbb, 0x22),
            LandCoverClass::Grassland => Color::rgb(0xff, 0xff, 0x4c),
            LandCoverClass::Cropland => Color::rgb(0xf0, 0x96, 0xff),
            LandCoverClass::BuiltUp => Color::rgb(0xfa, 0x00, 0x00),
            LandCoverClass::BareSparse => Color::rgb(0xb4, 0xb4, 0xb4),
            LandCoverClass::SnowIce => Color::rgb(0xf0, 0xf0, 0xf0),
            LandCoverClass::Water => Color::rgb(0x00, 0x64, 0xc8),
            LandCoverClass::HerbaceousWetland => Color::rgb(0x00, 0x96, 0xa0),
            LandCoverClass::Mangroves => Color::rgb(0x00, 0xcf, 0x75),
            LandCoverClass::MossLichen => Color::rgb(0xfa, 0xe6, 0xa0),
        }
    }
}

impl FromStr for LandCoverClass {
    type Err = DashboardError;

    /// Accepts the legend label, the snake_case id or the pixel code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_key(s);
        LandCoverClass::ALL
            .into_iter()
            .find(|class| {
                normalize_key(class.label()) == key
                    || class.code().to_string() == key
                    || normalize_key(&format!("{:?}", class)) == key
            })
            .ok_or_else(|| DashboardError::UnknownStyleKey {
                domain: "land cover class",
                key: s.to_string(),
            })
    }
}

/// Vegetation density classes derived from NDVI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VegetationDensity {
    Low,
    Medium,
    High,
}

impl VegetationDensity {
    pub const ALL: [VegetationDensity; 3] = [
        VegetationDensity::Low,
        VegetationDensity::Medium,
        VegetationDensity::High,
    ];

    /// Class value written by the backend classification.
    pub fn code(&self) -> u16 {
        match self {
            VegetationDensity::Low => 1,
            VegetationDensity::Medium => 2,
            VegetationDensity::High => 3,
        }
    }

    /// NDVI interval `[min, max)` for the class; High is closed at 1.
    pub fn ndvi_interval(&self) -> ValueRange {
        match self {
            VegetationDensity::Low => ValueRange::new(0.2, 0.4),
            VegetationDensity::Medium => ValueRange::new(0.4, 0.6),
            VegetationDensity::High => ValueRange::new(0.6, 1.0),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VegetationDensity::Low => "Low",
            VegetationDensity::Medium => "Medium",
            VegetationDensity::High => "High",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            VegetationDensity::Low => Color::rgb(0xff, 0xff, 0xcc),
            VegetationDensity::Medium => Color::rgb(0x78, 0xc6, 0x79),
            VegetationDensity::High => Color::rgb(0x00, 0x5a, 0x32),
        }
    }
}

impl FromStr for VegetationDensity {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_key(s).as_str() {
            "low" => Ok(VegetationDensity::Low),
            "medium" => Ok(VegetationDensity::Medium),
            "high" => Ok(VegetationDensity::High),
            _ => Err(DashboardError::UnknownStyleKey {
                domain: "vegetation density",
                key: s.to_string(),
            }),
        }
    }
}

/// GRIP4 road classes (`GP_RTP` attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadType {
    Highway,
    Primary,
    Secondary,
    Tertiary,
    Local,
}

impl RoadType {
    pub const ALL: [RoadType; 5] = [
        RoadType::Highway,
        RoadType::Primary,
        RoadType::Secondary,
        RoadType::Tertiary,
        RoadType::Local,
    ];

    pub fn code(&self) -> u16 {
        match self {
            RoadType::Highway => 1,
            RoadType::Primary => 2,
            RoadType::Secondary => 3,
            RoadType::Tertiary => 4,
            RoadType::Local => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoadType::Highway => "Highway",
            RoadType::Primary => "Primary",
            RoadType::Secondary => "Secondary",
            RoadType::Tertiary => "Tertiary",
            RoadType::Local => "Local",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            RoadType::Highway => Color::rgb(0xe3, 0x1a, 0x1c),
            RoadType::Primary => Color::rgb(0xfd, 0x8d, 0x3c),
            RoadType::Secondary => Color::rgb(0xfe, 0xcc, 0x5c),
            RoadType::Tertiary => Color::rgb(0x96, 0x96, 0x96),
            RoadType::Local => Color::rgb(0xd9, 0xd9, 0xd9),
        }
    }

    /// Stroke width in pixels.
    pub fn line_width(&self) -> f32 {
        match self {
            RoadType::Highway => 4.0,
            RoadType::Primary => 3.0,
            RoadType::Secondary => 2.0,
            RoadType::Tertiary => 1.5,
            RoadType::Local => 1.0,
        }
    }
}

impl FromStr for RoadType {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize_key(s);
        RoadType::ALL
            .into_iter()
            .find(|road| normalize_key(road.label()) == key || road.code().to_string() == key)
            .ok_or_else(|| DashboardError::UnknownStyleKey {
                domain: "road type",
                key: s.to_string(),
            })
    }
}

/// A categorical style key, tagged by its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "domain", content = "key", rename_all = "snake_case")]
pub enum StyleKey {
    LandCover(LandCoverClass),
    VegetationDensity(VegetationDensity),
    RoadType(RoadType),
}

impl StyleKey {
    /// Parse a raw widget value into the key domain of `kind`.
    pub fn parse(kind: LayerKind, raw: &str) -> DashboardResult<Self> {
        match kind {
            LayerKind::LandUse => raw.parse().map(StyleKey::LandCover),
            LayerKind::Vegetation => raw.parse().map(StyleKey::VegetationDensity),
            LayerKind::Roads => raw.parse().map(StyleKey::RoadType),
            other => Err(DashboardError::InvalidParameter {
                param: "categories".to_string(),
                message: format!("{} has no categorical filter", other),
            }),
        }
    }

    /// Every key of the categorical domain belonging to `kind`.
    pub fn domain(kind: LayerKind) -> Vec<StyleKey> {
        match kind {
            LayerKind::LandUse => LandCoverClass::ALL.into_iter().map(StyleKey::LandCover).collect(),
            LayerKind::Vegetation => VegetationDensity::ALL
                .into_iter()
                .map(StyleKey::VegetationDensity)
                .collect(),
            LayerKind::Roads => RoadType::ALL.into_iter().map(StyleKey::RoadType).collect(),
            _ => Vec::new(),
        }
    }

    pub fn color(&self) -> Color {
        match self {
            StyleKey::LandCover(class) => class.color(),
            StyleKey::VegetationDensity(density) => density.color(),
            StyleKey::RoadType(road) => road.color(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StyleKey::LandCover(class) => class.label(),
            StyleKey::VegetationDensity(density) => density.label(),
            StyleKey::RoadType(road) => road.label(),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            StyleKey::LandCover(class) => class.code(),
            StyleKey::VegetationDensity(density) => density.code(),
            StyleKey::RoadType(road) => road.code(),
        }
    }
}

/// One legend entry of a categorical style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub key: StyleKey,
    pub value: u16,
    pub color: Color,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f32>,
}

impl From<StyleKey> for CategoryEntry {
    fn from(key: StyleKey) -> Self {
        let line_width = match key {
            StyleKey::RoadType(road) => Some(road.line_width()),
            _ => None,
        };
        Self {
            key,
            value: key.code(),
            color: key.color(),
            label: key.label().to_string(),
            line_width,
        }
    }
}

/// Resolved visualization for one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerStyle {
    /// Continuous raster ramp.
    Gradient(GradientStyle),
    /// Discrete raster classes.
    Categorical { entries: Vec<CategoryEntry> },
    /// Vector lines styled per class.
    Lines { entries: Vec<CategoryEntry> },
}

impl LayerStyle {
    /// Categorical style over the given keys, in ascending key order.
    pub fn categorical(keys: &[StyleKey]) -> Self {
        LayerStyle::Categorical {
            entries: sorted_entries(keys),
        }
    }

    pub fn lines(keys: &[StyleKey]) -> Self {
        LayerStyle::Lines {
            entries: sorted_entries(keys),
        }
    }

    /// Palette as hex strings, in the order the backend expects.
    pub fn palette_hex(&self) -> Vec<String> {
        match self {
            LayerStyle::Gradient(gradient) => gradient.palette.iter().map(Color::to_hex).collect(),
            LayerStyle::Categorical { entries } | LayerStyle::Lines { entries } => {
                entries.iter().map(|e| e.color.to_hex()).collect()
            }
        }
    }
}

fn sorted_entries(keys: &[StyleKey]) -> Vec<CategoryEntry> {
    let mut keys = keys.to_vec();
    keys.sort();
    keys.dedup();
    keys.into_iter().map(CategoryEntry::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let color = Color::from_hex("#005a32").unwrap();
        assert_eq!(color, Color::rgb(0, 0x5a, 0x32));
        assert_eq!(color.to_hex(), "#005a32");
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#gg0000").is_err());
    }

    #[test]
    fn test_gradient_endpoints_and_clamp() {
        let ndvi = GradientStyle::ndvi();
        assert_eq!(ndvi.color_at(-1.0), ndvi.palette[0]);
        assert_eq!(ndvi.color_at(1.0), ndvi.palette[2]);
        assert_eq!(ndvi.color_at(0.0), ndvi.palette[1]);
        assert_eq!(ndvi.color_at(7.5), ndvi.color_at(1.0));
        assert_eq!(ndvi.color_at(-3.0), ndvi.color_at(-1.0));
    }

    #[test]
    fn test_ndvi_bounds_clamped() {
        let style = GradientStyle::ndvi_within(ValueRange::new(-2.0, 1.5));
        assert_eq!(style.range, ValueRange::NDVI);
    }

    #[test]
    fn test_road_type_parse() {
        assert_eq!("highway".parse::<RoadType>().unwrap(), RoadType::Highway);
        assert_eq!("3".parse::<RoadType>().unwrap(), RoadType::Secondary);
        assert!("motorway".parse::<RoadType>().is_err());
    }

    #[test]
    fn test_land_cover_parse_variants() {
        assert_eq!("Built-up".parse::<LandCoverClass>().unwrap(), LandCoverClass::BuiltUp);
        assert_eq!("built_up".parse::<LandCoverClass>().unwrap(), LandCoverClass::BuiltUp);
        assert_eq!("50".parse::<LandCoverClass>().unwrap(), LandCoverClass::BuiltUp);
        assert_eq!(
            "Permanent water bodies".parse::<LandCoverClass>().unwrap(),
            LandCoverClass::Water
        );
    }

    #[test]
    fn test_categorical_entries_sorted_and_deduped() {
        let style = LayerStyle::categorical(&[
            StyleKey::LandCover(LandCoverClass::Water),
            StyleKey::LandCover(LandCoverClass::TreeCover),
            StyleKey::LandCover(LandCoverClass::Water),
        ]);
        let LayerStyle::Categorical { entries } = style else {
            panic!("expected categorical style");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, 10);
        assert_eq!(entries[1].value, 80);
    }

    #[test]
    fn test_style_key_rejects_non_categorical_layer() {
        assert!(matches!(
            StyleKey::parse(LayerKind::Ndvi, "High"),
            Err(DashboardError::InvalidParameter { .. })
        ));
    }
}
