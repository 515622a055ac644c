//! Common types and utilities shared across the urban layers dashboard crates.

pub mod aoi;
pub mod bbox;
pub mod error;
pub mod layer;
pub mod style;
pub mod time;

pub use aoi::{AoiExtent, AreaOfInterest, Geometry, LatLon};
pub use bbox::BoundingBox;
pub use error::{DashboardError, DashboardResult, LayerFailure, LayerFailureView};
pub use layer::LayerKind;
pub use style::{
    CategoryEntry, Color, GradientStyle, LandCoverClass, LayerStyle, RoadType, StyleKey, ValueRange,
    VegetationDensity,
};
pub use time::{DateRange, YearBounds};
