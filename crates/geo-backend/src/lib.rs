//! Geospatial compute backend abstraction.
//!
//! All raster math (compositing, band math, spatial reduction, thumbnail
//! rendering) runs on a remote service. This crate describes the requests
//! the dashboard sends and the [`GeoBackend`] trait implementations satisfy.
//!
//! # Architecture
//!
//! ```text
//! LayerRequest
//!      │
//!      ▼
//! GeoBackend::query(CollectionQuery)  ──► ImageHandle
//!      │
//!      ├─► render_thumbnail(handle, vis)   ──► overlay URL     (raster layers)
//!      ├─► fetch_features(handle)          ──► GeoJSON         (vector layers)
//!      ├─► reduce_region(handle, mean, 30) ──► {band: value}   (statistics)
//!      └─► region_time_series(handle, ...) ──► [(time, value)] (trends)
//! ```

pub mod backend;
pub mod error;
pub mod http;
pub mod types;

pub use backend::GeoBackend;
pub use error::{BackendError, Result};
pub use http::{HttpBackendConfig, HttpGeoBackend};
pub use types::{
    ClassInterval, CloudFilter, CollectionQuery, Compositor, DateFilter, Derivation, HandleKind,
    ImageHandle, PropertyFilter, Reducer, ReductionValues, SourceKind, TimeSeriesRecord,
    VisParams,
};
