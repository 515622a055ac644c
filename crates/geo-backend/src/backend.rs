//! The backend trait.

use async_trait::async_trait;
use urban_common::Geometry;

use crate::error::Result;
use crate::types::{CollectionQuery, ImageHandle, Reducer, ReductionValues, TimeSeriesRecord, VisParams};

/// Remote geospatial compute service.
///
/// Implementations perform blocking-in-spirit remote calls; callers bound
/// each call with their own timeout.
#[async_trait]
pub trait GeoBackend: Send + Sync {
    /// Verify credentials and open a session. Called once at startup.
    async fn authenticate(&self) -> Result<()>;

    /// Evaluate a query (filter, composite, derive, clip) and return a
    /// handle to the result.
    async fn query(&self, query: &CollectionQuery) -> Result<ImageHandle>;

    /// Reduce a raster over `geometry` at `scale` meters.
    async fn reduce_region(
        &self,
        handle: &ImageHandle,
        reducer: Reducer,
        geometry: &Geometry,
        scale: f64,
    ) -> Result<ReductionValues>;

    /// Mean value over `geometry` for each image of an uncomposited
    /// collection. Records may come back in any order.
    async fn region_time_series(
        &self,
        handle: &ImageHandle,
        geometry: &Geometry,
        scale: f64,
    ) -> Result<Vec<TimeSeriesRecord>>;

    /// Render a raster to an image and return its URL.
    async fn render_thumbnail(
        &self,
        handle: &ImageHandle,
        vis: &VisParams,
        region: &Geometry,
    ) -> Result<String>;

    /// Fetch the features of a vector handle as a GeoJSON FeatureCollection.
    async fn fetch_features(&self, handle: &ImageHandle) -> Result<serde_json::Value>;
}
