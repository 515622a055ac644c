//! Scriptable in-memory [`GeoBackend`] for pipeline tests.
//!
//! Behavior is keyed by collection id: tests script failures, delays,
//! reduction results and time series per collection, then inspect the
//! recorded queries afterwards.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use geo_backend::{
    BackendError, CollectionQuery, GeoBackend, HandleKind, ImageHandle, Reducer, ReductionValues,
    Result, SourceKind, TimeSeriesRecord, VisParams,
};
use urban_common::Geometry;

/// One backend call, as seen by the fake.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Authenticate,
    Query(CollectionQuery),
    Reduce { handle: String, reducer: Reducer, scale: f64 },
    TimeSeries { handle: String, scale: f64 },
    Thumbnail { handle: String, vis: VisParams },
    Features { handle: String },
}

#[derive(Default)]
struct FakeState {
    auth_error: Option<String>,
    failing: HashMap<String, String>,
    disconnected: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    reductions: HashMap<String, ReductionValues>,
    series: HashMap<String, Vec<TimeSeriesRecord>>,
    handles: HashMap<String, CollectionQuery>,
    calls: Vec<RecordedCall>,
    next_handle: u64,
}

/// In-memory backend double.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `authenticate` fail with an auth error.
    pub fn reject_auth(self, message: &str) -> Self {
        self.with_state(|s| s.auth_error = Some(message.to_string()))
    }

    /// Every call touching `collection_id` fails with a query error.
    pub fn fail_collection(self, collection_id: &str, message: &str) -> Self {
        self.with_state(|s| {
            s.failing
                .insert(collection_id.to_string(), message.to_string());
        })
    }

    /// Every call touching `collection_id` fails with a connection error.
    pub fn disconnect_collection(self, collection_id: &str, message: &str) -> Self {
        self.with_state(|s| {
            s.disconnected
                .insert(collection_id.to_string(), message.to_string());
        })
    }

    /// Delay every call touching `collection_id`.
    pub fn delay_collection(self, collection_id: &str, delay: Duration) -> Self {
        self.with_state(|s| {
            s.delays.insert(collection_id.to_string(), delay);
        })
    }

    /// Reduction result for handles derived from `collection_id`.
    pub fn with_reduction(self, collection_id: &str, values: ReductionValues) -> Self {
        self.with_state(|s| {
            s.reductions.insert(collection_id.to_string(), values);
        })
    }

    /// Time series for handles derived from `collection_id`.
    pub fn with_time_series(self, collection_id: &str, records: Vec<TimeSeriesRecord>) -> Self {
        self.with_state(|s| {
            s.series.insert(collection_id.to_string(), records);
        })
    }

    /// Every query received, in order.
    pub fn queries(&self) -> Vec<CollectionQuery> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::Query(query) => Some(query),
                _ => None,
            })
            .collect()
    }

    /// Every call received, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    fn with_state(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.lock());
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        // A panicking test must not poison the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn collection_of(&self, handle: &ImageHandle) -> Result<String> {
        self.lock()
            .handles
            .get(&handle.id)
            .map(|q| q.collection_id.clone())
            .ok_or_else(|| BackendError::query(404, format!("unknown handle {}", handle.id)))
    }

    /// Apply scripted delay and failure for `collection_id`.
    async fn gate(&self, collection_id: &str) -> Result<()> {
        let (delay, failure, disconnect) = {
            let state = self.lock();
            (
                state.delays.get(collection_id).copied(),
                state.failing.get(collection_id).cloned(),
                state.disconnected.get(collection_id).cloned(),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = disconnect {
            return Err(BackendError::Connection(message));
        }
        if let Some(message) = failure {
            return Err(BackendError::query(500, message));
        }
        Ok(())
    }
}

#[async_trait]
impl GeoBackend for FakeBackend {
    async fn authenticate(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(RecordedCall::Authenticate);
        match &state.auth_error {
            Some(message) => Err(BackendError::Auth(message.clone())),
            None => Ok(()),
        }
    }

    async fn query(&self, query: &CollectionQuery) -> Result<ImageHandle> {
        self.lock().calls.push(RecordedCall::Query(query.clone()));
        self.gate(&query.collection_id).await?;

        let mut state = self.lock();
        state.next_handle += 1;
        let id = format!("{}#{}", query.collection_id, state.next_handle);
        state.handles.insert(id.clone(), query.clone());

        let kind = match query.source {
            SourceKind::FeatureCollection => HandleKind::Vector,
            _ => HandleKind::Raster,
        };
        let bands = match query.output_band() {
            Some(band) if query.derivation.is_some() => vec![band.to_string()],
            _ => query.bands.clone(),
        };
        Ok(ImageHandle { id, kind, bands })
    }

    async fn reduce_region(
        &self,
        handle: &ImageHandle,
        reducer: Reducer,
        _geometry: &Geometry,
        scale: f64,
    ) -> Result<ReductionValues> {
        self.lock().calls.push(RecordedCall::Reduce {
            handle: handle.id.clone(),
            reducer,
            scale,
        });
        let collection = self.collection_of(handle)?;
        self.gate(&collection).await?;
        Ok(self
            .lock()
            .reductions
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn region_time_series(
        &self,
        handle: &ImageHandle,
        _geometry: &Geometry,
        scale: f64,
    ) -> Result<Vec<TimeSeriesRecord>> {
        self.lock().calls.push(RecordedCall::TimeSeries {
            handle: handle.id.clone(),
            scale,
        });
        let collection = self.collection_of(handle)?;
        self.gate(&collection).await?;
        Ok(self
            .lock()
            .series
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn render_thumbnail(
        &self,
        handle: &ImageHandle,
        vis: &VisParams,
        _region: &Geometry,
    ) -> Result<String> {
        self.lock().calls.push(RecordedCall::Thumbnail {
            handle: handle.id.clone(),
            vis: vis.clone(),
        });
        let collection = self.collection_of(handle)?;
        self.gate(&collection).await?;
        Ok(format!("https://thumbnails.test/{}.png", handle.id.replace('/', "_")))
    }

    async fn fetch_features(&self, handle: &ImageHandle) -> Result<serde_json::Value> {
        self.lock().calls.push(RecordedCall::Features {
            handle: handle.id.clone(),
        });
        let collection = self.collection_of(handle)?;
        self.gate(&collection).await?;
        Ok(serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[44.0, 36.18], [44.02, 36.2]]},
                "properties": {"GP_RTP": 1}
            }]
        }))
    }
}
