//! Upper bound on every backend call.

use std::future::Future;
use std::time::Duration;

use urban_common::{DashboardError, DashboardResult};

/// Await a backend call for at most `limit`.
///
/// Backend errors convert into the dashboard taxonomy. Expiry becomes
/// [`DashboardError::Timeout`] and the call is dropped.
pub async fn with_deadline<T, F>(limit: Duration, call: F) -> DashboardResult<T>
where
    F: Future<Output = geo_backend::Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(DashboardError::from),
        Err(_) => Err(DashboardError::Timeout(limit.as_secs())),
    }
}
