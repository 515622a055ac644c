//! Render pass handler.

use std::sync::Arc;

use axum::{extract::Extension, Json};
use dashboard_core::{PassReport, UiState};
use tracing::instrument;

use crate::state::AppState;

/// POST /api/pass - Run one render pass over the posted UI snapshot.
///
/// Layer failures are reported inside the body; the response is always 200
/// once the snapshot parses.
#[instrument(skip_all)]
pub async fn pass_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(ui): Json<UiState>,
) -> Json<PassReport> {
    Json(state.dashboard.run_pass(&ui).await)
}
