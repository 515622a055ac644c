//! The render pass: resolve, build, aggregate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use geo_backend::GeoBackend;
use metrics::counter;
use serde::Serialize;
use tracing::{error, info, instrument};
use urban_common::{DashboardError, DashboardResult, LayerFailure, LayerFailureView};
use uuid::Uuid;

use crate::aggregator::{StatSummary, StatisticsAggregator};
use crate::builder::{LayerBuilder, LayerOutcome, RenderableLayer};
use crate::config::DashboardConfig;
use crate::deadline::with_deadline;
use crate::resolver::{SelectionResolver, UiState};

/// Inline warning shown next to the affected control or metric.
pub type InlineWarning = LayerFailureView;

/// Everything one pass produced.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// One outcome per enabled layer, in render priority order.
    pub layers: Vec<LayerOutcome>,
    pub stats: StatSummary,
    /// Every layer and statistic failure of the pass.
    pub warnings: Vec<InlineWarning>,
    /// The backend connection was lost and later work was skipped.
    pub halted: bool,
}

impl PassReport {
    pub fn rendered(&self) -> impl Iterator<Item = &RenderableLayer> {
        self.layers.iter().filter_map(LayerOutcome::layer)
    }

    pub fn failures(&self) -> impl Iterator<Item = &LayerFailure> {
        self.layers.iter().filter_map(LayerOutcome::failure)
    }
}

/// A connected dashboard. Holds only immutable state, so one instance
/// serves any number of concurrent passes.
pub struct Dashboard {
    config: Arc<DashboardConfig>,
    backend: Arc<dyn GeoBackend>,
}

impl Dashboard {
    /// Validate configuration and authenticate against the backend.
    ///
    /// Any failure here is fatal: no layer can render without a session.
    #[instrument(skip_all, fields(aoi = %config.aoi.name))]
    pub async fn connect(
        config: DashboardConfig,
        backend: Arc<dyn GeoBackend>,
    ) -> DashboardResult<Self> {
        config
            .validate()
            .map_err(|e| DashboardError::Config(format!("{:#}", e)))?;

        let limit = Duration::from_secs(config.pipeline.backend_timeout_secs);
        with_deadline(limit, backend.authenticate())
            .await
            .map_err(|e| match e {
                DashboardError::BackendConnection(_) => e,
                other => DashboardError::BackendConnection(other.to_string()),
            })?;

        info!("Backend session established");
        Ok(Self {
            config: Arc::new(config),
            backend,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Re-run the backend credential check, for readiness probes.
    pub async fn check_backend(&self) -> DashboardResult<()> {
        let limit = Duration::from_secs(self.config.pipeline.backend_timeout_secs);
        with_deadline(limit, self.backend.authenticate()).await
    }

    /// Run one full resolve, build and aggregate pass over `state`.
    #[instrument(skip_all, fields(selections = state.selections.len()))]
    pub async fn run_pass(&self, state: &UiState) -> PassReport {
        let pass_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        counter!("dashboard_passes_total").increment(1);

        let config = self.config.as_ref();
        let backend = self.backend.as_ref();

        let resolution = SelectionResolver::new(config).resolve(state);
        for failure in &resolution.rejected {
            counter!(
                "dashboard_layer_failures_total",
                "kind" => failure.kind.id(),
                "code" => failure.error.code()
            )
            .increment(1);
        }

        let built = LayerBuilder::new(backend, config)
            .build_all(&resolution.requests)
            .await;
        let mut halted = built
            .iter()
            .any(|o| o.failure().map(|f| f.error.is_fatal()).unwrap_or(false));

        let mut stats = StatSummary::default();
        let mut stat_warnings = Vec::new();
        if !halted {
            let pairs: Vec<_> = resolution
                .requests
                .iter()
                .zip(built.iter())
                .filter_map(|(request, outcome)| outcome.layer().map(|layer| (request, layer)))
                .collect();
            let aggregation = StatisticsAggregator::new(backend, config)
                .aggregate(&pairs)
                .await;
            halted = aggregation.warnings.iter().any(|w| w.error.is_fatal());
            stats = aggregation.summary;
            stat_warnings = aggregation.warnings;
        }

        let mut layers: Vec<LayerOutcome> = built;
        layers.extend(resolution.rejected.into_iter().map(LayerOutcome::Failed));
        layers.sort_by_key(LayerOutcome::kind);

        let mut warnings: Vec<InlineWarning> = layers
            .iter()
            .filter_map(LayerOutcome::failure)
            .chain(stat_warnings.iter())
            .map(InlineWarning::from)
            .collect();
        warnings.sort_by_key(|w| w.kind);

        if halted {
            error!(%pass_id, "Pass halted: backend connection lost");
        }
        let duration_ms = clock.elapsed().as_millis() as u64;
        info!(
            %pass_id,
            rendered = layers.iter().filter(|o| o.layer().is_some()).count(),
            failed = layers.iter().filter(|o| o.failure().is_some()).count(),
            duration_ms,
            "Pass complete"
        );

        PassReport {
            pass_id,
            started_at,
            duration_ms,
            layers,
            stats,
            warnings,
            halted,
        }
    }
}
