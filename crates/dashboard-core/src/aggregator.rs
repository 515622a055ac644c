//! Statistics over built layers: scalar means and the soil temperature trend.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use geo_backend::{Compositor, GeoBackend, Reducer, ReductionValues};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use urban_common::{DashboardError, DashboardResult, LayerFailure, LayerKind};

use crate::builder::RenderableLayer;
use crate::config::DashboardConfig;
use crate::deadline::with_deadline;
use crate::resolver::{LayerRequest, NDVI_BAND};

const KELVIN_OFFSET: f64 = 273.15;

/// A displayed statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Metric {
    #[serde(rename = "AverageNDVI")]
    AverageNdvi,
    AverageSoilTemperature,
    BuiltUpFraction,
    SoilTemperatureTrend,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::AverageNdvi => "Average NDVI",
            Metric::AverageSoilTemperature => "Average Soil Temperature",
            Metric::BuiltUpFraction => "Built-up Fraction",
            Metric::SoilTemperatureTrend => "Soil Temperature Trend",
        }
    }

    pub fn units(&self) -> Option<&'static str> {
        match self {
            Metric::AverageSoilTemperature | Metric::SoilTemperatureTrend => Some("°C"),
            Metric::AverageNdvi | Metric::BuiltUpFraction => None,
        }
    }

    /// Layer whose data the metric is reduced from.
    pub fn layer(&self) -> LayerKind {
        match self {
            Metric::AverageNdvi => LayerKind::Ndvi,
            Metric::AverageSoilTemperature | Metric::SoilTemperatureTrend => {
                LayerKind::Temperature
            }
            Metric::BuiltUpFraction => LayerKind::UrbanDensity,
        }
    }
}

/// One point of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Statistics for one pass. A metric that could not be computed is listed
/// in `missing` and never appears with a placeholder value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatSummary {
    pub scalars: BTreeMap<Metric, f64>,
    pub series: BTreeMap<Metric, Vec<SeriesPoint>>,
    pub missing: Vec<Metric>,
}

impl StatSummary {
    pub fn scalar(&self, metric: Metric) -> Option<f64> {
        self.scalars.get(&metric).copied()
    }

    pub fn series(&self, metric: Metric) -> Option<&[SeriesPoint]> {
        self.series.get(&metric).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.series.is_empty() && self.missing.is_empty()
    }
}

/// Aggregator output: the summary plus layer-scoped warnings.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub summary: StatSummary,
    pub warnings: Vec<LayerFailure>,
}

/// Computes [`StatSummary`] values by region reduction on the backend.
pub struct StatisticsAggregator<'a> {
    backend: &'a dyn GeoBackend,
    config: &'a DashboardConfig,
}

impl<'a> StatisticsAggregator<'a> {
    pub fn new(backend: &'a dyn GeoBackend, config: &'a DashboardConfig) -> Self {
        Self { backend, config }
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.config.pipeline.backend_timeout_secs)
    }

    /// Aggregate statistics for successfully built layers.
    ///
    /// Stops early on a lost backend connection, recording it as a warning.
    #[instrument(skip_all, fields(layers = built.len()))]
    pub async fn aggregate(&self, built: &[(&LayerRequest, &RenderableLayer)]) -> Aggregation {
        let mut out = Aggregation::default();

        for (request, layer) in built {
            let wanted: &[Metric] = match request.kind {
                LayerKind::Ndvi => &[Metric::AverageNdvi],
                LayerKind::Temperature => {
                    &[Metric::AverageSoilTemperature, Metric::SoilTemperatureTrend]
                }
                LayerKind::UrbanDensity => &[Metric::BuiltUpFraction],
                LayerKind::LandUse | LayerKind::Vegetation | LayerKind::Roads => &[],
            };

            for &metric in wanted {
                let result = match metric {
                    Metric::SoilTemperatureTrend => self
                        .soil_temperature_trend(request)
                        .await
                        .map(|series| {
                            out.summary.series.insert(metric, series);
                        }),
                    _ => self.scalar(metric, request, layer).await.map(|value| {
                        out.summary.scalars.insert(metric, value);
                    }),
                };

                if let Err(e) = result {
                    if matches!(e, DashboardError::MissingStatistic(_)) {
                        out.summary.missing.push(metric);
                        info!(metric = ?metric, "Statistic has no value, omitting");
                    } else {
                        warn!(metric = ?metric, error = %e, "Statistic failed");
                    }
                    let fatal = e.is_fatal();
                    out.warnings.push(LayerFailure::new(request.kind, e));
                    if fatal {
                        return out;
                    }
                }
            }
        }

        out
    }

    async fn scalar(
        &self,
        metric: Metric,
        request: &LayerRequest,
        layer: &RenderableLayer,
    ) -> DashboardResult<f64> {
        let limit = self.deadline();
        let scale = self.config.pipeline.stats_scale_m;
        let clip = &request.query.clip;

        let (values, key) = match metric {
            Metric::AverageNdvi => {
                let values = with_deadline(
                    limit,
                    self.backend
                        .reduce_region(&layer.source, Reducer::Mean, clip, scale),
                )
                .await?;
                (values, NDVI_BAND.to_string())
            }
            Metric::AverageSoilTemperature => {
                let key = first_band(request)?;
                let values = with_deadline(
                    limit,
                    self.backend
                        .reduce_region(&layer.source, Reducer::Mean, clip, scale),
                )
                .await?;
                (values, key)
            }
            Metric::BuiltUpFraction => {
                // Fraction of the composite before thresholding
                let mut query = request.query.clone();
                query.derivation = None;
                let key = first_band(request)?;
                let handle = with_deadline(limit, self.backend.query(&query)).await?;
                let values = with_deadline(
                    limit,
                    self.backend.reduce_region(&handle, Reducer::Mean, clip, scale),
                )
                .await?;
                (values, key)
            }
            Metric::SoilTemperatureTrend => {
                return Err(DashboardError::InvalidParameter {
                    param: "metric".to_string(),
                    message: "trend is a series, not a scalar".to_string(),
                })
            }
        };

        let value = pick(&values, &key).ok_or_else(|| missing(metric))?;
        debug!(metric = ?metric, value, "Statistic reduced");

        Ok(match metric {
            Metric::AverageSoilTemperature => value - KELVIN_OFFSET,
            _ => value,
        })
    }

    /// Regional time series over the request's date range, ascending.
    async fn soil_temperature_trend(&self, request: &LayerRequest) -> DashboardResult<Vec<SeriesPoint>> {
        let limit = self.deadline();
        let key = first_band(request)?;
        let query = request.query.clone().with_composite(Compositor::None);

        let handle = with_deadline(limit, self.backend.query(&query)).await?;
        let records = with_deadline(
            limit,
            self.backend.region_time_series(
                &handle,
                &request.query.clip,
                self.config.pipeline.stats_scale_m,
            ),
        )
        .await?;

        let mut series: Vec<SeriesPoint> = records
            .iter()
            .filter_map(|record| {
                pick(&record.values, &key).map(|kelvin| SeriesPoint {
                    timestamp: record.timestamp,
                    value: kelvin - KELVIN_OFFSET,
                })
            })
            .collect();

        if series.is_empty() {
            return Err(missing(Metric::SoilTemperatureTrend));
        }
        series.sort_by_key(|point| point.timestamp);
        Ok(series)
    }
}

fn first_band(request: &LayerRequest) -> DashboardResult<String> {
    request.query.bands.first().cloned().ok_or_else(|| {
        DashboardError::Config(format!("{} query selects no band", request.kind))
    })
}

/// Finite value for `key`, or `None` when absent, null or NaN.
fn pick(values: &ReductionValues, key: &str) -> Option<f64> {
    values
        .get(key)
        .copied()
        .flatten()
        .filter(|v| v.is_finite())
}

fn missing(metric: Metric) -> DashboardError {
    DashboardError::MissingStatistic(metric.label().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_rejects_missing_null_and_nan() {
        let mut values = ReductionValues::new();
        values.insert("a".into(), Some(1.0));
        values.insert("b".into(), None);
        values.insert("c".into(), Some(f64::NAN));

        assert_eq!(pick(&values, "a"), Some(1.0));
        assert_eq!(pick(&values, "b"), None);
        assert_eq!(pick(&values, "c"), None);
        assert_eq!(pick(&values, "d"), None);
    }

    #[test]
    fn test_metric_serializes_display_name() {
        let mut summary = StatSummary::default();
        summary.scalars.insert(Metric::AverageNdvi, 0.31);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["scalars"]["AverageNDVI"], 0.31);
    }

    #[test]
    fn test_metric_layers() {
        assert_eq!(Metric::AverageNdvi.layer(), LayerKind::Ndvi);
        assert_eq!(Metric::SoilTemperatureTrend.layer(), LayerKind::Temperature);
        assert_eq!(Metric::AverageSoilTemperature.units(), Some("°C"));
    }
}
