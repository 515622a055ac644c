//! Layer composition for the urban layers dashboard.
//!
//! A pass takes an immutable [`UiState`] snapshot and runs three stages in
//! sequence:
//!
//! ```text
//! UiState ──► SelectionResolver ──► [LayerRequest] ──► LayerBuilder ──► [LayerOutcome]
//!                                                                          │
//!                                   StatSummary ◄── StatisticsAggregator ◄─┘
//! ```
//!
//! Every stage isolates failures per layer. Only a lost backend connection
//! stops a pass early.

pub mod aggregator;
pub mod builder;
pub mod config;
pub mod deadline;
pub mod pass;
pub mod resolver;

pub use aggregator::{Aggregation, Metric, SeriesPoint, StatSummary, StatisticsAggregator};
pub use builder::{LayerArtifact, LayerBuilder, LayerOutcome, RenderableLayer};
pub use config::{DashboardConfig, LayerCatalog, LayerSource, PipelineConfig};
pub use deadline::with_deadline;
pub use pass::{Dashboard, InlineWarning, PassReport};
pub use resolver::{
    LayerRequest, LayerSelection, Resolution, SelectionFilters, SelectionResolver, UiState,
};
