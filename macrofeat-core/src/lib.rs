//! # macrofeat-core: Macroeconomic Indicator Features
//!
//! Downloads World Bank indicator series, reshapes them into a
//! (country, date) panel, derives grouped time-series features, and renders
//! exploratory plots.
//!
//! ## Pipeline
//!
//! 1. **Download**: [`source::WorldBankSource`] fetches one indicator per request;
//!    [`source::pivot`] and [`source::merge_all`] build the wide panel.
//! 2. **Transform**: [`FeatureGenerator`] appends changes, rolling statistics,
//!    lags and z-scores computed within each country.
//! 3. **Visualize**: [`viz::Plotter`] writes scatter, histogram and time-series pages.

// Foundation
pub mod config;
pub mod error;
pub mod panel;

// Stages
pub mod features;
pub mod source;
pub mod viz;

// Orchestration
pub mod pipeline;

// Re-exports
pub use config::{PipelineConfig, load_config};
pub use error::{MacroError, Result};
pub use features::{FeatureGenerator, FeatureKind, FeatureSpec};
pub use panel::{Column, ColumnData, ColumnType, Panel};
pub use pipeline::{Pipeline, RunSummary};
pub use source::{DateRange, IndicatorSource, LongTable, WorldBankSource};
pub use viz::{ColumnRef, OlsFit, Plotter};
