//! Exploratory plots rendered as standalone Chart.js HTML pages.

pub mod chart;
pub mod plotter;
pub mod regression;
pub mod render;

pub use chart::{Axis, ChartDataset, ChartSpec, ChartType, Point, SeriesData};
pub use plotter::{
    ColumnRef, HISTOGRAM_FILE, PlotLabels, Plotter, SCATTER_FILE, ScatterPlot, TIMESERIES_FILE,
};
pub use regression::{OlsFit, fit_ols};
pub use render::{render_chart_config, render_chart_page};
