//! Chart specifications.
//!
//! Structured descriptions of the charts the plotter draws. The renderer
//! converts them to Chart.js configurations embedded in standalone HTML.

use serde::{Deserialize, Serialize};

/// Chart.js chart type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Scatter,
}

/// Which y-axis a dataset is drawn against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    Left,
    Right,
}

impl Axis {
    /// Chart.js scale id.
    pub fn scale_id(&self) -> &'static str {
        match self {
            Axis::Left => "y",
            Axis::Right => "y1",
        }
    }
}

/// An (x, y) point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Dataset values: one per category label, or free (x, y) points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeriesData {
    /// Aligned with [`ChartSpec::labels`]; `None` leaves a gap.
    Values(Vec<Option<f64>>),
    Points(Vec<Point>),
}

impl SeriesData {
    pub fn len(&self) -> usize {
        match self {
            SeriesData::Values(v) => v.len(),
            SeriesData::Points(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A single dataset in a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDataset {
    pub label: String,
    pub data: SeriesData,
    #[serde(default)]
    pub color: Option<String>,
    /// Per-dataset type override (e.g. a line drawn over a scatter).
    #[serde(default)]
    pub chart_type: Option<ChartType>,
    #[serde(default)]
    pub axis: Axis,
}

impl ChartDataset {
    pub fn values(label: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(label, SeriesData::Values(values))
    }

    pub fn points(label: impl Into<String>, points: Vec<Point>) -> Self {
        Self::new(label, SeriesData::Points(points))
    }

    fn new(label: impl Into<String>, data: SeriesData) -> Self {
        Self {
            label: label.into(),
            data,
            color: None,
            chart_type: None,
            axis: Axis::Left,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_type(mut self, chart_type: ChartType) -> Self {
        self.chart_type = Some(chart_type);
        self
    }

    pub fn on_axis(mut self, axis: Axis) -> Self {
        self.axis = axis;
        self
    }
}

/// Chart specification (rendered via Chart.js).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub chart_type: ChartType,
    /// Category labels (x-axis for line and bar charts).
    #[serde(default)]
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub x_label: Option<String>,
    #[serde(default)]
    pub y_label: Option<String>,
    /// Title of the right-hand axis. Only drawn when a dataset uses it.
    #[serde(default)]
    pub y2_label: Option<String>,
    /// Stack bar datasets on top of each other.
    #[serde(default)]
    pub stacked: bool,
}

impl ChartSpec {
    pub fn new(chart_type: ChartType) -> Self {
        Self {
            chart_type,
            labels: Vec::new(),
            datasets: Vec::new(),
            title: None,
            x_label: None,
            y_label: None,
            y2_label: None,
            stacked: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_axis_labels(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_label = Some(x.into());
        self.y_label = Some(y.into());
        self
    }

    pub fn uses_right_axis(&self) -> bool {
        self.datasets.iter().any(|d| d.axis == Axis::Right)
    }
}

/// Colour cycle for per-entity datasets.
pub const PALETTE: [&str; 8] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
];

pub fn palette_color(i: usize) -> &'static str {
    PALETTE[i % PALETTE.len()]
}
