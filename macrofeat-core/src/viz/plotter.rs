//! The three exploratory plots: scatter with OLS overlay, histogram, and a
//! dual-axis time series. Each writes a standalone HTML page.

use super::chart::{Axis, ChartDataset, ChartSpec, ChartType, Point, palette_color};
use super::regression::{OlsFit, fit_ols};
use super::render::render_chart_page;
use crate::error::{MacroError, Result};
use crate::features::{DATE_FIELD, ENTITY_FIELD, feature_column_name};
use crate::panel::{Column, Panel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SCATTER_FILE: &str = "scatter.html";
pub const HISTOGRAM_FILE: &str = "histogram.html";
pub const TIMESERIES_FILE: &str = "timeseries.html";

/// Number of equal-width histogram bins.
pub const HISTOGRAM_BINS: usize = 10;

/// A panel column named by base field and optional feature suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub base: String,
    #[serde(default)]
    pub feature: Option<String>,
}

impl ColumnRef {
    pub fn new(base: impl Into<String>, feature: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            feature: Some(feature.into()),
        }
    }

    pub fn raw(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            feature: None,
        }
    }

    /// `{base}_{feature}`, or `{base}` without a feature.
    pub fn resolve(&self) -> String {
        match self.feature.as_deref() {
            Some(f) if !f.is_empty() => feature_column_name(&self.base, f),
            _ => self.base.clone(),
        }
    }
}

/// Axis labels and title for one plot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotLabels {
    #[serde(default)]
    pub x_label: String,
    #[serde(default)]
    pub y_label: String,
    #[serde(default)]
    pub title: String,
}

impl PlotLabels {
    pub fn new(x_label: impl Into<String>, y_label: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            x_label: x_label.into(),
            y_label: y_label.into(),
            title: title.into(),
        }
    }

    /// The explicit title, or `fallback` when none was set.
    fn title_or(&self, fallback: String) -> String {
        if self.title.is_empty() {
            fallback
        } else {
            self.title.clone()
        }
    }
}

/// Result of [`Plotter::scatter`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPlot {
    pub path: PathBuf,
    pub fit: OlsFit,
}

/// Writes plots into one output directory.
pub struct Plotter {
    output_dir: PathBuf,
    entity_field: String,
    date_field: String,
}

impl Plotter {
    /// Create the plotter, creating `output_dir` if needed.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            entity_field: ENTITY_FIELD.to_string(),
            date_field: DATE_FIELD.to_string(),
        })
    }

    /// Use a different field for per-entity colouring.
    pub fn with_entity_field(mut self, field: impl Into<String>) -> Self {
        self.entity_field = field.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Scatter of `y` against `x`, coloured by entity, with the OLS line.
    ///
    /// Only rows where x, y and the entity are all present are plotted and fitted.
    pub fn scatter(
        &self,
        panel: &Panel,
        x: &ColumnRef,
        y: &ColumnRef,
        labels: &PlotLabels,
    ) -> Result<ScatterPlot> {
        let xs = numeric_values(panel, x)?;
        let ys = numeric_values(panel, y)?;
        let entity = panel.require_field(&self.entity_field)?;

        let mut groups: Vec<(String, Vec<Point>)> = Vec::new();
        let mut fit_x = Vec::new();
        let mut fit_y = Vec::new();
        for row in 0..panel.row_count() {
            let (Some(px), Some(py), Some(name)) = (xs[row], ys[row], entity.data.key(row)) else {
                continue;
            };
            if !px.is_finite() || !py.is_finite() {
                continue;
            }
            fit_x.push(px);
            fit_y.push(py);
            let point = Point { x: px, y: py };
            match groups.iter_mut().find(|(g, _)| *g == name) {
                Some((_, points)) => points.push(point),
                None => groups.push((name, vec![point])),
            }
        }

        let fit = fit_ols(&fit_x, &fit_y)?;
        let (lo, hi) = fit_x
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

        let mut spec = ChartSpec::new(ChartType::Scatter)
            .with_axis_labels(&labels.x_label, &labels.y_label)
            .with_title(labels.title_or(format!("{} vs {}", labels.y_label, labels.x_label)));
        for (i, (name, points)) in groups.into_iter().enumerate() {
            spec.datasets
                .push(ChartDataset::points(name, points).with_color(palette_color(i)));
        }
        spec.datasets.push(
            ChartDataset::points(
                fit.label(),
                vec![
                    Point { x: lo, y: fit.predict(lo) },
                    Point { x: hi, y: fit.predict(hi) },
                ],
            )
            .with_type(ChartType::Line)
            .with_color("#000000"),
        );

        tracing::debug!(
            x = %x.resolve(),
            y = %y.resolve(),
            n = fit.n,
            slope = fit.slope,
            r_squared = fit.r_squared,
            "Fitted scatter regression"
        );
        let path = self.write(SCATTER_FILE, &spec)?;
        Ok(ScatterPlot { path, fit })
    }

    /// Histogram of `column` in equal-width bins, stacked per entity.
    pub fn histogram(
        &self,
        panel: &Panel,
        column: &ColumnRef,
        label: &str,
        title: &str,
    ) -> Result<PathBuf> {
        let values = numeric_values(panel, column)?;
        let entity = panel.require_field(&self.entity_field)?;

        let cells: Vec<(String, f64)> = (0..panel.row_count())
            .filter_map(|row| {
                let v = values[row].filter(|v| v.is_finite())?;
                Some((entity.data.key(row)?, v))
            })
            .collect();
        if cells.is_empty() {
            return Err(MacroError::invalid_input(format!(
                "column '{}' has no finite values to plot",
                column.resolve()
            )));
        }

        let bins = BinEdges::spanning(cells.iter().map(|(_, v)| *v), HISTOGRAM_BINS);
        let mut groups: Vec<(String, Vec<Option<f64>>)> = Vec::new();
        for (name, v) in cells {
            let bin = bins.bin_of(v);
            let counts = match groups.iter().position(|(g, _)| *g == name) {
                Some(i) => &mut groups[i].1,
                None => {
                    groups.push((name, vec![Some(0.0); HISTOGRAM_BINS]));
                    let last = groups.len() - 1;
                    &mut groups[last].1
                }
            };
            counts[bin] = Some(counts[bin].unwrap_or(0.0) + 1.0);
        }

        let mut spec = ChartSpec::new(ChartType::Bar).with_axis_labels(label, "Frequency");
        spec.labels = bins.labels();
        spec.stacked = true;
        if !title.is_empty() {
            spec.title = Some(title.to_string());
        }
        for (i, (name, counts)) in groups.into_iter().enumerate() {
            spec.datasets
                .push(ChartDataset::values(name, counts).with_color(palette_color(i)));
        }
        self.write(HISTOGRAM_FILE, &spec)
    }

    /// Line chart of `x` (left axis) and `y` (right axis) over row order.
    pub fn timeseries(
        &self,
        panel: &Panel,
        x: &ColumnRef,
        y: &ColumnRef,
        labels: &PlotLabels,
    ) -> Result<PathBuf> {
        let xs = numeric_values(panel, x)?;
        let ys = numeric_values(panel, y)?;

        let mut spec = ChartSpec::new(ChartType::Line)
            .with_axis_labels("Year", &labels.x_label)
            .with_title(labels.title_or(format!(
                "{} vs {} Over Time",
                labels.y_label, labels.x_label
            )));
        spec.y2_label = Some(labels.y_label.clone());
        spec.labels = self.row_labels(panel);
        spec.datasets.push(
            ChartDataset::values(labels_or(&labels.x_label, x), finite(xs))
                .with_color(palette_color(0)),
        );
        spec.datasets.push(
            ChartDataset::values(labels_or(&labels.y_label, y), finite(ys))
                .with_color(palette_color(1))
                .on_axis(Axis::Right),
        );
        self.write(TIMESERIES_FILE, &spec)
    }

    /// `entity date` per row when both fields exist, otherwise the row number.
    fn row_labels(&self, panel: &Panel) -> Vec<String> {
        let entity = panel.field(&self.entity_field);
        let date = panel.field(&self.date_field);
        (0..panel.row_count())
            .map(|row| match (entity, date) {
                (Some(e), Some(d)) => format!("{} {}", e.data.render(row), d.data.render(row)),
                _ => row.to_string(),
            })
            .collect()
    }

    fn write(&self, file: &str, spec: &ChartSpec) -> Result<PathBuf> {
        let html = render_chart_page(spec)?;
        let path = self.output_dir.join(file);
        std::fs::write(&path, html)
            .map_err(|e| MacroError::plot(format!("Failed to write {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "Saved plot");
        Ok(path)
    }
}

fn numeric_values<'a>(panel: &'a Panel, column: &ColumnRef) -> Result<&'a [Option<f64>]> {
    let name = column.resolve();
    let col: &Column = panel.require_field(&name)?;
    col.as_numeric()
        .ok_or_else(|| MacroError::schema(format!("column '{name}' is not numeric")))
}

fn finite(values: &[Option<f64>]) -> Vec<Option<f64>> {
    values.iter().map(|v| v.filter(|v| v.is_finite())).collect()
}

fn labels_or(label: &str, column: &ColumnRef) -> String {
    if label.is_empty() {
        column.resolve()
    } else {
        label.to_string()
    }
}

/// Equal-width bin edges over a value range.
struct BinEdges {
    lo: f64,
    width: f64,
    count: usize,
}

impl BinEdges {
    /// A constant sample gets one unit of width centred on its value.
    fn spanning(values: impl Iterator<Item = f64>, count: usize) -> Self {
        let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if hi > lo {
            Self {
                lo,
                width: (hi - lo) / count as f64,
                count,
            }
        } else {
            Self {
                lo: lo - 0.5,
                width: 1.0 / count as f64,
                count,
            }
        }
    }

    /// The last bin is closed on the right.
    fn bin_of(&self, value: f64) -> usize {
        let idx = ((value - self.lo) / self.width).floor();
        if idx <= 0.0 {
            0
        } else {
            (idx as usize).min(self.count - 1)
        }
    }

    fn labels(&self) -> Vec<String> {
        (0..self.count)
            .map(|i| {
                let start = self.lo + self.width * i as f64;
                format!("{:.3}..{:.3}", start, start + self.width)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn panel() -> Panel {
        Panel::from_columns(vec![
            Column::from_strs("country", ["USA", "USA", "USA", "CAN", "CAN"]),
            Column::from_strs("date", ["2020", "2021", "2022", "2020", "2021"]),
            Column::numeric("gdp", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), None]),
            Column::numeric("exp", vec![Some(3.0), Some(5.0), Some(7.0), Some(9.0), Some(1.0)]),
        ])
        .unwrap()
    }

    fn read_config(path: &Path) -> serde_json::Value {
        let html = std::fs::read_to_string(path).unwrap();
        let start = html.find("const config = ").unwrap() + "const config = ".len();
        let end = html[start..].find(";\nnew Chart").unwrap() + start;
        serde_json::from_str(&html[start..end]).unwrap()
    }

    #[test]
    fn test_column_ref_resolve() {
        assert_eq!(ColumnRef::new("NY.GDP", "chpct1YE").resolve(), "NY.GDP_chpct1YE");
        assert_eq!(ColumnRef::raw("NY.GDP").resolve(), "NY.GDP");
        let empty = ColumnRef {
            base: "x".into(),
            feature: Some(String::new()),
        };
        assert_eq!(empty.resolve(), "x");
    }

    #[test]
    fn test_new_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("reports").join("viz");
        let plotter = Plotter::new(&out).unwrap();
        assert!(out.is_dir());
        assert_eq!(plotter.output_dir(), out.as_path());
    }

    #[test]
    fn test_scatter_fits_complete_rows() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = Plotter::new(dir.path()).unwrap();
        let labels = PlotLabels::new("GDP", "Exports", "Exports vs GDP");
        let out = plotter
            .scatter(&panel(), &ColumnRef::raw("gdp"), &ColumnRef::raw("exp"), &labels)
            .unwrap();

        assert_eq!(out.path, dir.path().join(SCATTER_FILE));
        assert_eq!(out.fit.n, 4);
        assert!((out.fit.slope - 2.0).abs() < 1e-12);
        assert!((out.fit.intercept - 1.0).abs() < 1e-12);

        let config = read_config(&out.path);
        let datasets = config["data"]["datasets"].as_array().unwrap();
        assert_eq!(datasets.len(), 3);
        assert_eq!(datasets[0]["label"], "USA");
        assert_eq!(datasets[0]["data"].as_array().unwrap().len(), 3);
        assert_eq!(datasets[1]["label"], "CAN");
        assert_eq!(datasets[2]["label"], "R² = 1.000");
        assert_eq!(datasets[2]["type"], "line");
    }

    #[test]
    fn test_scatter_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = Plotter::new(dir.path()).unwrap();
        let err = plotter
            .scatter(
                &panel(),
                &ColumnRef::new("gdp", "chpct1YE"),
                &ColumnRef::raw("exp"),
                &PlotLabels::default(),
            )
            .unwrap_err();
        assert!(matches!(err, MacroError::Schema(_)));
        assert!(!dir.path().join(SCATTER_FILE).exists());
    }

    #[test]
    fn test_scatter_too_few_points() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = Plotter::new(dir.path()).unwrap();
        let small = Panel::from_columns(vec![
            Column::from_strs("country", ["USA"]),
            Column::from_f64("a", [1.0]),
            Column::from_f64("b", [2.0]),
        ])
        .unwrap();
        let err = plotter
            .scatter(&small, &ColumnRef::raw("a"), &ColumnRef::raw("b"), &PlotLabels::default())
            .unwrap_err();
        assert!(matches!(err, MacroError::InvalidInput(_)));
    }

    #[test]
    fn test_histogram_stacks_per_entity() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = Plotter::new(dir.path()).unwrap();
        let path = plotter
            .histogram(&panel(), &ColumnRef::raw("exp"), "Exports", "Exports growth")
            .unwrap();
        let config = read_config(&path);

        assert_eq!(config["type"], "bar");
        assert_eq!(config["data"]["labels"].as_array().unwrap().len(), HISTOGRAM_BINS);
        assert_eq!(config["options"]["scales"]["x"]["stacked"], true);

        let datasets = config["data"]["datasets"].as_array().unwrap();
        let total: f64 = datasets
            .iter()
            .flat_map(|d| d["data"].as_array().unwrap().iter())
            .map(|v| v.as_f64().unwrap())
            .sum();
        assert_eq!(total, 5.0);
        // 1.0 lands in the first bin, 9.0 (the maximum) in the last.
        assert_eq!(datasets[1]["label"], "CAN");
        assert_eq!(datasets[1]["data"][0], 1.0);
        assert_eq!(datasets[1]["data"][9], 1.0);
    }

    #[test]
    fn test_histogram_constant_values() {
        let bins = BinEdges::spanning([2.0, 2.0].into_iter(), 10);
        assert_eq!(bins.bin_of(2.0), 5);
    }

    #[test]
    fn test_histogram_no_values() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = Plotter::new(dir.path()).unwrap();
        let p = Panel::from_columns(vec![
            Column::from_strs("country", ["USA"]),
            Column::numeric("a", vec![None]),
        ])
        .unwrap();
        let err = plotter.histogram(&p, &ColumnRef::raw("a"), "a", "").unwrap_err();
        assert!(matches!(err, MacroError::InvalidInput(_)));
    }

    #[test]
    fn test_timeseries_dual_axis() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = Plotter::new(dir.path()).unwrap();
        let labels = PlotLabels::new("GDP", "Exports", "");
        let path = plotter
            .timeseries(&panel(), &ColumnRef::raw("gdp"), &ColumnRef::raw("exp"), &labels)
            .unwrap();
        let config = read_config(&path);

        assert_eq!(config["type"], "line");
        assert_eq!(config["data"]["labels"][0], "USA 2020");
        assert_eq!(config["data"]["datasets"][0]["label"], "GDP");
        assert_eq!(config["data"]["datasets"][0]["yAxisID"], "y");
        assert!(config["data"]["datasets"][0]["data"][4].is_null());
        assert_eq!(config["data"]["datasets"][1]["yAxisID"], "y1");
        assert_eq!(config["options"]["scales"]["y1"]["title"]["text"], "Exports");
        assert_eq!(config["options"]["plugins"]["title"]["text"], "Exports vs GDP Over Time");
        assert_eq!(config["options"]["scales"]["x"]["title"]["text"], "Year");
    }

    #[test]
    fn test_plots_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let plotter = Plotter::new(dir.path()).unwrap();
        let labels = PlotLabels::default();
        let first = plotter
            .timeseries(&panel(), &ColumnRef::raw("gdp"), &ColumnRef::raw("exp"), &labels)
            .unwrap();
        let second = plotter
            .timeseries(&panel(), &ColumnRef::raw("exp"), &ColumnRef::raw("gdp"), &labels)
            .unwrap();
        assert_eq!(first, second);
        let config = read_config(&second);
        assert_eq!(config["data"]["datasets"][0]["label"], "exp");
    }
}
