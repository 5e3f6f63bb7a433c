//! Configuration system for macrofeat.
//!
//! Uses `figment` for layered configuration merging:
//! defaults -> user config -> workspace config -> explicit file -> env vars -> overrides.

use crate::error::{MacroError, Result};
use crate::features::FeatureSpec;
use crate::source::DateRange;
use crate::source::worldbank::WORLD_BANK_API_BASE;
use crate::viz::{ColumnRef, PlotLabels};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding the workspace-level config file.
pub const WORKSPACE_CONFIG_DIR: &str = ".macrofeat";
pub const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// World Bank indicator codes to download.
    #[serde(default = "default_indicators")]
    pub indicators: Vec<String>,
    /// Entity (country) codes passed to the source.
    #[serde(default = "default_entities")]
    pub entities: Vec<String>,
    /// First period, e.g. "2010". Empty leaves the range open.
    #[serde(default = "default_date_start")]
    pub date_start: String,
    #[serde(default = "default_date_end")]
    pub date_end: String,
    /// Trailing window for the rolling features.
    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,
    /// Feature tags. Unknown tags are skipped with a warning.
    #[serde(default = "default_feature_set")]
    pub feature_set: Vec<String>,
    /// Period unit appended to feature column names.
    #[serde(default = "default_time_unit")]
    pub time_unit: String,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub plots: PlotsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            indicators: default_indicators(),
            entities: default_entities(),
            date_start: default_date_start(),
            date_end: default_date_end(),
            rolling_window: default_rolling_window(),
            feature_set: default_feature_set(),
            time_unit: default_time_unit(),
            output: OutputConfig::default(),
            source: SourceConfig::default(),
            plots: PlotsConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// The feature specification described by this config.
    pub fn feature_spec(&self) -> Result<FeatureSpec> {
        FeatureSpec::new(self.rolling_window, &self.feature_set, self.time_unit.clone())
    }

    pub fn date_range(&self) -> DateRange {
        let bound = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
        DateRange {
            start: bound(&self.date_start),
            end: bound(&self.date_end),
        }
    }

    /// Reject configs that cannot drive a download.
    pub fn validate(&self) -> Result<()> {
        if self.indicators.is_empty() {
            return Err(MacroError::Config("no indicators configured".into()));
        }
        if self.entities.is_empty() {
            return Err(MacroError::Config("no entities configured".into()));
        }
        if self.rolling_window == 0 {
            return Err(MacroError::Config("rolling_window must be positive".into()));
        }
        if self.source.per_page == 0 {
            return Err(MacroError::Config("source.per_page must be positive".into()));
        }
        Ok(())
    }

    /// Serialize as TOML, the format `macrofeat config init` writes.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| MacroError::Config(format!("Failed to serialize config: {e}")))
    }
}

fn default_indicators() -> Vec<String> {
    [
        "BX.KLT.DINV.WD.GD.ZS",
        "MS.MIL.XPND.GD.ZS",
        "NY.GDP.MKTP.CD",
        "NE.EXP.GNFS.ZS",
        "NE.IMP.GNFS.ZS",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_entities() -> Vec<String> {
    ["US", "CA", "MX", "JP"].iter().map(|s| s.to_string()).collect()
}

fn default_date_start() -> String {
    "2010".to_string()
}

fn default_date_end() -> String {
    "2023".to_string()
}

fn default_rolling_window() -> usize {
    3
}

fn default_feature_set() -> Vec<String> {
    ["changepct", "changeraw", "rollingmean", "log", "zscore", "lag1", "lag2"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_time_unit() -> String {
    "YE".to_string()
}

/// Where pipeline artifacts are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_features_csv")]
    pub features_csv: PathBuf,
    #[serde(default = "default_plots_dir")]
    pub plots_dir: PathBuf,
    /// Directory for per-indicator raw dumps (`raw_{indicator}.csv`).
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    #[serde(default = "default_merged_csv")]
    pub merged_csv: PathBuf,
    /// Write raw and merged CSVs during download.
    #[serde(default)]
    pub save_raw: bool,
    #[serde(default = "default_true")]
    pub save_features: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            features_csv: default_features_csv(),
            plots_dir: default_plots_dir(),
            raw_dir: default_raw_dir(),
            merged_csv: default_merged_csv(),
            save_raw: false,
            save_features: true,
        }
    }
}

impl OutputConfig {
    /// Resolve every relative path against `base`.
    pub fn rooted_at(&self, base: &Path) -> Self {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };
        Self {
            features_csv: join(&self.features_csv),
            plots_dir: join(&self.plots_dir),
            raw_dir: join(&self.raw_dir),
            merged_csv: join(&self.merged_csv),
            ..self.clone()
        }
    }

    pub fn raw_csv(&self, indicator: &str) -> PathBuf {
        self.raw_dir.join(format!("raw_{indicator}.csv"))
    }
}

fn default_features_csv() -> PathBuf {
    PathBuf::from("data/features/wb_feat.csv")
}

fn default_plots_dir() -> PathBuf {
    PathBuf::from("reports/viz")
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_merged_csv() -> PathBuf {
    PathBuf::from("data/clean/merged_wb.csv")
}

fn default_true() -> bool {
    true
}

/// World Bank API client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            per_page: default_per_page(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    WORLD_BANK_API_BASE.to_string()
}

fn default_per_page() -> u32 {
    30000
}

fn default_timeout_secs() -> u64 {
    60
}

/// Columns and labels for the three plots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotsConfig {
    #[serde(default = "default_histogram_label")]
    pub histogram_label: String,
    #[serde(default = "default_histogram_title")]
    pub histogram_title: String,
    /// Horizontal axis of the scatter, left axis of the time series.
    #[serde(default = "default_plot_x")]
    pub x: ColumnRef,
    /// Vertical axis of the scatter, right axis of the time series.
    #[serde(default = "default_plot_y")]
    pub y: ColumnRef,
    #[serde(default = "default_plot_labels")]
    pub labels: PlotLabels,
    #[serde(default = "default_plot_x")]
    pub histogram: ColumnRef,
}

impl Default for PlotsConfig {
    fn default() -> Self {
        Self {
            histogram_label: default_histogram_label(),
            histogram_title: default_histogram_title(),
            x: default_plot_x(),
            y: default_plot_y(),
            labels: default_plot_labels(),
            histogram: default_plot_x(),
        }
    }
}

fn default_plot_x() -> ColumnRef {
    ColumnRef::new("NY.GDP.MKTP.CD", "chpct1YE")
}

fn default_plot_y() -> ColumnRef {
    ColumnRef::new("NE.EXP.GNFS.ZS", "chpct1YE")
}

fn default_plot_labels() -> PlotLabels {
    PlotLabels::new("GDP Growth", "Export Growth", "")
}

fn default_histogram_label() -> String {
    "GDP Growth".to_string()
}

fn default_histogram_title() -> String {
    "Histogram of GDP Growth".to_string()
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "macrofeat", "macrofeat")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_CONFIG_DIR).join(CONFIG_FILE)
}

/// Load configuration with layered merging.
///
/// Priority (highest first):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `MACROFEAT_`)
/// 3. An explicit config file (`--config`)
/// 4. Workspace-local config (`.macrofeat/config.toml`)
/// 5. User config (`~/.config/macrofeat/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit_file: Option<&Path>,
    overrides: Option<&PipelineConfig>,
) -> std::result::Result<PipelineConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(PipelineConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(file) = explicit_file {
        figment = figment.merge(Toml::file(file));
    }

    // MACROFEAT_ROLLING_WINDOW, MACROFEAT_SOURCE__TIMEOUT_SECS, ...
    figment = figment.merge(Env::prefixed("MACROFEAT_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// Write `config` to `<workspace>/.macrofeat/config.toml`.
///
/// An existing file is left untouched unless `force` is set.
pub fn write_workspace_config(
    workspace: &Path,
    config: &PipelineConfig,
    force: bool,
) -> Result<PathBuf> {
    let path = workspace_config_path(workspace);
    if path.exists() && !force {
        return Err(MacroError::Config(format!(
            "{} already exists",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, config.to_toml_string()?)?;
    Ok(path)
}
