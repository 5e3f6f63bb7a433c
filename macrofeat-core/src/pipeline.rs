//! The download -> transform -> visualize pipeline.

use crate::config::PipelineConfig;
use crate::error::{MacroError, Result};
use crate::features::FeatureGenerator;
use crate::panel::{Panel, io};
use crate::source::{IndicatorSource, WorldBankSource, merge_all, pivot};
use crate::viz::{OlsFit, Plotter};
use serde::Serialize;
use std::path::PathBuf;

/// What a full run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub rows: usize,
    /// Columns of the merged panel.
    pub raw_columns: usize,
    /// Columns after feature generation.
    pub feature_columns: usize,
    /// Feature tags that were skipped as unknown.
    pub ignored_tags: Vec<String>,
    /// Every file written, in write order.
    pub files: Vec<PathBuf>,
    pub fit: Option<OlsFit>,
}

/// Files written by the visualization step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSummary {
    pub files: Vec<PathBuf>,
    pub fit: OlsFit,
}

/// Runs the stages against one config, keeping each stage's output.
pub struct Pipeline {
    config: PipelineConfig,
    source: Box<dyn IndicatorSource>,
    raw_data: Option<Panel>,
    feature_data: Option<Panel>,
    ignored_tags: Vec<String>,
    written: Vec<PathBuf>,
}

impl Pipeline {
    /// Pipeline backed by the World Bank API.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let source = WorldBankSource::new(&config.source)?;
        Ok(Self::with_source(config, Box::new(source)))
    }

    /// Pipeline backed by any indicator source.
    pub fn with_source(config: PipelineConfig, source: Box<dyn IndicatorSource>) -> Self {
        Self {
            config,
            source,
            raw_data: None,
            feature_data: None,
            ignored_tags: Vec::new(),
            written: Vec::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn raw_data(&self) -> Option<&Panel> {
        self.raw_data.as_ref()
    }

    pub fn feature_data(&self) -> Option<&Panel> {
        self.feature_data.as_ref()
    }

    /// Unknown feature tags skipped by the last transform.
    pub fn ignored_tags(&self) -> &[String] {
        &self.ignored_tags
    }

    /// Files written so far, in write order.
    pub fn written_files(&self) -> &[PathBuf] {
        &self.written
    }

    /// Step 1: fetch every indicator, pivot, and outer-merge on (country, date).
    pub async fn download(&mut self) -> Result<&Panel> {
        tracing::info!(
            source = %self.source.describe(),
            indicators = self.config.indicators.len(),
            "Step 1: Download"
        );
        let range = self.config.date_range();
        let output = &self.config.output;

        let mut panels = Vec::with_capacity(self.config.indicators.len());
        for indicator in &self.config.indicators {
            let table = self
                .source
                .fetch(indicator, &self.config.entities, &range)
                .await?;
            tracing::info!(indicator = %indicator, observations = table.len(), "Downloaded indicator");

            if output.save_raw {
                let path = output.raw_csv(indicator);
                io::write_csv(&table.to_panel()?, &path)?;
                tracing::info!(path = %path.display(), "Saved raw data");
                self.written.push(path);
            }
            panels.push(pivot(&table)?);
        }

        let merged = merge_all(panels)?;
        tracing::info!(
            rows = merged.row_count(),
            columns = merged.width(),
            "Merged indicators"
        );
        if output.save_raw {
            io::write_csv(&merged, &output.merged_csv)?;
            tracing::info!(path = %output.merged_csv.display(), "Saved merged data");
            self.written.push(output.merged_csv.clone());
        }

        Ok(&*self.raw_data.insert(merged))
    }

    /// Step 2: append features to `input`, or to the downloaded panel.
    pub fn transform(&mut self, input: Option<&Panel>) -> Result<&Panel> {
        let input = match input {
            Some(panel) => panel,
            None => self.raw_data.as_ref().ok_or_else(|| {
                MacroError::invalid_input(
                    "raw data is not available; run download first or provide an input panel",
                )
            })?,
        };

        tracing::info!(rows = input.row_count(), "Step 2: Transform");
        let spec = self.config.feature_spec()?;
        self.ignored_tags = spec.ignored().to_vec();
        let generator = FeatureGenerator::from_spec(spec);
        let features = generator.transform(input)?;
        tracing::info!(
            added = features.width() - input.width(),
            "Generated feature columns"
        );

        let output = &self.config.output;
        if output.save_features {
            io::write_csv(&features, &output.features_csv)?;
            tracing::info!(path = %output.features_csv.display(), "Saved features");
            self.written.push(output.features_csv.clone());
        }

        Ok(&*self.feature_data.insert(features))
    }

    /// Step 3: timeseries, histogram, and scatter plots of `panel`.
    pub fn visualize(&mut self, panel: &Panel) -> Result<PlotSummary> {
        tracing::info!("Step 3: Visualization");
        let plots = &self.config.plots;
        let plotter = Plotter::new(&self.config.output.plots_dir)?;

        let timeseries = plotter.timeseries(panel, &plots.x, &plots.y, &plots.labels)?;
        let histogram = plotter.histogram(
            panel,
            &plots.histogram,
            &plots.histogram_label,
            &plots.histogram_title,
        )?;
        let scatter = plotter.scatter(panel, &plots.x, &plots.y, &plots.labels)?;
        tracing::info!(
            slope = scatter.fit.slope,
            r_squared = scatter.fit.r_squared,
            n = scatter.fit.n,
            "Regression fit"
        );

        let files = vec![timeseries, histogram, scatter.path];
        self.written.extend(files.iter().cloned());
        Ok(PlotSummary {
            files,
            fit: scatter.fit,
        })
    }

    /// Download, transform, and visualize in sequence.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let raw_columns = self.download().await?.width();
        self.transform(None)?;

        let features = self
            .feature_data
            .take()
            .ok_or_else(|| MacroError::invalid_input("feature generation produced no data"))?;
        let plots = self.visualize(&features);
        let (rows, feature_columns) = (features.row_count(), features.width());
        self.feature_data = Some(features);
        let plots = plots?;

        Ok(RunSummary {
            rows,
            raw_columns,
            feature_columns,
            ignored_tags: self.ignored_tags.clone(),
            files: self.written.clone(),
            fit: Some(plots.fit),
        })
    }
}
