//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use anyhow::Context;
use macrofeat_core::config::{self, PipelineConfig};
use macrofeat_core::panel::io::{self, ReadOptions};
use macrofeat_core::pipeline::Pipeline;
use std::path::Path;

/// Handle a pipeline subcommand with a fully resolved config.
pub async fn handle_command(command: Commands, config: PipelineConfig) -> anyhow::Result<()> {
    match command {
        Commands::Run => run(config).await,
        Commands::Download => download(config).await,
        Commands::Features { input, output } => features(config, &input, output.as_deref()),
        Commands::Plot { input } => plot(config, &input),
        Commands::Config { .. } => anyhow::bail!("config commands are handled before loading"),
    }
}

pub fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    explicit_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init { force } => {
            let config_path = config::workspace_config_path(workspace);
            if config_path.exists() && !force {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            let path = config::write_workspace_config(workspace, &PipelineConfig::default(), force)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = config::load_config(Some(workspace), explicit_file, None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

async fn run(config: PipelineConfig) -> anyhow::Result<()> {
    let mut pipeline = Pipeline::new(config)?;
    let summary = pipeline.run().await?;

    println!(
        "Pipeline complete: {} rows, {} raw columns, {} columns with features",
        summary.rows, summary.raw_columns, summary.feature_columns
    );
    if !summary.ignored_tags.is_empty() {
        println!("Skipped unknown feature tags: {}", summary.ignored_tags.join(", "));
    }
    if let Some(fit) = summary.fit {
        println!(
            "Regression: slope {:.4}, intercept {:.4}, {} (n = {})",
            fit.slope,
            fit.intercept,
            fit.label(),
            fit.n
        );
    }
    for file in &summary.files {
        println!("  wrote {}", file.display());
    }
    Ok(())
}

async fn download(config: PipelineConfig) -> anyhow::Result<()> {
    let merged_csv = config.output.merged_csv.clone();
    let save_raw = config.output.save_raw;
    let mut pipeline = Pipeline::new(config)?;
    let panel = pipeline.download().await?;

    // With --save-raw the pipeline already wrote the merged panel.
    if !save_raw {
        io::write_csv(panel, &merged_csv)
            .with_context(|| format!("writing {}", merged_csv.display()))?;
    }
    println!(
        "Downloaded {} rows x {} columns to {}",
        panel.row_count(),
        panel.width(),
        merged_csv.display()
    );
    Ok(())
}

fn features(
    mut config: PipelineConfig,
    input: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let panel = io::read_csv(input, &ReadOptions::default())
        .with_context(|| format!("reading {}", input.display()))?;
    if let Some(output) = output {
        config.output.features_csv = output.to_path_buf();
    }
    config.output.save_features = true;
    let features_csv = config.output.features_csv.clone();

    let mut pipeline = Pipeline::new(config)?;
    let out = pipeline.transform(Some(&panel))?;
    println!(
        "Generated {} feature columns for {} rows; wrote {}",
        out.width() - panel.width(),
        out.row_count(),
        features_csv.display()
    );
    Ok(())
}

fn plot(config: PipelineConfig, input: &Path) -> anyhow::Result<()> {
    let panel = io::read_csv(input, &ReadOptions::default())
        .with_context(|| format!("reading {}", input.display()))?;
    let mut pipeline = Pipeline::new(config)?;
    let summary = pipeline.visualize(&panel)?;
    println!("Regression {} (n = {})", summary.fit.label(), summary.fit.n);
    for file in &summary.files {
        println!("  wrote {}", file.display());
    }
    Ok(())
}
