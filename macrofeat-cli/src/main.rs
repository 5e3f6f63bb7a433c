//! macrofeat CLI: download World Bank indicators, build features, render plots.
//!
//! With no subcommand the full pipeline runs.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// macrofeat: macroeconomic indicator features from the World Bank API
#[derive(Parser, Debug)]
#[command(name = "macrofeat", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (config lookup and relative output paths)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rolling window override
    #[arg(long)]
    window: Option<usize>,

    /// Also write raw per-indicator and merged CSVs
    #[arg(long)]
    save_raw: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Download, transform and visualize (the default)
    Run,
    /// Fetch every indicator and write the merged panel CSV
    Download,
    /// Generate features for an existing panel CSV
    Features {
        /// Panel CSV with `country` and `date` columns
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the features CSV (defaults to the configured path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render the plots for an existing features CSV
    Plot {
        /// Features CSV
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write the default configuration to `.macrofeat/config.toml`
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "macrofeat", "macrofeat")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "macrofeat.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    tracing::debug!(workspace = %workspace.display(), "Resolved workspace");

    let command = cli.command.unwrap_or(Commands::Run);
    if let Commands::Config { action } = command {
        return commands::handle_config(action, &workspace, cli.config.as_deref());
    }

    if let Some(path) = &cli.config {
        if !path.exists() {
            anyhow::bail!("Configuration file not found: {}", path.display());
        }
    }
    let mut config =
        macrofeat_core::config::load_config(Some(&workspace), cli.config.as_deref(), None)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if cli.config.is_none() && !macrofeat_core::config::config_exists(Some(&workspace)) {
        tracing::info!("No configuration file found; using defaults (see `macrofeat config init`)");
    }

    // Apply CLI overrides
    if let Some(window) = cli.window {
        config.rolling_window = window;
    }
    if cli.save_raw {
        config.output.save_raw = true;
    }
    config.output = config.output.rooted_at(&workspace);

    commands::handle_command(command, config).await
}
