//! docx-signer
//!
//! Usage:
//!   docx-signer [serve]                      Run the HTTP service
//!   docx-signer sign <DIR>... --image <PATH>  Sign documents in place

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docx_signer::batch::{process_folder, BatchConfig, BatchReport};
use docx_signer::storage::spawn_retention_sweeper;
use docx_signer::utils::init_logger;
use docx_signer::{config::Config, routes::create_router, AppState};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "docx-signer", version, about = "Insert a signature image into Word documents")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the upload/download HTTP service (default)
    Serve,
    /// Sign every .docx directly inside each directory, in place
    Sign {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
        /// Signature image (png, jpeg, gif, bmp or tiff)
        #[arg(long)]
        image: PathBuf,
        /// Text of the anchor paragraph
        #[arg(long)]
        marker: Option<String>,
        /// Target paragraph relative to the marker
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<i64>,
        /// Image width in inches
        #[arg(long)]
        width: Option<f64>,
        /// Image height in inches
        #[arg(long)]
        height: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let _log_guard = init_logger(&config.logging);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Sign {
            dirs,
            image,
            marker,
            offset,
            width,
            height,
        } => {
            let defaults = config.signing.batch_config();
            let batch = BatchConfig {
                marker: marker.unwrap_or(defaults.marker),
                offset: offset.unwrap_or(defaults.offset),
                width_in: width.unwrap_or(defaults.width_in),
                height_in: height.unwrap_or(defaults.height_in),
            };
            sign(&dirs, &image, &batch)
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Configuration loaded: {:?}", config.server);

    let storage = &config.storage;
    tokio::fs::create_dir_all(&storage.work_root)
        .await
        .with_context(|| format!("Failed to create {}", storage.work_root.display()))?;
    spawn_retention_sweeper(
        storage.work_root.clone(),
        storage.retention(),
        storage.sweep_interval(),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = create_router(AppState::new(config));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

fn sign(dirs: &[PathBuf], image: &std::path::Path, config: &BatchConfig) -> Result<()> {
    let mut report = BatchReport::default();
    for dir in dirs {
        let folder = process_folder(dir, image, config)
            .with_context(|| format!("Failed to sign documents in {}", dir.display()))?;
        report.merge(folder);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    if report.summary.failed > 0 {
        anyhow::bail!("{} document(s) failed", report.summary.failed);
    }
    Ok(())
}
