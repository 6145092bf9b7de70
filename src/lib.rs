pub mod commands;
pub mod models;
pub mod services;

use clap::Parser;
use commands::{collect_image_ids, PlateService};
use models::config::{AppConfig, LoggingConfig};
use services::config::{ConfigManager, InitOutcome};
use services::ocr_server::OcrServerManager;
use services::preview::PreviewRenderer;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub use models::detection::{Candidate, Detection, PlateKind, Point, RankedResult};
pub use services::ocr::{HttpOcrClient, RecognitionError, RecognitionSource};
pub use services::pipeline::RecognitionPipeline;
pub use services::plate_validator::{is_valid, PlateValidator};
pub use services::recognition_cache::RecognitionCache;

/// Read license plates from photos using a PaddleOCR server
#[derive(Parser, Debug)]
#[command(name = "plate-reader", version)]
pub struct Cli {
    /// Image files or directories of images
    #[arg(required_unless_present = "init_config")]
    pub images: Vec<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write highlighted, size-bounded previews into this directory
    #[arg(long)]
    pub preview_dir: Option<PathBuf>,

    /// Override the confidence threshold (exclusive)
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Start the configured OCR server binary if none is running
    #[arg(long)]
    pub start_server: bool,

    /// Print one JSON object per image instead of text
    #[arg(long)]
    pub json: bool,

    /// Write a default config file (if none exists) and exit
    #[arg(long)]
    pub init_config: bool,
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence
/// over the configured level.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, String> {
    let mut config = ConfigManager::locate(cli.config.as_deref())?.load()?;

    if let Some(threshold) = cli.min_confidence {
        config.pipeline.min_confidence = threshold;
        config.validate()?;
    }
    Ok(config)
}

fn init_config(cli: &Cli) -> Result<String, String> {
    let manager = ConfigManager::locate(cli.config.as_deref())?;
    let message = match manager.init_default()? {
        InitOutcome::Created => format!("Wrote default config to {}", manager.path().display()),
        InitOutcome::AlreadyExists => format!("Config already exists at {}", manager.path().display()),
    };
    Ok(message)
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if cli.init_config {
        return match init_config(&cli) {
            Ok(message) => {
                println!("{}", message);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Configuration error: {}", e);
                ExitCode::from(2)
            }
        };
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };
    init_logging(&config.logging);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(recognize_images(&cli, &config))
}

async fn recognize_images(cli: &Cli, config: &AppConfig) -> ExitCode {
    let image_ids = match collect_image_ids(&cli.images) {
        Ok(ids) => ids,
        Err(e) => {
            error!(error = %e, "Failed to collect images");
            return ExitCode::FAILURE;
        }
    };
    if image_ids.is_empty() {
        error!("No images to recognize");
        return ExitCode::FAILURE;
    }

    let mut server = None;
    if cli.start_server {
        let mut manager = OcrServerManager::new(&config.ocr.base_url, config.ocr.server_binary.as_deref());
        if let Err(e) = manager.start().await {
            error!(error = %e, "OCR server unavailable");
            return ExitCode::FAILURE;
        }
        server = Some(manager);
    } else if let Ok(client) = HttpOcrClient::new(&config.ocr) {
        if let Err(e) = client.health_check().await {
            warn!(error = %e, "OCR server did not answer the health check");
        }
    }

    let service = match PlateService::from_config(config) {
        Ok(service) => service,
        Err(e) => {
            error!(error = %e, "Failed to initialize plate service");
            return ExitCode::FAILURE;
        }
    };
    let service = match &cli.preview_dir {
        Some(dir) => service.with_preview(PreviewRenderer::new(config.preview.clone()), dir),
        None => service,
    };

    info!(images = image_ids.len(), "Recognizing plates");
    let reports = service.recognize_all(&image_ids).await;

    for report in &reports {
        if cli.json {
            println!("{}", report.to_json());
        } else {
            println!("{}", report);
        }
    }

    if let Some(mut manager) = server {
        manager.stop().await;
    }

    if reports.iter().any(|r| r.outcome.is_failure()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
