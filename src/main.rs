use anyhow::{Context, Result};
use doc_binarize::config::AppConfig;
use doc_binarize::errors::error_logging;
use doc_binarize::observability;
use doc_binarize::observability_config::ObservabilityConfig;
use doc_binarize::output;
use doc_binarize::sweep::ParameterSweepRunner;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const USAGE: &str = "Usage: binarize <source-image> [output-dir]";

/// Command-line inputs for one run
#[derive(Debug, PartialEq)]
struct Arguments {
    source: PathBuf,
    output_root: Option<PathBuf>,
}

/// Parse positional arguments (program name already stripped)
fn parse_arguments(args: &[String]) -> Result<Arguments> {
    match args {
        [flag] if flag == "-h" || flag == "--help" => Err(anyhow::anyhow!(USAGE)),
        [source] => Ok(Arguments {
            source: PathBuf::from(source),
            output_root: None,
        }),
        [source, output_root] => Ok(Arguments {
            source: PathBuf::from(source),
            output_root: Some(PathBuf::from(output_root)),
        }),
        _ => Err(anyhow::anyhow!(
            "Expected a source image and an optional output directory. {}",
            USAGE
        )),
    }
}

/// Validate the source path before decoding
fn validate_source(source: &Path) -> Result<()> {
    if !source.is_file() {
        return Err(anyhow::anyhow!(
            "Source image {} does not exist or is not a file",
            source.display()
        ));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let arguments = parse_arguments(&args)?;

    // Logging starts before the sweep grid is read so its messages are kept
    let observability_config = ObservabilityConfig::from_env();
    observability_config
        .validate()
        .map_err(|e| anyhow::anyhow!("Observability configuration invalid: {}", e))?;
    observability::init_tracing_with_config(&observability_config)?;

    let mut config = AppConfig::from_env().map_err(|e| {
        error_logging::log_config_error(&e, "app_config", "load");
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;
    if let Some(root) = arguments.output_root {
        config.output.root = root;
    }
    config.validate().map_err(|e| {
        error_logging::log_config_error(&e, "app_config", "validate");
        anyhow::anyhow!("Configuration validation failed: {}", e)
    })?;
    info!("{}", config.summary());

    validate_source(&arguments.source)?;
    let buffer = Arc::new(
        output::load_grayscale(&arguments.source)
            .with_context(|| format!("Failed to load {}", arguments.source.display()))?,
    );
    let dimensions = (buffer.width(), buffer.height());
    info!(
        source = %arguments.source.display(),
        width = dimensions.0,
        height = dimensions.1,
        "Source image loaded"
    );

    // Ctrl-C stops the sweep between combinations
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling sweep");
                cancel.cancel();
            }
        }
    });

    let total = config.sweep.entry_count();
    let runner = ParameterSweepRunner::new(config.sweep.clone()).with_progress(Arc::new(
        move |index: usize, label: &str| {
            info!(index, total, label, "Sweep entry finished");
        },
    ));
    let result = runner
        .run_parallel(Arc::clone(&buffer), config.execution.max_workers, cancel)
        .await
        .map_err(|e| {
            error_logging::log_binarization_error(&e, "sweep", None, Some(dimensions));
            observability::record_error_metrics("binarization", "sweep");
            e
        })?;

    let artifacts = output::write_sweep(&result, &config.output.root, config.output.format)?;
    if config.output.write_manifest {
        output::write_manifest(
            &config.output.root,
            &arguments.source,
            dimensions,
            &artifacts,
        )?;
    }

    info!(
        artifacts = artifacts.len(),
        output = %config.output.root.display(),
        "Binarization comparison finished"
    );
    Ok(())
}
