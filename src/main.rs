use anyhow::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use chapter_extractor::cli::{apply_matches, build_cli};
use chapter_extractor::{BatchProcessor, Config, RunOutcome};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = build_cli().get_matches();
    let verbose = matches.get_flag("verbose");

    // Initialize logging; RUST_LOG wins over the flag
    let level = if verbose {
        "debug".to_string()
    } else {
        std::env::var("CHAPTER_EXTRACTOR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chapter_extractor={},warn", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    apply_matches(&mut config, &matches);
    config.validate()?;
    debug!("{}", config.summary());

    info!("🚀 Chapter Extractor starting...");
    info!("📁 Input directory: {}", config.scan.input_dir.display());
    info!("📂 Output directory: {}", config.output.output_dir.display());

    let processor = BatchProcessor::new(config);
    let outcome = processor.run().await?;

    if let RunOutcome::Stopped(reason) = &outcome {
        error!("{}", reason);
    }

    Ok(ExitCode::from(outcome.exit_code()))
}
