//! midnam-server binary: HTTP service and offline document validation

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use midnam_server::{
    Cli, Command, Config, ConfigManager, DocumentValidator, Output, OutputFormat, VerbosityLevel,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse_args();

    let config = ConfigManager::load_config(&cli)
        .await
        .context("Failed to load configuration")?;

    midnam_server::logging::init(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    match cli.command() {
        Command::Serve => {
            midnam_server::start_server(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate {
            file,
            format,
            quiet,
        } => validate_file(&config, &file, format, quiet).await,
    }
}

async fn validate_file(
    config: &Config,
    file: &Path,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<ExitCode> {
    let xml = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    // Relative DTD references resolve next to the file being checked
    let validator = DocumentValidator::new(&config.validation, Some(file))?;
    let report = validator.validate(&xml)?;

    let verbosity = if quiet {
        VerbosityLevel::Quiet
    } else {
        VerbosityLevel::Normal
    };
    print!("{}", Output::new(format, verbosity).format_report(file, &report));

    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
