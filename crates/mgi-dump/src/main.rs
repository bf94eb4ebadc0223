//! MGI Dump - main entry point

use anyhow::{Context, Result};
use clap::Parser;
use mgi_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use mgi_dump::commands::{self, anatomy::AnatomyInputs};
use mgi_dump::{Cli, Commands, Config, Namespaces};
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .log_file_prefix("mgi-dump")
        .build();

    // Environment variables take precedence
    let log_config = log_config.with_env().unwrap_or_else(|e| {
        eprintln!("Warning: ignoring invalid logging environment: {}", e);
        LogConfig::builder().level(log_level).build()
    });

    // Logging is best effort; the tools work without it
    let _guard = init_logging(&log_config).ok();

    match execute(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        },
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load().context("Failed to load configuration")?;
    let Namespaces { internal, external } = &mut config.namespaces;
    if let Some(prefix) = &cli.internal_prefix {
        *internal = prefix.clone();
    }
    if let Some(prefix) = &cli.external_prefix {
        *external = prefix.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Run the selected command. `Ok(false)` means the command ran but found
/// problems.
fn execute(cli: &Cli) -> Result<bool> {
    let config = load_config(cli)?;

    match &cli.command {
        Commands::Remosh {
            base,
            mapping,
            names,
            output,
        } => {
            let report = commands::remosh::run(base, mapping, names, output, &config)
                .context("remosh failed")?;
            info!(leafified = report.leafified.len(), "Remap complete");
        },
        Commands::Medic { input, names, output } => {
            commands::medic::run(input, names, output, &config).context("medic failed")?;
        },
        Commands::OmimAdd { input, names, output } => {
            commands::omim_add::run(input, names, output, &config).context("omim-add failed")?;
        },
        Commands::FilterDo { input, output } => {
            commands::filter_do::run(input, output, &config).context("filter-do failed")?;
        },
        Commands::Anatomy {
            emap,
            ma,
            gxd,
            overrides,
            conceptus,
            output,
        } => {
            let inputs = AnatomyInputs {
                emap,
                ma,
                gxd,
                overrides: overrides.as_deref(),
                conceptus: conceptus.as_deref(),
            };
            commands::anatomy::run(inputs, output).context("anatomy merge failed")?;
        },
        Commands::Emapa { input, output } => {
            commands::emapa::run(input, output).context("emapa failed")?;
        },
        Commands::CheckIds { paths, report } => {
            let report = commands::check_ids::run(paths, report.as_deref()).context("check-ids failed")?;
            return Ok(report.is_clean());
        },
    }

    Ok(true)
}
