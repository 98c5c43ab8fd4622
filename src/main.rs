use anyhow::Result;
use cdx_sift::commands::{extract::extract, reformat::reformat, IndexOptions};
use cdx_sift::config::SiftConfig;
use cdx_sift::error::{SortError, UsageError};
use cdx_sift::utils::{format_duration, setup_logging};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tracing::info;

#[derive(Parser)]
#[command(name = "cdx-sift")]
#[command(about = "Builds CDX indexes from ARC and WARC files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true, help = "Configuration file, created with defaults if missing")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Directory for temporary sort files")]
    workdir: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Verbose output")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Extract an index from ARC and WARC files
    Extract(IndexOptions),
    /// Convert existing CDX files into another format
    Reformat(IndexOptions),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Extract(_) => "extract",
            Command::Reformat(_) => "reformat",
        }
    }

    fn options(&self) -> &IndexOptions {
        match self {
            Command::Extract(options) | Command::Reformat(options) => options,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::from(1) } else { ExitCode::SUCCESS };
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let start_time = Instant::now();
    let mut config = load_config(cli.config.as_deref())?;

    let verbosity = if cli.verbose { "verbose" } else { config.logging.verbosity.as_str() };
    setup_logging(verbosity)?;

    if let Some(workdir) = &cli.workdir {
        if !workdir.is_dir() {
            return Err(UsageError(format!("Workdir '{}' does not exist", workdir.display())).into());
        }
        config.sort.temp_directory = workdir.clone();
    }

    cli.command.options().apply_to(&mut config);
    config.validate().map_err(|e| UsageError(e.to_string()))?;

    match &cli.command {
        Command::Extract(options) => extract(options, &config).await?,
        Command::Reformat(options) => reformat(options, &config).await?,
    };

    info!(
        "Command {} was executed in {}",
        cli.command.name(),
        format_duration(start_time.elapsed().as_secs_f64())
    );
    Ok(())
}

/// Reads the config file when there is one; a missing file is created with the defaults.
fn load_config(path: Option<&Path>) -> Result<SiftConfig> {
    let Some(path) = path else {
        return Ok(SiftConfig::default());
    };

    if path.exists() {
        SiftConfig::from_file(path).map_err(|e| UsageError(format!("{:#}", e)).into())
    } else {
        let config = SiftConfig::default();
        config.to_file(path)?;
        eprintln!("Wrote default configuration to {}", path.display());
        Ok(config)
    }
}

/// 1 for bad parameters, 2 for I/O failures, 3 for anything else.
fn exit_code(error: &anyhow::Error) -> u8 {
    if error.downcast_ref::<UsageError>().is_some() {
        return 1;
    }
    let io_failure = error
        .chain()
        .any(|cause| cause.is::<std::io::Error>() || cause.is::<SortError>());
    if io_failure {
        2
    } else {
        3
    }
}
