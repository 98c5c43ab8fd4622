use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use crate::archive::ContainerFormat;

/// Logs go to stderr so that stdout can carry CDX output.
pub fn setup_logging(verbosity: &str) -> Result<()> {
    let level = match verbosity {
        "silent" => Level::ERROR,
        "normal" => Level::INFO,
        "verbose" => Level::DEBUG,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(format!("cdx_sift={}", level).parse()?);

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(verbosity == "verbose")
        .with_line_number(verbosity == "verbose")
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Expands directories among `inputs` into the archive files below them.
///
/// Plain file arguments are kept as given, in order, whatever their name.
pub fn expand_inputs<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            files.extend(discover_archive_files(input)?);
        } else {
            files.push(input.to_path_buf());
        }
    }
    Ok(files)
}

/// Archive files below `directory`, largest first so long files start early.
pub fn discover_archive_files<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
    let mut archive_files = Vec::new();

    for entry in WalkDir::new(directory).follow_links(false) {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && ContainerFormat::from_extension(path).is_some() {
            archive_files.push(path.to_path_buf());
        }
    }

    archive_files.sort_by_key(|path| std::fs::metadata(path).map(|m| m.len()).unwrap_or(0));
    archive_files.reverse();

    Ok(archive_files)
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

pub fn format_duration(seconds: f64) -> String {
    if seconds < 1.0 {
        format!("{}ms", (seconds * 1000.0).round() as u64)
    } else if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        format!("{:.1}m", seconds / 60.0)
    } else {
        format!("{:.1}h", seconds / 3600.0)
    }
}

pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(digit);
    }
    formatted
}
