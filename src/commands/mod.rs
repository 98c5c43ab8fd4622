//! The `extract` and `reformat` commands: output layout and sink setup around a batch.

pub mod extract;
pub mod reformat;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::cdx::CdxFormat;
use crate::config::SiftConfig;
use crate::constants::{CONCATENATED_OUTPUT_STEM, STAGED_OUTPUT_PREFIX, STAGED_OUTPUT_SUFFIX};
use crate::error::{BatchError, UsageError};
use crate::pipeline::{BatchProcessor, BatchReport, InputKind};
use crate::sink::{BoxedWriter, CdxSink};

/// Options shared by both commands.
#[derive(Debug, Clone, clap::Args)]
pub struct IndexOptions {
    #[arg(short, long, default_value = "cdxj", help = "One of cdxj, cdx9 or cdx11")]
    pub format: CdxFormat,

    #[arg(short, long, help = "Sort the output")]
    pub sort: bool,

    #[arg(short, long, help = "Concatenate output into one file")]
    pub concatenate: bool,

    #[arg(
        short = 't',
        long = "tempfiles",
        help = "Number of temporary files used for sorting [default: 10]"
    )]
    pub scratch_files: Option<usize>,

    #[arg(
        short = 'H',
        long = "heapsize",
        help = "Number of lines held in memory per sorted run [default: 100]"
    )]
    pub heap_size: Option<usize>,

    #[arg(
        short,
        long,
        required = true,
        num_args = 1..,
        value_delimiter = ',',
        help = "Input files, separated by comma or space, or repeated"
    )]
    pub input: Vec<PathBuf>,

    #[arg(
        short,
        long,
        help = "Destination. Standard out if not given. With -c a file or a directory \
                receiving out.<suffix>, otherwise a directory receiving one file per input"
    )]
    pub output: Option<PathBuf>,
}

impl IndexOptions {
    pub fn new(input: Vec<PathBuf>, format: CdxFormat) -> Self {
        Self {
            format,
            sort: false,
            concatenate: false,
            scratch_files: None,
            heap_size: None,
            input,
            output: None,
        }
    }

    /// Command line sort settings take precedence over the config file.
    pub fn apply_to(&self, config: &mut SiftConfig) {
        if let Some(scratch_files) = self.scratch_files {
            config.sort.scratch_files = scratch_files;
        }
        if let Some(heap_size) = self.heap_size {
            config.sort.heap_size = heap_size;
        }
    }
}

/// Where the output of a command goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPlan {
    Stdout,
    /// Every input goes into this one file.
    Single(PathBuf),
    /// `(input, output)` pairs, one output file per input.
    PerInput(Vec<(PathBuf, PathBuf)>),
}

impl OutputPlan {
    /// Resolves the output layout and refuses to overwrite anything, before any work begins.
    pub fn resolve(options: &IndexOptions, inputs: &[PathBuf]) -> Result<Self> {
        let suffix = options.format.file_suffix();
        let Some(output) = options.output.as_deref() else {
            return Ok(OutputPlan::Stdout);
        };

        if options.concatenate {
            let target = if output.is_dir() {
                output.join(format!("{}.{}", CONCATENATED_OUTPUT_STEM, suffix))
            } else {
                output.to_path_buf()
            };
            ensure_absent(&target)?;
            return Ok(OutputPlan::Single(target));
        }

        if !output.is_dir() {
            return Err(UsageError(format!("Output {} must be a directory", output.display())).into());
        }

        let mut seen = HashSet::new();
        let mut pairs = Vec::with_capacity(inputs.len());
        for input in inputs {
            let target = output.join(output_file_name(input, suffix));
            ensure_absent(&target)?;
            if !seen.insert(target.clone()) {
                return Err(UsageError(format!(
                    "{} would be written by more than one input",
                    target.display()
                ))
                .into());
            }
            pairs.push((input.clone(), target));
        }
        Ok(OutputPlan::PerInput(pairs))
    }
}

/// `dir/name.warc.gz` becomes `name.warc.<suffix>`; only the last extension is replaced.
pub fn output_file_name(input: &Path, suffix: &str) -> String {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match name.rfind('.') {
        Some(dot) => &name[..dot],
        None => name.as_str(),
    };
    format!("{}.{}", stem, suffix)
}

fn ensure_absent(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(UsageError(format!("{} already exists", path.display())).into());
    }
    Ok(())
}

/// An output file written under a hidden name beside its target.
///
/// The target only appears once [`StagedOutput::publish`] is called, so a batch that
/// fails or times out leaves nothing behind. Dropping it removes the staged file.
pub struct StagedOutput {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedOutput {
    pub fn create(target: &Path) -> Result<Self> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file = tempfile::Builder::new()
            .prefix(STAGED_OUTPUT_PREFIX)
            .suffix(STAGED_OUTPUT_SUFFIX)
            .tempfile_in(dir)
            .with_context(|| format!("Failed to create a staging file for {}", target.display()))?;
        debug!("Staging {} as {}", target.display(), file.path().display());
        Ok(Self {
            file,
            target: target.to_path_buf(),
        })
    }

    pub fn writer(&self) -> Result<BoxedWriter> {
        let file = self
            .file
            .as_file()
            .try_clone()
            .with_context(|| format!("Failed to open {}", self.file.path().display()))?;
        Ok(Box::new(file))
    }

    /// Moves the staged file to its target. Never replaces a file that appeared meanwhile.
    pub fn publish(self) -> Result<()> {
        self.file
            .persist_noclobber(&self.target)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to move output into {}", self.target.display()))?;
        Ok(())
    }
}

fn open_sink(writer: BoxedWriter, options: &IndexOptions, config: &SiftConfig) -> Result<CdxSink> {
    let sink = if options.sort {
        CdxSink::sorting(writer, options.format, &config.sort)?
    } else {
        CdxSink::direct(writer, options.format)?
    };
    Ok(sink)
}

/// Runs `inputs` through sinks laid out according to `options`.
pub async fn run_index(
    options: &IndexOptions,
    inputs: &[PathBuf],
    kind: InputKind,
    config: &SiftConfig,
) -> Result<BatchReport> {
    if options.sort {
        config.sort.check_available_memory();
    }

    let plan = OutputPlan::resolve(options, inputs)?;
    let report = match plan {
        OutputPlan::Stdout => {
            // Sequential, one file after the other.
            let batch = BatchProcessor::new(1, config.workers.batch_timeout(), kind);
            let sink = open_sink(Box::new(std::io::stdout()), options, config)?;
            run_batch(&batch, inputs, sink, options, kind).await?
        }
        OutputPlan::Single(target) => {
            info!("Number of input files: {}", inputs.len());
            info!("Writing into: {}", target.display());
            let batch = BatchProcessor::from_config(&config.workers, kind);
            let staged = StagedOutput::create(&target)?;
            let sink = open_sink(staged.writer()?, options, config)?;
            let report = run_batch(&batch, inputs, sink, options, kind).await?;
            staged.publish()?;
            report
        }
        OutputPlan::PerInput(pairs) => run_per_input(&pairs, options, kind, config).await?,
    };

    report.log_summary();
    Ok(report)
}

/// Existing CDX files are usually sorted already. Without `--sort`, several of them going
/// into one output are merged so that the output stays sorted.
async fn run_batch(
    batch: &BatchProcessor,
    inputs: &[PathBuf],
    sink: CdxSink,
    options: &IndexOptions,
    kind: InputKind,
) -> Result<BatchReport, BatchError> {
    if kind == InputKind::Cdx && inputs.len() > 1 && !options.sort {
        batch.run_merged(inputs, sink).await
    } else {
        batch.run(inputs, sink).await
    }
}

async fn run_per_input(
    pairs: &[(PathBuf, PathBuf)],
    options: &IndexOptions,
    kind: InputKind,
    config: &SiftConfig,
) -> Result<BatchReport> {
    let batch = BatchProcessor::new(1, config.workers.batch_timeout(), kind);
    let mut total = BatchReport::default();

    for (input, target) in pairs {
        info!("Indexing {} into {}", input.display(), target.display());
        let staged = StagedOutput::create(target)?;
        let sink = open_sink(staged.writer()?, options, config)?;

        match batch.run(std::slice::from_ref(input), sink).await {
            Ok(report) => {
                staged.publish()?;
                total.absorb(report);
            }
            Err(BatchError::AllInputsFailed(_)) => {
                warn!("No index written for {}", input.display());
                total.files_failed.push((input.clone(), "input could not be indexed".to_string()));
            }
            Err(e) => return Err(e.into()),
        }
    }

    if !pairs.is_empty() && total.files_failed.len() == pairs.len() {
        return Err(BatchError::AllInputsFailed(pairs.len()).into());
    }
    Ok(total)
}
