//! Runs one producer per input file against a single shared sink.


use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::archive;
use crate::cdx::{CdxReader, MergedRecords, Record};
use crate::config::WorkerConfig;
use crate::error::{BatchError, ParseError, ProducerError};
use crate::external_sort::SortStats;
use crate::sink::CdxSink;
use crate::utils::{format_bytes, format_duration, format_number};

pub type RecordIter = Box<dyn Iterator<Item = Result<Record, ParseError>> + Send>;

/// What the input files of a batch contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// ARC or WARC files, plain or gzipped.
    Archive,
    /// Existing CDX files to be reformatted.
    Cdx,
}

impl InputKind {
    pub fn open(&self, path: &Path) -> Result<RecordIter, ParseError> {
        match self {
            InputKind::Archive => Ok(Box::new(archive::open_records(path)?)),
            InputKind::Cdx => Ok(Box::new(CdxReader::open(path)?)),
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub files_processed: usize,
    pub files_failed: Vec<(PathBuf, String)>,
    pub records_written: u64,
    pub elapsed: Duration,
    pub sort: Option<SortStats>,
}

impl BatchReport {
    /// Adds the totals of another batch, keeping the first sort statistics seen.
    pub fn absorb(&mut self, other: BatchReport) {
        self.files_processed += other.files_processed;
        self.files_failed.extend(other.files_failed);
        self.records_written += other.records_written;
        self.elapsed += other.elapsed;
        if self.sort.is_none() {
            self.sort = other.sort;
        }
    }

    pub fn log_summary(&self) {
        info!(
            "Indexed {} records from {} files in {}",
            format_number(self.records_written),
            self.files_processed,
            format_duration(self.elapsed.as_secs_f64())
        );
        if let Some(sort) = &self.sort {
            info!(
                "Sorted {} lines in {} runs ({} dummy) over {} merge phases, {} of scratch written",
                format_number(sort.lines),
                sort.runs,
                sort.dummy_runs,
                sort.merge_phases,
                format_bytes(sort.scratch_bytes_written)
            );
        }
        for (path, reason) in &self.files_failed {
            warn!("Failed: '{}': {}", path.display(), reason);
        }
    }
}

/// Worker pool owned by a single batch.
pub struct BatchProcessor {
    max_parallelism: usize,
    timeout: Duration,
    kind: InputKind,
}

impl BatchProcessor {
    pub fn new(max_parallelism: usize, timeout: Duration, kind: InputKind) -> Self {
        Self {
            max_parallelism: max_parallelism.max(1),
            timeout,
            kind,
        }
    }

    pub fn from_config(config: &WorkerConfig, kind: InputKind) -> Self {
        Self::new(config.max_parallelism, config.batch_timeout(), kind)
    }

    /// Feeds every input into `sink`, then closes it.
    ///
    /// A failing input only fails itself. A failing sink stops the batch, and its close
    /// error is what gets reported.
    pub async fn run(&self, inputs: &[PathBuf], sink: CdxSink) -> Result<BatchReport, BatchError> {
        let start_time = Instant::now();
        let sink = Arc::new(sink);
        let stop = Arc::new(AtomicBool::new(false));
        let mut report = BatchReport::default();
        let mut tasks = JoinSet::new();

        let drive = self.drive(inputs, &sink, &stop, &mut tasks, &mut report);
        if tokio::time::timeout(self.timeout, drive).await.is_err() {
            stop.store(true, Ordering::Relaxed);
            tasks.abort_all();
            return Err(self.timed_out());
        }

        self.finish(sink, inputs, report, start_time).await
    }

    /// Like [`BatchProcessor::run`], but reads every input on one worker and interleaves
    /// their records by sort key, so inputs that are each sorted give sorted output.
    pub async fn run_merged(&self, inputs: &[PathBuf], sink: CdxSink) -> Result<BatchReport, BatchError> {
        let start_time = Instant::now();
        let sink = Arc::new(sink);
        let stop = Arc::new(AtomicBool::new(false));
        let mut report = BatchReport::default();
        debug!("Merging {} files on one worker", inputs.len());

        let kind = self.kind;
        let paths = inputs.to_vec();
        let task_sink = sink.clone();
        let task_stop = stop.clone();
        let mut task = tokio::task::spawn_blocking(move || merge_into(kind, &paths, &task_sink, &task_stop));

        match tokio::time::timeout(self.timeout, &mut task).await {
            Err(_) => {
                stop.store(true, Ordering::Relaxed);
                task.abort();
                return Err(self.timed_out());
            }
            Ok(Ok(outcomes)) => {
                for outcome in outcomes {
                    record_outcome(Ok(outcome), &mut report);
                }
            }
            Ok(Err(e)) => {
                for path in inputs {
                    report.files_failed.push((path.clone(), e.to_string()));
                }
                error!("{}", ProducerError::Panicked(e.to_string()));
            }
        }

        self.finish(sink, inputs, report, start_time).await
    }

    fn timed_out(&self) -> BatchError {
        error!("Batch did not finish within {}", format_duration(self.timeout.as_secs_f64()));
        BatchError::Timeout(self.timeout)
    }

    async fn finish(
        &self,
        sink: Arc<CdxSink>,
        inputs: &[PathBuf],
        mut report: BatchReport,
        start_time: Instant,
    ) -> Result<BatchReport, BatchError> {
        let sink = Arc::try_unwrap(sink).map_err(|_| BatchError::SinkStillShared)?;
        let summary = match sink.close().await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Closing output failed: {}", e);
                return Err(e.into());
            }
        };

        report.records_written = summary.records;
        report.sort = summary.sort;
        report.elapsed = start_time.elapsed();

        if !inputs.is_empty() && report.files_failed.len() == inputs.len() {
            return Err(BatchError::AllInputsFailed(inputs.len()));
        }
        Ok(report)
    }

    async fn drive(
        &self,
        inputs: &[PathBuf],
        sink: &Arc<CdxSink>,
        stop: &Arc<AtomicBool>,
        tasks: &mut JoinSet<(PathBuf, Result<u64, ProducerError>)>,
        report: &mut BatchReport,
    ) {
        let parallelism = inputs.len().min(self.max_parallelism).max(1);
        let semaphore = Arc::new(Semaphore::new(parallelism));
        debug!("Scheduling {} files on {} workers", inputs.len(), parallelism);

        for (scheduled, path) in inputs.iter().enumerate() {
            if stop.load(Ordering::Relaxed) {
                warn!(
                    "Output failed, not scheduling the remaining {} files",
                    inputs.len() - scheduled
                );
                break;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let path = path.clone();
            let sink = sink.clone();
            let stop = stop.clone();
            let kind = self.kind;

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = produce(kind, &path, &sink, &stop);
                if let Err(ProducerError::Sink(e)) = &result {
                    if e.is_fatal() {
                        stop.store(true, Ordering::Relaxed);
                    }
                }
                (path, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            record_outcome(joined, report);
        }
    }
}

fn produce(kind: InputKind, path: &Path, sink: &CdxSink, stop: &AtomicBool) -> Result<u64, ProducerError> {
    info!("Processing file: '{}'", path.display());
    let mut written = 0;
    for record in kind.open(path)? {
        if stop.load(Ordering::Relaxed) {
            return Err(ProducerError::Cancelled);
        }
        sink.write(&record?)?;
        written += 1;
    }
    Ok(written)
}

/// Writes the merged records of `paths` into `sink`, one outcome per path.
fn merge_into(
    kind: InputKind,
    paths: &[PathBuf],
    sink: &CdxSink,
    stop: &AtomicBool,
) -> Vec<(PathBuf, Result<u64, ProducerError>)> {
    let mut written = vec![0u64; paths.len()];
    let mut failures: Vec<Option<ProducerError>> = paths.iter().map(|_| None).collect();

    let sources = paths.iter().enumerate().map(|(index, path)| {
        info!("Processing file: '{}'", path.display());
        match kind.open(path) {
            Ok(records) => records,
            Err(e) => {
                failures[index] = Some(e.into());
                Box::new(std::iter::empty()) as RecordIter
            }
        }
    });
    let mut merged = MergedRecords::new(sources.collect::<Vec<_>>());

    while let Some((source, record)) = merged.next() {
        if stop.load(Ordering::Relaxed) {
            failures[source].get_or_insert(ProducerError::Cancelled);
            break;
        }
        let written_to_sink = record.map_err(ProducerError::from).and_then(|record| {
            sink.write(&record)?;
            Ok(())
        });
        match written_to_sink {
            Ok(()) => written[source] += 1,
            Err(e) => {
                let fatal = matches!(&e, ProducerError::Sink(sink_error) if sink_error.is_fatal());
                merged.close_source(source);
                failures[source] = Some(e);
                if fatal {
                    warn!("Output failed, stopping the merge");
                    break;
                }
            }
        }
    }

    paths
        .iter()
        .cloned()
        .zip(failures.into_iter().zip(written))
        .map(|(path, (failure, records))| match failure {
            Some(e) => (path, Err(e)),
            None => (path, Ok(records)),
        })
        .collect()
}

fn record_outcome(
    joined: Result<(PathBuf, Result<u64, ProducerError>), tokio::task::JoinError>,
    report: &mut BatchReport,
) {
    match joined {
        Ok((path, Ok(records))) => {
            debug!("Finished '{}' with {} records", path.display(), records);
            report.files_processed += 1;
        }
        Ok((path, Err(e))) => {
            warn!("Failed to index '{}': {}", path.display(), e);
            report.files_failed.push((path, e.to_string()));
        }
        Err(e) => {
            let failure = ProducerError::Panicked(e.to_string());
            warn!("{}", failure);
            report.files_failed.push((PathBuf::new(), failure.to_string()));
        }
    }
}
