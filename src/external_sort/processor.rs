use rayon::prelude::*;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, warn};

use crate::constants::*;
use crate::error::SortError;
use crate::external_sort::key::compare_lines;
use crate::external_sort::queue::LineSource;
use crate::external_sort::schedule::{MergeStep, PolyphaseSchedule};
use crate::external_sort::scratch::ScratchFile;
use crate::external_sort::{SortConfig, SortStats};

/// Polyphase merge sort over `F` scratch files holding at most `heap_size` lines in memory.
pub struct PolyphaseMergeSort {
    scratch_files: usize,
    heap_size: usize,
    io_buffer_size: usize,
    temp_directory: PathBuf,
}

#[derive(Debug)]
struct MergeEntry {
    line: String,
    source: usize,
}

impl PartialEq for MergeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeEntry {}

impl PartialOrd for MergeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_lines(&self.line, &other.line).then(self.source.cmp(&other.source))
    }
}

impl PolyphaseMergeSort {
    pub fn new(config: &SortConfig) -> Self {
        let scratch_files = if config.scratch_files < MIN_SCRATCH_FILES {
            warn!(
                "{} scratch files cannot merge, using {} instead",
                config.scratch_files, MIN_SCRATCH_FILES
            );
            MIN_SCRATCH_FILES
        } else {
            config.scratch_files
        };

        let heap_size = if config.heap_size < MIN_HEAP_SIZE {
            warn!("Heap size {} is too small, using {}", config.heap_size, MIN_HEAP_SIZE);
            MIN_HEAP_SIZE
        } else {
            config.heap_size
        };

        Self {
            scratch_files,
            heap_size,
            io_buffer_size: config.io_buffer_size_bytes().max(BYTES_PER_KB),
            temp_directory: config.temp_directory.clone(),
        }
    }

    pub fn scratch_files(&self) -> usize {
        self.scratch_files
    }

    pub fn heap_size(&self) -> usize {
        self.heap_size
    }

    /// Pulls every line from `source` and writes them to `output` ordered by sort key.
    ///
    /// On failure the source is aborted so that anything blocked on feeding it is released.
    pub fn sort<S, W>(&self, source: &mut S, output: &mut W) -> Result<SortStats, SortError>
    where
        S: LineSource,
        W: Write,
    {
        let result = self.run(source, output);
        if result.is_err() {
            source.abort();
        }
        result
    }

    fn run<S, W>(&self, source: &mut S, output: &mut W) -> Result<SortStats, SortError>
    where
        S: LineSource,
        W: Write,
    {
        let start_time = Instant::now();
        let mut files = (0..self.scratch_files)
            .map(|_| ScratchFile::create_in(&self.temp_directory, self.io_buffer_size))
            .collect::<Result<Vec<_>, _>>()?;
        let mut schedule = PolyphaseSchedule::new(self.scratch_files);
        let mut stats = SortStats::default();

        self.distribute(source, &mut files, &mut schedule, &mut stats)?;
        let distributed_at = Instant::now();

        schedule.begin_merge();
        stats.runs = schedule.real_runs();
        stats.dummy_runs = schedule.dummy_runs();
        stats.levels = schedule.level();
        debug!(
            "Distributed {} lines into {} runs plus {} dummy runs over {} scratch files (level {})",
            stats.lines, stats.runs, stats.dummy_runs, self.scratch_files, stats.levels
        );

        let first_output = self.scratch_files - 1;
        for (index, file) in files.iter_mut().enumerate() {
            if index != first_output {
                file.start_reading()?;
            }
        }

        loop {
            match schedule.next_merge_step() {
                MergeStep::Merge {
                    inputs,
                    run_lines,
                    output: target,
                } => merge_runs(&mut files, &inputs, &run_lines, target)?,
                MergeStep::Rotate { new_output, rewind } => {
                    debug!(
                        "Merge phase {} done, scratch file {} becomes the output",
                        schedule.phases(),
                        new_output
                    );
                    files[rewind].start_reading()?;
                    files[new_output].start_writing()?;
                }
                MergeStep::Finished { file, lines } => {
                    if let Some(index) = file {
                        copy_run(&mut files[index], lines, output)?;
                    }
                    break;
                }
            }
        }

        output.flush().map_err(SortError::Output)?;

        stats.merge_phases = schedule.phases();
        stats.scratch_bytes_written = files.iter().map(ScratchFile::bytes_written).sum();
        stats.distribution_time_ms = distributed_at.duration_since(start_time).as_millis() as u64;
        stats.merge_time_ms = distributed_at.elapsed().as_millis() as u64;
        debug!(
            "Sorted {} lines in {} merge phases, {} bytes through scratch files",
            stats.lines, stats.merge_phases, stats.scratch_bytes_written
        );

        Ok(stats)
    }

    fn distribute<S: LineSource>(
        &self,
        source: &mut S,
        files: &mut [ScratchFile],
        schedule: &mut PolyphaseSchedule,
        stats: &mut SortStats,
    ) -> Result<(), SortError> {
        let mut run: Vec<String> = Vec::with_capacity(self.heap_size);

        loop {
            let exhausted = fill_run(source, &mut run, self.heap_size)?;

            if !run.is_empty() {
                if run.len() >= PARALLEL_SORT_THRESHOLD {
                    run.par_sort_by(|a, b| compare_lines(a, b));
                } else {
                    run.sort_by(|a, b| compare_lines(a, b));
                }

                let lines = run.len() as u64;
                let target = schedule.next_target();
                for line in run.drain(..) {
                    files[target].write_line(&line)?;
                }
                schedule.record_run(target, lines);

                stats.lines += lines;
                stats.max_run_lines = stats.max_run_lines.max(lines as usize);
            }

            if exhausted {
                return Ok(());
            }
        }
    }
}

/// Fills `run` up to `limit` lines. Returns `true` once the source is drained.
fn fill_run<S: LineSource>(source: &mut S, run: &mut Vec<String>, limit: usize) -> Result<bool, SortError> {
    while run.len() < limit {
        match source.next_line()? {
            Some(line) => {
                if line.contains('\n') {
                    return Err(SortError::EmbeddedNewline(line));
                }
                run.push(line);
            }
            None => return Ok(true),
        }
    }
    Ok(false)
}

fn merge_runs(
    files: &mut [ScratchFile],
    inputs: &[usize],
    run_lines: &[u64],
    output: usize,
) -> Result<(), SortError> {
    let mut remaining = run_lines.to_vec();
    let mut heap = BinaryHeap::with_capacity(inputs.len());

    for (source, &file) in inputs.iter().enumerate() {
        if remaining[source] > 0 {
            let line = files[file].read_expected_line()?;
            remaining[source] -= 1;
            heap.push(Reverse(MergeEntry { line, source }));
        }
    }

    while let Some(Reverse(entry)) = heap.pop() {
        files[output].write_line(&entry.line)?;

        let source = entry.source;
        if remaining[source] > 0 {
            let line = files[inputs[source]].read_expected_line()?;
            remaining[source] -= 1;
            heap.push(Reverse(MergeEntry { line, source }));
        }
    }

    Ok(())
}

fn copy_run<W: Write>(file: &mut ScratchFile, lines: u64, output: &mut W) -> Result<(), SortError> {
    if !file.is_reading() {
        file.start_reading()?;
    }

    let mut line = String::new();
    for _ in 0..lines {
        if !file.read_line(&mut line)? {
            return Err(SortError::Scratch(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "scratch file ended inside the final run",
            )));
        }
        output.write_all(line.as_bytes()).map_err(SortError::Output)?;
        output.write_all(b"\n").map_err(SortError::Output)?;
    }
    Ok(())
}
