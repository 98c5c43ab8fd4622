pub mod config;
pub mod key;
pub mod processor;
pub mod queue;
pub mod schedule;
pub mod scratch;


pub use config::SortConfig;
pub use processor::PolyphaseMergeSort;
pub use queue::{ClosableQueue, IterSource, LineSource, QueueClosed};
pub use schedule::{MergeStep, PolyphaseSchedule};

use std::io::Write;

use crate::error::SortError;

#[derive(Debug, Clone, Default)]
pub struct SortStats {
    pub lines: u64,
    pub runs: u64,
    pub dummy_runs: u64,
    /// Longest run built in memory, never more than the heap size.
    pub max_run_lines: usize,
    pub merge_phases: usize,
    pub levels: u32,
    pub scratch_bytes_written: u64,
    pub distribution_time_ms: u64,
    pub merge_time_ms: u64,
}

/// Sorts an in-memory sequence of lines into `output`.
pub fn sort_lines<I, W>(lines: I, output: &mut W, config: &SortConfig) -> Result<SortStats, SortError>
where
    I: IntoIterator<Item = String>,
    W: Write,
{
    let sorter = PolyphaseMergeSort::new(config);
    sorter.sort(&mut IterSource(lines.into_iter()), output)
}
