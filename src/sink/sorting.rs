use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::cdx::{CdxFormat, Record};
use crate::error::{SinkError, SortError};
use crate::external_sort::{ClosableQueue, PolyphaseMergeSort, SortConfig, SortStats};
use crate::sink::{write_header, BoxedWriter, SinkSummary};

type SortTask = JoinHandle<Result<(SortStats, BoxedWriter), SortError>>;

/// Queues serialized lines for one background polyphase sort that owns the destination.
pub struct SortingSink {
    queue: Arc<ClosableQueue<String>>,
    task: Option<SortTask>,
    format: CdxFormat,
    records: AtomicU64,
}

impl SortingSink {
    pub fn new(mut writer: BoxedWriter, format: CdxFormat, config: &SortConfig) -> Result<Self, SinkError> {
        write_header(&mut writer, format)?;

        let queue = Arc::new(ClosableQueue::new(config.queue_capacity));
        let sorter = PolyphaseMergeSort::new(config);
        let buffer_size = config.io_buffer_size_bytes();
        let consumer = queue.clone();

        let task = tokio::task::spawn_blocking(move || -> Result<(SortStats, BoxedWriter), SortError> {
            let mut source = &*consumer;
            let mut output = BufWriter::with_capacity(buffer_size, writer);
            let stats = sorter.sort(&mut source, &mut output)?;
            let writer = output.into_inner().map_err(|e| SortError::Output(e.into_error()))?;
            Ok((stats, writer))
        });

        debug!(
            "Started sort task with {} scratch files, heap of {} lines, queue of {}",
            config.scratch_files,
            config.heap_size,
            queue.capacity()
        );

        Ok(Self {
            queue,
            task: Some(task),
            format,
            records: AtomicU64::new(0),
        })
    }

    pub fn format(&self) -> CdxFormat {
        self.format
    }

    pub fn records_written(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    /// Fails with [`SinkError::Closed`] once the sort task has given up.
    pub fn write(&self, record: &Record) -> Result<(), SinkError> {
        let line = self.format.format(record)?;
        self.queue.push(line).map_err(|_| SinkError::Closed)?;
        self.records.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub async fn close(mut self) -> Result<SinkSummary, SinkError> {
        self.queue.close();

        let task = self.task.take().ok_or(SinkError::Closed)?;
        let (stats, mut writer) = match task.await {
            Ok(Ok(finished)) => finished,
            Ok(Err(e)) => {
                error!("Sort failed: {}", e);
                return Err(SinkError::Sort(e));
            }
            Err(e) => return Err(SinkError::TaskFailed(e.to_string())),
        };

        writer.flush()?;
        Ok(SinkSummary {
            records: self.records.load(Ordering::Relaxed),
            sort: Some(stats),
        })
    }
}

impl Drop for SortingSink {
    fn drop(&mut self) {
        // Lets the sort task finish if the sink is dropped without close.
        self.queue.close();
    }
}
