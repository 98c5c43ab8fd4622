use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Number of scratch files `F`, including the idle merge target.
    pub scratch_files: usize,
    /// Lines held in memory per run.
    pub heap_size: usize,
    /// Serialized lines buffered between producers and the sort task.
    pub queue_capacity: usize,
    pub io_buffer_size_kb: usize,
    pub temp_directory: PathBuf,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            scratch_files: DEFAULT_SCRATCH_FILES,
            heap_size: DEFAULT_HEAP_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            io_buffer_size_kb: DEFAULT_IO_BUFFER_SIZE_KB,
            temp_directory: std::env::temp_dir(),
        }
    }
}

impl SortConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scratch_files < MIN_SCRATCH_FILES || self.scratch_files > MAX_SCRATCH_FILES {
            return Err(anyhow::anyhow!(
                "Scratch file count must be between {} and {}",
                MIN_SCRATCH_FILES, MAX_SCRATCH_FILES
            ));
        }

        if self.heap_size < MIN_HEAP_SIZE || self.heap_size > MAX_HEAP_SIZE {
            return Err(anyhow::anyhow!(
                "Heap size must be between {} and {} lines",
                MIN_HEAP_SIZE, MAX_HEAP_SIZE
            ));
        }

        if self.queue_capacity < MIN_QUEUE_CAPACITY {
            return Err(anyhow::anyhow!("Queue capacity must be at least {}", MIN_QUEUE_CAPACITY));
        }

        if self.io_buffer_size_kb < MIN_IO_BUFFER_SIZE_KB {
            return Err(anyhow::anyhow!(
                "I/O buffer size must be at least {} KB",
                MIN_IO_BUFFER_SIZE_KB
            ));
        }

        if !self.temp_directory.is_dir() {
            return Err(anyhow::anyhow!(
                "Scratch directory {} does not exist",
                self.temp_directory.display()
            ));
        }

        Ok(())
    }

    pub fn io_buffer_size_bytes(&self) -> usize {
        self.io_buffer_size_kb * BYTES_PER_KB
    }

    /// Rough peak memory of one sort: a full run plus the queue and the file buffers.
    pub fn estimated_memory_bytes(&self) -> usize {
        (self.heap_size + self.queue_capacity) * ESTIMATED_LINE_SIZE_BYTES
            + self.scratch_files * self.io_buffer_size_bytes()
    }

    /// Logs a warning when a sort would not fit into the currently available memory.
    pub fn check_available_memory(&self) -> bool {
        use sysinfo::System;
        let mut system = System::new();
        system.refresh_memory();

        let available = system.available_memory() as usize;
        let needed = self.estimated_memory_bytes();
        if available > 0 && needed > available {
            tracing::warn!(
                "Sort needs about {:.2} GB but only {:.2} GB of memory is available",
                needed as f64 / BYTES_PER_GB,
                available as f64 / BYTES_PER_GB
            );
            return false;
        }
        true
    }
}
