pub const BYTES_PER_KB: usize = 1024;
pub const BYTES_PER_GB: f64 = 1_073_741_824.0;

// External sort tuning
pub const DEFAULT_SCRATCH_FILES: usize = 10;
pub const DEFAULT_HEAP_SIZE: usize = 100;
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;
pub const DEFAULT_IO_BUFFER_SIZE_KB: usize = 64;

pub const MIN_SCRATCH_FILES: usize = 3;
pub const MAX_SCRATCH_FILES: usize = 64;
pub const MIN_HEAP_SIZE: usize = 1;
pub const MAX_HEAP_SIZE: usize = 10_000_000;
pub const MIN_QUEUE_CAPACITY: usize = 1;
pub const MIN_IO_BUFFER_SIZE_KB: usize = 4;

/// Runs at least this long are sorted with rayon.
pub const PARALLEL_SORT_THRESHOLD: usize = 8192;
pub const ESTIMATED_LINE_SIZE_BYTES: usize = 256;

// Worker pool
pub const DEFAULT_MAX_PARALLELISM: usize = 16;
pub const MIN_MAX_PARALLELISM: usize = 1;
pub const MAX_MAX_PARALLELISM: usize = 256;
pub const DEFAULT_BATCH_TIMEOUT_SECS: u64 = 5 * 60 * 60;

// Archive reading
pub const ARCHIVE_READ_BUFFER_SIZE: usize = 512 * BYTES_PER_KB;
pub const MAX_RECORD_HEADER_SIZE: usize = 8192;
pub const MAX_PAYLOAD_HEADER_SIZE: usize = 32768;
pub const FORMAT_SNIFF_BYTES: usize = 16;

// Output
pub const CONCATENATED_OUTPUT_STEM: &str = "out";
pub const STAGED_OUTPUT_PREFIX: &str = ".cdx-sift-";
pub const STAGED_OUTPUT_SUFFIX: &str = ".partial";

pub const DEFAULT_VERBOSITY: &str = "normal";
