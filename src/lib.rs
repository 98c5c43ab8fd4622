pub mod archive;
pub mod cdx;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod external_sort;
pub mod pipeline;
pub mod sink;
pub mod utils;

pub use cdx::{CdxFormat, Record};
pub use config::SiftConfig;
pub use error::{BatchError, ParseError, SinkError, SortError, UsageError};
pub use external_sort::{PolyphaseMergeSort, SortConfig, SortStats};
pub use pipeline::{BatchProcessor, BatchReport, InputKind};
pub use sink::CdxSink;
