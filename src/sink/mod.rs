//! Destinations for serialized CDX records shared by concurrent producers.
//!
//! A sink is opened once, written to from any number of threads and closed exactly
//! once. [`CdxSink::close`] consumes the sink, so a second close cannot compile.

pub mod direct;
pub mod sorting;


pub use direct::DirectSink;
pub use sorting::SortingSink;

use std::io::Write;

use crate::cdx::{CdxFormat, Record};
use crate::error::SinkError;
use crate::external_sort::{SortConfig, SortStats};

pub type BoxedWriter = Box<dyn Write + Send>;

/// What a sink reports once everything has reached the destination.
#[derive(Debug, Clone, Default)]
pub struct SinkSummary {
    pub records: u64,
    /// Present for sorting sinks.
    pub sort: Option<SortStats>,
}

pub enum CdxSink {
    /// Writes each record as it arrives, in arrival order.
    Direct(DirectSink),
    /// Funnels records through the external sort; output is ordered once closed.
    Sorting(SortingSink),
}

impl CdxSink {
    pub fn direct(writer: BoxedWriter, format: CdxFormat) -> Result<Self, SinkError> {
        Ok(CdxSink::Direct(DirectSink::new(writer, format)?))
    }

    /// Starts the background sort task, so it has to be called inside a tokio runtime.
    pub fn sorting(writer: BoxedWriter, format: CdxFormat, config: &SortConfig) -> Result<Self, SinkError> {
        Ok(CdxSink::Sorting(SortingSink::new(writer, format, config)?))
    }

    pub fn format(&self) -> CdxFormat {
        match self {
            CdxSink::Direct(sink) => sink.format(),
            CdxSink::Sorting(sink) => sink.format(),
        }
    }

    pub fn is_sorting(&self) -> bool {
        matches!(self, CdxSink::Sorting(_))
    }

    /// Accepted records so far.
    pub fn records_written(&self) -> u64 {
        match self {
            CdxSink::Direct(sink) => sink.records_written(),
            CdxSink::Sorting(sink) => sink.records_written(),
        }
    }

    /// Serializes `record` and hands it to the destination. Blocks on backpressure.
    pub fn write(&self, record: &Record) -> Result<(), SinkError> {
        match self {
            CdxSink::Direct(sink) => sink.write(record),
            CdxSink::Sorting(sink) => sink.write(record),
        }
    }

    /// Flushes everything to the destination and reports any failure that happened on the way.
    pub async fn close(self) -> Result<SinkSummary, SinkError> {
        match self {
            CdxSink::Direct(sink) => sink.close(),
            CdxSink::Sorting(sink) => sink.close().await,
        }
    }
}

fn write_header(writer: &mut dyn Write, format: CdxFormat) -> Result<(), SinkError> {
    writer.write_all(format.file_header().as_bytes())?;
    writer.write_all(b"\n")?;
    Ok(())
}
