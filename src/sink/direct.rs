use parking_lot::Mutex;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cdx::{CdxFormat, Record};
use crate::constants::ARCHIVE_READ_BUFFER_SIZE;
use crate::error::SinkError;
use crate::sink::{write_header, BoxedWriter, SinkSummary};

/// Writes records straight through. One lock guards the writer so lines never interleave.
pub struct DirectSink {
    writer: Mutex<BufWriter<BoxedWriter>>,
    format: CdxFormat,
    records: AtomicU64,
}

impl DirectSink {
    pub fn new(writer: BoxedWriter, format: CdxFormat) -> Result<Self, SinkError> {
        let mut writer = BufWriter::with_capacity(ARCHIVE_READ_BUFFER_SIZE, writer);
        write_header(&mut writer, format)?;
        Ok(Self {
            writer: Mutex::new(writer),
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

    pub fn write(&self, record: &Record) -> Result<(), SinkError> {
        let line = self.format.format(record)?;

        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        drop(writer);

        self.records.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn close(self) -> Result<SinkSummary, SinkError> {
        let mut writer = self.writer.into_inner();
        writer.flush()?;
        Ok(SinkSummary {
            records: self.records.into_inner(),
            sort: None,
        })
    }
}
