use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::SortError;

enum Mode {
    Writing(BufWriter<File>),
    Reading(BufReader<File>),
}

/// An anonymous temporary file holding newline separated runs.
///
/// The file is either appended to or read front to back, never both at once.
/// Run boundaries are not stored in the file; the schedule knows the run lengths.
pub struct ScratchFile {
    mode: Option<Mode>,
    buffer_size: usize,
    bytes_written: u64,
}

impl ScratchFile {
    /// Creates the file in `directory`. It is unlinked immediately and vanishes when dropped.
    pub fn create_in(directory: &Path, buffer_size: usize) -> Result<Self, SortError> {
        let file = tempfile::tempfile_in(directory).map_err(SortError::Scratch)?;
        Ok(Self {
            mode: Some(Mode::Writing(BufWriter::with_capacity(buffer_size, file))),
            buffer_size,
            bytes_written: 0,
        })
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn is_reading(&self) -> bool {
        matches!(self.mode, Some(Mode::Reading(_)))
    }

    fn take_file(&mut self) -> Result<File, SortError> {
        match self.mode.take() {
            Some(Mode::Writing(writer)) => writer
                .into_inner()
                .map_err(|e| SortError::Scratch(e.into_error())),
            Some(Mode::Reading(reader)) => Ok(reader.into_inner()),
            None => Err(SortError::Scratch(io::Error::other(
                "scratch file unusable after an earlier failure",
            ))),
        }
    }

    /// Flushes pending writes and rewinds to the first run.
    pub fn start_reading(&mut self) -> Result<(), SortError> {
        let mut file = self.take_file()?;
        file.seek(SeekFrom::Start(0)).map_err(SortError::Scratch)?;
        self.mode = Some(Mode::Reading(BufReader::with_capacity(self.buffer_size, file)));
        Ok(())
    }

    /// Drops the current contents and starts appending from an empty file.
    pub fn start_writing(&mut self) -> Result<(), SortError> {
        let mut file = self.take_file()?;
        file.set_len(0).map_err(SortError::Scratch)?;
        file.seek(SeekFrom::Start(0)).map_err(SortError::Scratch)?;
        self.mode = Some(Mode::Writing(BufWriter::with_capacity(self.buffer_size, file)));
        Ok(())
    }

    pub fn write_line(&mut self, line: &str) -> Result<(), SortError> {
        let Some(Mode::Writing(writer)) = self.mode.as_mut() else {
            return Err(SortError::Scratch(io::Error::other("scratch file is not open for writing")));
        };
        writer.write_all(line.as_bytes()).map_err(SortError::Scratch)?;
        writer.write_all(b"\n").map_err(SortError::Scratch)?;
        self.bytes_written += line.len() as u64 + 1;
        Ok(())
    }

    /// Reads the next line into `buffer` without its newline. Returns `false` at end of file.
    pub fn read_line(&mut self, buffer: &mut String) -> Result<bool, SortError> {
        let Some(Mode::Reading(reader)) = self.mode.as_mut() else {
            return Err(SortError::Scratch(io::Error::other("scratch file is not open for reading")));
        };
        buffer.clear();
        if reader.read_line(buffer).map_err(SortError::Scratch)? == 0 {
            return Ok(false);
        }
        if buffer.ends_with('\n') {
            buffer.pop();
        }
        Ok(true)
    }

    /// Reads a line that the run bookkeeping says must be there.
    pub fn read_expected_line(&mut self) -> Result<String, SortError> {
        let mut line = String::new();
        if self.read_line(&mut line)? {
            Ok(line)
        } else {
            Err(SortError::Scratch(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "scratch file ended inside a run",
            )))
        }
    }
}
