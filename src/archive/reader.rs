use flate2::bufread::GzDecoder;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use crate::archive::digest::PayloadDigest;
use crate::cdx::Record;
use crate::constants::{ARCHIVE_READ_BUFFER_SIZE, MAX_RECORD_HEADER_SIZE};
use crate::error::ParseError;

/// One record read by a [`ContainerParser`].
pub enum ParsedRecord {
    Indexed(Record),
    /// Read past but not indexed, such as `warcinfo`.
    Skipped,
}

/// Reads records of one container type from an uncompressed stream.
pub trait ContainerParser {
    const KIND: &'static str;

    /// Reads the record starting at the current position. `Ok(None)` at end of input.
    ///
    /// `offset` is only used for error messages.
    fn read_record(&mut self, input: &mut dyn BufRead, offset: u64) -> Result<Option<ParsedRecord>, ParseError>;
}

/// Counts the bytes taken from the wrapped reader.
pub(crate) struct CountingReader<R> {
    inner: R,
    position: u64,
}

impl<R> CountingReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    pub(crate) fn position(&self) -> u64 {
        self.position
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.position += read as u64;
        Ok(read)
    }
}

impl<R: BufRead> BufRead for CountingReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amount: usize) {
        self.inner.consume(amount);
        self.position += amount as u64;
    }
}

/// Drives a [`ContainerParser`] over a file and fills in where each record lives.
///
/// Plain files: the offset is the record's position and the length is what the parser
/// consumed. Gzipped files: both describe the gzip member holding the record.
pub struct ArchiveReader<P> {
    input: CountingReader<BufReader<File>>,
    parser: P,
    filename: String,
    compressed: bool,
    pending: VecDeque<Record>,
    done: bool,
}

impl<P: ContainerParser> ArchiveReader<P> {
    pub fn open(path: &Path, parser: P, compressed: bool) -> Result<Self, ParseError> {
        let file = File::open(path)?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            input: CountingReader::new(BufReader::with_capacity(ARCHIVE_READ_BUFFER_SIZE, file)),
            parser,
            filename,
            compressed,
            pending: VecDeque::new(),
            done: false,
        })
    }

    fn next_plain(&mut self) -> Result<Option<Record>, ParseError> {
        loop {
            skip_newlines(&mut self.input)?;
            let offset = self.input.position();
            let Some(parsed) = self.parser.read_record(&mut self.input, offset)? else {
                return Ok(None);
            };
            skip_newlines(&mut self.input)?;

            if let ParsedRecord::Indexed(mut record) = parsed {
                record.filename = self.filename.clone();
                record.offset = offset;
                record.record_length = Some(self.input.position() - offset);
                return Ok(Some(record));
            }
        }
    }

    /// Reads one whole gzip member and queues the records it holds.
    fn read_member(&mut self) -> Result<bool, ParseError> {
        if self.input.fill_buf()?.is_empty() {
            return Ok(false);
        }

        let start = self.input.position();
        let mut records = Vec::new();
        {
            let mut member = BufReader::new(GzDecoder::new(&mut self.input));
            loop {
                skip_newlines(&mut member)?;
                match self.parser.read_record(&mut member, start)? {
                    Some(ParsedRecord::Indexed(record)) => records.push(record),
                    Some(ParsedRecord::Skipped) => {}
                    None => break,
                }
            }
            // Drain the trailer so the outer reader stops right after this member.
            io::copy(&mut member, &mut io::sink())?;
        }

        let length = self.input.position() - start;
        if length == 0 {
            return Err(ParseError::malformed(P::KIND, start, "empty gzip member"));
        }

        for mut record in records {
            record.filename = self.filename.clone();
            record.offset = start;
            record.record_length = Some(length);
            self.pending.push_back(record);
        }
        Ok(true)
    }

    fn next_compressed(&mut self) -> Result<Option<Record>, ParseError> {
        while self.pending.is_empty() {
            if !self.read_member()? {
                return Ok(None);
            }
        }
        Ok(self.pending.pop_front())
    }
}

impl<P: ContainerParser> Iterator for ArchiveReader<P> {
    type Item = Result<Record, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = if self.compressed {
            self.next_compressed()
        } else {
            self.next_plain()
        };

        match result {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Consumes record separators (`\r` and `\n`) up to the next content byte.
pub(crate) fn skip_newlines<R: BufRead + ?Sized>(input: &mut R) -> io::Result<()> {
    loop {
        let buffer = input.fill_buf()?;
        if buffer.is_empty() {
            return Ok(());
        }
        let newlines = buffer.iter().take_while(|&&b| b == b'\r' || b == b'\n').count();
        let whole_buffer = newlines == buffer.len();
        input.consume(newlines);
        if !whole_buffer {
            return Ok(());
        }
    }
}

/// Reads one line without its line ending. `Ok(None)` at end of input.
pub(crate) fn read_header_line<R: BufRead + ?Sized>(
    input: &mut R,
    kind: &'static str,
    offset: u64,
) -> Result<Option<String>, ParseError> {
    let mut line = Vec::new();
    let read = Read::take(&mut *input, MAX_RECORD_HEADER_SIZE as u64).read_until(b'\n', &mut line)?;
    if read == 0 {
        return Ok(None);
    }
    if !line.ends_with(b"\n") && read == MAX_RECORD_HEADER_SIZE {
        return Err(ParseError::malformed(kind, offset, "header line too long"));
    }

    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}

/// Reads the first `limit` bytes of a block and leaves the rest unread.
pub(crate) fn read_block_start<R: BufRead + ?Sized>(
    input: &mut R,
    block_length: u64,
    limit: usize,
    kind: &'static str,
    offset: u64,
) -> Result<Vec<u8>, ParseError> {
    let wanted = block_length.min(limit as u64);
    let mut start = Vec::with_capacity(wanted as usize);
    Read::take(&mut *input, wanted).read_to_end(&mut start)?;
    if (start.len() as u64) < wanted {
        return Err(ParseError::malformed(kind, offset, "record block is truncated"));
    }
    Ok(start)
}

/// Consumes the `remaining` bytes of a block, hashing them into `digest` when given.
pub(crate) fn consume_block_rest<R: BufRead + ?Sized>(
    input: &mut R,
    remaining: u64,
    mut digest: Option<&mut PayloadDigest>,
    kind: &'static str,
    offset: u64,
) -> Result<(), ParseError> {
    let mut remaining = remaining;
    while remaining > 0 {
        let buffer = input.fill_buf()?;
        if buffer.is_empty() {
            return Err(ParseError::malformed(kind, offset, "record block is truncated"));
        }
        let taken = remaining.min(buffer.len() as u64) as usize;
        if let Some(digest) = digest.as_mut() {
            digest.update(&buffer[..taken]);
        }
        input.consume(taken);
        remaining -= taken as u64;
    }
    Ok(())
}

/// Reads the rest of a block whose start has been read. The payload begins at
/// `payload_start` within `start`; with `None` no digest is computed.
pub(crate) fn finish_block<R: BufRead + ?Sized>(
    input: &mut R,
    start: &[u8],
    block_length: u64,
    payload_start: Option<usize>,
    kind: &'static str,
    offset: u64,
) -> Result<Option<String>, ParseError> {
    let mut digest = payload_start.map(|payload_start| {
        let mut digest = PayloadDigest::new();
        digest.update(&start[payload_start.min(start.len())..]);
        digest
    });
    consume_block_rest(input, block_length - start.len() as u64, digest.as_mut(), kind, offset)?;
    Ok(digest.map(PayloadDigest::finish))
}
