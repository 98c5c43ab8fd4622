//! Lazy readers turning ARC and WARC files, plain or gzipped per record, into [`Record`]s.

pub mod arc;
pub mod digest;
pub mod http;
pub mod reader;
pub mod warc;


pub use reader::{ArchiveReader, ContainerParser, ParsedRecord};

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::cdx::Record;
use crate::constants::FORMAT_SNIFF_BYTES;
use crate::error::ParseError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const WARC_MAGIC: &[u8] = b"WARC/";
const ARC_MAGIC: &[u8] = b"filedesc://";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Warc,
    WarcGz,
    Arc,
    ArcGz,
}

impl ContainerFormat {
    pub fn is_compressed(&self) -> bool {
        matches!(self, ContainerFormat::WarcGz | ContainerFormat::ArcGz)
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".warc.gz") {
            Some(ContainerFormat::WarcGz)
        } else if name.ends_with(".warc") {
            Some(ContainerFormat::Warc)
        } else if name.ends_with(".arc.gz") {
            Some(ContainerFormat::ArcGz)
        } else if name.ends_with(".arc") {
            Some(ContainerFormat::Arc)
        } else {
            None
        }
    }

    /// Recognizes the container from its first bytes, looking inside gzip if needed.
    pub fn sniff(head: &[u8]) -> Option<Self> {
        if head.starts_with(&GZIP_MAGIC) {
            let mut inflated = Vec::with_capacity(FORMAT_SNIFF_BYTES);
            let _ = GzDecoder::new(head)
                .take(FORMAT_SNIFF_BYTES as u64)
                .read_to_end(&mut inflated);
            return match Self::sniff_plain(&inflated)? {
                ContainerFormat::Warc => Some(ContainerFormat::WarcGz),
                _ => Some(ContainerFormat::ArcGz),
            };
        }
        Self::sniff_plain(head)
    }

    fn sniff_plain(head: &[u8]) -> Option<Self> {
        if head.starts_with(WARC_MAGIC) {
            Some(ContainerFormat::Warc)
        } else if head.starts_with(ARC_MAGIC) {
            Some(ContainerFormat::Arc)
        } else {
            None
        }
    }

    /// Identifies a file by content. `Ok(None)` means the file is empty and has nothing to index.
    ///
    /// Content wins over the file name; a disagreement is only logged.
    pub fn identify(path: &Path) -> Result<Option<Self>, ParseError> {
        let by_extension = Self::from_extension(path);
        if std::fs::metadata(path)?.len() == 0 {
            match by_extension {
                Some(_) => warn!("Empty file: '{}'", path.display()),
                None => warn!("Not a (W)ARC file: '{}'", path.display()),
            }
            return Ok(None);
        }

        let by_content = Self::sniff(&read_head(path)?)
            .ok_or_else(|| ParseError::UnsupportedFormat(path.to_path_buf()))?;

        if by_extension != Some(by_content) {
            warn!(
                "Extension not in line with content: '{}', processing anyway",
                path.display()
            );
        }
        Ok(Some(by_content))
    }
}

/// Enough leading bytes to recognize a container, gzip header included.
fn read_head(path: &Path) -> Result<Vec<u8>, ParseError> {
    // A gzip member header can carry a file name, so read well past the sniff window.
    const HEAD_BYTES: u64 = 4096;
    let mut head = Vec::new();
    File::open(path)?.take(HEAD_BYTES).read_to_end(&mut head)?;
    Ok(head)
}

/// Records of one archive file, in file order.
pub enum ArchiveRecords {
    Warc(ArchiveReader<warc::WarcParser>),
    Arc(ArchiveReader<arc::ArcParser>),
    Empty,
}

impl Iterator for ArchiveRecords {
    type Item = Result<Record, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ArchiveRecords::Warc(reader) => reader.next(),
            ArchiveRecords::Arc(reader) => reader.next(),
            ArchiveRecords::Empty => None,
        }
    }
}

/// Identifies `path` and opens a lazy record iterator over it.
pub fn open_records(path: &Path) -> Result<ArchiveRecords, ParseError> {
    let Some(format) = ContainerFormat::identify(path)? else {
        return Ok(ArchiveRecords::Empty);
    };

    let compressed = format.is_compressed();
    Ok(match format {
        ContainerFormat::Warc | ContainerFormat::WarcGz => {
            ArchiveRecords::Warc(ArchiveReader::open(path, warc::WarcParser, compressed)?)
        }
        ContainerFormat::Arc | ContainerFormat::ArcGz => {
            ArchiveRecords::Arc(ArchiveReader::open(path, arc::ArcParser::default(), compressed)?)
        }
    })
}
