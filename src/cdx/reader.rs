use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::cdx::format::{CdxjFields, CDX9_HEADER};
use crate::cdx::record::Record;
use crate::constants::ARCHIVE_READ_BUFFER_SIZE;
use crate::error::ParseError;

const REVISIT_MIME: &str = "warc/revisit";

/// How the lines of a CDX file are laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdxLayout {
    Json,
    /// Classic space separated CDX with its legend letters, e.g. `N b a m s k r V g`.
    Legend(Vec<char>),
}

impl CdxLayout {
    /// Detects the layout from the first line of a file.
    ///
    /// Returns the layout and whether that line was a header to be skipped.
    pub fn detect(first_line: &str) -> (Self, bool) {
        let trimmed = first_line.trim_end_matches(['\r', '\n']);
        if trimmed.starts_with('!') {
            return (CdxLayout::Json, true);
        }
        if let Some(legend) = trimmed.trim_start().strip_prefix("CDX ") {
            return (Self::legend(legend), true);
        }

        let third = trimmed.splitn(3, ' ').nth(2).unwrap_or("");
        if third.starts_with('{') {
            (CdxLayout::Json, false)
        } else {
            let legend = CDX9_HEADER.trim_start().trim_start_matches("CDX ");
            (Self::legend(legend), false)
        }
    }

    fn legend(letters: &str) -> Self {
        CdxLayout::Legend(letters.split_whitespace().filter_map(|token| token.chars().next()).collect())
    }

    pub fn parse_line(&self, line: &str, line_number: usize) -> Result<Record, ParseError> {
        match self {
            CdxLayout::Json => parse_cdxj_line(line, line_number),
            CdxLayout::Legend(letters) => parse_legend_line(letters, line, line_number),
        }
    }
}

/// Lazily reads an existing CDX file back into records.
pub struct CdxReader<R: BufRead> {
    reader: R,
    layout: Option<CdxLayout>,
    pending_first_line: Option<String>,
    line_number: usize,
    line: String,
}

impl CdxReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(ARCHIVE_READ_BUFFER_SIZE, file)))
    }
}

impl<R: BufRead> CdxReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            layout: None,
            pending_first_line: None,
            line_number: 0,
            line: String::new(),
        }
    }

    pub fn layout(&self) -> Option<&CdxLayout> {
        self.layout.as_ref()
    }

    fn read_line(&mut self) -> Result<Option<String>, ParseError> {
        if let Some(line) = self.pending_first_line.take() {
            return Ok(Some(line));
        }

        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = self.line.trim_end_matches(['\r', '\n']);
            if trimmed.trim().is_empty() {
                continue;
            }
            return Ok(Some(trimmed.to_string()));
        }
    }

    fn next_record(&mut self) -> Result<Option<Record>, ParseError> {
        if self.layout.is_none() {
            let Some(first) = self.read_line()? else {
                return Ok(None);
            };
            let (layout, is_header) = CdxLayout::detect(&first);
            self.layout = Some(layout);
            if !is_header {
                self.pending_first_line = Some(first);
            }
        }

        loop {
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            // Further `!` lines in CDXJ are metadata, not records.
            if line.starts_with('!') {
                continue;
            }
            if let Some(layout) = &self.layout {
                return layout.parse_line(&line, self.line_number).map(Some);
            }
        }
    }
}

impl<R: BufRead> Iterator for CdxReader<R> {
    type Item = Result<Record, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

fn parse_cdxj_line(line: &str, line_number: usize) -> Result<Record, ParseError> {
    let malformed = |message: &str| ParseError::MalformedCdx {
        line_number,
        message: message.to_string(),
    };

    let mut parts = line.splitn(3, ' ');
    let _surt = parts.next().ok_or_else(|| malformed("missing sort key"))?;
    let timestamp = parts.next().ok_or_else(|| malformed("missing timestamp"))?;
    let json = parts.next().ok_or_else(|| malformed("missing JSON block"))?;

    let fields: CdxjFields = serde_json::from_str(json).map_err(|e| malformed(&e.to_string()))?;
    fields.into_record(timestamp).ok_or_else(|| malformed("missing uri"))
}

fn parse_legend_line(letters: &[char], line: &str, line_number: usize) -> Result<Record, ParseError> {
    let values: Vec<&str> = line.split(' ').collect();
    if values.len() != letters.len() {
        return Err(ParseError::MalformedCdx {
            line_number,
            message: format!("expected {} fields, found {}", letters.len(), values.len()),
        });
    }

    let mut uri = None;
    let mut timestamp = "";
    let mut record = Record::default();

    for (letter, value) in letters.iter().zip(values) {
        let value = Some(value).filter(|v| *v != "-");
        match letter {
            'a' => uri = value,
            'b' => timestamp = value.unwrap_or(""),
            'm' => record.content_type = value.map(str::to_string),
            's' => record.response_code = value.and_then(|v| v.parse().ok()),
            'k' => record.payload_digest = value.map(str::to_string),
            'S' => record.record_length = value.and_then(|v| v.parse().ok()),
            'V' => record.offset = value.and_then(|v| v.parse().ok()).unwrap_or(0),
            'g' => record.filename = value.unwrap_or("").to_string(),
            _ => {}
        }
    }

    let uri = uri.ok_or_else(|| ParseError::MalformedCdx {
        line_number,
        message: "missing original url".to_string(),
    })?;

    let record_type = if record.content_type.as_deref() == Some(REVISIT_MIME) {
        record.content_type = None;
        "revisit"
    } else {
        "response"
    };

    let normalized = Record::new(uri, timestamp, record_type);
    record.original_uri = normalized.original_uri;
    record.timestamp = normalized.timestamp;
    record.record_type = normalized.record_type;
    Ok(record)
}
