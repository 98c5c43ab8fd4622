use std::io::BufRead;

use crate::archive::http::HttpResponseHeader;
use crate::archive::reader::{consume_block_rest, finish_block, read_block_start, read_header_line, ContainerParser, ParsedRecord};
use crate::cdx::record::normalize_timestamp;
use crate::cdx::Record;
use crate::constants::MAX_PAYLOAD_HEADER_SIZE;
use crate::error::ParseError;

const KIND: &str = "ARC";
const VERSION_BLOCK_SCHEME: &str = "filedesc:";

/// The URL record line: `URL IP-address Archive-date Content-type [...] Archive-length`.
///
/// Version 2 lines carry extra fields before the length, which is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArcHeader {
    pub url: String,
    pub ip_address: String,
    pub archive_date: String,
    pub content_type: String,
    pub archive_length: u64,
}

impl ArcHeader {
    pub fn parse(line: &str, offset: u64) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(ParseError::malformed(
                KIND,
                offset,
                format!("expected at least 5 header fields, found {}", fields.len()),
            ));
        }

        let archive_length = fields[fields.len() - 1]
            .parse()
            .map_err(|_| ParseError::malformed(KIND, offset, "invalid archive length"))?;

        Ok(Self {
            url: fields[0].to_string(),
            ip_address: fields[1].to_string(),
            archive_date: fields[2].to_string(),
            content_type: fields[3].to_string(),
            archive_length,
        })
    }

    pub fn is_version_block(&self) -> bool {
        self.url.starts_with(VERSION_BLOCK_SCHEME)
    }
}

#[derive(Debug, Default)]
pub struct ArcParser;

impl ContainerParser for ArcParser {
    const KIND: &'static str = KIND;

    fn read_record(&mut self, input: &mut dyn BufRead, offset: u64) -> Result<Option<ParsedRecord>, ParseError> {
        let Some(line) = read_header_line(input, KIND, offset)? else {
            return Ok(None);
        };
        let header = ArcHeader::parse(&line, offset)?;

        if header.is_version_block() {
            consume_block_rest(input, header.archive_length, None, KIND, offset)?;
            return Ok(Some(ParsedRecord::Skipped));
        }

        let Some(timestamp) = normalize_timestamp(&header.archive_date) else {
            return Err(ParseError::malformed(
                KIND,
                offset,
                format!("invalid archive date {:?}", header.archive_date),
            ));
        };

        let start = read_block_start(input, header.archive_length, MAX_PAYLOAD_HEADER_SIZE, KIND, offset)?;
        let http = HttpResponseHeader::parse(&start);
        let payload_start = match &http {
            Some(http) => http.header_length,
            None => Some(0),
        };
        let digest = finish_block(input, &start, header.archive_length, payload_start, KIND, offset)?;

        let mut record = Record::new(header.url.as_str(), &timestamp, "response");
        record.content_length = Some(header.archive_length);
        record.payload_length = Some(header.archive_length);
        record.content_type = Some(header.content_type.clone()).filter(|value| value != "-");
        record.payload_digest = digest;

        if let Some(http) = http {
            record.response_code = Some(http.status);
            record.content_type = http.content_type.clone();
            if let Some(payload) = http.payload_length(header.archive_length) {
                record.payload_length = Some(payload);
            }
        }

        Ok(Some(ParsedRecord::Indexed(record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_one_header() {
        let header = ArcHeader::parse("http://example.com/ 10.0.0.1 20160504123001 text/html 1024", 0).unwrap();
        assert_eq!(header.url, "http://example.com/");
        assert_eq!(header.archive_date, "20160504123001");
        assert_eq!(header.content_type, "text/html");
        assert_eq!(header.archive_length, 1024);
        assert!(!header.is_version_block());
    }

    #[test]
    fn test_parse_version_two_header_takes_last_length() {
        let line = "http://example.com/ 10.0.0.1 20160504123001 text/html 200 abc - 0 x.arc 77";
        assert_eq!(ArcHeader::parse(line, 0).unwrap().archive_length, 77);
    }

    #[test]
    fn test_reject_short_header() {
        assert!(ArcHeader::parse("http://example.com/ 10.0.0.1 20160504123001", 42).is_err());
        assert!(ArcHeader::parse("http://example.com/ 10.0.0.1 20160504123001 text/html many", 42).is_err());
    }
}
