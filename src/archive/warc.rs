use std::io::BufRead;

use crate::archive::http::HttpResponseHeader;
use crate::archive::reader::{consume_block_rest, finish_block, read_block_start, read_header_line, ContainerParser, ParsedRecord};
use crate::cdx::record::normalize_timestamp;
use crate::cdx::{Record, RevisitTarget};
use crate::constants::{MAX_PAYLOAD_HEADER_SIZE, MAX_RECORD_HEADER_SIZE};
use crate::error::ParseError;

const KIND: &str = "WARC";

/// Named header fields of one WARC record, in file order.
#[derive(Debug, Default)]
pub struct WarcHeader {
    pub version: String,
    fields: Vec<(String, String)>,
}

impl WarcHeader {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn record_type(&self) -> &str {
        self.get("WARC-Type").unwrap_or("")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.get("Content-Length")?.parse().ok()
    }

    /// Reads the version line and fields up to the blank line. `Ok(None)` at end of input.
    pub fn read(input: &mut dyn BufRead, offset: u64) -> Result<Option<Self>, ParseError> {
        let Some(version) = read_header_line(input, KIND, offset)? else {
            return Ok(None);
        };
        if !version.starts_with("WARC/") {
            return Err(ParseError::malformed(KIND, offset, format!("bad version line {:?}", version)));
        }

        let mut header = WarcHeader {
            version,
            fields: Vec::new(),
        };
        let mut size = 0;
        loop {
            let line = read_header_line(input, KIND, offset)?
                .ok_or_else(|| ParseError::malformed(KIND, offset, "header ends before the blank line"))?;
            if line.is_empty() {
                return Ok(Some(header));
            }

            size += line.len();
            if size > MAX_RECORD_HEADER_SIZE {
                return Err(ParseError::malformed(KIND, offset, "header too large"));
            }

            match line.split_once(':') {
                Some((name, value)) => header.fields.push((name.trim().to_string(), value.trim().to_string())),
                // Folded continuation of the previous field.
                None if line.starts_with([' ', '\t']) => {
                    if let Some((_, value)) = header.fields.last_mut() {
                        value.push(' ');
                        value.push_str(line.trim());
                    }
                }
                None => return Err(ParseError::malformed(KIND, offset, format!("bad header line {:?}", line))),
            }
        }
    }
}

/// Indexes every record except `warcinfo` and `metadata`.
#[derive(Debug, Default)]
pub struct WarcParser;

impl ContainerParser for WarcParser {
    const KIND: &'static str = KIND;

    fn read_record(&mut self, input: &mut dyn BufRead, offset: u64) -> Result<Option<ParsedRecord>, ParseError> {
        let Some(header) = WarcHeader::read(input, offset)? else {
            return Ok(None);
        };
        let block_length = header
            .content_length()
            .ok_or_else(|| ParseError::malformed(KIND, offset, "missing or invalid Content-Length"))?;

        let record_type = header.record_type().to_ascii_lowercase();
        if matches!(record_type.as_str(), "warcinfo" | "metadata") {
            consume_block_rest(input, block_length, None, KIND, offset)?;
            return Ok(Some(ParsedRecord::Skipped));
        }

        let date = header.get("WARC-Date").unwrap_or("");
        let Some(timestamp) = normalize_timestamp(date) else {
            return Err(ParseError::malformed(KIND, offset, format!("invalid WARC-Date {:?}", date)));
        };

        let has_http = matches!(record_type.as_str(), "response" | "revisit")
            && header
                .get("Content-Type")
                .is_some_and(|value| value.to_ascii_lowercase().starts_with("application/http"));
        let limit = if has_http { MAX_PAYLOAD_HEADER_SIZE } else { 0 };
        let start = read_block_start(input, block_length, limit, KIND, offset)?;
        let http = if has_http { HttpResponseHeader::parse(&start) } else { None };

        let header_digest = header.get("WARC-Payload-Digest").map(strip_digest_algorithm);
        // Revisits carry no payload of their own to hash.
        let payload_start = if header_digest.is_some() || record_type == "revisit" {
            None
        } else {
            match &http {
                Some(http) => http.header_length,
                None => Some(0),
            }
        };
        let computed_digest = finish_block(input, &start, block_length, payload_start, KIND, offset)?;

        let uri = header
            .get("WARC-Target-URI")
            .unwrap_or("")
            .trim_start_matches('<')
            .trim_end_matches('>');
        let mut record = Record::new(uri, &timestamp, record_type.as_str());
        record.record_id = header.get("WARC-Record-ID").map(str::to_string);
        record.content_length = Some(block_length);
        record.payload_length = Some(block_length);
        record.content_type = header.get("Content-Type").map(str::to_string);
        record.payload_digest = header_digest.or(computed_digest);

        if let Some(http) = http {
            record.response_code = Some(http.status);
            record.content_type = http.content_type.clone();
            if let Some(payload) = http.payload_length(block_length) {
                record.payload_length = Some(payload);
            }
        }

        if record.is_revisit() {
            record.revisit = Some(RevisitTarget {
                refers_to_id: header.get("WARC-Refers-To").map(str::to_string),
                refers_to_uri: header.get("WARC-Refers-To-Target-URI").map(str::to_string),
                refers_to_date: header.get("WARC-Refers-To-Date").map(str::to_string),
            });
        }

        Ok(Some(ParsedRecord::Indexed(record)))
    }
}

/// `sha1:ABC` becomes `ABC`, the form CDX files carry.
fn strip_digest_algorithm(digest: &str) -> String {
    match digest.split_once(':') {
        Some((algorithm, value)) if algorithm.eq_ignore_ascii_case("sha1") => value.to_string(),
        _ => digest.to_string(),
    }
}
