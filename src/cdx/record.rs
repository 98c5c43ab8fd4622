use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::cdx::surt;

/// Length of a CDX timestamp, `YYYYMMDDhhmmss`.
pub const TIMESTAMP_LENGTH: usize = 14;

/// Stands in for a missing timestamp.
pub const UNKNOWN_TIMESTAMP: &str = "00000000000000";

/// One index entry describing a captured resource inside an archive file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub original_uri: String,
    /// 14 digits when the source date parses, otherwise the escaped raw value.
    pub timestamp: String,
    pub record_type: String,
    pub filename: String,
    pub offset: u64,
    pub record_length: Option<u64>,
    pub content_length: Option<u64>,
    pub payload_length: Option<u64>,
    pub content_type: Option<String>,
    pub response_code: Option<u16>,
    pub payload_digest: Option<String>,
    pub record_id: Option<String>,
    pub revisit: Option<RevisitTarget>,
}

/// What a WARC revisit record points back at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisitTarget {
    pub refers_to_id: Option<String>,
    pub refers_to_uri: Option<String>,
    pub refers_to_date: Option<String>,
}

impl Record {
    pub fn new(original_uri: impl Into<String>, timestamp: &str, record_type: impl Into<String>) -> Self {
        Self {
            original_uri: original_uri.into(),
            timestamp: normalize_timestamp(timestamp).unwrap_or_else(|| unparsed_timestamp(timestamp)),
            record_type: record_type.into(),
            ..Self::default()
        }
    }

    pub fn with_location(mut self, filename: impl Into<String>, offset: u64) -> Self {
        self.filename = filename.into();
        self.offset = offset;
        self
    }

    /// SURT form of the original URI.
    pub fn canonical_uri(&self) -> String {
        surt::canonicalize(&self.original_uri)
    }

    /// The `<surt> <timestamp>` prefix every serialized line starts with.
    pub fn sort_key(&self) -> String {
        format!("{} {}", self.canonical_uri(), self.timestamp)
    }

    pub fn is_revisit(&self) -> bool {
        self.record_type == "revisit"
    }
}

/// Keeps an unrecognized timestamp as one space-free token so the line still splits into its fields.
fn unparsed_timestamp(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return UNKNOWN_TIMESTAMP.to_string();
    }
    surt::escape_whitespace(raw.to_string())
}

/// Normalizes a WARC ISO-8601 date or an ARC/CDX digit string to `YYYYMMDDhhmmss`.
///
/// Digit strings shorter than 14 are right-padded with zeros, longer ones are truncated.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        if raw.len() < 4 {
            return None;
        }
        let mut digits: String = raw.chars().take(TIMESTAMP_LENGTH).collect();
        while digits.len() < TIMESTAMP_LENGTH {
            digits.push('0');
        }
        return Some(digits);
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|date| date.naive_utc().format("%Y%m%d%H%M%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_timestamp() {
        let cases = vec![
            ("2016-05-04T12:30:01Z", Some("20160504123001")),
            ("2016-05-04T12:30:01.123456Z", Some("20160504123001")),
            ("2016-05-04T14:30:01+02:00", Some("20160504123001")),
            ("20160504123001", Some("20160504123001")),
            ("2016050412300199", Some("20160504123001")),
            ("201605", Some("20160500000000")),
            ("16", None),
            ("yesterday", None),
            ("", None),
        ];

        for (input, expected) in cases {
            assert_eq!(normalize_timestamp(input).as_deref(), expected, "Failed for input: {}", input);
        }
    }

    #[test]
    fn test_sort_key_starts_with_surt_and_timestamp() {
        let record = Record::new("http://www.example.com/a", "2016-05-04T12:30:01Z", "response");
        assert_eq!(record.sort_key(), "com,example)/a 20160504123001");
    }

    #[test]
    fn test_new_keeps_unparseable_timestamp() {
        let record = Record::new("http://example.com/", "not-a-date", "response");
        assert_eq!(record.timestamp, "not-a-date");
    }

    #[test]
    fn test_odd_timestamps_stay_one_field() {
        let record = Record::new("http://example.com/", "May 4 2016", "response");
        assert_eq!(record.timestamp, "May%204%202016");
        assert_eq!(record.sort_key(), "com,example)/ May%204%202016");

        let record = Record::new("http://example.com/", "  ", "response");
        assert_eq!(record.timestamp, UNKNOWN_TIMESTAMP);
        assert_eq!(crate::external_sort::key::sort_key(&record.sort_key()), "com,example)/ 00000000000000");
    }
}
