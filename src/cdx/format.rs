use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::cdx::record::{Record, RevisitTarget};
use crate::cdx::surt::escape_whitespace;

pub const CDXJ_HEADER: &str = "!OpenWayback-CDXJ 1.0";
pub const CDX9_HEADER: &str = " CDX N b a m s k r V g";
pub const CDX11_HEADER: &str = " CDX N b a m s k r M S V g";

const REVISIT_MIME: &str = "warc/revisit";
const EMPTY_FIELD: &str = "-";
const WARCFILE_PREFIX: &str = "warcfile:";

/// The three fixed output schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CdxFormat {
    Cdxj,
    Cdx9,
    Cdx11,
}

impl CdxFormat {
    pub fn file_header(&self) -> &'static str {
        match self {
            CdxFormat::Cdxj => CDXJ_HEADER,
            CdxFormat::Cdx9 => CDX9_HEADER,
            CdxFormat::Cdx11 => CDX11_HEADER,
        }
    }

    pub fn file_suffix(&self) -> &'static str {
        match self {
            CdxFormat::Cdxj => "cdxj",
            CdxFormat::Cdx9 | CdxFormat::Cdx11 => "cdx",
        }
    }

    /// Serializes a record as one line without the trailing newline.
    ///
    /// The line always starts with [`Record::sort_key`].
    pub fn format(&self, record: &Record) -> Result<String, serde_json::Error> {
        match self {
            CdxFormat::Cdxj => format_cdxj(record),
            CdxFormat::Cdx9 => Ok(format_cdx(record, false)),
            CdxFormat::Cdx11 => Ok(format_cdx(record, true)),
        }
    }
}

impl FromStr for CdxFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cdxj" => Ok(CdxFormat::Cdxj),
            "cdx9" => Ok(CdxFormat::Cdx9),
            "cdx11" => Ok(CdxFormat::Cdx11),
            _ => Err(format!(
                "Illegal format '{}'. Allowed values are: cdxj, cdx9, cdx11",
                value
            )),
        }
    }
}

impl fmt::Display for CdxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CdxFormat::Cdxj => "cdxj",
            CdxFormat::Cdx9 => "cdx9",
            CdxFormat::Cdx11 => "cdx11",
        };
        f.write_str(name)
    }
}

/// The JSON block of a CDXJ line. Field order here is the order on disk.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct CdxjFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rty: Option<String>,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hsc: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mct: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ple: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rle: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cle: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rou: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rod: Option<String>,
}

impl CdxjFields {
    fn from_record(record: &Record) -> Self {
        let revisit = record.revisit.clone().unwrap_or_default();
        Self {
            uri: Some(record.original_uri.clone()),
            rty: Some(record.record_type.clone()),
            reference: Some(format!("{}{}#{}", WARCFILE_PREFIX, record.filename, record.offset)),
            hsc: record.response_code,
            mct: record.content_type.clone(),
            ple: record.payload_length,
            rle: record.record_length,
            cle: record.content_length,
            dig: record.payload_digest.clone(),
            rid: record.record_id.clone(),
            roi: revisit.refers_to_id,
            rou: revisit.refers_to_uri,
            rod: revisit.refers_to_date,
        }
    }

    /// Rebuilds a record from a parsed JSON block and the line's timestamp.
    pub(crate) fn into_record(self, timestamp: &str) -> Option<Record> {
        let mut record = Record::new(self.uri?, timestamp, self.rty.unwrap_or_else(|| "response".to_string()));

        if let Some((filename, offset)) = self.reference.as_deref().and_then(parse_reference) {
            record = record.with_location(filename, offset);
        }

        record.response_code = self.hsc;
        record.content_type = self.mct;
        record.payload_length = self.ple;
        record.record_length = self.rle;
        record.content_length = self.cle;
        record.payload_digest = self.dig;
        record.record_id = self.rid;

        if self.roi.is_some() || self.rou.is_some() || self.rod.is_some() {
            record.revisit = Some(RevisitTarget {
                refers_to_id: self.roi,
                refers_to_uri: self.rou,
                refers_to_date: self.rod,
            });
        }

        Some(record)
    }
}

fn parse_reference(reference: &str) -> Option<(&str, u64)> {
    let location = reference.strip_prefix(WARCFILE_PREFIX).unwrap_or(reference);
    let (filename, offset) = location.rsplit_once('#')?;
    Some((filename, offset.parse().ok()?))
}

fn format_cdxj(record: &Record) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(&CdxjFields::from_record(record))?;
    Ok(format!("{} {}", record.sort_key(), json))
}

fn format_cdx(record: &Record, eleven_fields: bool) -> String {
    let mime = if record.is_revisit() {
        REVISIT_MIME.to_string()
    } else {
        field(record.content_type.as_deref())
    };
    let status = record
        .response_code
        .map(|code| code.to_string())
        .unwrap_or_else(|| EMPTY_FIELD.to_string());

    let mut fields = vec![
        record.sort_key(),
        field(Some(&record.original_uri)),
        mime,
        status,
        field(record.payload_digest.as_deref()),
        EMPTY_FIELD.to_string(),
    ];

    if eleven_fields {
        fields.push(EMPTY_FIELD.to_string());
        fields.push(
            record
                .record_length
                .map(|length| length.to_string())
                .unwrap_or_else(|| EMPTY_FIELD.to_string()),
        );
    }

    fields.push(record.offset.to_string());
    fields.push(field(Some(&record.filename)));
    fields.join(" ")
}

fn field(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => escape_whitespace(value.to_string()),
        _ => EMPTY_FIELD.to_string(),
    }
}
