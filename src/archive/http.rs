/// The parts of an HTTP response header that end up in an index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseHeader {
    pub status: u16,
    /// Media type without parameters.
    pub content_type: Option<String>,
    /// Bytes up to and including the blank line, or `None` if the header never ended.
    pub header_length: Option<usize>,
}

impl HttpResponseHeader {
    /// Parses the start of a record block. Returns `None` unless it opens with an HTTP status line.
    pub fn parse(block: &[u8]) -> Option<Self> {
        let mut lines = LineIter { data: block, position: 0 };

        let status_line = lines.next()?;
        let mut parts = status_line.split_whitespace();
        if !parts.next()?.starts_with("HTTP/") {
            return None;
        }
        let status = parts.next()?.parse().ok()?;

        let mut content_type = None;
        let mut header_length = None;
        while let Some(line) = lines.next() {
            if line.is_empty() {
                header_length = Some(lines.position);
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-type") {
                    content_type = media_type(value);
                }
            }
        }

        Some(Self {
            status,
            content_type,
            header_length,
        })
    }

    /// Payload bytes after the header, given the full block length.
    pub fn payload_length(&self, block_length: u64) -> Option<u64> {
        self.header_length
            .map(|length| block_length.saturating_sub(length as u64))
    }
}

fn media_type(value: &str) -> Option<String> {
    let media = value.split(';').next().unwrap_or("").trim();
    (!media.is_empty()).then(|| media.to_ascii_lowercase())
}

/// Splits on `\n`, dropping a trailing `\r`. A final line without `\n` is not returned.
struct LineIter<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Iterator for LineIter<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let rest = &self.data[self.position..];
        let end = rest.iter().position(|&b| b == b'\n')?;
        self.position += end + 1;

        let line = rest[..end].strip_suffix(b"\r").unwrap_or(&rest[..end]);
        Some(String::from_utf8_lossy(line).into_owned())
    }
}
