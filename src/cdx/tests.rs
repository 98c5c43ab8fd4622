#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::cdx::{CdxFormat, CdxLayout, CdxReader, Record, RevisitTarget};

    fn sample_record() -> Record {
        let mut record = Record::new("http://www.example.com/page", "2016-05-04T12:30:01Z", "response")
            .with_location("crawl-1.warc.gz", 1234);
        record.content_type = Some("text/html".to_string());
        record.response_code = Some(200);
        record.payload_digest = Some("sha1:ABCDEF".to_string());
        record.record_length = Some(987);
        record.payload_length = Some(512);
        record
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("cdxj".parse::<CdxFormat>().unwrap(), CdxFormat::Cdxj);
        assert_eq!("cdx9".parse::<CdxFormat>().unwrap(), CdxFormat::Cdx9);
        assert_eq!("cdx11".parse::<CdxFormat>().unwrap(), CdxFormat::Cdx11);
        assert!("cdx10".parse::<CdxFormat>().is_err());
    }

    #[test]
    fn test_headers_and_suffixes() {
        assert_eq!(CdxFormat::Cdxj.file_suffix(), "cdxj");
        assert_eq!(CdxFormat::Cdx9.file_suffix(), "cdx");
        assert_eq!(CdxFormat::Cdx11.file_suffix(), "cdx");
        assert!(CdxFormat::Cdx9.file_header().starts_with(" CDX "));
        assert!(CdxFormat::Cdxj.file_header().starts_with('!'));
    }

    #[test]
    fn test_cdx9_line() {
        let line = CdxFormat::Cdx9.format(&sample_record()).unwrap();
        assert_eq!(
            line,
            "com,example)/page 20160504123001 http://www.example.com/page text/html 200 sha1:ABCDEF - 1234 crawl-1.warc.gz"
        );
    }

    #[test]
    fn test_cdx11_line() {
        let line = CdxFormat::Cdx11.format(&sample_record()).unwrap();
        assert_eq!(
            line,
            "com,example)/page 20160504123001 http://www.example.com/page text/html 200 sha1:ABCDEF - - 987 1234 crawl-1.warc.gz"
        );
    }

    #[test]
    fn test_cdxj_line() {
        let line = CdxFormat::Cdxj.format(&sample_record()).unwrap();
        assert!(line.starts_with("com,example)/page 20160504123001 {"));
        assert!(line.contains(r#""uri":"http://www.example.com/page""#));
        assert!(line.contains(r#""ref":"warcfile:crawl-1.warc.gz#1234""#));
        assert!(line.contains(r#""hsc":200"#));
        assert!(!line.contains("rou"));
    }

    #[test]
    fn test_every_format_starts_with_sort_key() {
        let record = sample_record();
        for format in [CdxFormat::Cdxj, CdxFormat::Cdx9, CdxFormat::Cdx11] {
            let line = format.format(&record).unwrap();
            assert!(line.starts_with(&record.sort_key()), "{} line: {}", format, line);
            assert!(!line.contains('\n'));
        }
    }

    #[test]
    fn test_revisit_is_marked_in_cdx() {
        let mut record = sample_record();
        record.record_type = "revisit".to_string();
        record.revisit = Some(RevisitTarget {
            refers_to_uri: Some("http://www.example.com/page".to_string()),
            refers_to_date: Some("2016-01-01T00:00:00Z".to_string()),
            refers_to_id: None,
        });

        let cdx = CdxFormat::Cdx9.format(&record).unwrap();
        assert!(cdx.contains(" warc/revisit "));

        let cdxj = CdxFormat::Cdxj.format(&record).unwrap();
        assert!(cdxj.contains(r#""rou":"http://www.example.com/page""#));
    }

    #[test]
    fn test_detect_layout() {
        assert_eq!(CdxLayout::detect("!OpenWayback-CDXJ 1.0"), (CdxLayout::Json, true));
        assert_eq!(
            CdxLayout::detect(" CDX N b a m s k r V g"),
            (CdxLayout::Legend(vec!['N', 'b', 'a', 'm', 's', 'k', 'r', 'V', 'g']), true)
        );
        assert_eq!(CdxLayout::detect("com,example)/ 20160101000000 {\"uri\":\"x\"}").0, CdxLayout::Json);
    }

    #[test]
    fn test_reader_parses_cdxj_written_by_formatter() {
        let record = sample_record();
        let content = format!(
            "{}\n{}\n",
            CdxFormat::Cdxj.file_header(),
            CdxFormat::Cdxj.format(&record).unwrap()
        );

        let records: Vec<Record> = CdxReader::new(Cursor::new(content))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records, vec![record]);
    }

    #[test]
    fn test_reader_parses_cdx11_lines() {
        let content = " CDX N b a m s k r M S V g\n\
            com,example)/ 20160101000000 http://example.com/ text/html 200 DIGEST - - 300 10 a.warc\n\
            \n\
            com,example)/x 20160102000000 http://example.com/x warc/revisit - DIGEST - - 120 310 a.warc\n";

        let records: Vec<Record> = CdxReader::new(Cursor::new(content))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].original_uri, "http://example.com/");
        assert_eq!(records[0].record_length, Some(300));
        assert_eq!(records[0].offset, 10);
        assert_eq!(records[0].filename, "a.warc");
        assert_eq!(records[1].record_type, "revisit");
        assert_eq!(records[1].content_type, None);
        assert_eq!(records[1].response_code, None);
    }

    #[test]
    fn test_reader_reports_malformed_line() {
        let content = " CDX N b a m s k r V g\ncom,example)/ 20160101000000 http://example.com/\n";
        let mut reader = CdxReader::new(Cursor::new(content));
        assert!(reader.next().unwrap().is_err());
    }
}
