//! K-way merge of CDX record streams that are each already in sort key order.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};

use crate::cdx::record::Record;
use crate::error::ParseError;

struct Pending {
    key: String,
    source: usize,
    record: Record,
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then(self.source.cmp(&other.source))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

/// Yields `(source index, record)` in ascending sort key order across all sources.
///
/// Equal keys come out in source order. A source that yields an error reports it once
/// and takes no further part in the merge.
pub struct MergedRecords<I> {
    sources: Vec<Option<I>>,
    pending: BinaryHeap<Reverse<Pending>>,
    failures: VecDeque<(usize, ParseError)>,
}

impl<I> MergedRecords<I>
where
    I: Iterator<Item = Result<Record, ParseError>>,
{
    pub fn new(sources: impl IntoIterator<Item = I>) -> Self {
        let mut merged = Self {
            sources: sources.into_iter().map(Some).collect(),
            pending: BinaryHeap::new(),
            failures: VecDeque::new(),
        };
        for source in 0..merged.sources.len() {
            merged.refill(source);
        }
        merged
    }

    /// Stops reading `source`. Records of it already buffered are discarded.
    pub fn close_source(&mut self, source: usize) {
        if let Some(slot) = self.sources.get_mut(source) {
            *slot = None;
        }
        self.pending.retain(|Reverse(pending)| pending.source != source);
    }

    fn refill(&mut self, source: usize) {
        let Some(Some(iter)) = self.sources.get_mut(source) else {
            return;
        };
        match iter.next() {
            Some(Ok(record)) => self.pending.push(Reverse(Pending {
                key: record.sort_key(),
                source,
                record,
            })),
            Some(Err(e)) => {
                self.sources[source] = None;
                self.failures.push_back((source, e));
            }
            None => self.sources[source] = None,
        }
    }
}

impl<I> Iterator for MergedRecords<I>
where
    I: Iterator<Item = Result<Record, ParseError>>,
{
    type Item = (usize, Result<Record, ParseError>);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some((source, error)) = self.failures.pop_front() {
            return Some((source, Err(error)));
        }
        let Reverse(head) = self.pending.pop()?;
        self.refill(head.source);
        Some((head.source, Ok(head.record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(uris: &[&str]) -> Vec<Result<Record, ParseError>> {
        uris.iter()
            .map(|uri| Ok(Record::new(*uri, "20160504123001", "response")))
            .collect()
    }

    fn uris<I>(merged: MergedRecords<I>) -> Vec<(usize, String)>
    where
        I: Iterator<Item = Result<Record, ParseError>>,
    {
        merged
            .map(|(source, record)| (source, record.unwrap().original_uri))
            .collect()
    }

    #[test]
    fn test_interleaves_sorted_sources() {
        let merged = MergedRecords::new(vec![
            records(&["http://a.com/", "http://c.com/"]).into_iter(),
            records(&["http://b.com/", "http://d.com/"]).into_iter(),
            records(&[]).into_iter(),
        ]);
        assert_eq!(
            uris(merged),
            vec![
                (0, "http://a.com/".to_string()),
                (1, "http://b.com/".to_string()),
                (0, "http://c.com/".to_string()),
                (1, "http://d.com/".to_string()),
            ]
        );
    }

    #[test]
    fn test_equal_keys_follow_source_order() {
        let merged = MergedRecords::new(vec![
            records(&["http://b.com/", "http://b.com/"]).into_iter(),
            records(&["http://a.com/", "http://b.com/"]).into_iter(),
        ]);
        let sources: Vec<usize> = uris(merged).into_iter().map(|(source, _)| source).collect();
        assert_eq!(sources, vec![1, 0, 0, 1]);
    }

    #[test]
    fn test_failing_source_leaves_the_merge() {
        let mut broken = records(&["http://b.com/"]);
        broken.push(Err(ParseError::MalformedCdx {
            line_number: 2,
            message: "expected 9 fields, found 3".to_string(),
        }));
        broken.extend(records(&["http://z.com/"]));

        let mut merged = MergedRecords::new(vec![
            records(&["http://a.com/", "http://c.com/"]).into_iter(),
            broken.into_iter(),
        ]);

        let mut seen = Vec::new();
        let mut failed = Vec::new();
        for (source, record) in merged.by_ref() {
            match record {
                Ok(record) => seen.push(record.original_uri),
                Err(_) => failed.push(source),
            }
        }
        assert_eq!(seen, vec!["http://a.com/", "http://b.com/", "http://c.com/"]);
        assert_eq!(failed, vec![1]);
    }

    #[test]
    fn test_closed_source_is_skipped() {
        let mut merged = MergedRecords::new(vec![
            records(&["http://a.com/", "http://c.com/"]).into_iter(),
            records(&["http://b.com/", "http://d.com/"]).into_iter(),
        ]);
        let first = merged.next().unwrap();
        assert_eq!(first.0, 0);
        merged.close_source(1);
        assert_eq!(uris(merged), vec![(0, "http://c.com/".to_string())]);
    }
}
