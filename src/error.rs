use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures of the polyphase sort engine. All of them are fatal to the sort.
#[derive(Error, Debug)]
pub enum SortError {
    #[error("scratch file I/O failed: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("writing sorted output failed: {0}")]
    Output(#[source] std::io::Error),

    #[error("line contains an embedded newline: {0:?}")]
    EmbeddedNewline(String),

    #[error("line source failed: {0}")]
    Source(String),
}

/// Failures reported by a record sink.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,

    #[error("writing to output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serializing record failed: {0}")]
    Format(#[from] serde_json::Error),

    #[error("sort failed: {0}")]
    Sort(#[from] SortError),

    #[error("background sort task failed: {0}")]
    TaskFailed(String),
}

impl SinkError {
    /// True when the sink can no longer accept records and the batch should stop feeding it.
    /// A record that fails to serialize only fails its own input file.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SinkError::Format(_))
    }
}

/// Failures while reading an archive or CDX input. Local to one input file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("not a (W)ARC or CDX file: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("malformed {kind} record at offset {offset}: {message}")]
    Malformed {
        kind: &'static str,
        offset: u64,
        message: String,
    },

    #[error("malformed CDX line {line_number}: {message}")]
    MalformedCdx { line_number: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    pub fn malformed(kind: &'static str, offset: u64, message: impl Into<String>) -> Self {
        ParseError::Malformed {
            kind,
            offset,
            message: message.into(),
        }
    }
}

/// Why one input file could not be indexed completely.
#[derive(Error, Debug)]
pub enum ProducerError {
    #[error(transparent)]
    Input(#[from] ParseError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("producer task panicked: {0}")]
    Panicked(String),

    #[error("batch was stopped before this file finished")]
    Cancelled,
}

/// Failures of a whole extraction batch.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("all {0} input files failed")]
    AllInputsFailed(usize),

    #[error("producers did not finish within {0:?}")]
    Timeout(Duration),

    #[error("sink is still referenced after all producers finished")]
    SinkStillShared,
}

/// A command line or output layout problem found before any work starts.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct UsageError(pub String);
