use anyhow::Result;
use tracing::info;

use super::{run_index, IndexOptions};
use crate::config::SiftConfig;
use crate::pipeline::{BatchReport, InputKind};

/// Rewrites existing CDX files into another format, optionally sorting them.
pub async fn reformat(options: &IndexOptions, config: &SiftConfig) -> Result<BatchReport> {
    info!("Reformatting {} files into {}", options.input.len(), options.format);
    run_index(options, &options.input, InputKind::Cdx, config).await
}
