use anyhow::Result;
use tracing::info;

use super::{run_index, IndexOptions};
use crate::config::SiftConfig;
use crate::error::UsageError;
use crate::pipeline::{BatchReport, InputKind};
use crate::utils::expand_inputs;

/// Indexes ARC and WARC files. Directories among the inputs are searched for archives.
pub async fn extract(options: &IndexOptions, config: &SiftConfig) -> Result<BatchReport> {
    let inputs = expand_inputs(&options.input)?;
    if inputs.is_empty() {
        return Err(UsageError("No archive files found in the given inputs".to_string()).into());
    }

    info!(
        "Extracting {} index from {} files{}",
        options.format,
        inputs.len(),
        if options.sort { ", sorted" } else { "" }
    );
    run_index(options, &inputs, InputKind::Archive, config).await
}
