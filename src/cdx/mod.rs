pub mod format;
pub mod merge;
pub mod reader;
pub mod record;
pub mod surt;

#[cfg(test)]
mod tests;

pub use format::CdxFormat;
pub use merge::MergedRecords;
pub use reader::{CdxLayout, CdxReader};
pub use record::{Record, RevisitTarget};
