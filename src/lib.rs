//! markbook - Marksheet Processing & Department-wise Excel Export
//!
//! Ingests a tabular marksheet (xlsx workbook or delimited text),
//! decomposes per-subject mark strings into internal/external/total
//! components, and re-exports the enriched table partitioned into
//! per-department, per-batch workbooks bundled into a single ZIP archive.
//!
//! The hosting shell owns all interactive state; this crate is the pure
//! boundary from input bytes to archive bytes:
//!
//! ```no_run
//! let bytes = std::fs::read("marksheet.xlsx")?;
//! let archive = markbook::process_marksheet(&bytes, markbook::SourceFormat::Xlsx)?;
//! std::fs::write("department_batch_excel_files.zip", archive)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod data;
pub mod export;
pub mod marks;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

pub use data::{Cell, LoaderError, SourceFormat, Table, TableLoader};
pub use export::{ArchiveBuilder, DepartmentPartitioner, ExportError, Partition, XlsxWriter};
pub use marks::{MarkSplitter, SplitMarks, TableEnricher};

/// MIME type of the returned archive.
pub const ARCHIVE_MIME_TYPE: &str = "application/zip";

/// Process an uploaded marksheet into the department/batch ZIP archive.
///
/// One linear run: decode, enrich, partition, archive. Cell-level parse
/// failures and excluded rows degrade silently; only structural problems
/// (unreadable source, broken workbook) surface, as a single error.
pub fn process_marksheet(bytes: &[u8], format: SourceFormat) -> Result<Vec<u8>> {
    let raw = TableLoader::load_bytes(bytes, format).context("failed to read marksheet")?;
    info!(rows = raw.height(), cols = raw.width(), "marksheet loaded");

    let enriched = TableEnricher::enrich(&raw);
    let partition = DepartmentPartitioner::partition(&enriched);
    info!(groups = partition.len(), "partitioned by department and batch");

    let archive = ArchiveBuilder::build(&partition).context("failed to build archive")?;
    info!(size = archive.len(), "archive ready");
    Ok(archive)
}

/// Process a marksheet file, inferring the source format from its
/// extension.
pub fn process_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let format = SourceFormat::from_path(path)
        .ok_or_else(|| anyhow::anyhow!("Unsupported file type: {}", path.display()))?;
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    process_marksheet(&bytes, format)
}
