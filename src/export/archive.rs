//! Archive Builder Module
//! Bundles the per-department workbooks into one in-memory ZIP buffer.

use std::io::{Cursor, Write};

use tracing::debug;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::export::partition::Partition;
use crate::export::xlsx::{ExportError, XlsxWriter};

/// Packs every partition group into a deflated ZIP archive.
///
/// The archive is assembled entirely in memory, so no temporary files are
/// left behind on either the success or the failure path.
pub struct ArchiveBuilder;

impl ArchiveBuilder {
    /// Serialize each group to a workbook and collect them into one
    /// ZIP byte buffer, in first-seen group order.
    pub fn build(partition: &Partition) -> Result<Vec<u8>, ExportError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();

        for group in partition.groups() {
            let name = group.file_name();
            let workbook = XlsxWriter::workbook_bytes(&group.table)?;
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&workbook)?;
            debug!(entry = %name, rows = group.table.height() - 1, "archived group");
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}
