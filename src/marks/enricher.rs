//! Table Enricher Module
//! Infers per-subject column blocks and injects computed mark columns.

use tracing::debug;

use crate::data::{Cell, Table};
use crate::marks::{MarkSplitter, SplitMarks};

/// The three fixed leading columns of every marksheet.
pub const FIXED_HEADERS: [&str; 3] = ["Register No", "Name", "College ID"];

/// Width of one subject block in the raw table.
const RAW_BLOCK: usize = 4;
/// Width of one subject block after enrichment.
const ENRICHED_BLOCK: usize = 7;
/// Offset of the Marks column within a raw subject block.
const MARKS_OFFSET: usize = 2;

/// Expands each 4-column subject block (Code, Name, Marks, Result) into a
/// 7-column block by appending Internal, External and Total columns
/// computed from the Marks cell.
pub struct TableEnricher;

impl TableEnricher {
    /// Number of subject blocks in a raw table of the given width.
    pub fn subject_count(width: usize) -> usize {
        width.saturating_sub(FIXED_HEADERS.len()) / RAW_BLOCK
    }

    /// Enrich a raw headerless table.
    ///
    /// The output gains a synthesized header row; each row is rebuilt by
    /// interleaving the original cells with the computed cells against the
    /// original column layout, so no in-place column shifting happens.
    pub fn enrich(raw: &Table) -> Table {
        let width = raw.width();
        let subjects = Self::subject_count(width);
        let extras = width.saturating_sub(FIXED_HEADERS.len() + subjects * RAW_BLOCK);
        debug!(width, subjects, extras, rows = raw.height(), "enriching table");

        let mut rows = Vec::with_capacity(raw.height() + 1);
        rows.push(Self::header(width, subjects, extras));
        for row in raw.rows() {
            rows.push(Self::enrich_row(row, subjects, extras));
        }
        Table::from_rows(rows)
    }

    /// Synthesized header: the fixed labels, one 7-label group per
    /// subject, then placeholder labels for any trailing columns.
    fn header(width: usize, subjects: usize, extras: usize) -> Vec<Cell> {
        let fixed = FIXED_HEADERS.len().min(width);
        let mut header: Vec<Cell> = FIXED_HEADERS[..fixed].iter().map(|&h| Cell::from(h)).collect();
        for i in 1..=subjects {
            for label in ["Subject Code", "Subject Name", "Marks", "Result", "Internal", "External", "Total"] {
                header.push(Cell::Text(format!("{} {}", label, i)));
            }
        }
        for i in 1..=extras {
            header.push(Cell::Text(format!("Extra {}", i)));
        }
        header
    }

    fn enrich_row(row: &[Cell], subjects: usize, extras: usize) -> Vec<Cell> {
        let fixed = FIXED_HEADERS.len().min(row.len());
        let mut out = Vec::with_capacity(fixed + subjects * ENRICHED_BLOCK + extras);
        out.extend_from_slice(&row[..fixed]);

        for subject in 0..subjects {
            let start = FIXED_HEADERS.len() + subject * RAW_BLOCK;
            out.extend_from_slice(&row[start..start + RAW_BLOCK]);

            let marks = MarkSplitter::split(&row[start + MARKS_OFFSET]);
            let SplitMarks {
                internal,
                external,
                total,
            } = marks;
            for component in [internal, external, total] {
                out.push(component.map_or(Cell::Empty, Cell::Int));
            }
        }

        let tail = FIXED_HEADERS.len() + subjects * RAW_BLOCK;
        out.extend_from_slice(&row[tail.min(row.len())..]);
        out
    }
}
