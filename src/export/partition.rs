//! Department Partitioner Module
//! Groups enriched rows into per-department, per-batch output tables.

use std::collections::HashMap;

use tracing::debug;

use crate::data::{Cell, Table};

/// Fixed register-number prefix lookup: three-character department code
/// to department name.
pub const DEPARTMENT_CODES: [(&str, &str); 12] = [
    ("28M", "Data Science"),
    ("25F", "BBA"),
    ("25N", "BBAIB"),
    ("2AA", "BCom"),
    ("2AK", "BComPA"),
    ("26U", "Psychology"),
    ("22S", "Viscom"),
    ("21C", "Economics"),
    ("21G", "Tamil"),
    ("31B", "MSW"),
    ("21B", "Political Science"),
    ("31M", "M. Political Science"),
];

/// Resolve a department code to its name.
pub fn department_name(code: &str) -> Option<&'static str> {
    DEPARTMENT_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// One output table: the rows of a single (department, batch) group under
/// the shared header.
#[derive(Debug, Clone)]
pub struct PartitionGroup {
    pub department: &'static str,
    pub batch: String,
    pub table: Table,
}

impl PartitionGroup {
    /// Archive entry name for this group's workbook.
    pub fn file_name(&self) -> String {
        format!("{}_Batch_{}.xlsx", self.department.replace(' ', "_"), self.batch)
    }
}

/// The full partition result, in first-seen group order.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    groups: Vec<PartitionGroup>,
}

impl Partition {
    pub fn groups(&self) -> &[PartitionGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Splits the enriched table into batch-wise tables for each department.
pub struct DepartmentPartitioner;

impl DepartmentPartitioner {
    /// Partition the enriched table by register-number prefix.
    ///
    /// Row 0 is the header and is copied into every group. Rows whose
    /// register number is not text, is too short to slice, or carries an
    /// unrecognized department code are dropped from every output.
    pub fn partition(enriched: &Table) -> Partition {
        let Some(header) = enriched.row(0) else {
            return Partition::default();
        };

        let mut groups: Vec<PartitionGroup> = Vec::new();
        let mut index: HashMap<(&'static str, String), usize> = HashMap::new();

        for (row_idx, row) in enriched.rows().iter().enumerate().skip(1) {
            let Some((department, batch)) = Self::row_key(row) else {
                debug!(row = row_idx, "row excluded from partition");
                continue;
            };

            let key = (department, batch.to_string());
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(PartitionGroup {
                    department,
                    batch: batch.to_string(),
                    table: Table::from_rows(vec![header.to_vec()]),
                });
                groups.len() - 1
            });
            groups[slot].table.push_row(row.to_vec());
        }

        Partition { groups }
    }

    /// Derive the (department, batch) key from a row's register number,
    /// or `None` if the row must be excluded.
    fn row_key(row: &[Cell]) -> Option<(&'static str, &str)> {
        let register = row.first()?.as_text()?;
        let batch = register.get(0..2)?;
        let code = register.get(2..5)?;
        Some((department_name(code)?, batch))
    }
}
