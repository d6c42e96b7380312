//! Mark Splitter Module
//! Decomposes one mark cell into internal, external and total components.

use crate::data::Cell;

/// Split result for a single mark cell.
///
/// An unparseable cell yields all-`None`; the enricher renders each `None`
/// component as an empty cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SplitMarks {
    pub internal: Option<i64>,
    pub external: Option<i64>,
    pub total: Option<i64>,
}

impl SplitMarks {
    fn none() -> Self {
        Self::default()
    }

    fn total_only(total: i64) -> Self {
        Self {
            internal: None,
            external: None,
            total: Some(total),
        }
    }
}

/// Parses mark cells in both formats: `"040+043"` and `"040"`.
pub struct MarkSplitter;

impl MarkSplitter {
    /// Split a mark cell.
    ///
    /// Numeric cells carry a total only; string cells are parsed as either
    /// `internal+external` or a plain total. Every parse failure degrades
    /// to the all-`None` result, never an error.
    pub fn split(cell: &Cell) -> SplitMarks {
        match cell {
            Cell::Empty => SplitMarks::none(),
            Cell::Int(v) => SplitMarks::total_only(*v),
            Cell::Float(v) => SplitMarks::total_only(*v as i64),
            Cell::Text(s) => {
                if s.is_empty() {
                    return SplitMarks::none();
                }
                Self::split_str(s.trim())
            }
        }
    }

    fn split_str(marks: &str) -> SplitMarks {
        if let Some((internal, external)) = marks.split_once('+') {
            // Both halves must be plain digit runs; a second '+', a sign
            // or a blank half is malformed.
            match (Self::parse_digits(internal), Self::parse_digits(external)) {
                (Some(i), Some(e)) => match i.checked_add(e) {
                    Some(total) => SplitMarks {
                        internal: Some(i),
                        external: Some(e),
                        total: Some(total),
                    },
                    None => SplitMarks::none(),
                },
                _ => SplitMarks::none(),
            }
        } else {
            match marks.parse::<i64>() {
                Ok(total) => SplitMarks::total_only(total),
                Err(_) => SplitMarks::none(),
            }
        }
    }

    /// Parse a non-empty all-digit string, tolerating leading zeros
    /// ("000" parses as 0).
    fn parse_digits(part: &str) -> Option<i64> {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse::<i64>().ok()
    }
}
