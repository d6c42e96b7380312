//! Marks module - mark splitting and table enrichment

mod enricher;
mod splitter;

pub use enricher::{TableEnricher, FIXED_HEADERS};
pub use splitter::{MarkSplitter, SplitMarks};
