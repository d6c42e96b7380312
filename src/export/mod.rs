//! Export module - department partitioning and archive generation

mod archive;
mod partition;
mod xlsx;

pub use archive::ArchiveBuilder;
pub use partition::{department_name, DepartmentPartitioner, Partition, PartitionGroup, DEPARTMENT_CODES};
pub use xlsx::{ExportError, XlsxWriter};
