//! Labeled dataset files: record types, readers and writers.

mod reader;
mod record;
mod writer;

pub use reader::{parse_dataset, read_dataset, Dataset};
pub use record::{DatasetFormat, DropReason, DroppedRow, Record};
pub use writer::{render_dataset, write_dataset};
