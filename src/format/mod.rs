//! Persistence: the JSONL exchange format and the background writer.
//!
//! ## Wire format
//!
//! Each line of an export is one [`AnnotationRecord`]: the annotation ID and
//! its `boundingBoxSequence` (see [`record`] for the full shape). Exports hold
//! keyframes only unless [`ExportOptions::dense`] is set.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vtat::format::{ExportOptions, read_jsonl, write_jsonl};
//!
//! write_jsonl(&store, path, &ExportOptions::new().dense(true))?;
//! let store = read_jsonl(path)?.into_store();
//! ```

mod auto_save;
mod error;
mod jsonl;
pub mod record;
mod report;
mod store;
mod writer;

#[cfg(test)]
mod tests;

pub use auto_save::AutoSaveManager;
pub use error::FormatError;
pub use jsonl::{export_jsonl, import_jsonl, read_jsonl, write_jsonl};
pub use record::{AnnotationRecord, BoxRecord, SequenceRecord};
pub use report::{
    ExportOptions, ExportResult, FormatWarning, ImportResult, WarningSeverity,
};
pub use store::{FileSequenceStore, MemorySequenceStore, SequenceStore};
pub use writer::{PersistenceWriter, RetryPolicy, WriteOp, WriterNotice};
