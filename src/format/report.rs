//! Results and warnings produced by import/export.

use std::path::PathBuf;

use crate::model::{Annotation, AnnotationId, AnnotationStore};

/// Options for export operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Also write the interpolated frames between keyframes (`isKeyframe: false`).
    pub dense: bool,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dense(mut self, dense: bool) -> Self {
        self.dense = dense;
        self
    }
}

/// Result of an export operation.
#[derive(Debug, Default)]
pub struct ExportResult {
    pub annotations_exported: usize,

    /// Box entries written, keyframes plus interpolated frames for dense export.
    pub boxes_exported: usize,

    /// Files created during export.
    pub files_created: Vec<PathBuf>,
}

/// Result of an import operation.
#[derive(Debug, Default)]
pub struct ImportResult {
    pub annotations: Vec<Annotation>,

    /// Non-fatal problems (recomputed counts, missing segments).
    pub warnings: Vec<FormatWarning>,
}

impl ImportResult {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Build a store holding the imported annotations under their file IDs.
    pub fn into_store(self) -> AnnotationStore {
        let mut store = AnnotationStore::new();
        for annotation in self.annotations {
            store.restore(annotation);
        }
        store.clear_dirty();
        store
    }
}

/// Warning generated during format conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatWarning {
    /// Annotation this warning relates to (if applicable).
    pub annotation_id: Option<AnnotationId>,

    /// Human-readable warning message.
    pub message: String,

    pub severity: WarningSeverity,
}

impl FormatWarning {
    pub fn new(message: impl Into<String>, severity: WarningSeverity) -> Self {
        Self {
            annotation_id: None,
            message: message.into(),
            severity,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, WarningSeverity::Info)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, WarningSeverity::Warning)
    }

    /// Set the annotation this warning relates to.
    pub fn with_annotation(mut self, id: AnnotationId) -> Self {
        self.annotation_id = Some(id);
        self
    }
}

/// Severity level for format warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    /// Informational message, not a problem.
    Info,
    /// Something was recomputed or filled in.
    Warning,
}
