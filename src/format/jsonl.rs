//! JSON Lines import/export: one annotation per line.

use std::collections::HashSet;
use std::path::Path;

use super::error::FormatError;
use super::record::AnnotationRecord;
use super::report::{ExportOptions, ExportResult, ImportResult};
use crate::model::AnnotationStore;

/// Serialize every annotation in `store`, in ID order.
pub fn export_jsonl(
    store: &AnnotationStore,
    options: &ExportOptions,
) -> Result<(String, ExportResult), FormatError> {
    let mut out = String::new();
    let mut result = ExportResult::default();
    for annotation in store.iter() {
        let record = AnnotationRecord::from_annotation(annotation, options.dense);
        result.boxes_exported += record.bounding_box_sequence.boxes.len();
        out.push_str(&serde_json::to_string(&record)?);
        out.push('\n');
        result.annotations_exported += 1;
    }
    log::debug!(
        "Exported {} annotations ({} boxes, dense = {})",
        result.annotations_exported,
        result.boxes_exported,
        options.dense
    );
    Ok((out, result))
}

/// Export to a file.
pub fn write_jsonl(
    store: &AnnotationStore,
    path: &Path,
    options: &ExportOptions,
) -> Result<ExportResult, FormatError> {
    log::info!("Exporting annotations to {:?}", path);
    let (text, mut result) = export_jsonl(store, options)?;
    std::fs::write(path, text)?;
    result.files_created.push(path.to_path_buf());
    log::info!(
        "Exported {} annotations with {} boxes",
        result.annotations_exported,
        result.boxes_exported
    );
    Ok(result)
}

/// Parse JSONL text. Blank lines are skipped.
///
/// Errors carry the 1-based line number. Duplicate annotation IDs are rejected.
pub fn import_jsonl(text: &str) -> Result<ImportResult, FormatError> {
    let mut result = ImportResult::default();
    let mut seen = HashSet::new();

    for (index, line) in text.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let record: AnnotationRecord =
            serde_json::from_str(line).map_err(|e| FormatError::from(e).at_line(line_number))?;
        if !seen.insert(record.id) {
            return Err(
                FormatError::invalid_format(format!("duplicate annotation id {}", record.id))
                    .at_line(line_number),
            );
        }
        let (annotation, warnings) = record
            .to_annotation()
            .map_err(|e| e.at_line(line_number))?;
        result.annotations.push(annotation);
        result.warnings.extend(warnings);
    }

    log::debug!(
        "Imported {} annotations with {} warnings",
        result.annotations.len(),
        result.warnings.len()
    );
    Ok(result)
}

/// Import from a file.
pub fn read_jsonl(path: &Path) -> Result<ImportResult, FormatError> {
    log::info!("Importing annotations from {:?}", path);
    let text = std::fs::read_to_string(path)?;
    let result = import_jsonl(&text)?;
    log::info!("Imported {} annotations", result.annotations.len());
    Ok(result)
}
