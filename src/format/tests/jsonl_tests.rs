//! Tests for JSONL export/import.

use super::{create_test_store, scratch_dir};
use crate::format::{
    ExportOptions, FormatError, export_jsonl, import_jsonl, read_jsonl, write_jsonl,
};
use crate::model::{BoundingBox, InterpolationType, TrackingSource, VisibilityRange};

#[test]
fn test_export_wire_shape() {
    let store = create_test_store();
    let (text, result) = export_jsonl(&store, &ExportOptions::new()).unwrap();
    assert_eq!(result.annotations_exported, 2);
    assert_eq!(result.boxes_exported, 5);

    let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(first["id"], 1);
    let seq = &first["boundingBoxSequence"];
    assert_eq!(seq["boxes"][1]["frameNumber"], 50);
    assert_eq!(seq["boxes"][1]["isKeyframe"], true);
    assert_eq!(seq["boxes"][1]["width"], 100.0);
    assert_eq!(seq["interpolationSegments"][1]["type"], "ease-in-out");
    assert_eq!(seq["interpolationSegments"][1]["startFrame"], 50);
    assert_eq!(seq["visibilityRanges"][1]["visible"], false);
    assert_eq!(seq["trackingSource"], "manual");
    assert_eq!(seq["totalFrames"], 100);
    assert_eq!(seq["keyframeCount"], 3);
    assert_eq!(seq["interpolatedFrameCount"], 78);

    let second: serde_json::Value = serde_json::from_str(text.lines().nth(1).unwrap()).unwrap();
    assert_eq!(second["boundingBoxSequence"]["trackingSource"], "sam2");
}

#[test]
fn test_export_import_preserves_sequences() {
    let store = create_test_store();
    let (text, _) = export_jsonl(&store, &ExportOptions::new()).unwrap();
    let result = import_jsonl(&text).unwrap();
    assert!(!result.has_warnings());

    let imported = result.into_store();
    assert!(!imported.is_dirty());
    for original in store.iter() {
        assert_eq!(imported.sequence(original.id), Some(&original.sequence));
    }
}

#[test]
fn test_dense_export_marks_interpolated_frames() {
    let store = create_test_store();
    let (text, result) = export_jsonl(&store, &ExportOptions::new().dense(true)).unwrap();
    // [0, 80] and [10, 15]
    assert_eq!(result.boxes_exported, 81 + 6);

    let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    let boxes = first["boundingBoxSequence"]["boxes"].as_array().unwrap();
    assert_eq!(boxes[25]["frameNumber"], 25);
    assert_eq!(boxes[25]["isKeyframe"], false);
    assert_eq!(boxes[25]["x"], 50.0);

    // Importing a dense export recovers the same keyframes.
    let imported = import_jsonl(&text).unwrap().into_store();
    assert_eq!(imported.sequence(1), store.sequence(1));
}

#[test]
fn test_import_unflagged_boxes_are_keyframes() {
    let line = r#"{"id": 4, "boundingBoxSequence": {
        "boxes": [
            {"x": 10, "y": 0, "width": 5, "height": 5, "frameNumber": 20},
            {"x": 0, "y": 0, "width": 5, "height": 5, "frameNumber": 0}
        ],
        "totalFrames": 30
    }}"#
    .replace('\n', " ");
    let result = import_jsonl(&line).unwrap();
    // Missing segment falls back to linear with a warning.
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].annotation_id, Some(4));

    let annotation = &result.annotations[0];
    let seq = &annotation.sequence;
    assert_eq!(seq.keyframe_count(), 2);
    assert_eq!(seq.segments()[0].kind, InterpolationType::Linear);
    assert_eq!(seq.visibility_ranges(), &[VisibilityRange::new(0, 30, true)]);
    assert_eq!(seq.tracking_source(), &TrackingSource::Manual);
    assert_eq!(seq.box_at_frame(10).bbox, BoundingBox::new(5.0, 0.0, 5.0, 5.0));
}

#[test]
fn test_import_normalizes_visibility() {
    let line = r#"{"id": 1, "boundingBoxSequence": {"boxes": [{"x": 0, "y": 0, "width": 5, "height": 5, "frameNumber": 0, "isKeyframe": true}], "visibilityRanges": [{"startFrame": 0, "endFrame": 15, "visible": true}, {"startFrame": 20, "endFrame": 90, "visible": false}], "totalFrames": 60}}"#;
    let result = import_jsonl(line).unwrap();
    let seq = &result.annotations[0].sequence;
    assert_eq!(
        seq.visibility_ranges(),
        &[VisibilityRange::new(0, 20, true), VisibilityRange::new(20, 60, false)]
    );
}

#[test]
fn test_import_warns_on_stale_counts() {
    let line = r#"{"id": 1, "boundingBoxSequence": {"boxes": [{"x": 0, "y": 0, "width": 5, "height": 5, "frameNumber": 0, "isKeyframe": true}], "totalFrames": 10, "keyframeCount": 3, "interpolatedFrameCount": 0}}"#;
    let result = import_jsonl(line).unwrap();
    assert_eq!(result.warnings.len(), 1);
    assert!(result.warnings[0].message.contains("keyframeCount"));
}

#[test]
fn test_import_errors_carry_line_numbers() {
    let store = create_test_store();
    let (text, _) = export_jsonl(&store, &ExportOptions::new()).unwrap();

    let broken = format!("{}\n\nnot json\n", text.lines().next().unwrap());
    let err = import_jsonl(&broken).unwrap_err();
    assert_eq!(err.line(), Some(3));

    let duplicated = format!("{text}{}\n", text.lines().next().unwrap());
    let err = import_jsonl(&duplicated).unwrap_err();
    assert_eq!(err.line(), Some(3));

    let empty = r#"{"id": 1, "boundingBoxSequence": {"boxes": [], "totalFrames": 10}}"#;
    let err = import_jsonl(empty).unwrap_err();
    match err {
        FormatError::AtLine { line, source } => {
            assert_eq!(line, 1);
            assert!(matches!(*source, FormatError::MissingField { .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_import_rejects_keyframe_outside_video() {
    let line = r#"{"id": 1, "boundingBoxSequence": {"boxes": [{"x": 0, "y": 0, "width": 5, "height": 5, "frameNumber": 12, "isKeyframe": true}], "totalFrames": 10}}"#;
    let err = import_jsonl(line).unwrap_err();
    match err {
        FormatError::AtLine { source, .. } => {
            assert!(matches!(*source, FormatError::InvalidSequence { id: 1, .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_import_rejects_negative_box() {
    let line = r#"{"id": 4, "boundingBoxSequence": {"boxes": [{"x": 0, "y": 0, "width": -5, "height": 5, "frameNumber": 2, "isKeyframe": true}], "totalFrames": 10}}"#;
    let err = import_jsonl(line).unwrap_err();
    match err {
        FormatError::AtLine { source, .. } => {
            assert!(matches!(*source, FormatError::InvalidSequence { id: 4, .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_file_roundtrip() {
    let dir = scratch_dir("jsonl");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("export.jsonl");

    let store = create_test_store();
    let result = write_jsonl(&store, &path, &ExportOptions::new()).unwrap();
    assert_eq!(result.files_created, vec![path.clone()]);

    let imported = read_jsonl(&path).unwrap().into_store();
    assert_eq!(imported.len(), 2);
    assert_eq!(imported.sequence(2), store.sequence(2));
    let _ = std::fs::remove_dir_all(&dir);
}
