//! Tests for the exchange format, the sequence stores and the background writer.

mod jsonl_tests;
mod store_tests;

use crate::model::{
    AnnotationStore, BoundingBox, BoundingBoxSequence, InterpolationType, TrackingSource,
};

/// Two annotations: one eased with a hidden stretch, one from a tracker.
fn create_test_store() -> AnnotationStore {
    let mut store = AnnotationStore::new();

    let mut manual =
        BoundingBoxSequence::new(0, BoundingBox::new(0.0, 0.0, 100.0, 100.0), 100).unwrap();
    manual
        .add_keyframe(50, Some(BoundingBox::new(100.0, 100.0, 100.0, 100.0)))
        .unwrap();
    manual
        .add_keyframe(80, Some(BoundingBox::new(150.0, 100.0, 80.0, 80.0)))
        .unwrap();
    manual
        .set_interpolation_type(50, InterpolationType::EaseInOut, None)
        .unwrap();
    manual.set_visible(60, 70, false).unwrap();
    store.add(manual);

    let mut tracked =
        BoundingBoxSequence::new(10, BoundingBox::new(5.0, 5.0, 20.0, 20.0), 100).unwrap();
    tracked
        .add_keyframe(15, Some(BoundingBox::new(10.0, 5.0, 20.0, 20.0)))
        .unwrap();
    tracked.set_tracking_source(TrackingSource::Model("sam2".to_string()));
    store.add(tracked);

    store
}

/// Unique scratch directory for a test.
fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("vtat-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}
