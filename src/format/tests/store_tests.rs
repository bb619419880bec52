//! Tests for the sequence stores.

use super::{create_test_store, scratch_dir};
use crate::format::{
    FileSequenceStore, MemorySequenceStore, SequenceRecord, SequenceStore,
};

#[test]
fn test_file_store_save_and_load() {
    let dir = scratch_dir("file-store");
    let mut store = FileSequenceStore::open(&dir).unwrap();
    let annotations = create_test_store();

    for annotation in annotations.iter() {
        let record = SequenceRecord::from_sequence(&annotation.sequence, false);
        store.save(annotation.id, &record).unwrap();
    }
    assert!(dir.join("annotation-1.json").exists());
    assert!(!dir.join("annotation-1.json.tmp").exists());

    let records = store.load_all().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, 1);
    let (sequence, warnings) = records[1].bounding_box_sequence.to_sequence(2).unwrap();
    assert!(warnings.is_empty());
    assert_eq!(Some(&sequence), annotations.sequence(2));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_file_store_overwrite_and_delete() {
    let dir = scratch_dir("file-store-delete");
    let mut store = FileSequenceStore::open(&dir).unwrap();
    let annotations = create_test_store();
    let first = SequenceRecord::from_sequence(annotations.sequence(1).unwrap(), false);
    let second = SequenceRecord::from_sequence(annotations.sequence(2).unwrap(), false);

    store.save(7, &first).unwrap();
    store.save(7, &second).unwrap();
    let records = store.load_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].bounding_box_sequence, second);

    store.delete(7).unwrap();
    store.delete(7).unwrap();
    assert!(store.load_all().unwrap().is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_file_store_ignores_foreign_files() {
    let dir = scratch_dir("file-store-foreign");
    let store = FileSequenceStore::open(&dir).unwrap();
    std::fs::write(dir.join("notes.txt"), "hello").unwrap();
    std::fs::write(dir.join("annotation-x.json"), "{}").unwrap();
    assert!(store.load_all().unwrap().is_empty());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_memory_store_shared_between_clones() {
    let annotations = create_test_store();
    let record = SequenceRecord::from_sequence(annotations.sequence(1).unwrap(), false);

    let mut store = MemorySequenceStore::new();
    let observer = store.clone();
    store.save(1, &record).unwrap();
    assert_eq!(observer.get(1), Some(record));
    assert_eq!(observer.len(), 1);

    store.delete(1).unwrap();
    assert!(observer.is_empty());
}
