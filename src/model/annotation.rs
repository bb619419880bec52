//! Annotations and their store.

use std::collections::BTreeMap;

use super::geometry::Point;
use super::sequence::BoundingBoxSequence;

/// Unique identifier for an annotation.
pub type AnnotationId = u64;

/// A tracked object: exclusively owns one bounding box sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Unique identifier.
    pub id: AnnotationId,
    /// The object's trajectory.
    pub sequence: BoundingBoxSequence,
}

impl Annotation {
    pub fn new(id: AnnotationId, sequence: BoundingBoxSequence) -> Self {
        Self { id, sequence }
    }
}

/// Storage for all annotations of one video.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    /// All annotations, keyed by their ID.
    annotations: BTreeMap<AnnotationId, Annotation>,
    /// Counter for generating unique annotation IDs.
    next_id: AnnotationId,
    /// Currently selected annotation ID.
    selected_id: Option<AnnotationId>,
    /// Set when annotations change; cleared by whoever persists or redraws.
    dirty: bool,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self {
            annotations: BTreeMap::new(),
            next_id: 1,
            selected_id: None,
            dirty: false,
        }
    }

    /// Check if the store has been modified since last clear_dirty().
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Add an annotation owning `sequence` and return its ID.
    pub fn add(&mut self, sequence: BoundingBoxSequence) -> AnnotationId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.annotations.insert(id, Annotation::new(id, sequence));
        self.mark_dirty();
        log::debug!("Added annotation {}", id);
        id
    }

    /// Re-insert an annotation with its original ID (undo, import).
    pub fn restore(&mut self, annotation: Annotation) {
        self.next_id = self.next_id.max(annotation.id + 1);
        self.annotations.insert(annotation.id, annotation);
        self.mark_dirty();
    }

    /// Remove an annotation by ID.
    pub fn remove(&mut self, id: AnnotationId) -> Option<Annotation> {
        let removed = self.annotations.remove(&id);
        if removed.is_some() {
            self.mark_dirty();
            log::debug!("Removed annotation {}", id);
        }
        if self.selected_id == Some(id) {
            self.selected_id = None;
        }
        removed
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.get(&id)
    }

    pub fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.annotations.get_mut(&id)
    }

    /// Sequence of an annotation, if it exists.
    pub fn sequence(&self, id: AnnotationId) -> Option<&BoundingBoxSequence> {
        self.get(id).map(|a| &a.sequence)
    }

    /// Iterate annotations in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Select an annotation (or clear the selection).
    pub fn select(&mut self, id: Option<AnnotationId>) {
        self.selected_id = id.filter(|id| self.annotations.contains_key(id));
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.selected_id
    }

    /// Find the topmost visible annotation whose box at `frame` contains `point`.
    ///
    /// Later annotations are drawn on top, so they win.
    pub fn hit_test(&self, frame: u32, point: &Point) -> Option<AnnotationId> {
        self.annotations
            .values()
            .rev()
            .find(|ann| {
                let sample = ann.sequence.box_at_frame(frame);
                let b = sample.bbox;
                sample.visible
                    && point.x >= b.x
                    && point.x <= b.x + b.width
                    && point.y >= b.y
                    && point.y <= b.y + b.height
            })
            .map(|ann| ann.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingBox;

    fn sequence(x: f32) -> BoundingBoxSequence {
        BoundingBoxSequence::new(0, BoundingBox::new(x, 0.0, 10.0, 10.0), 50).unwrap()
    }

    #[test]
    fn test_annotation_store() {
        let mut store = AnnotationStore::new();
        assert!(store.is_empty());

        let a = store.add(sequence(0.0));
        let b = store.add(sequence(100.0));
        assert_eq!((a, b), (1, 2));
        assert!(store.is_dirty());

        store.select(Some(a));
        assert_eq!(store.selected(), Some(a));
        store.remove(a);
        assert_eq!(store.selected(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_restore_keeps_id_and_advances_counter() {
        let mut store = AnnotationStore::new();
        store.restore(Annotation::new(7, sequence(0.0)));
        assert!(store.get(7).is_some());
        assert_eq!(store.add(sequence(1.0)), 8);
    }

    #[test]
    fn test_select_unknown_is_ignored() {
        let mut store = AnnotationStore::new();
        store.select(Some(42));
        assert_eq!(store.selected(), None);
    }

    #[test]
    fn test_hit_test_respects_visibility() {
        let mut store = AnnotationStore::new();
        let id = store.add(sequence(0.0));
        assert_eq!(store.hit_test(5, &Point::new(5.0, 5.0)), Some(id));
        assert_eq!(store.hit_test(5, &Point::new(50.0, 5.0)), None);

        store
            .get_mut(id)
            .unwrap()
            .sequence
            .set_visible(0, 10, false)
            .unwrap();
        assert_eq!(store.hit_test(5, &Point::new(5.0, 5.0)), None);
        assert_eq!(store.hit_test(10, &Point::new(5.0, 5.0)), Some(id));
    }
}
