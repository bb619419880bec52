//! Review of tracker candidates: accept into annotations or reject.

use std::collections::HashMap;

use super::decimate::{all_keyframes, decimate};
use super::service::TrackingRequest;
use crate::error::EditError;
use crate::model::{
    AnnotationId, AnnotationStore, BoundingBoxSequence, Track, TrackId, TrackStatus,
    TrackingSource,
};

/// Result of a batch accept: what was accepted and what failed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchAcceptReport {
    pub accepted: Vec<(TrackId, AnnotationId)>,
    pub failed: Vec<(TrackId, EditError)>,
}

impl BatchAcceptReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Candidate tracks from the last tracking run and their review state.
#[derive(Debug, Clone)]
pub struct TrackIngestion {
    tracks: Vec<Track>,
    /// Annotation created for each accepted track
    accepted: HashMap<TrackId, AnnotationId>,
    /// Interval asked for by the request that delivered each track
    requested_decimation: HashMap<TrackId, u32>,
    total_frames: u32,
    /// Decimation used when neither the caller nor the request give one
    default_decimation: Option<u32>,
}

impl TrackIngestion {
    pub fn new(total_frames: u32) -> Self {
        Self {
            tracks: Vec::new(),
            accepted: HashMap::new(),
            requested_decimation: HashMap::new(),
            total_frames,
            default_decimation: None,
        }
    }

    pub fn with_default_decimation(mut self, interval: Option<u32>) -> Self {
        self.default_decimation = interval;
        self
    }

    /// Take the tracks returned for `request`.
    ///
    /// Tracks with an ID already under review replace the old entry unless it
    /// was already accepted or rejected.
    pub fn ingest(&mut self, tracks: Vec<Track>, request: &TrackingRequest) {
        let count = tracks.len();
        for mut track in tracks {
            track.normalize();
            if track.model_name.is_empty() {
                track.model_name = request.model_name.clone();
            }
            match self.tracks.iter_mut().find(|t| t.id == track.id) {
                Some(existing) if existing.is_pending() => {
                    Self::remember_decimation(&mut self.requested_decimation, &track, request);
                    *existing = track;
                }
                Some(existing) => {
                    log::debug!(
                        "Ignoring re-delivered track {} ({:?})",
                        existing.id,
                        existing.status
                    );
                }
                None => {
                    Self::remember_decimation(&mut self.requested_decimation, &track, request);
                    self.tracks.push(track);
                }
            }
        }
        log::info!(
            "Ingested {} tracks from {} for video {}",
            count,
            request.model_name,
            request.video_id
        );
    }

    /// All tracks, in arrival order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Tracks still awaiting review.
    pub fn pending(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|t| t.is_pending())
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn track(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == id)
    }

    /// Annotation created when `id` was accepted.
    pub fn annotation_for(&self, id: &TrackId) -> Option<AnnotationId> {
        self.accepted.get(id).copied()
    }

    /// Build the sequence an accepted track would produce.
    ///
    /// Segments are linear and every frame is visible.
    pub fn sequence_from_track(
        &self,
        track: &Track,
        decimation: Option<u32>,
    ) -> Result<BoundingBoxSequence, EditError> {
        if track.detections.is_empty() {
            return Err(EditError::invalid(format!(
                "track {} has no detections",
                track.id
            )));
        }
        let interval = decimation
            .or_else(|| self.requested_decimation.get(&track.id).copied())
            .or(self.default_decimation);
        let keyframes = match interval {
            Some(interval) => decimate(track, interval)?,
            None => all_keyframes(track),
        };
        BoundingBoxSequence::from_keyframes(
            keyframes,
            self.total_frames,
            TrackingSource::Model(track.model_name.clone()),
        )
    }

    /// Accept a track into `store` as a new annotation.
    ///
    /// Accepting the same track again returns the existing annotation while
    /// it is still in `store`.
    pub fn accept_track(
        &mut self,
        store: &mut AnnotationStore,
        id: &TrackId,
        decimation: Option<u32>,
    ) -> Result<AnnotationId, EditError> {
        if let Some(&annotation_id) = self.accepted.get(id) {
            if store.get(annotation_id).is_some() {
                return Ok(annotation_id);
            }
            // The annotation was removed (e.g. undone); accept again.
            self.accepted.remove(id);
        }
        let index = self.index_of(id)?;
        let track = &self.tracks[index];
        if track.status == TrackStatus::Rejected {
            return Err(EditError::conflict(format!("track {id} was rejected")));
        }

        let sequence = self.sequence_from_track(track, decimation)?;
        let keyframes = sequence.keyframe_count();
        let annotation_id = store.add(sequence);
        self.tracks[index].status = TrackStatus::Accepted;
        self.accepted.insert(id.clone(), annotation_id);
        log::info!(
            "Accepted track {} as annotation {} ({} keyframes)",
            id,
            annotation_id,
            keyframes
        );
        Ok(annotation_id)
    }

    /// Bring review state in line with `store` after the annotations `ids`
    /// were removed or restored by undo/redo.
    ///
    /// A track whose annotation is gone is pending again; it becomes
    /// accepted again when the annotation comes back.
    pub fn sync_review_state(&mut self, store: &AnnotationStore, ids: &[AnnotationId]) {
        for track in &mut self.tracks {
            let Some(&annotation_id) = self.accepted.get(&track.id) else {
                continue;
            };
            if !ids.contains(&annotation_id) || track.status == TrackStatus::Rejected {
                continue;
            }
            let status = if store.get(annotation_id).is_some() {
                TrackStatus::Accepted
            } else {
                TrackStatus::Pending
            };
            if track.status != status {
                log::debug!("Track {} is {:?} again", track.id, status);
                track.status = status;
            }
        }
    }

    /// Mark a track rejected. Rejecting twice is a no-op.
    pub fn reject_track(&mut self, id: &TrackId) -> Result<(), EditError> {
        let index = self.index_of(id)?;
        let track = &mut self.tracks[index];
        match track.status {
            TrackStatus::Accepted => Err(EditError::conflict(format!(
                "track {id} was already accepted"
            ))),
            TrackStatus::Rejected => Ok(()),
            TrackStatus::Pending => {
                track.status = TrackStatus::Rejected;
                self.accepted.remove(id);
                log::info!("Rejected track {}", id);
                Ok(())
            }
        }
    }

    /// Accept every pending track whose mean confidence is at least `threshold`.
    ///
    /// Failures are collected and do not stop the batch.
    pub fn accept_all_above_confidence(
        &mut self,
        store: &mut AnnotationStore,
        threshold: f32,
        decimation: Option<u32>,
    ) -> BatchAcceptReport {
        let candidates: Vec<TrackId> = self
            .pending()
            .filter(|t| t.confidence() >= threshold)
            .map(|t| t.id.clone())
            .collect();

        let mut report = BatchAcceptReport::default();
        for id in candidates {
            match self.accept_track(store, &id, decimation) {
                Ok(annotation_id) => report.accepted.push((id, annotation_id)),
                Err(e) => {
                    log::warn!("Failed to accept track {}: {}", id, e);
                    report.failed.push((id, e));
                }
            }
        }
        log::info!(
            "Batch accept at confidence {:.2}: {} accepted, {} failed",
            threshold,
            report.accepted.len(),
            report.failed.len()
        );
        report
    }

    /// Forget every track that is no longer pending.
    pub fn clear_reviewed(&mut self) {
        self.tracks.retain(|t| t.is_pending());
        let tracks = &self.tracks;
        self.requested_decimation
            .retain(|id, _| tracks.iter().any(|t| &t.id == id));
    }

    fn remember_decimation(
        requested: &mut HashMap<TrackId, u32>,
        track: &Track,
        request: &TrackingRequest,
    ) {
        match request.decimation_interval {
            Some(interval) => requested.insert(track.id.clone(), interval),
            None => requested.remove(&track.id),
        };
    }

    fn index_of(&self, id: &TrackId) -> Result<usize, EditError> {
        self.tracks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| EditError::not_found(format!("no track with id {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, Detection};

    fn track(id: &str, confidence: f32, frames: std::ops::RangeInclusive<u32>) -> Track {
        let detections = frames
            .map(|f| Detection::new(f, BoundingBox::new(f as f32, 0.0, 10.0, 10.0), confidence))
            .collect();
        Track::new(TrackId::new(id), "", detections)
    }

    fn ingestion_with(tracks: Vec<Track>) -> TrackIngestion {
        let mut ingestion = TrackIngestion::new(200);
        ingestion.ingest(tracks, &TrackingRequest::new("video", "sam2"));
        ingestion
    }

    #[test]
    fn test_ingest_fills_model_name() {
        let ingestion = ingestion_with(vec![track("a", 0.9, 0..=3)]);
        assert_eq!(ingestion.tracks()[0].model_name, "sam2");
        assert_eq!(ingestion.pending_count(), 1);
    }

    #[test]
    fn test_accept_track_builds_model_sequence() {
        let mut ingestion = ingestion_with(vec![track("a", 0.9, 10..=30)]);
        let mut store = AnnotationStore::new();
        let id = TrackId::new("a");

        let annotation = ingestion.accept_track(&mut store, &id, Some(5)).unwrap();
        let seq = store.sequence(annotation).unwrap();
        let frames: Vec<u32> = seq.keyframes().iter().map(|k| k.frame).collect();
        assert_eq!(frames, vec![10, 15, 20, 25, 30]);
        assert_eq!(seq.tracking_source(), &TrackingSource::Model("sam2".to_string()));
        assert_eq!(seq.visible_frame_count(), 200);
        assert_eq!(ingestion.track(&id).unwrap().status, TrackStatus::Accepted);
        assert_eq!(ingestion.pending_count(), 0);
    }

    #[test]
    fn test_accept_is_idempotent() {
        let mut ingestion = ingestion_with(vec![track("a", 0.9, 0..=3)]);
        let mut store = AnnotationStore::new();
        let id = TrackId::new("a");
        let first = ingestion.accept_track(&mut store, &id, None).unwrap();
        let second = ingestion.accept_track(&mut store, &id, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);

        // Once the annotation is gone the track can be accepted again.
        store.remove(first);
        let third = ingestion.accept_track(&mut store, &id, None).unwrap();
        assert_ne!(third, first);
        assert_eq!(ingestion.annotation_for(&id), Some(third));
    }

    #[test]
    fn test_accept_errors() {
        let mut ingestion = ingestion_with(vec![track("a", 0.9, 0..=3), track("empty", 0.9, 1..=0)]);
        let mut store = AnnotationStore::new();

        let err = ingestion
            .accept_track(&mut store, &TrackId::new("missing"), None)
            .unwrap_err();
        assert!(matches!(err, EditError::NotFound { .. }));

        let err = ingestion
            .accept_track(&mut store, &TrackId::new("empty"), None)
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidOperation { .. }));

        ingestion.reject_track(&TrackId::new("a")).unwrap();
        let err = ingestion
            .accept_track(&mut store, &TrackId::new("a"), None)
            .unwrap_err();
        assert!(matches!(err, EditError::Conflict { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_reject_accepted_is_conflict() {
        let mut ingestion = ingestion_with(vec![track("a", 0.9, 0..=3)]);
        let mut store = AnnotationStore::new();
        let id = TrackId::new("a");
        ingestion.accept_track(&mut store, &id, None).unwrap();
        assert!(matches!(
            ingestion.reject_track(&id),
            Err(EditError::Conflict { .. })
        ));
    }

    #[test]
    fn test_reject_removes_from_pending() {
        let mut ingestion = ingestion_with(vec![track("a", 0.9, 0..=3), track("b", 0.9, 0..=3)]);
        ingestion.reject_track(&TrackId::new("a")).unwrap();
        let pending: Vec<&str> = ingestion.pending().map(|t| t.id.0.as_str()).collect();
        assert_eq!(pending, vec!["b"]);
        ingestion.reject_track(&TrackId::new("a")).unwrap();
    }

    #[test]
    fn test_accept_all_above_confidence() {
        let mut ingestion = ingestion_with(vec![
            track("high", 0.9, 0..=10),
            track("mid", 0.6, 0..=10),
            track("low", 0.3, 0..=10),
        ]);
        let mut store = AnnotationStore::new();

        let report = ingestion.accept_all_above_confidence(&mut store, 0.5, None);
        assert!(report.is_clean());
        assert_eq!(report.accepted.len(), 2);
        assert_eq!(store.len(), 2);
        let pending: Vec<&str> = ingestion.pending().map(|t| t.id.0.as_str()).collect();
        assert_eq!(pending, vec!["low"]);
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let mut ingestion =
            ingestion_with(vec![track("empty", 0.0, 1..=0), track("ok", 0.8, 0..=4)]);
        let mut store = AnnotationStore::new();

        let report = ingestion.accept_all_above_confidence(&mut store, 0.0, Some(0));
        // Interval 0 fails the non-empty track, the empty one fails first.
        assert_eq!(report.failed.len(), 2);

        let report = ingestion.accept_all_above_confidence(&mut store, 0.0, Some(2));
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, TrackId::new("empty"));
    }

    #[test]
    fn test_decimation_follows_each_request() {
        let mut ingestion = TrackIngestion::new(200);
        ingestion.ingest(
            vec![track("a", 0.9, 0..=20)],
            &TrackingRequest::new("video", "sam2").with_decimation(5),
        );
        ingestion.ingest(
            vec![track("b", 0.9, 0..=20)],
            &TrackingRequest::new("video", "sam2"),
        );
        let mut store = AnnotationStore::new();

        let b = ingestion.accept_track(&mut store, &TrackId::new("b"), None).unwrap();
        assert_eq!(store.sequence(b).unwrap().keyframe_count(), 21);
        let a = ingestion.accept_track(&mut store, &TrackId::new("a"), None).unwrap();
        assert_eq!(store.sequence(a).unwrap().keyframe_count(), 5);
    }

    #[test]
    fn test_configured_decimation_is_fallback() {
        let mut ingestion = TrackIngestion::new(200).with_default_decimation(Some(10));
        ingestion.ingest(
            vec![track("a", 0.9, 0..=20), track("b", 0.9, 0..=20)],
            &TrackingRequest::new("video", "sam2"),
        );
        let mut store = AnnotationStore::new();
        let a = ingestion.accept_track(&mut store, &TrackId::new("a"), None).unwrap();
        assert_eq!(store.sequence(a).unwrap().keyframe_count(), 3);
        // An explicit interval wins over both.
        let b = ingestion.accept_track(&mut store, &TrackId::new("b"), Some(20)).unwrap();
        assert_eq!(store.sequence(b).unwrap().keyframe_count(), 2);
    }

    #[test]
    fn test_accept_rejects_invalid_boxes() {
        let detections = (0..=20)
            .map(|f| Detection::new(f, BoundingBox::new(0.0, 0.0, -5.0, 10.0), 0.9))
            .collect();
        let mut ingestion =
            ingestion_with(vec![Track::new(TrackId::new("bad"), "", detections)]);
        let mut store = AnnotationStore::new();
        assert!(matches!(
            ingestion.accept_track(&mut store, &TrackId::new("bad"), Some(10)),
            Err(EditError::InvalidOperation { .. })
        ));
        assert!(store.is_empty());
        assert_eq!(ingestion.pending_count(), 1);
    }

    #[test]
    fn test_sync_review_state_follows_store() {
        let mut ingestion = ingestion_with(vec![track("a", 0.9, 0..=3), track("b", 0.9, 0..=3)]);
        let mut store = AnnotationStore::new();
        let id = TrackId::new("a");
        let annotation = ingestion.accept_track(&mut store, &id, None).unwrap();
        let removed = store.remove(annotation).unwrap();

        ingestion.sync_review_state(&store, &[annotation]);
        assert_eq!(ingestion.track(&id).unwrap().status, TrackStatus::Pending);
        assert_eq!(ingestion.pending_count(), 2);

        store.restore(removed);
        ingestion.sync_review_state(&store, &[annotation]);
        assert_eq!(ingestion.track(&id).unwrap().status, TrackStatus::Accepted);
        assert_eq!(ingestion.annotation_for(&id), Some(annotation));
    }

    #[test]
    fn test_reingest_keeps_reviewed_state() {
        let mut ingestion = ingestion_with(vec![track("a", 0.9, 0..=3)]);
        ingestion.reject_track(&TrackId::new("a")).unwrap();
        ingestion.ingest(vec![track("a", 0.9, 0..=8)], &TrackingRequest::new("video", "sam2"));
        assert_eq!(ingestion.pending_count(), 0);
        assert_eq!(ingestion.tracks().len(), 1);
        ingestion.clear_reviewed();
        assert!(ingestion.tracks().is_empty());
    }
}
