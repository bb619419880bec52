//! Editing session for one video.
//!
//! [`TimelineController`] owns the annotations and everything that changes
//! them: pointer gestures, keyboard commands, bracket markers, undo/redo,
//! track review and the persistence hand-off. The UI feeds it input and
//! drains [`TimelineEvent`]s to know what to redraw.
//!
//! Gestures form a small state machine:
//!
//! ```text
//! Idle -> Drawing          -> Idle   (new box or keyframe on release)
//! Idle -> DraggingKeyframe -> Idle   (move_keyframe on release)
//! Idle -> DraggingHandle   -> Idle   (keyframe with the resized box on release)
//! ```
//!
//! The bracket marker (`[` then `]`) runs alongside, so the frame can be
//! stepped while a start is pending. Each completed gesture issues exactly one
//! mutation; a cancelled gesture issues none.

use std::collections::VecDeque;
use std::time::Duration;

use super::gesture::{Gesture, Handle};
use super::navigation::FrameCursor;
use crate::config::EngineConfig;
use crate::engine::{BracketMarker, BracketOutcome, FrameBox};
use crate::error::{EditError, TrackingError};
use crate::format::{PersistenceWriter, WriterNotice};
use crate::keybindings::{ContextFlags, Key, KeyBindings, Modifiers, TimelineCommand};
use crate::model::{
    AnnotationId, AnnotationStore, BoundingBox, BoundingBoxSequence, EasingParams,
    InterpolationType, Point, TrackId,
};
use crate::tracking::{
    BatchAcceptReport, Generation, TrackIngestion, TrackingClient, TrackingOutcome,
    TrackingRequest,
};
use crate::undo::{Command, UndoStack};

/// Change notifications for the UI adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    FrameChanged(u32),
    SelectionChanged(Option<AnnotationId>),
    AnnotationCreated(AnnotationId),
    AnnotationChanged(AnnotationId),
    AnnotationDeleted(AnnotationId),
    GestureCancelled,
    BracketStarted(u32),
    TrackingStarted(Generation),
    TrackingFinished {
        generation: Generation,
        track_count: usize,
    },
    TrackingFailed {
        generation: Generation,
        error: TrackingError,
    },
    /// A background save failed after all retries; it will be tried again
    SaveFailed {
        annotation: AnnotationId,
        error: String,
    },
}

/// What ending a gesture did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    /// A new annotation was created and selected
    Created(AnnotationId),
    /// The annotation's sequence was changed
    Edited(AnnotationId),
    /// The gesture ended without a change (box too small, no movement)
    Discarded,
    /// No gesture was active
    NoGesture,
}

/// Editing session over an [`AnnotationStore`].
pub struct TimelineController {
    store: AnnotationStore,
    cursor: FrameCursor,
    gesture: Gesture,
    bracket: BracketMarker,
    undo: UndoStack,
    ingestion: TrackIngestion,
    tracking: Option<TrackingClient>,
    writer: Option<PersistenceWriter>,
    keybindings: KeyBindings,
    events: VecDeque<TimelineEvent>,
    large_step: u32,
    default_interpolation: InterpolationType,
    accept_confidence: f32,
}

impl TimelineController {
    /// Session with default settings and no annotations.
    pub fn new(total_frames: u32) -> Self {
        Self::with_config(total_frames, &EngineConfig::default())
    }

    pub fn with_config(total_frames: u32, config: &EngineConfig) -> Self {
        let cursor = FrameCursor::new(total_frames);
        Self {
            store: AnnotationStore::new(),
            cursor,
            gesture: Gesture::Idle,
            bracket: BracketMarker::Idle,
            undo: UndoStack::with_config(config.timeline.undo_config()),
            ingestion: TrackIngestion::new(cursor.total_frames())
                .with_default_decimation(config.tracking.default_decimation),
            tracking: None,
            writer: None,
            keybindings: config.keybindings.clone(),
            events: VecDeque::new(),
            large_step: config.timeline.large_step.max(1),
            default_interpolation: config.timeline.default_interpolation,
            accept_confidence: config.tracking.accept_confidence,
        }
    }

    /// Replace the annotations (e.g. after an import). Clears undo history.
    pub fn load_annotations(&mut self, store: AnnotationStore) {
        self.cancel_gesture();
        self.store = store;
        self.undo.clear();
        log::info!("Loaded {} annotations", self.store.len());
        self.emit(TimelineEvent::SelectionChanged(self.store.selected()));
    }

    /// Attach the background writer; every later mutation is handed to it.
    pub fn attach_writer(&mut self, writer: PersistenceWriter) {
        self.writer = Some(writer);
    }

    /// Detach the background writer, e.g. to flush it elsewhere.
    pub fn detach_writer(&mut self) -> Option<PersistenceWriter> {
        self.writer.take()
    }

    pub fn attach_tracking(&mut self, client: TrackingClient) {
        self.tracking = Some(client);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn ingestion(&self) -> &TrackIngestion {
        &self.ingestion
    }

    pub fn current_frame(&self) -> u32 {
        self.cursor.current()
    }

    pub fn total_frames(&self) -> u32 {
        self.cursor.total_frames()
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.store.selected()
    }

    pub fn selected_sequence(&self) -> Option<&BoundingBoxSequence> {
        self.store.sequence(self.store.selected()?)
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn pending_bracket(&self) -> Option<u32> {
        self.bracket.pending_start()
    }

    pub fn keybindings(&self) -> &KeyBindings {
        &self.keybindings
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Resolved box of every annotation at the current frame, in ID order.
    pub fn frame_boxes(&self) -> Vec<(AnnotationId, FrameBox)> {
        let frame = self.cursor.current();
        self.store
            .iter()
            .map(|a| (a.id, a.sequence.box_at_frame(frame)))
            .collect()
    }

    /// Live box of the gesture in progress.
    ///
    /// Keyframe drags preview the dragged keyframe's box at its target frame.
    pub fn preview_box(&self) -> Option<BoundingBox> {
        match self.gesture {
            Gesture::DraggingKeyframe {
                annotation,
                from_frame,
                ..
            } => Some(self.store.sequence(annotation)?.keyframe_at(from_frame)?.bbox),
            ref other => other.preview_box(),
        }
    }

    /// Flags for evaluating keybinding when-clauses.
    pub fn context_flags(&self) -> ContextFlags {
        let on_keyframe = self
            .selected_sequence()
            .is_some_and(|s| s.is_keyframe(self.cursor.current()));
        ContextFlags {
            has_selection: self.store.selected().is_some(),
            on_keyframe,
            gesture_active: self.gesture.is_active(),
            bracket_pending: self.bracket.pending_start().is_some(),
            tracking_in_flight: self.tracking.as_ref().is_some_and(|t| t.is_busy()),
            can_undo: self.undo.can_undo(),
            can_redo: self.undo.can_redo(),
        }
    }

    /// Take all queued events, oldest first.
    pub fn drain_events(&mut self) -> Vec<TimelineEvent> {
        self.events.drain(..).collect()
    }

    // ========================================================================
    // Selection and navigation
    // ========================================================================

    /// Select an annotation, or clear the selection with `None`.
    pub fn select(&mut self, id: Option<AnnotationId>) -> Result<(), EditError> {
        if let Some(id) = id {
            if self.store.get(id).is_none() {
                return Err(EditError::not_found(format!("no annotation with id {id}")));
            }
        }
        if self.store.selected() != id {
            self.store.select(id);
            self.emit(TimelineEvent::SelectionChanged(id));
        }
        Ok(())
    }

    /// Select the topmost visible annotation under `point` (or clear the selection).
    pub fn select_at(&mut self, point: Point) -> Option<AnnotationId> {
        let hit = self.store.hit_test(self.cursor.current(), &point);
        if self.store.selected() != hit {
            self.store.select(hit);
            self.emit(TimelineEvent::SelectionChanged(hit));
        }
        hit
    }

    pub fn seek(&mut self, frame: u32) -> u32 {
        let before = self.cursor.current();
        let after = self.cursor.seek(frame);
        self.frame_moved(before, after)
    }

    pub fn step(&mut self, delta: i64) -> u32 {
        let before = self.cursor.current();
        let after = self.cursor.step(delta);
        self.frame_moved(before, after)
    }

    pub fn large_step(&mut self, forward: bool) -> u32 {
        let delta = i64::from(self.large_step);
        self.step(if forward { delta } else { -delta })
    }

    pub fn jump_to_start(&mut self) -> u32 {
        let before = self.cursor.current();
        let after = self.cursor.home();
        self.frame_moved(before, after)
    }

    pub fn jump_to_end(&mut self) -> u32 {
        let before = self.cursor.current();
        let after = self.cursor.end();
        self.frame_moved(before, after)
    }

    /// Jump to the selected annotation's next keyframe.
    pub fn next_keyframe(&mut self) -> Result<u32, EditError> {
        let id = self.require_selected()?;
        let sequence = self
            .store
            .sequence(id)
            .ok_or_else(|| EditError::not_found(format!("no annotation with id {id}")))?;
        let before = self.cursor.current();
        let after = self.cursor.next_keyframe(sequence);
        Ok(self.frame_moved(before, after))
    }

    /// Jump to the selected annotation's previous keyframe.
    pub fn previous_keyframe(&mut self) -> Result<u32, EditError> {
        let id = self.require_selected()?;
        let sequence = self
            .store
            .sequence(id)
            .ok_or_else(|| EditError::not_found(format!("no annotation with id {id}")))?;
        let before = self.cursor.current();
        let after = self.cursor.previous_keyframe(sequence);
        Ok(self.frame_moved(before, after))
    }

    fn frame_moved(&mut self, before: u32, after: u32) -> u32 {
        if before != after {
            self.emit(TimelineEvent::FrameChanged(after));
        }
        after
    }

    // ========================================================================
    // Keyframe and visibility edits (selected annotation, current frame)
    // ========================================================================

    /// Freeze the current box into a keyframe at the current frame.
    pub fn add_keyframe(&mut self) -> Result<(), EditError> {
        self.add_keyframe_with(self.cursor.current(), None)
    }

    /// Copy the previous keyframe's box to the current frame.
    pub fn copy_previous_keyframe(&mut self) -> Result<(), EditError> {
        let frame = self.cursor.current();
        self.edit_selected("Copy previous keyframe", |s| {
            s.copy_previous_keyframe(frame).map(drop)
        })
    }

    /// Delete the keyframe at the current frame.
    pub fn delete_keyframe(&mut self) -> Result<(), EditError> {
        let frame = self.cursor.current();
        self.edit_selected("Delete keyframe", |s| s.delete_keyframe(frame).map(drop))
    }

    pub fn move_keyframe(&mut self, from_frame: u32, to_frame: u32) -> Result<(), EditError> {
        self.edit_selected("Move keyframe", |s| {
            s.move_keyframe(from_frame, to_frame).map(drop)
        })
    }

    /// Flip visibility from the current frame to the end of its range.
    pub fn toggle_visibility(&mut self) -> Result<(), EditError> {
        let frame = self.cursor.current();
        self.edit_selected("Toggle visibility", |s| s.toggle_at(frame))
    }

    /// Paint `[start, end)` of the selected annotation.
    pub fn set_visible(&mut self, start: u32, end: u32, visible: bool) -> Result<(), EditError> {
        self.edit_selected("Set visibility", |s| s.set_visible(start, end, visible))
    }

    /// Change the type of the segment starting at `start_frame`.
    pub fn set_interpolation_type(
        &mut self,
        start_frame: u32,
        kind: InterpolationType,
        easing: Option<EasingParams>,
    ) -> Result<(), EditError> {
        self.edit_selected("Change interpolation", |s| {
            s.set_interpolation_type(start_frame, kind, easing).map(drop)
        })
    }

    /// `[`: remember the current frame as the start of a visible span.
    pub fn mark_visible_start(&mut self) -> BracketOutcome {
        let outcome = self.bracket.mark_start(self.cursor.current());
        if let BracketOutcome::StartMarked(frame) = outcome {
            self.emit(TimelineEvent::BracketStarted(frame));
        }
        outcome
    }

    /// `]`: paint `[start, current)` visible on the selected annotation.
    ///
    /// Ignored when no start is pending. On failure the start stays pending.
    pub fn mark_visible_end(&mut self) -> Result<BracketOutcome, EditError> {
        if self.bracket.pending_start().is_none() {
            return Ok(BracketOutcome::Ignored);
        }
        let frame = self.cursor.current();
        let mut bracket = self.bracket;
        let outcome = self.edit_selected("Show frame range", |s| bracket.mark_end(s, frame))?;
        self.bracket = bracket;
        Ok(outcome)
    }

    /// Remove the selected annotation with all its keyframes.
    pub fn delete_selected_annotation(&mut self) -> Result<AnnotationId, EditError> {
        let id = self.require_selected()?;
        let removed = self
            .store
            .remove(id)
            .ok_or_else(|| EditError::not_found(format!("no annotation with id {id}")))?;
        self.record(Command::edit(
            id,
            Some(removed.sequence),
            None,
            "Delete annotation",
        ));
        self.emit(TimelineEvent::SelectionChanged(None));
        Ok(id)
    }

    fn add_keyframe_with(&mut self, frame: u32, bbox: Option<BoundingBox>) -> Result<(), EditError> {
        let kind = self.default_interpolation;
        self.edit_selected("Add keyframe", |s| {
            let (first, last) = s.keyframe_range();
            s.add_keyframe(frame, bbox)?;
            // New outer segments start as linear; apply the configured default.
            let new_segment = if frame < first {
                Some(frame)
            } else if frame > last {
                Some(last)
            } else {
                None
            };
            match new_segment {
                Some(start) if kind != InterpolationType::Linear => {
                    s.set_interpolation_type(start, kind, None).map(drop)
                }
                _ => Ok(()),
            }
        })
    }

    // ========================================================================
    // Gestures
    // ========================================================================

    /// Start drawing a box on the current frame.
    pub fn begin_draw(&mut self, origin: Point) -> Result<(), EditError> {
        self.ensure_no_gesture()?;
        self.gesture = Gesture::Drawing {
            frame: self.cursor.current(),
            origin,
            current: origin,
        };
        Ok(())
    }

    /// Start dragging the selected annotation's keyframe at `frame` along the timeline.
    pub fn begin_keyframe_drag(&mut self, frame: u32) -> Result<(), EditError> {
        self.ensure_no_gesture()?;
        let annotation = self.require_selected()?;
        let sequence = self.require_selected_sequence()?;
        if !sequence.is_keyframe(frame) {
            return Err(EditError::no_keyframe(frame));
        }
        self.gesture = Gesture::DraggingKeyframe {
            annotation,
            from_frame: frame,
            to_frame: frame,
        };
        Ok(())
    }

    /// Start dragging a handle of the selected annotation's box on the current frame.
    pub fn begin_handle_drag(&mut self, handle: Handle, origin: Point) -> Result<(), EditError> {
        self.ensure_no_gesture()?;
        let annotation = self.require_selected()?;
        let frame = self.cursor.current();
        let original = self.require_selected_sequence()?.box_at_frame(frame).bbox;
        self.gesture = Gesture::DraggingHandle {
            annotation,
            frame,
            handle,
            original,
            origin,
            current: origin,
        };
        Ok(())
    }

    /// Follow the pointer during a draw or handle drag.
    pub fn update_pointer(&mut self, point: Point) {
        self.gesture.update_pointer(point);
    }

    /// Move the target frame of a keyframe drag (clamped to the video).
    pub fn update_keyframe_drag(&mut self, frame: u32) {
        let last = self.cursor.last_frame();
        if let Gesture::DraggingKeyframe { to_frame, .. } = &mut self.gesture {
            *to_frame = frame.min(last);
        }
    }

    /// Finish the active gesture and apply its single mutation.
    ///
    /// The gesture is over afterwards even if the mutation fails.
    pub fn end_gesture(&mut self) -> Result<GestureOutcome, EditError> {
        let gesture = std::mem::take(&mut self.gesture);
        match gesture {
            Gesture::Idle => Ok(GestureOutcome::NoGesture),
            Gesture::Drawing {
                frame,
                origin,
                current,
            } => self.finish_draw(frame, origin, current),
            Gesture::DraggingKeyframe {
                annotation,
                from_frame,
                to_frame,
            } => {
                if from_frame == to_frame {
                    return Ok(GestureOutcome::Discarded);
                }
                self.edit_annotation(annotation, "Move keyframe", |s| {
                    s.move_keyframe(from_frame, to_frame).map(drop)
                })?;
                Ok(GestureOutcome::Edited(annotation))
            }
            Gesture::DraggingHandle {
                annotation,
                frame,
                handle,
                original,
                origin,
                current,
            } => {
                let updated = handle.apply(&original, origin, current);
                if updated == original || !Self::large_enough(&updated) {
                    return Ok(GestureOutcome::Discarded);
                }
                self.edit_annotation(annotation, "Resize box", |s| {
                    s.add_keyframe(frame, Some(updated)).map(drop)
                })?;
                Ok(GestureOutcome::Edited(annotation))
            }
        }
    }

    /// Abort the drag and any pending bracket without changing anything.
    ///
    /// Returns whether anything was cancelled.
    pub fn cancel_gesture(&mut self) -> bool {
        let cancelled = self.gesture.is_active() || self.bracket.pending_start().is_some();
        if self.gesture.is_active() {
            log::debug!("Cancelled {}", self.gesture.name());
        }
        self.gesture = Gesture::Idle;
        self.bracket.cancel();
        if cancelled {
            self.emit(TimelineEvent::GestureCancelled);
        }
        cancelled
    }

    fn finish_draw(
        &mut self,
        frame: u32,
        origin: Point,
        current: Point,
    ) -> Result<GestureOutcome, EditError> {
        let Some(bbox) = BoundingBox::from_corners_checked(origin, current) else {
            log::debug!("Discarded box below minimum size");
            return Ok(GestureOutcome::Discarded);
        };
        if let Some(id) = self.store.selected() {
            self.add_keyframe_with(frame, Some(bbox))?;
            return Ok(GestureOutcome::Edited(id));
        }
        let sequence = BoundingBoxSequence::new(frame, bbox, self.cursor.total_frames())?;
        let id = self.store.add(sequence.clone());
        self.record(Command::edit(id, None, Some(sequence), "Draw box"));
        self.store.select(Some(id));
        self.emit(TimelineEvent::SelectionChanged(Some(id)));
        log::info!("Created annotation {} at frame {}", id, frame);
        Ok(GestureOutcome::Created(id))
    }

    fn large_enough(bbox: &BoundingBox) -> bool {
        bbox.width > crate::model::MIN_BOX_SIZE && bbox.height > crate::model::MIN_BOX_SIZE
    }

    fn ensure_no_gesture(&self) -> Result<(), EditError> {
        if self.gesture.is_active() {
            return Err(EditError::invalid(format!(
                "a {} is already in progress",
                self.gesture.name()
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Undo / redo
    // ========================================================================

    /// Undo the last edit. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, EditError> {
        self.ensure_no_gesture()?;
        let Some(command) = self.undo.undo(&mut self.store).cloned() else {
            return Ok(false);
        };
        self.after_history_step(&command);
        Ok(true)
    }

    /// Redo the last undone edit. Returns false when there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool, EditError> {
        self.ensure_no_gesture()?;
        let Some(command) = self.undo.redo(&mut self.store).cloned() else {
            return Ok(false);
        };
        self.after_history_step(&command);
        Ok(true)
    }

    fn after_history_step(&mut self, command: &Command) {
        let ids = command.annotation_ids();
        self.ingestion.sync_review_state(&self.store, &ids);
        for id in ids {
            self.persist(id);
            let event = if self.store.get(id).is_some() {
                TimelineEvent::AnnotationChanged(id)
            } else {
                TimelineEvent::AnnotationDeleted(id)
            };
            self.emit(event);
        }
        if let Some(selected) = self.store.selected() {
            if self.store.get(selected).is_none() {
                self.store.select(None);
                self.emit(TimelineEvent::SelectionChanged(None));
            }
        }
    }

    // ========================================================================
    // Tracking
    // ========================================================================

    /// Send a tracking request; a request still running is cancelled.
    pub fn start_tracking(&mut self, request: TrackingRequest) -> Result<Generation, TrackingError> {
        let client = self.tracking.as_mut().ok_or_else(|| {
            TrackingError::ServiceUnavailable("no tracking service attached".to_string())
        })?;
        let generation = client.request(request)?;
        self.emit(TimelineEvent::TrackingStarted(generation));
        Ok(generation)
    }

    /// Cancel the running tracking request; its result will be discarded.
    pub fn cancel_tracking(&mut self) -> Option<Generation> {
        let generation = self.tracking.as_mut()?.cancel()?;
        self.emit(TimelineEvent::TrackingFailed {
            generation,
            error: TrackingError::Cancelled,
        });
        Some(generation)
    }

    /// Pump background work: tracking results and save notices.
    ///
    /// Call once per UI tick. Never blocks.
    pub fn poll(&mut self) {
        if let Some(outcome) = self.tracking.as_mut().and_then(|t| t.poll()) {
            self.handle_tracking_outcome(outcome);
        }

        let notices = self
            .writer
            .as_mut()
            .map(|w| w.tick())
            .unwrap_or_default();
        self.handle_notices(notices);
    }

    /// Block until the running tracking request finishes, or `max_wait` passes.
    ///
    /// Returns whether an outcome arrived.
    pub fn wait_for_tracking(&mut self, max_wait: Duration) -> bool {
        match self.tracking.as_mut().and_then(|t| t.wait(max_wait)) {
            Some(outcome) => {
                self.handle_tracking_outcome(outcome);
                true
            }
            None => false,
        }
    }

    fn handle_tracking_outcome(&mut self, outcome: TrackingOutcome) {
        match outcome.result {
            Ok(tracks) => {
                let track_count = tracks.len();
                self.ingestion.ingest(tracks, &outcome.request);
                self.emit(TimelineEvent::TrackingFinished {
                    generation: outcome.generation,
                    track_count,
                });
            }
            Err(error) => {
                log::warn!("Tracking request {} failed: {}", outcome.generation, error);
                self.emit(TimelineEvent::TrackingFailed {
                    generation: outcome.generation,
                    error,
                });
            }
        }
    }

    /// Block until the writer has stored everything, or `max_wait` passes.
    pub fn flush_writes(&mut self, max_wait: Duration) {
        let notices = self
            .writer
            .as_mut()
            .map(|w| w.wait_idle(max_wait))
            .unwrap_or_default();
        self.handle_notices(notices);
    }

    fn handle_notices(&mut self, notices: Vec<WriterNotice>) {
        for notice in notices {
            if let WriterNotice::Failed { id, error, .. } = notice {
                self.emit(TimelineEvent::SaveFailed {
                    annotation: id,
                    error,
                });
            }
        }
    }

    /// Accept a candidate track as a new annotation.
    pub fn accept_track(
        &mut self,
        id: &TrackId,
        decimation: Option<u32>,
    ) -> Result<AnnotationId, EditError> {
        let existed = self.ingestion.annotation_for(id);
        let annotation = self.ingestion.accept_track(&mut self.store, id, decimation)?;
        if existed != Some(annotation) {
            let sequence = self.store.sequence(annotation).cloned();
            self.record(Command::edit(annotation, None, sequence, "Accept track"));
        }
        Ok(annotation)
    }

    pub fn reject_track(&mut self, id: &TrackId) -> Result<(), EditError> {
        self.ingestion.reject_track(id)
    }

    /// Accept every pending track at or above `threshold` (the configured one if `None`).
    ///
    /// The accepted tracks are undone as one step.
    pub fn accept_all_above_confidence(
        &mut self,
        threshold: Option<f32>,
        decimation: Option<u32>,
    ) -> BatchAcceptReport {
        let threshold = threshold.unwrap_or(self.accept_confidence);
        let report =
            self.ingestion
                .accept_all_above_confidence(&mut self.store, threshold, decimation);
        let commands: Vec<Command> = report
            .accepted
            .iter()
            .map(|(_, id)| {
                Command::edit(*id, None, self.store.sequence(*id).cloned(), "Accept track")
            })
            .collect();
        if !commands.is_empty() {
            self.record(Command::Batch {
                description: format!("Accept {} tracks", commands.len()),
                commands,
            });
        }
        report
    }

    // ========================================================================
    // Keyboard
    // ========================================================================

    /// Run a keyboard command.
    pub fn execute(&mut self, command: TimelineCommand) -> Result<(), EditError> {
        log::trace!("Executing {:?}", command);
        match command {
            TimelineCommand::AddKeyframe => self.add_keyframe(),
            TimelineCommand::CopyPreviousKeyframe => self.copy_previous_keyframe(),
            TimelineCommand::ToggleVisibility => self.toggle_visibility(),
            TimelineCommand::DeleteKeyframe => self.delete_keyframe(),
            TimelineCommand::MarkVisibleStart => {
                self.mark_visible_start();
                Ok(())
            }
            TimelineCommand::MarkVisibleEnd => self.mark_visible_end().map(drop),
            TimelineCommand::StepBackward => {
                self.step(-1);
                Ok(())
            }
            TimelineCommand::StepForward => {
                self.step(1);
                Ok(())
            }
            TimelineCommand::LargeStepBackward => {
                self.large_step(false);
                Ok(())
            }
            TimelineCommand::LargeStepForward => {
                self.large_step(true);
                Ok(())
            }
            TimelineCommand::JumpToStart => {
                self.jump_to_start();
                Ok(())
            }
            TimelineCommand::JumpToEnd => {
                self.jump_to_end();
                Ok(())
            }
            TimelineCommand::PreviousKeyframe => self.previous_keyframe().map(drop),
            TimelineCommand::NextKeyframe => self.next_keyframe().map(drop),
            TimelineCommand::Undo => self.undo().map(drop),
            TimelineCommand::Redo => self.redo().map(drop),
            TimelineCommand::CancelGesture => {
                self.cancel_gesture();
                Ok(())
            }
        }
    }

    /// Resolve a key press through the keybindings and run it.
    ///
    /// Returns the command that ran, or `None` if the key is unbound here.
    pub fn handle_key(
        &mut self,
        key: Key,
        modifiers: Modifiers,
    ) -> Result<Option<TimelineCommand>, EditError> {
        let flags = self.context_flags();
        let Some(command) = self.keybindings.command_for(key, modifiers, &flags) else {
            return Ok(None);
        };
        self.execute(command)?;
        Ok(Some(command))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn emit(&mut self, event: TimelineEvent) {
        self.events.push_back(event);
    }

    fn require_selected(&self) -> Result<AnnotationId, EditError> {
        self.store
            .selected()
            .ok_or_else(|| EditError::not_found("no annotation selected"))
    }

    fn require_selected_sequence(&self) -> Result<&BoundingBoxSequence, EditError> {
        let id = self.require_selected()?;
        self.store
            .sequence(id)
            .ok_or_else(|| EditError::not_found(format!("no annotation with id {id}")))
    }

    fn edit_selected<T>(
        &mut self,
        description: &str,
        edit: impl FnOnce(&mut BoundingBoxSequence) -> Result<T, EditError>,
    ) -> Result<T, EditError> {
        let id = self.require_selected()?;
        self.edit_annotation(id, description, edit)
    }

    /// Apply `edit` to a working copy and commit it only on success.
    ///
    /// Unchanged results are not recorded.
    fn edit_annotation<T>(
        &mut self,
        id: AnnotationId,
        description: &str,
        edit: impl FnOnce(&mut BoundingBoxSequence) -> Result<T, EditError>,
    ) -> Result<T, EditError> {
        let annotation = self
            .store
            .get_mut(id)
            .ok_or_else(|| EditError::not_found(format!("no annotation with id {id}")))?;
        let mut working = annotation.sequence.clone();
        let value = edit(&mut working)?;
        if working == annotation.sequence {
            return Ok(value);
        }
        let before = std::mem::replace(&mut annotation.sequence, working.clone());
        self.store.mark_dirty();
        self.record(Command::edit(id, Some(before), Some(working), description));
        Ok(value)
    }

    /// Push to undo history, notify and hand the new state to the writer.
    fn record(&mut self, command: Command) {
        if let Command::Edit {
            annotation_id,
            before,
            after,
            ..
        } = &command
        {
            let event = match (before, after) {
                (None, Some(_)) => TimelineEvent::AnnotationCreated(*annotation_id),
                (Some(_), None) => TimelineEvent::AnnotationDeleted(*annotation_id),
                _ => TimelineEvent::AnnotationChanged(*annotation_id),
            };
            self.emit(event);
        } else {
            for id in command.annotation_ids() {
                self.emit(TimelineEvent::AnnotationCreated(id));
            }
        }
        for id in command.annotation_ids() {
            self.persist(id);
        }
        self.undo.push(command);
    }

    fn persist(&mut self, id: AnnotationId) {
        if let Some(writer) = self.writer.as_mut() {
            writer.enqueue(id, self.store.sequence(id));
        }
    }
}
