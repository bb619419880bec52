//! Keyframe interpolation and keyframe editing.
//!
//! [`BoundingBoxSequence::box_at_frame`] is a pure O(log n) query so it can run
//! on every playback tick. The editing methods split and merge segments so the
//! segment list always tiles the keyframe range exactly.

use serde::Serialize;

use super::easing::ease;
use crate::error::EditError;
use crate::model::{
    BoundingBox, BoundingBoxSequence, EasingParams, InterpolationSegment, InterpolationType,
    Keyframe,
};

/// Resolved box for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameBox {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// The frame carries an explicit keyframe
    pub is_keyframe: bool,
    /// The frame lies outside the keyframe range and holds the nearest endpoint
    pub is_extrapolated: bool,
    /// Visibility from the sequence's partition
    pub visible: bool,
}

impl BoundingBoxSequence {
    /// Resolve the box at `frame`.
    ///
    /// Frames before the first or after the last keyframe hold the nearest
    /// endpoint's box and are flagged `is_extrapolated`.
    pub fn box_at_frame(&self, frame: u32) -> FrameBox {
        let visible = self.is_visible(frame);
        let (bbox, is_keyframe, is_extrapolated) = match self.keyframe_index(frame) {
            Ok(idx) => (self.keyframes[idx].bbox, true, false),
            Err(0) => (self.first_keyframe().bbox, false, true),
            Err(idx) if idx == self.keyframes.len() => (self.last_keyframe().bbox, false, true),
            Err(idx) => {
                // keyframes[idx - 1] < frame < keyframes[idx]; segment idx - 1 joins them
                let segment = &self.segments[idx - 1];
                let start = &self.keyframes[idx - 1];
                let end = &self.keyframes[idx];
                let t = f64::from(frame - segment.start_frame) / f64::from(segment.span());
                let weight = ease(segment, t) as f32;
                (start.bbox.lerp(&end.bbox, weight), false, false)
            }
        };
        FrameBox {
            bbox,
            is_keyframe,
            is_extrapolated,
            visible,
        }
    }

    /// Materialise every frame in the keyframe range, in order.
    pub fn dense_boxes(&self) -> Vec<(u32, FrameBox)> {
        let (first, last) = self.keyframe_range();
        (first..=last).map(|f| (f, self.box_at_frame(f))).collect()
    }

    /// Add a keyframe at `frame`, or overwrite the box of an existing one.
    ///
    /// With `bbox = None` the current interpolated/extrapolated box is frozen
    /// into the new keyframe. Splitting a segment keeps its type on both
    /// halves; extending past either end adds a linear segment.
    pub fn add_keyframe(
        &mut self,
        frame: u32,
        bbox: Option<BoundingBox>,
    ) -> Result<Keyframe, EditError> {
        if frame >= self.total_frames {
            return Err(EditError::frame_out_of_range(frame, self.total_frames));
        }
        let bbox = bbox.unwrap_or_else(|| self.box_at_frame(frame).bbox);
        if !bbox.is_valid() {
            return Err(EditError::invalid(format!(
                "box {bbox:?} has non-finite or negative components"
            )));
        }
        let keyframe = Keyframe::new(frame, bbox);

        match self.keyframe_index(frame) {
            Ok(idx) => {
                self.keyframes[idx].bbox = bbox;
                log::debug!("Overwrote keyframe at frame {}", frame);
            }
            Err(0) => {
                let next = self.first_keyframe().frame;
                self.keyframes.insert(0, keyframe);
                self.segments.insert(
                    0,
                    InterpolationSegment::new(frame, next, InterpolationType::Linear),
                );
                log::debug!("Added leading keyframe at frame {}", frame);
            }
            Err(idx) if idx == self.keyframes.len() => {
                let prev = self.last_keyframe().frame;
                self.keyframes.push(keyframe);
                self.segments
                    .push(InterpolationSegment::new(prev, frame, InterpolationType::Linear));
                log::debug!("Added trailing keyframe at frame {}", frame);
            }
            Err(idx) => {
                let original = self.segments[idx - 1];
                self.segments[idx - 1] = original.with_bounds(original.start_frame, frame);
                self.segments
                    .insert(idx, original.with_bounds(frame, original.end_frame));
                self.keyframes.insert(idx, keyframe);
                log::debug!(
                    "Split {} segment [{}, {}] at frame {}",
                    original.kind.as_str(),
                    original.start_frame,
                    original.end_frame,
                    frame
                );
            }
        }
        Ok(keyframe)
    }

    /// Delete the keyframe at `frame`.
    ///
    /// An interior deletion merges the two flanking segments into one that
    /// keeps the left segment's type. The sole keyframe cannot be deleted;
    /// delete the owning annotation instead.
    pub fn delete_keyframe(&mut self, frame: u32) -> Result<Keyframe, EditError> {
        let idx = self
            .keyframe_index(frame)
            .map_err(|_| EditError::no_keyframe(frame))?;
        if self.keyframes.len() == 1 {
            return Err(EditError::invalid(
                "cannot delete the only keyframe; delete the annotation instead",
            ));
        }

        let removed = self.keyframes.remove(idx);
        if idx == 0 {
            self.segments.remove(0);
        } else if idx == self.keyframes.len() {
            self.segments.pop();
        } else {
            let right = self.segments.remove(idx);
            self.segments[idx - 1].end_frame = right.end_frame;
        }
        log::debug!("Deleted keyframe at frame {}", frame);
        Ok(removed)
    }

    /// Move a keyframe to another frame, keeping its box.
    pub fn move_keyframe(&mut self, old_frame: u32, new_frame: u32) -> Result<Keyframe, EditError> {
        let idx = self
            .keyframe_index(old_frame)
            .map_err(|_| EditError::no_keyframe(old_frame))?;
        if old_frame == new_frame {
            return Ok(self.keyframes[idx]);
        }
        if self.is_keyframe(new_frame) {
            return Err(EditError::conflict(format!(
                "frame {new_frame} already has a keyframe"
            )));
        }
        if new_frame >= self.total_frames {
            return Err(EditError::frame_out_of_range(new_frame, self.total_frames));
        }

        let bbox = self.keyframes[idx].bbox;
        if self.keyframes.len() == 1 {
            self.keyframes[0].frame = new_frame;
            log::debug!("Moved sole keyframe {} -> {}", old_frame, new_frame);
            return Ok(self.keyframes[0]);
        }
        // Delete and re-add on a copy so a failed add leaves `self` untouched.
        let mut moved_sequence = self.clone();
        moved_sequence.delete_keyframe(old_frame)?;
        let moved = moved_sequence.add_keyframe(new_frame, Some(bbox))?;
        *self = moved_sequence;
        log::debug!("Moved keyframe {} -> {}", old_frame, new_frame);
        Ok(moved)
    }

    /// Freeze the box currently shown at `frame` into an explicit keyframe.
    pub fn copy_previous_keyframe(&mut self, frame: u32) -> Result<Keyframe, EditError> {
        let current = self.box_at_frame(frame).bbox;
        self.add_keyframe(frame, Some(current))
    }

    /// Change the interpolation rule of the segment starting at `start_frame`.
    pub fn set_interpolation_type(
        &mut self,
        start_frame: u32,
        kind: InterpolationType,
        easing: Option<EasingParams>,
    ) -> Result<InterpolationSegment, EditError> {
        let idx = self
            .segments
            .binary_search_by_key(&start_frame, |s| s.start_frame)
            .map_err(|_| {
                EditError::not_found(format!("no segment starts at frame {start_frame}"))
            })?;
        if easing.is_some_and(|e| !e.is_finite()) {
            return Err(EditError::invalid(format!(
                "easing parameters {easing:?} must be finite"
            )));
        }
        let segment = &mut self.segments[idx];
        segment.kind = kind;
        segment.easing = easing;
        log::debug!(
            "Segment [{}, {}] set to {}",
            segment.start_frame,
            segment.end_frame,
            kind.as_str()
        );
        Ok(*segment)
    }
}
