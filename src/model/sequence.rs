//! The persisted trajectory of a single annotated object.
//!
//! A [`BoundingBoxSequence`] owns the keyframes, the interpolation segments
//! between them and the visibility partition of the whole video. The fields
//! are crate-private so that every mutation goes through the engine methods
//! (see [`crate::engine`]), which keep these invariants:
//!
//! 1. keyframes strictly increase by frame and there is at least one;
//! 2. segments tile `[first keyframe, last keyframe]` without gap or overlap;
//! 3. visibility ranges tile `[0, total_frames)` and are maximally merged.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::geometry::BoundingBox;
use super::keyframe::{InterpolationSegment, InterpolationType, Keyframe};
use super::visibility::VisibilityRange;
use crate::error::EditError;

/// Where a sequence's keyframes came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrackingSource {
    /// Drawn by hand
    #[default]
    Manual,
    /// Accepted from an AI tracker, by model name
    Model(String),
}

impl TrackingSource {
    /// Wire value for manually drawn sequences.
    pub const MANUAL: &'static str = "manual";

    /// Get the source as a string slice.
    pub fn as_str(&self) -> &str {
        match self {
            TrackingSource::Manual => Self::MANUAL,
            TrackingSource::Model(name) => name,
        }
    }

    /// Check if the sequence was produced by a tracker.
    pub fn is_model(&self) -> bool {
        matches!(self, TrackingSource::Model(_))
    }
}

impl From<String> for TrackingSource {
    fn from(value: String) -> Self {
        if value == Self::MANUAL || value.is_empty() {
            TrackingSource::Manual
        } else {
            TrackingSource::Model(value)
        }
    }
}

impl From<TrackingSource> for String {
    fn from(source: TrackingSource) -> Self {
        match source {
            TrackingSource::Manual => TrackingSource::MANUAL.to_string(),
            TrackingSource::Model(name) => name,
        }
    }
}

impl fmt::Display for TrackingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keyframes, segments and visibility for one object across a video.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBoxSequence {
    pub(crate) keyframes: Vec<Keyframe>,
    pub(crate) segments: Vec<InterpolationSegment>,
    pub(crate) visibility: Vec<VisibilityRange>,
    pub(crate) tracking_source: TrackingSource,
    pub(crate) total_frames: u32,
}

impl BoundingBoxSequence {
    /// Create a sequence from the first drawn box.
    ///
    /// All frames start out visible.
    pub fn new(frame: u32, bbox: BoundingBox, total_frames: u32) -> Result<Self, EditError> {
        Self::from_keyframes(
            vec![Keyframe::new(frame, bbox)],
            total_frames,
            TrackingSource::Manual,
        )
    }

    /// Create a sequence from sorted keyframes, joined by linear segments.
    pub fn from_keyframes(
        keyframes: Vec<Keyframe>,
        total_frames: u32,
        tracking_source: TrackingSource,
    ) -> Result<Self, EditError> {
        let segments = keyframes
            .windows(2)
            .map(|pair| {
                InterpolationSegment::new(pair[0].frame, pair[1].frame, InterpolationType::Linear)
            })
            .collect();
        Self::from_parts(
            keyframes,
            segments,
            vec![VisibilityRange::new(0, total_frames, true)],
            tracking_source,
            total_frames,
        )
    }

    /// Assemble a sequence from already-built parts, validating every invariant.
    pub fn from_parts(
        keyframes: Vec<Keyframe>,
        segments: Vec<InterpolationSegment>,
        visibility: Vec<VisibilityRange>,
        tracking_source: TrackingSource,
        total_frames: u32,
    ) -> Result<Self, EditError> {
        let sequence = Self {
            keyframes,
            segments,
            visibility,
            tracking_source,
            total_frames,
        };
        sequence.check_invariants()?;
        Ok(sequence)
    }

    /// Keyframes, sorted by frame.
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Interpolation segments, sorted by start frame.
    pub fn segments(&self) -> &[InterpolationSegment] {
        &self.segments
    }

    /// Visibility partition of `[0, total_frames)`.
    pub fn visibility_ranges(&self) -> &[VisibilityRange] {
        &self.visibility
    }

    pub fn tracking_source(&self) -> &TrackingSource {
        &self.tracking_source
    }

    pub fn set_tracking_source(&mut self, source: TrackingSource) {
        self.tracking_source = source;
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Frames inside `[first, last]` that are not keyframes.
    pub fn interpolated_frame_count(&self) -> u32 {
        let (first, last) = self.keyframe_range();
        (last - first + 1) - self.keyframes.len() as u32
    }

    /// First keyframe. Always present.
    pub fn first_keyframe(&self) -> &Keyframe {
        &self.keyframes[0]
    }

    /// Last keyframe. Always present.
    pub fn last_keyframe(&self) -> &Keyframe {
        &self.keyframes[self.keyframes.len() - 1]
    }

    /// Frames of the first and last keyframe.
    pub fn keyframe_range(&self) -> (u32, u32) {
        (self.first_keyframe().frame, self.last_keyframe().frame)
    }

    /// Binary search for a keyframe; `Err` holds the insertion index.
    pub fn keyframe_index(&self, frame: u32) -> Result<usize, usize> {
        self.keyframes.binary_search_by_key(&frame, |k| k.frame)
    }

    /// Get the keyframe at a frame, if any.
    pub fn keyframe_at(&self, frame: u32) -> Option<&Keyframe> {
        self.keyframe_index(frame).ok().map(|i| &self.keyframes[i])
    }

    /// Check if a frame carries a keyframe.
    pub fn is_keyframe(&self, frame: u32) -> bool {
        self.keyframe_index(frame).is_ok()
    }

    /// Closest keyframe frame strictly after `frame`.
    pub fn next_keyframe_after(&self, frame: u32) -> Option<u32> {
        let idx = self.keyframes.partition_point(|k| k.frame <= frame);
        self.keyframes.get(idx).map(|k| k.frame)
    }

    /// Closest keyframe frame strictly before `frame`.
    pub fn previous_keyframe_before(&self, frame: u32) -> Option<u32> {
        let idx = self.keyframes.partition_point(|k| k.frame < frame);
        idx.checked_sub(1).map(|i| self.keyframes[i].frame)
    }

    /// Verify the sequence invariants.
    pub fn check_invariants(&self) -> Result<(), EditError> {
        if self.total_frames == 0 {
            return Err(EditError::invalid("total_frames must be at least 1"));
        }
        if self.keyframes.is_empty() {
            return Err(EditError::invalid("a sequence needs at least one keyframe"));
        }
        for pair in self.keyframes.windows(2) {
            if pair[0].frame >= pair[1].frame {
                return Err(EditError::invalid(format!(
                    "keyframes not strictly increasing at frames {} and {}",
                    pair[0].frame, pair[1].frame
                )));
            }
        }
        if let Some(bad) = self.keyframes.iter().find(|k| !k.bbox.is_valid()) {
            return Err(EditError::invalid(format!(
                "keyframe at frame {} has non-finite or negative box {:?}",
                bad.frame, bad.bbox
            )));
        }
        let last = self.last_keyframe().frame;
        if last >= self.total_frames {
            return Err(EditError::frame_out_of_range(last, self.total_frames));
        }

        if self.segments.len() != self.keyframes.len() - 1 {
            return Err(EditError::invalid(format!(
                "expected {} segments, found {}",
                self.keyframes.len() - 1,
                self.segments.len()
            )));
        }
        for (seg, pair) in self.segments.iter().zip(self.keyframes.windows(2)) {
            if seg.start_frame != pair[0].frame || seg.end_frame != pair[1].frame {
                return Err(EditError::invalid(format!(
                    "segment [{}, {}] does not join keyframes {} and {}",
                    seg.start_frame, seg.end_frame, pair[0].frame, pair[1].frame
                )));
            }
            if seg.easing.is_some_and(|e| !e.is_finite()) {
                return Err(EditError::invalid(format!(
                    "segment [{}, {}] has non-finite easing parameters",
                    seg.start_frame, seg.end_frame
                )));
            }
        }

        let mut cursor = 0;
        let mut previous: Option<bool> = None;
        for range in &self.visibility {
            if range.start_frame != cursor || range.is_empty() {
                return Err(EditError::invalid(format!(
                    "visibility range [{}, {}) breaks the partition at frame {cursor}",
                    range.start_frame, range.end_frame
                )));
            }
            if previous == Some(range.visible) {
                return Err(EditError::invalid(format!(
                    "adjacent visibility ranges share visible={} at frame {}",
                    range.visible, range.start_frame
                )));
            }
            previous = Some(range.visible);
            cursor = range.end_frame;
        }
        if cursor != self.total_frames {
            return Err(EditError::invalid(format!(
                "visibility ranges cover [0, {cursor}) instead of [0, {})",
                self.total_frames
            )));
        }

        Ok(())
    }
}
