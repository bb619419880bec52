//! Visibility partition editing.
//!
//! The ranges of a sequence always tile `[0, total_frames)` with no two
//! neighbours sharing a value. Every edit paints or splits, then re-merges.

use crate::error::EditError;
use crate::model::{BoundingBoxSequence, VisibilityRange};

impl BoundingBoxSequence {
    /// Check whether the object is shown at `frame`.
    ///
    /// Frames past the end of the video are reported hidden.
    pub fn is_visible(&self, frame: u32) -> bool {
        self.visibility_range_index(frame)
            .map(|idx| self.visibility[idx].visible)
            .unwrap_or(false)
    }

    /// Index of the range containing `frame`.
    fn visibility_range_index(&self, frame: u32) -> Option<usize> {
        let idx = self
            .visibility
            .partition_point(|r| r.start_frame <= frame)
            .checked_sub(1)?;
        self.visibility[idx].contains(frame).then_some(idx)
    }

    /// Flip visibility from `frame` to the end of the range containing it.
    pub fn toggle_at(&mut self, frame: u32) -> Result<(), EditError> {
        let idx = self
            .visibility_range_index(frame)
            .ok_or_else(|| EditError::frame_out_of_range(frame, self.total_frames))?;
        let range = self.visibility[idx];
        let flipped = VisibilityRange::new(frame, range.end_frame, !range.visible);
        if frame == range.start_frame {
            self.visibility[idx] = flipped;
        } else {
            self.visibility[idx].end_frame = frame;
            self.visibility.insert(idx + 1, flipped);
        }
        self.visibility = merge_adjacent(std::mem::take(&mut self.visibility));
        log::debug!(
            "Toggled visibility at frame {} -> {}",
            frame,
            if flipped.visible { "shown" } else { "hidden" }
        );
        Ok(())
    }

    /// Paint `[start, end)` with `visible`.
    pub fn set_visible(&mut self, start: u32, end: u32, visible: bool) -> Result<(), EditError> {
        if end <= start {
            return Err(EditError::invalid(format!(
                "visibility range end {end} must be greater than start {start}"
            )));
        }
        if end > self.total_frames {
            return Err(EditError::invalid(format!(
                "visibility range [{start}, {end}) exceeds [0, {})",
                self.total_frames
            )));
        }
        let painted = paint(
            self.visibility
                .iter()
                .map(|r| (r.start_frame, r.end_frame, r.visible))
                .collect(),
            start,
            end,
            visible,
        );
        self.visibility = merge_adjacent(
            painted
                .into_iter()
                .map(|(s, e, v)| VisibilityRange::new(s, e, v))
                .collect(),
        );
        log::debug!("Painted [{}, {}) visible={}", start, end, visible);
        Ok(())
    }

    /// Replace the partition with an arbitrary list of ranges, repairing it.
    ///
    /// See [`normalize_ranges`].
    pub fn set_visibility_ranges(&mut self, ranges: &[VisibilityRange]) {
        self.visibility = normalize_ranges(ranges, self.total_frames);
    }

    /// Frame count shown to the user.
    pub fn visible_frame_count(&self) -> u32 {
        self.visibility
            .iter()
            .filter(|r| r.visible)
            .map(|r| r.len())
            .sum()
    }
}

/// Turn any list of ranges into a valid partition of `[0, total_frames)`.
///
/// Ranges are clipped to the video and applied in order, so later ranges win
/// where they overlap. Uncovered frames take the value of the range before
/// them; a leading gap is visible.
pub fn normalize_ranges(ranges: &[VisibilityRange], total_frames: u32) -> Vec<VisibilityRange> {
    if total_frames == 0 {
        return Vec::new();
    }
    let mut spans: Vec<(u32, u32, Option<bool>)> = vec![(0, total_frames, None)];
    for range in ranges {
        let start = range.start_frame.min(total_frames);
        let end = range.end_frame.min(total_frames);
        if start < end {
            spans = paint(spans, start, end, Some(range.visible));
        }
    }

    let mut carried = true;
    let filled = spans
        .into_iter()
        .map(|(start, end, value)| {
            let visible = value.unwrap_or(carried);
            carried = visible;
            VisibilityRange::new(start, end, visible)
        })
        .collect();
    merge_adjacent(filled)
}

/// Overwrite `[start, end)` in a sorted, contiguous span list.
fn paint<V: Copy>(spans: Vec<(u32, u32, V)>, start: u32, end: u32, value: V) -> Vec<(u32, u32, V)> {
    let mut out = Vec::with_capacity(spans.len() + 2);
    let mut inserted = false;
    for (s, e, v) in spans {
        if e <= start {
            out.push((s, e, v));
            continue;
        }
        if s >= end {
            if !inserted {
                out.push((start, end, value));
                inserted = true;
            }
            out.push((s, e, v));
            continue;
        }
        if s < start {
            out.push((s, start, v));
        }
        if !inserted {
            out.push((start, end, value));
            inserted = true;
        }
        if e > end {
            out.push((end, e, v));
        }
    }
    if !inserted {
        out.push((start, end, value));
    }
    out
}

/// Merge neighbours with equal visibility and drop empty ranges.
fn merge_adjacent(ranges: Vec<VisibilityRange>) -> Vec<VisibilityRange> {
    let mut merged: Vec<VisibilityRange> = Vec::with_capacity(ranges.len());
    for range in ranges.into_iter().filter(|r| !r.is_empty()) {
        match merged.last_mut() {
            Some(last) if last.visible == range.visible && last.end_frame == range.start_frame => {
                last.end_frame = range.end_frame;
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Outcome of pressing a bracket marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BracketOutcome {
    /// A start frame is now pending
    StartMarked(u32),
    /// `[start, end)` was painted visible
    Painted { start: u32, end: u32 },
    /// End pressed with no pending start
    Ignored,
}

/// `[` / `]` marker gesture that paints a visible span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BracketMarker {
    #[default]
    Idle,
    StartMarked(u32),
}

impl BracketMarker {
    /// Record (or overwrite) the pending start frame.
    pub fn mark_start(&mut self, current_frame: u32) -> BracketOutcome {
        *self = BracketMarker::StartMarked(current_frame);
        BracketOutcome::StartMarked(current_frame)
    }

    /// Close the bracket at `current_frame`, painting `[start, current_frame)` visible.
    ///
    /// On error the pending start is kept so the user can pick another end.
    pub fn mark_end(
        &mut self,
        sequence: &mut BoundingBoxSequence,
        current_frame: u32,
    ) -> Result<BracketOutcome, EditError> {
        let BracketMarker::StartMarked(start) = *self else {
            return Ok(BracketOutcome::Ignored);
        };
        sequence.set_visible(start, current_frame, true)?;
        *self = BracketMarker::Idle;
        Ok(BracketOutcome::Painted {
            start,
            end: current_frame,
        })
    }

    pub fn pending_start(&self) -> Option<u32> {
        match self {
            BracketMarker::Idle => None,
            BracketMarker::StartMarked(start) => Some(*start),
        }
    }

    pub fn cancel(&mut self) {
        *self = BracketMarker::Idle;
    }
}
