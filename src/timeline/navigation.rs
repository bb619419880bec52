//! The frame pointer.

use crate::model::BoundingBoxSequence;

/// Current frame, clamped to `[0, total_frames)`.
///
/// Moving the cursor never touches annotation data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    current: u32,
    total_frames: u32,
}

impl FrameCursor {
    pub fn new(total_frames: u32) -> Self {
        Self {
            current: 0,
            total_frames: total_frames.max(1),
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    pub fn last_frame(&self) -> u32 {
        self.total_frames - 1
    }

    /// Jump to `frame`, clamped. Returns the new frame.
    pub fn seek(&mut self, frame: u32) -> u32 {
        self.current = frame.min(self.last_frame());
        self.current
    }

    /// Move by `delta` frames, clamped at both ends.
    pub fn step(&mut self, delta: i64) -> u32 {
        let target = (i64::from(self.current) + delta).clamp(0, i64::from(self.last_frame()));
        self.seek(u32::try_from(target).unwrap_or(0))
    }

    pub fn home(&mut self) -> u32 {
        self.seek(0)
    }

    pub fn end(&mut self) -> u32 {
        self.seek(self.last_frame())
    }

    /// Jump to the next keyframe of `sequence`; stays put when there is none.
    pub fn next_keyframe(&mut self, sequence: &BoundingBoxSequence) -> u32 {
        match sequence.next_keyframe_after(self.current) {
            Some(frame) => self.seek(frame),
            None => self.current,
        }
    }

    /// Jump to the previous keyframe of `sequence`; stays put when there is none.
    pub fn previous_keyframe(&mut self, sequence: &BoundingBoxSequence) -> u32 {
        match sequence.previous_keyframe_before(self.current) {
            Some(frame) => self.seek(frame),
            None => self.current,
        }
    }
}
