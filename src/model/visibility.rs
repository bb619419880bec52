//! Visibility ranges.

use serde::{Deserialize, Serialize};

/// A half-open run of frames `[start_frame, end_frame)` sharing one shown/hidden state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRange {
    pub start_frame: u32,
    pub end_frame: u32,
    pub visible: bool,
}

impl VisibilityRange {
    pub fn new(start_frame: u32, end_frame: u32, visible: bool) -> Self {
        Self {
            start_frame,
            end_frame,
            visible,
        }
    }

    /// Check if a frame falls inside this range.
    pub fn contains(&self, frame: u32) -> bool {
        frame >= self.start_frame && frame < self.end_frame
    }

    /// Number of frames covered.
    pub fn len(&self) -> u32 {
        self.end_frame.saturating_sub(self.start_frame)
    }

    /// Check if the range covers no frames.
    pub fn is_empty(&self) -> bool {
        self.end_frame <= self.start_frame
    }
}
