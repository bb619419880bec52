//! Tracking candidates produced by an external AI tracker.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::geometry::BoundingBox;

/// Identifier assigned to a track by the tracking service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One per-frame detection inside a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub frame_number: u32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub confidence: f32,
}

impl Detection {
    pub fn new(frame_number: u32, bbox: BoundingBox, confidence: f32) -> Self {
        Self {
            frame_number,
            bbox,
            confidence,
        }
    }
}

/// Review state of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// A candidate trajectory awaiting accept/reject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    /// Model that produced the track (filled in from the request when absent)
    #[serde(default)]
    pub model_name: String,
    /// Detections sorted by frame, one per frame
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub status: TrackStatus,
}

impl Track {
    /// Create a pending track; detections are sorted and de-duplicated by frame.
    pub fn new(id: TrackId, model_name: impl Into<String>, detections: Vec<Detection>) -> Self {
        let mut track = Self {
            id,
            model_name: model_name.into(),
            detections,
            status: TrackStatus::Pending,
        };
        track.normalize();
        track
    }

    /// Sort detections by frame and keep the first detection seen for each frame.
    pub fn normalize(&mut self) {
        self.detections.sort_by_key(|d| d.frame_number);
        self.detections.dedup_by_key(|d| d.frame_number);
    }

    /// Mean confidence over all detections (0 for an empty track).
    pub fn confidence(&self) -> f32 {
        if self.detections.is_empty() {
            return 0.0;
        }
        self.detections.iter().map(|d| d.confidence).sum::<f32>() / self.detections.len() as f32
    }

    /// Frames of the first and last detection.
    pub fn frame_range(&self) -> Option<(u32, u32)> {
        Some((
            self.detections.first()?.frame_number,
            self.detections.last()?.frame_number,
        ))
    }

    pub fn is_pending(&self) -> bool {
        self.status == TrackStatus::Pending
    }
}
