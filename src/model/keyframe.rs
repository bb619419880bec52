//! Keyframes and the interpolation segments between them.

use serde::{Deserialize, Serialize};

use super::geometry::BoundingBox;

/// An explicitly authored box at a specific frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Frame this keyframe sits on
    #[serde(rename = "frameNumber")]
    pub frame: u32,
    /// Box geometry at that frame
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl Keyframe {
    pub fn new(frame: u32, bbox: BoundingBox) -> Self {
        Self { frame, bbox }
    }
}

/// Rule used to compute boxes between two consecutive keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationType {
    /// Constant-speed blend
    #[default]
    Linear,
    /// Cubic Bézier timing curve with configurable control points
    Bezier,
    /// Slow start
    EaseIn,
    /// Slow finish
    EaseOut,
    /// Slow start and finish
    EaseInOut,
    /// Keep the start box until the next keyframe
    Hold,
}

impl InterpolationType {
    /// Get the wire name for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationType::Linear => "linear",
            InterpolationType::Bezier => "bezier",
            InterpolationType::EaseIn => "ease-in",
            InterpolationType::EaseOut => "ease-out",
            InterpolationType::EaseInOut => "ease-in-out",
            InterpolationType::Hold => "hold",
        }
    }

    /// Get all interpolation types.
    pub fn all() -> &'static [InterpolationType] {
        &[
            InterpolationType::Linear,
            InterpolationType::Bezier,
            InterpolationType::EaseIn,
            InterpolationType::EaseOut,
            InterpolationType::EaseInOut,
            InterpolationType::Hold,
        ]
    }

    /// Default cubic Bézier control points for curve-based types.
    pub fn default_easing(&self) -> Option<EasingParams> {
        match self {
            InterpolationType::Bezier => Some(EasingParams::new(0.25, 0.1, 0.25, 1.0)),
            InterpolationType::EaseIn => Some(EasingParams::new(0.42, 0.0, 1.0, 1.0)),
            InterpolationType::EaseOut => Some(EasingParams::new(0.0, 0.0, 0.58, 1.0)),
            InterpolationType::EaseInOut => Some(EasingParams::new(0.42, 0.0, 0.58, 1.0)),
            InterpolationType::Linear | InterpolationType::Hold => None,
        }
    }
}

/// Cubic Bézier control points `(x1, y1)` and `(x2, y2)`; the curve runs from (0,0) to (1,1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EasingParams {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl EasingParams {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Interpolation rule between two consecutive keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationSegment {
    /// Frame of the segment's first keyframe
    pub start_frame: u32,
    /// Frame of the segment's second keyframe
    pub end_frame: u32,
    /// Interpolation rule
    #[serde(rename = "type")]
    pub kind: InterpolationType,
    /// Optional control-point override for curve-based types
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<EasingParams>,
}

impl InterpolationSegment {
    pub fn new(start_frame: u32, end_frame: u32, kind: InterpolationType) -> Self {
        Self {
            start_frame,
            end_frame,
            kind,
            easing: None,
        }
    }

    /// Number of frames spanned (`end - start`).
    pub fn span(&self) -> u32 {
        self.end_frame - self.start_frame
    }

    /// Copy of this segment's rule over a different frame range.
    pub fn with_bounds(&self, start_frame: u32, end_frame: u32) -> Self {
        Self {
            start_frame,
            end_frame,
            ..*self
        }
    }

    /// Control points to evaluate, honouring the per-segment override.
    pub fn effective_easing(&self) -> Option<EasingParams> {
        match self.kind {
            InterpolationType::Linear | InterpolationType::Hold => None,
            _ => self.easing.or_else(|| self.kind.default_easing()),
        }
    }
}
