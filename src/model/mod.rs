//! Data models for the temporal annotation engine.

mod annotation;
mod geometry;
mod keyframe;
mod sequence;
mod track;
mod visibility;

pub use annotation::{Annotation, AnnotationId, AnnotationStore};
pub use geometry::{BoundingBox, MIN_BOX_SIZE, Point};
pub use keyframe::{EasingParams, InterpolationSegment, InterpolationType, Keyframe};
pub use sequence::{BoundingBoxSequence, TrackingSource};
pub use track::{Detection, Track, TrackId, TrackStatus};
pub use visibility::VisibilityRange;
