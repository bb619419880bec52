//! VTAT - Video Temporal Annotation Toolkit
//!
//! Keyframe-based bounding box annotation over video frames: interpolation
//! between keyframes, per-frame visibility, ingestion of AI tracker output and
//! an interactive timeline controller with undo and background persistence.
//!
//! The engine is UI-agnostic. A front end drives a
//! [`TimelineController`](timeline::TimelineController) with pointer and key
//! input and redraws from the [`TimelineEvent`](timeline::TimelineEvent)s it
//! emits.

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod format;
pub mod keybindings;
pub mod model;
pub mod timeline;
pub mod tracking;
pub mod undo;

pub use error::{EditError, Error, PersistError, TrackingError};
pub use model::{AnnotationStore, BoundingBox, BoundingBoxSequence};
pub use timeline::TimelineController;
