//! Wire shape of a persisted sequence.
//!
//! ```json
//! {"id": 3, "boundingBoxSequence": {
//!   "boxes": [{"x": 0, "y": 0, "width": 10, "height": 10, "frameNumber": 0, "isKeyframe": true}],
//!   "interpolationSegments": [{"startFrame": 0, "endFrame": 20, "type": "linear"}],
//!   "visibilityRanges": [{"startFrame": 0, "endFrame": 100, "visible": true}],
//!   "trackingSource": "manual",
//!   "totalFrames": 100,
//!   "keyframeCount": 2,
//!   "interpolatedFrameCount": 19
//! }}
//! ```
//!
//! The derived counts are written for consumers that do not interpolate; on
//! import they are recomputed and only compared.

use serde::{Deserialize, Serialize};

use super::error::FormatError;
use super::report::FormatWarning;
use crate::engine::normalize_ranges;
use crate::model::{
    Annotation, AnnotationId, BoundingBox, BoundingBoxSequence, InterpolationSegment,
    InterpolationType, Keyframe, TrackingSource, VisibilityRange,
};

/// One box entry: a keyframe, or an interpolated frame in dense exports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxRecord {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub frame_number: u32,
    #[serde(default)]
    pub is_keyframe: bool,
}

impl BoxRecord {
    pub fn new(frame_number: u32, bbox: BoundingBox, is_keyframe: bool) -> Self {
        Self {
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
            frame_number,
            is_keyframe,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.x, self.y, self.width, self.height)
    }
}

/// Serialized `boundingBoxSequence` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceRecord {
    pub boxes: Vec<BoxRecord>,
    #[serde(default)]
    pub interpolation_segments: Vec<InterpolationSegment>,
    #[serde(default)]
    pub visibility_ranges: Vec<VisibilityRange>,
    #[serde(default)]
    pub tracking_source: TrackingSource,
    pub total_frames: u32,
    #[serde(default)]
    pub keyframe_count: Option<usize>,
    #[serde(default)]
    pub interpolated_frame_count: Option<u32>,
}

impl SequenceRecord {
    /// Record for `sequence`; `dense` adds every interpolated frame.
    pub fn from_sequence(sequence: &BoundingBoxSequence, dense: bool) -> Self {
        let boxes = if dense {
            sequence
                .dense_boxes()
                .into_iter()
                .map(|(frame, sample)| BoxRecord::new(frame, sample.bbox, sample.is_keyframe))
                .collect()
        } else {
            sequence
                .keyframes()
                .iter()
                .map(|k| BoxRecord::new(k.frame, k.bbox, true))
                .collect()
        };
        Self {
            boxes,
            interpolation_segments: sequence.segments().to_vec(),
            visibility_ranges: sequence.visibility_ranges().to_vec(),
            tracking_source: sequence.tracking_source().clone(),
            total_frames: sequence.total_frames(),
            keyframe_count: Some(sequence.keyframe_count()),
            interpolated_frame_count: Some(sequence.interpolated_frame_count()),
        }
    }

    /// Rebuild the sequence.
    ///
    /// Keyframes are the boxes flagged `isKeyframe`, or every box when none is
    /// flagged. Segment types are looked up by start and end frame and default
    /// to linear. Visibility ranges are normalized onto `[0, totalFrames)`.
    pub fn to_sequence(
        &self,
        id: AnnotationId,
    ) -> Result<(BoundingBoxSequence, Vec<FormatWarning>), FormatError> {
        let mut warnings = Vec::new();

        let flagged: Vec<&BoxRecord> = self.boxes.iter().filter(|b| b.is_keyframe).collect();
        let sources: Vec<&BoxRecord> = if flagged.is_empty() {
            self.boxes.iter().collect()
        } else {
            flagged
        };
        let mut keyframes: Vec<Keyframe> = sources
            .iter()
            .map(|b| Keyframe::new(b.frame_number, b.bbox()))
            .collect();
        keyframes.sort_by_key(|k| k.frame);
        let before_dedup = keyframes.len();
        keyframes.dedup_by_key(|k| k.frame);
        if keyframes.is_empty() {
            return Err(FormatError::missing_field("boxes"));
        }
        if keyframes.len() != before_dedup {
            warnings.push(
                FormatWarning::warning(format!(
                    "dropped {} duplicate keyframe frames",
                    before_dedup - keyframes.len()
                ))
                .with_annotation(id),
            );
        }

        let segments: Vec<InterpolationSegment> = keyframes
            .windows(2)
            .map(|pair| {
                let (start, end) = (pair[0].frame, pair[1].frame);
                self.interpolation_segments
                    .iter()
                    .find(|s| s.start_frame == start && s.end_frame == end)
                    .cloned()
                    .unwrap_or_else(|| {
                        warnings.push(
                            FormatWarning::warning(format!(
                                "no segment for [{start}, {end}], using linear"
                            ))
                            .with_annotation(id),
                        );
                        InterpolationSegment::new(start, end, InterpolationType::Linear)
                    })
            })
            .collect();

        let visibility = if self.visibility_ranges.is_empty() {
            vec![VisibilityRange::new(0, self.total_frames, true)]
        } else {
            normalize_ranges(&self.visibility_ranges, self.total_frames)
        };

        let sequence = BoundingBoxSequence::from_parts(
            keyframes,
            segments,
            visibility,
            self.tracking_source.clone(),
            self.total_frames,
        )
        .map_err(|source| FormatError::InvalidSequence { id, source })?;

        self.check_counts(id, &sequence, &mut warnings);
        Ok((sequence, warnings))
    }

    fn check_counts(
        &self,
        id: AnnotationId,
        sequence: &BoundingBoxSequence,
        warnings: &mut Vec<FormatWarning>,
    ) {
        let checks = [
            (
                "keyframeCount",
                self.keyframe_count.map(|c| c as u64),
                sequence.keyframe_count() as u64,
            ),
            (
                "interpolatedFrameCount",
                self.interpolated_frame_count.map(u64::from),
                u64::from(sequence.interpolated_frame_count()),
            ),
        ];
        for (field, stored, actual) in checks {
            if let Some(stored) = stored.filter(|s| *s != actual) {
                log::warn!(
                    "Annotation {}: stored {} {} does not match recomputed {}",
                    id,
                    field,
                    stored,
                    actual
                );
                warnings.push(
                    FormatWarning::warning(format!(
                        "{field} {stored} recomputed as {actual}"
                    ))
                    .with_annotation(id),
                );
            }
        }
    }
}

/// One JSONL line: an annotation ID with its sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    pub id: AnnotationId,
    pub bounding_box_sequence: SequenceRecord,
}

impl AnnotationRecord {
    pub fn from_annotation(annotation: &Annotation, dense: bool) -> Self {
        Self {
            id: annotation.id,
            bounding_box_sequence: SequenceRecord::from_sequence(&annotation.sequence, dense),
        }
    }

    pub fn to_annotation(&self) -> Result<(Annotation, Vec<FormatWarning>), FormatError> {
        let (sequence, warnings) = self.bounding_box_sequence.to_sequence(self.id)?;
        Ok((Annotation::new(self.id, sequence), warnings))
    }
}
