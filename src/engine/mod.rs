//! The temporal annotation engine.
//!
//! Both halves are implemented as inherent methods on
//! [`BoundingBoxSequence`](crate::model::BoundingBoxSequence):
//!
//! - **interpolator**: `box_at_frame`, keyframe add/delete/move/copy and
//!   per-segment interpolation type
//! - **visibility**: `is_visible`, `toggle_at`, `set_visible` and the bracket
//!   marker gesture
//!
//! Every method either applies completely or returns an [`EditError`](crate::EditError)
//! and leaves the sequence untouched.

mod easing;
mod interpolator;
mod visibility;

pub use easing::{cubic_bezier, ease};
pub use interpolator::FrameBox;
pub use visibility::{BracketMarker, BracketOutcome, normalize_ranges};

#[cfg(test)]
mod tests {
    use crate::model::{BoundingBox, BoundingBoxSequence, InterpolationType};

    /// Interleave keyframe and visibility edits and check invariants after each.
    #[test]
    fn test_mixed_edit_sequence_keeps_invariants() {
        let mut seq =
            BoundingBoxSequence::new(40, BoundingBox::new(0.0, 0.0, 20.0, 20.0), 200).unwrap();
        let steps: [fn(&mut BoundingBoxSequence); 10] = [
            |s: &mut BoundingBoxSequence| {
                s.add_keyframe(10, Some(BoundingBox::new(5.0, 5.0, 20.0, 20.0)))
                    .unwrap();
            },
            |s: &mut BoundingBoxSequence| {
                s.add_keyframe(120, None).unwrap();
            },
            |s: &mut BoundingBoxSequence| s.toggle_at(60).unwrap(),
            |s: &mut BoundingBoxSequence| {
                s.add_keyframe(80, Some(BoundingBox::new(50.0, 50.0, 30.0, 30.0)))
                    .unwrap();
            },
            |s: &mut BoundingBoxSequence| {
                s.set_interpolation_type(40, InterpolationType::EaseInOut, None)
                    .unwrap();
            },
            |s: &mut BoundingBoxSequence| s.set_visible(100, 150, false).unwrap(),
            |s: &mut BoundingBoxSequence| {
                s.move_keyframe(120, 199).unwrap();
            },
            |s: &mut BoundingBoxSequence| {
                s.delete_keyframe(40).unwrap();
            },
            |s: &mut BoundingBoxSequence| s.toggle_at(0).unwrap(),
            |s: &mut BoundingBoxSequence| {
                s.copy_previous_keyframe(150).unwrap();
            },
        ];

        for step in steps {
            step(&mut seq);
            seq.check_invariants().unwrap();
            let (first, last) = seq.keyframe_range();
            let spans: u32 = seq.segments().iter().map(|s| s.span()).sum();
            assert_eq!(spans, last - first);
            for keyframe in seq.keyframes() {
                assert_eq!(seq.box_at_frame(keyframe.frame).bbox, keyframe.bbox);
            }
        }
        assert_eq!(seq.keyframe_count(), 4);
    }
}
