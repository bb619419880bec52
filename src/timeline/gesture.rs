//! Pointer gestures on the canvas and the timeline strip.

use crate::model::{AnnotationId, BoundingBox, Point};

/// Grab point on a box: one of the corners, or the body to move it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Body,
}

impl Handle {
    /// Corner handles, checked before the body when hit-testing.
    pub const CORNERS: [Handle; 4] = [
        Handle::TopLeft,
        Handle::TopRight,
        Handle::BottomLeft,
        Handle::BottomRight,
    ];

    /// Position of this handle on `bbox` (body handle: the center).
    pub fn position(&self, bbox: &BoundingBox) -> Point {
        let (left, top) = (bbox.x, bbox.y);
        let (right, bottom) = (bbox.x + bbox.width, bbox.y + bbox.height);
        match self {
            Handle::TopLeft => Point::new(left, top),
            Handle::TopRight => Point::new(right, top),
            Handle::BottomLeft => Point::new(left, bottom),
            Handle::BottomRight => Point::new(right, bottom),
            Handle::Body => Point::new(left + bbox.width / 2.0, top + bbox.height / 2.0),
        }
    }

    /// Find the handle under `point`; corners within `tolerance` win over the body.
    pub fn hit(bbox: &BoundingBox, point: &Point, tolerance: f32) -> Option<Handle> {
        let corner = Self::CORNERS.into_iter().find(|h| {
            let p = h.position(bbox);
            (p.x - point.x).abs() <= tolerance && (p.y - point.y).abs() <= tolerance
        });
        if corner.is_some() {
            return corner;
        }
        let inside = point.x >= bbox.x
            && point.x <= bbox.x + bbox.width
            && point.y >= bbox.y
            && point.y <= bbox.y + bbox.height;
        inside.then_some(Handle::Body)
    }

    /// Box after dragging this handle from `origin` to `current`.
    ///
    /// Corners move against the fixed opposite corner; the body translates.
    pub fn apply(&self, original: &BoundingBox, origin: Point, current: Point) -> BoundingBox {
        let (dx, dy) = (current.x - origin.x, current.y - origin.y);
        let opposite = match self {
            Handle::TopLeft => Handle::BottomRight,
            Handle::TopRight => Handle::BottomLeft,
            Handle::BottomLeft => Handle::TopRight,
            Handle::BottomRight => Handle::TopLeft,
            Handle::Body => return original.translated(dx, dy),
        };
        let moved = self.position(original);
        BoundingBox::from_corners(
            opposite.position(original),
            Point::new(moved.x + dx, moved.y + dy),
        )
    }
}

/// The drag currently in progress.
///
/// Drags update live but only touch the model when they end.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Rubber-band drawing of a new box on `frame`
    Drawing {
        frame: u32,
        origin: Point,
        current: Point,
    },
    /// Moving a keyframe along the timeline
    DraggingKeyframe {
        annotation: AnnotationId,
        from_frame: u32,
        to_frame: u32,
    },
    /// Resizing or moving the box on `frame`
    DraggingHandle {
        annotation: AnnotationId,
        frame: u32,
        handle: Handle,
        original: BoundingBox,
        origin: Point,
        current: Point,
    },
}

impl Gesture {
    pub fn is_active(&self) -> bool {
        !matches!(self, Gesture::Idle)
    }

    /// Name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Gesture::Idle => "idle",
            Gesture::Drawing { .. } => "drawing",
            Gesture::DraggingKeyframe { .. } => "keyframe drag",
            Gesture::DraggingHandle { .. } => "handle drag",
        }
    }

    /// Follow the pointer. Keyframe drags ignore pointer positions.
    pub fn update_pointer(&mut self, point: Point) {
        match self {
            Gesture::Drawing { current, .. } | Gesture::DraggingHandle { current, .. } => {
                *current = point;
            }
            Gesture::Idle | Gesture::DraggingKeyframe { .. } => {}
        }
    }

    /// Box to draw while the gesture is live (not for keyframe drags).
    pub fn preview_box(&self) -> Option<BoundingBox> {
        match self {
            Gesture::Drawing {
                origin, current, ..
            } => Some(BoundingBox::from_corners(*origin, *current)),
            Gesture::DraggingHandle {
                handle,
                original,
                origin,
                current,
                ..
            } => Some(handle.apply(original, *origin, *current)),
            Gesture::Idle | Gesture::DraggingKeyframe { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> BoundingBox {
        BoundingBox::new(10.0, 10.0, 100.0, 50.0)
    }

    #[test]
    fn test_hit_prefers_corners() {
        let b = bbox();
        assert_eq!(
            Handle::hit(&b, &Point::new(11.0, 9.0), 3.0),
            Some(Handle::TopLeft)
        );
        assert_eq!(
            Handle::hit(&b, &Point::new(110.0, 60.0), 3.0),
            Some(Handle::BottomRight)
        );
        assert_eq!(Handle::hit(&b, &Point::new(50.0, 30.0), 3.0), Some(Handle::Body));
        assert_eq!(Handle::hit(&b, &Point::new(200.0, 30.0), 3.0), None);
    }

    #[test]
    fn test_corner_drag_keeps_opposite_corner() {
        let b = bbox();
        let resized = Handle::BottomRight.apply(&b, Point::new(110.0, 60.0), Point::new(130.0, 70.0));
        assert_eq!(resized, BoundingBox::new(10.0, 10.0, 120.0, 60.0));

        let resized = Handle::TopLeft.apply(&b, Point::new(10.0, 10.0), Point::new(0.0, 20.0));
        assert_eq!(resized, BoundingBox::new(0.0, 20.0, 110.0, 40.0));
    }

    #[test]
    fn test_corner_drag_past_opposite_flips() {
        let b = bbox();
        let flipped = Handle::TopLeft.apply(&b, Point::new(10.0, 10.0), Point::new(130.0, 10.0));
        assert_eq!(flipped, BoundingBox::new(110.0, 10.0, 20.0, 50.0));
    }

    #[test]
    fn test_body_drag_translates() {
        let b = bbox();
        let moved = Handle::Body.apply(&b, Point::new(50.0, 30.0), Point::new(55.0, 20.0));
        assert_eq!(moved, BoundingBox::new(15.0, 0.0, 100.0, 50.0));
    }

    #[test]
    fn test_preview_follows_pointer() {
        let mut gesture = Gesture::Drawing {
            frame: 3,
            origin: Point::new(10.0, 10.0),
            current: Point::new(10.0, 10.0),
        };
        assert!(gesture.is_active());
        gesture.update_pointer(Point::new(0.0, 40.0));
        assert_eq!(
            gesture.preview_box(),
            Some(BoundingBox::new(0.0, 10.0, 10.0, 30.0))
        );
        assert_eq!(Gesture::Idle.preview_box(), None);
    }
}
