//! Geometry primitives in video-frame pixel coordinates.

use serde::{Deserialize, Serialize};

/// Minimum size (width/height) for a drawn bounding box to be kept.
pub const MIN_BOX_SIZE: f32 = 1.0;

/// A 2D point in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Top-left corner X coordinate
    pub x: f32,
    /// Top-left corner Y coordinate
    pub y: f32,
    /// Width of the box
    pub width: f32,
    /// Height of the box
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a bounding box from two corner points.
    pub fn from_corners(p1: Point, p2: Point) -> Self {
        let x = p1.x.min(p2.x);
        let y = p1.y.min(p2.y);
        let width = (p1.x - p2.x).abs();
        let height = (p1.y - p2.y).abs();
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Like [`BoundingBox::from_corners`], but returns None for boxes too small to keep.
    pub fn from_corners_checked(p1: Point, p2: Point) -> Option<Self> {
        let bbox = Self::from_corners(p1, p2);
        (bbox.width > MIN_BOX_SIZE && bbox.height > MIN_BOX_SIZE).then_some(bbox)
    }

    /// Get the top-left corner.
    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Get the bottom-right corner.
    pub fn bottom_right(&self) -> Point {
        Point::new(self.x + self.width, self.y + self.height)
    }

    /// Get the area of the box.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Check that every component is finite and the size is non-negative.
    pub fn is_valid(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }

    /// Translate the box by a pointer delta.
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Component-wise linear blend: `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(&self, other: &BoundingBox, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            width: self.width + (other.width - self.width) * t,
            height: self.height + (other.height - self.height) * t,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_from_corners() {
        let bbox = BoundingBox::from_corners(Point::new(30.0, 40.0), Point::new(10.0, 20.0));
        assert_eq!(bbox, BoundingBox::new(10.0, 20.0, 20.0, 20.0));
        assert_eq!(bbox.bottom_right(), Point::new(30.0, 40.0));
    }

    #[test]
    fn test_tiny_box_rejected() {
        assert!(
            BoundingBox::from_corners_checked(Point::new(5.0, 5.0), Point::new(5.5, 50.0))
                .is_none()
        );
        assert!(
            BoundingBox::from_corners_checked(Point::new(5.0, 5.0), Point::new(50.0, 50.0))
                .is_some()
        );
    }

    #[test]
    fn test_lerp_midpoint() {
        let a = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let b = BoundingBox::new(100.0, 100.0, 100.0, 100.0);
        assert_eq!(a.lerp(&b, 0.5), BoundingBox::new(50.0, 50.0, 100.0, 100.0));
        assert_eq!(a.lerp(&b, 0.0), a);
        assert_eq!(a.lerp(&b, 1.0), b);
    }
}
