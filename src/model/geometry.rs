//! Page geometry.
//!
//! All coordinates use a top-left origin in PDF points (1/72 inch): `y` grows
//! downward, so "above" means a smaller `y0`.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
}

impl BBox {
    /// Create a box from its edges, normalizing swapped coordinates.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Width of the box.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the box.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f32 {
        (self.y0 + self.y1) / 2.0
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Length of the shared vertical range (negative when disjoint).
    pub fn vertical_overlap(&self, other: &BBox) -> f32 {
        self.y1.min(other.y1) - self.y0.max(other.y0)
    }

    /// Length of the shared horizontal range (negative when disjoint).
    pub fn horizontal_overlap(&self, other: &BBox) -> f32 {
        self.x1.min(other.x1) - self.x0.max(other.x0)
    }

    /// Whether a point lies inside the box (edges included).
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        BBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// Page dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    /// Page width
    pub width: f32,
    /// Page height
    pub height: f32,
}

impl PageSize {
    /// Create page dimensions.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// US Letter (8.5 x 11 inches), the fallback when a page declares no MediaBox.
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::letter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_normalizes() {
        let b = BBox::new(10.0, 50.0, 0.0, 20.0);
        assert_eq!(b, BBox::new(0.0, 20.0, 10.0, 50.0));
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 30.0);
    }

    #[test]
    fn test_bbox_overlap() {
        let a = BBox::new(0.0, 0.0, 100.0, 10.0);
        let b = BBox::new(50.0, 5.0, 150.0, 15.0);
        let c = BBox::new(0.0, 20.0, 100.0, 30.0);
        assert_eq!(a.vertical_overlap(&b), 5.0);
        assert_eq!(a.horizontal_overlap(&b), 50.0);
        assert!(a.vertical_overlap(&c) < 0.0);
        assert_eq!(a.union(&c), BBox::new(0.0, 0.0, 100.0, 30.0));
    }

    #[test]
    fn test_bbox_serializes_as_array() {
        let b = BBox::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(serde_json::to_string(&b).unwrap(), "[1.0,2.0,3.0,4.0]");
        let back: BBox = serde_json::from_str("[1.0,2.0,3.0,4.0]").unwrap();
        assert_eq!(back, b);
    }
}
