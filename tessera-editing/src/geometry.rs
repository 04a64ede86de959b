//! Pixel-space geometry used by the editing engine.
//!
//! Shaping engines report glyph geometry in fractional pixels, so every type
//! here is `f32` based. The coordinate system matches the rest of tessera:
//! origin at the top-left corner, x grows to the right and y grows downward.
//!
//! # Key Types
//!
//! - [`Point`] - A 2D position (x, y)
//! - [`Size`] - A 2D extent (width, height)
//! - [`Rect`] - An axis-aligned rectangle
//! - [`Constraints`] - Min/max bounds handed down by the host layout engine
//!
//! # Example
//!
//! ```
//! use tessera_editing::geometry::{Point, Rect, Size};
//!
//! let rect = Rect::from_origin_size(Point::new(10.0, 4.0), Size::new(100.0, 20.0));
//! assert!(rect.contains(Point::new(50.0, 10.0)));
//! assert_eq!(rect.right(), 110.0);
//! ```

use std::ops::{Add, Sub};

/// A position in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Point {
    /// The origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Creates a new point.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns this point moved by `dx`, `dy`.
    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Manhattan distance, the metric used for click tolerance checks.
    pub fn manhattan_distance(self, other: Self) -> f32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A width/height pair in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    /// Horizontal extent.
    pub width: f32,
    /// Vertical extent.
    pub height: f32,
}

impl Size {
    /// Zero size.
    pub const ZERO: Self = Self {
        width: 0.0,
        height: 0.0,
    };

    /// Creates a new size.
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width, never negative for rectangles produced by this crate.
    pub width: f32,
    /// Height, never negative for rectangles produced by this crate.
    pub height: f32,
}

impl Rect {
    /// Empty rectangle at the origin.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    /// Creates a new rectangle.
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a rectangle from its top-left corner and size.
    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// Top-left corner.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Width and height.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Center point.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Returns this rectangle moved by `delta`.
    pub fn translate(&self, delta: Point) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }

    /// Returns this rectangle grown by `dx` on the left and right and `dy` on
    /// the top and bottom. Negative values shrink it.
    pub fn inflate(&self, dx: f32, dy: f32) -> Self {
        Self::new(
            self.x - dx,
            self.y - dy,
            (self.width + dx * 2.0).max(0.0),
            (self.height + dy * 2.0).max(0.0),
        )
    }

    /// Whether `point` lies inside, edges included.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &Self) -> bool {
        other.x >= self.x
            && other.right() <= self.right()
            && other.y >= self.y
            && other.bottom() <= self.bottom()
    }

    /// Overlapping region of two rectangles, if any.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x1 < x2 && y1 < y2 {
            Some(Self::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }
}

/// Size bounds provided by the host layout engine during measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraints {
    /// Minimum width.
    pub min_width: f32,
    /// Maximum width, may be `f32::INFINITY`.
    pub max_width: f32,
    /// Minimum height.
    pub min_height: f32,
    /// Maximum height, may be `f32::INFINITY`.
    pub max_height: f32,
}

impl Constraints {
    /// Constraints that accept any size.
    pub const UNBOUNDED: Self = Self {
        min_width: 0.0,
        max_width: f32::INFINITY,
        min_height: 0.0,
        max_height: f32::INFINITY,
    };

    /// Constraints with zero minimums and the given maximums.
    pub fn loose(max_width: f32, max_height: f32) -> Self {
        Self {
            min_width: 0.0,
            max_width,
            min_height: 0.0,
            max_height,
        }
    }

    /// Clamps `size` into these bounds.
    pub fn constrain(&self, size: Size) -> Size {
        Size::new(
            size.width.clamp(self.min_width, self.max_width.max(self.min_width)),
            size.height
                .clamp(self.min_height, self.max_height.max(self.min_height)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges() {
        let rect = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect.right(), 40.0);
        assert_eq!(rect.bottom(), 60.0);
        assert_eq!(rect.center(), Point::new(25.0, 40.0));
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(5.0, 5.0, 5.0, 5.0)));

        let c = Rect::new(20.0, 20.0, 1.0, 1.0);
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn test_rect_contains_and_inflate() {
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains(Point::new(10.0, 10.0)));
        assert!(!rect.contains(Point::new(10.5, 3.0)));
        let grown = rect.inflate(2.0, 1.0);
        assert_eq!(grown, Rect::new(-2.0, -1.0, 14.0, 12.0));
        assert!(grown.contains_rect(&rect));
    }

    #[test]
    fn test_constraints_constrain() {
        let constraints = Constraints {
            min_width: 10.0,
            max_width: 100.0,
            min_height: 0.0,
            max_height: 20.0,
        };
        assert_eq!(
            constraints.constrain(Size::new(150.0, 30.0)),
            Size::new(100.0, 20.0)
        );
        assert_eq!(
            constraints.constrain(Size::new(5.0, 5.0)),
            Size::new(10.0, 5.0)
        );
        assert_eq!(
            Constraints::UNBOUNDED.constrain(Size::new(1e6, 1e6)),
            Size::new(1e6, 1e6)
        );
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(1.0, 1.0);
        let b = Point::new(4.0, -3.0);
        assert_eq!(a.manhattan_distance(b), 7.0);
        assert_eq!(b - a, Point::new(3.0, -4.0));
    }
}
