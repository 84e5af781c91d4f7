//! 2D geometry primitives: points, rectangles and affine matrices.
//!
//! Matrices follow the display-list convention used throughout the crate:
//!
//! ```text
//! | a  c  tx |
//! | b  d  ty |      x' = a·x + c·y + tx
//! | 0  0  1  |      y' = b·x + d·y + ty
//! ```
//!
//! `concat(m)` appends `m` (apply `self`, then `m`); `prepend(m)` applies
//! `m` first. The painter's model-view matrix is built exclusively with
//! `prepend`, so children transform into their parent's space.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// A rectangle without area is empty, regardless of its origin.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains_point(&self, p: Point) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.right() && p.y < self.bottom()
    }

    /// Smallest rectangle enclosing both. Empty operands are ignored, so
    /// folding a list into `Rect::default()` yields the bounds of the list.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Overlapping area, or an empty rectangle at the origin.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return Rect::default();
        }
        Rect::new(left, top, right - left, bottom - top)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub fn translation(tx: f32, ty: f32) -> Self {
        Self { tx, ty, ..Self::IDENTITY }
    }

    pub fn scaling(sx: f32, sy: f32) -> Self {
        Self { a: sx, d: sy, ..Self::IDENTITY }
    }

    pub fn rotation(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self { a: cos, b: sin, c: -sin, d: cos, tx: 0.0, ty: 0.0 }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Append `m`: the result applies `self` first, then `m`.
    pub fn concat(&self, m: &Matrix) -> Matrix {
        Matrix {
            a: self.a * m.a + self.b * m.c,
            b: self.a * m.b + self.b * m.d,
            c: self.c * m.a + self.d * m.c,
            d: self.c * m.b + self.d * m.d,
            tx: self.tx * m.a + self.ty * m.c + m.tx,
            ty: self.tx * m.b + self.ty * m.d + m.ty,
        }
    }

    /// Prepend `m`: the result applies `m` first, then `self`.
    pub fn prepend(&self, m: &Matrix) -> Matrix {
        m.concat(self)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Matrix {
        self.concat(&Matrix::translation(dx, dy))
    }

    pub fn scale(&self, sx: f32, sy: f32) -> Matrix {
        self.concat(&Matrix::scaling(sx, sy))
    }

    pub fn rotate(&self, angle: f32) -> Matrix {
        self.concat(&Matrix::rotation(angle))
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    /// Inverse transform, or `None` for a degenerate (zero-scale) matrix.
    pub fn invert(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        Some(Matrix {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            tx: (self.c * self.ty - self.d * self.tx) * inv,
            ty: (self.b * self.tx - self.a * self.ty) * inv,
        })
    }

    pub fn transform_point(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.tx,
            y: self.b * p.x + self.d * p.y + self.ty,
        }
    }

    /// Axis-aligned bounds of `rect` after transformation.
    pub fn transform_rect_bounds(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(Point::new(rect.x, rect.y)),
            self.transform_point(Point::new(rect.right(), rect.y)),
            self.transform_point(Point::new(rect.x, rect.bottom())),
            self.transform_point(Point::new(rect.right(), rect.bottom())),
        ];
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for c in corners {
            min_x = min_x.min(c.x);
            min_y = min_y.min(c.y);
            max_x = max_x.max(c.x);
            max_y = max_y.max(c.y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

/// Smallest power of two that is `>= value` (at least 1).
pub fn next_power_of_two(value: f32) -> f32 {
    let v = value.ceil().max(1.0) as u32;
    v.next_power_of_two() as f32
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_rect_union_ignores_empty() {
        let empty = Rect::default();
        let r = Rect::new(-3.0, 2.0, 10.0, 4.0);
        assert_eq!(empty.union(&r), r);
        assert_eq!(r.union(&empty), r);
    }

    #[test]
    fn test_rect_union_spans_both() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, -5.0, 10.0, 10.0);
        assert_eq!(a.union(&b), Rect::new(0.0, -5.0, 15.0, 15.0));
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersection(&b), Rect::new(5.0, 5.0, 5.0, 5.0));
        let c = Rect::new(20.0, 20.0, 1.0, 1.0);
        assert!(a.intersection(&c).is_empty());
    }

    #[test]
    fn test_contains_point_half_open() {
        let r = Rect::new(0.0, 0.0, 10.0, 5.0);
        assert!(r.contains_point(Point::new(0.0, 0.0)));
        assert!(r.contains_point(Point::new(9.9, 4.9)));
        assert!(!r.contains_point(Point::new(10.0, 2.0)));
        assert!(!r.contains_point(Point::new(-0.1, 2.0)));
    }

    #[test]
    fn test_concat_order() {
        // scale then translate: (1,1) → (2,2) → (12,2)
        let m = Matrix::scaling(2.0, 2.0).concat(&Matrix::translation(10.0, 0.0));
        let p = m.transform_point(Point::new(1.0, 1.0));
        assert!(approx(p.x, 12.0) && approx(p.y, 2.0));
    }

    #[test]
    fn test_prepend_order() {
        // prepend translate to scale: translate first, then scale.
        let m = Matrix::scaling(2.0, 2.0).prepend(&Matrix::translation(10.0, 0.0));
        let p = m.transform_point(Point::new(1.0, 1.0));
        assert!(approx(p.x, 22.0) && approx(p.y, 2.0));
    }

    #[test]
    fn test_invert_round_trip() {
        let m = Matrix::rotation(0.7).scale(2.0, 3.0).translate(5.0, -4.0);
        let inv = m.invert().unwrap();
        let p = Point::new(3.0, 7.0);
        let back = inv.transform_point(m.transform_point(p));
        assert!(approx(back.x, p.x) && approx(back.y, p.y));
    }

    #[test]
    fn test_invert_degenerate() {
        assert!(Matrix::scaling(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn test_rect_bounds_under_rotation() {
        let m = Matrix::rotation(std::f32::consts::FRAC_PI_2);
        let b = m.transform_rect_bounds(&Rect::new(0.0, 0.0, 10.0, 5.0));
        assert!(approx(b.x, -5.0) && approx(b.y, 0.0));
        assert!(approx(b.width, 5.0) && approx(b.height, 10.0));
    }

    #[test]
    fn test_next_power_of_two() {
        assert_eq!(next_power_of_two(1.0), 1.0);
        assert_eq!(next_power_of_two(100.0), 128.0);
        assert_eq!(next_power_of_two(128.0), 128.0);
        assert_eq!(next_power_of_two(128.5), 256.0);
        assert_eq!(next_power_of_two(0.0), 1.0);
    }
}
