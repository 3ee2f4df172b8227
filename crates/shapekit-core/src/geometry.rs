//! Geometry primitives shared by every drawing element.
//!
//! Points and vectors are `kurbo` types. A [`Polygon`] is the ordered list of
//! anchor points that defines an element's shape; it is treated as a value and
//! replaced wholesale on every edit.

use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Tolerance used when deciding whether a rotation angle is axis-aligned.
pub const ANGLE_EPSILON: f64 = 1e-9;

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    /// The other axis.
    pub fn other(self) -> Self {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }

    /// Read this axis' coordinate from a point.
    pub fn of(self, point: Point) -> f64 {
        match self {
            Axis::X => point.x,
            Axis::Y => point.y,
        }
    }

    /// Return a copy of `point` with this axis' coordinate replaced.
    pub fn with(self, point: Point, value: f64) -> Point {
        match self {
            Axis::X => Point::new(value, point.y),
            Axis::Y => Point::new(point.x, value),
        }
    }
}

/// Normalize an angle in radians to `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let normalized = angle.rem_euclid(TAU);
    if TAU - normalized < ANGLE_EPSILON {
        0.0
    } else {
        normalized
    }
}

/// Whether an angle is (within [`ANGLE_EPSILON`]) zero.
pub fn is_axis_aligned(angle: f64) -> bool {
    let a = normalize_angle(angle);
    a < ANGLE_EPSILON || TAU - a < ANGLE_EPSILON
}

/// Whether an angle is a multiple of 90°.
pub fn is_right_angle_multiple(angle: f64) -> bool {
    let a = normalize_angle(angle) % FRAC_PI_2;
    a < ANGLE_EPSILON || FRAC_PI_2 - a < ANGLE_EPSILON
}

/// Number of quarter turns in an angle that is a multiple of 90°.
pub fn quarter_turns(angle: f64) -> u8 {
    ((normalize_angle(angle) / FRAC_PI_2).round() as u8) % 4
}

/// Smallest difference between the directions of two undirected lines, in `[0, π/2]`.
pub fn line_angle_difference(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(PI);
    d.min(PI - d)
}

/// Angle of a vector in radians.
pub fn angle_of(v: Vec2) -> f64 {
    v.y.atan2(v.x)
}

/// Rotate `point` around `center` by `angle` radians.
pub fn rotate_around(point: Point, center: Point, angle: f64) -> Point {
    if angle == 0.0 {
        return point;
    }
    let (sin, cos) = angle.sin_cos();
    let d = point - center;
    Point::new(
        center.x + d.x * cos - d.y * sin,
        center.y + d.x * sin + d.y * cos,
    )
}

/// Rotate a vector by `angle` radians.
pub fn rotate_vec(v: Vec2, angle: f64) -> Vec2 {
    if angle == 0.0 {
        return v;
    }
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// Intersection of the line through `p1` at `a1` with the line through `p2` at `a2`.
///
/// Returns `None` for parallel lines.
pub fn line_intersection(p1: Point, a1: f64, p2: Point, a2: f64) -> Option<Point> {
    let d1 = Vec2::new(a1.cos(), a1.sin());
    let d2 = Vec2::new(a2.cos(), a2.sin());
    let denom = d1.cross(d2);
    if denom.abs() < 1e-9 {
        return None;
    }
    let t = (p2 - p1).cross(d2) / denom;
    Some(p1 + d1 * t)
}

/// Orthogonal projection of `point` onto the line through `origin` at `angle`.
pub fn project_onto_line(point: Point, origin: Point, angle: f64) -> Point {
    let dir = Vec2::new(angle.cos(), angle.sin());
    origin + dir * (point - origin).dot(dir)
}

/// Closest point on segment `a→b` to `point`, with its parameter along the segment.
pub fn closest_point_on_segment(point: Point, a: Point, b: Point) -> (Point, f64) {
    let seg = b - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return (a, 0.0);
    }
    let t = ((point - a).dot(seg) / len_sq).clamp(0.0, 1.0);
    (a + seg * t, t)
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let (proj, _) = closest_point_on_segment(point, a, b);
    point.distance(proj)
}

/// Smallest axis-aligned rectangle containing all points.
pub fn bounding_rect(points: &[Point]) -> Rect {
    let Some(first) = points.first() else {
        return Rect::ZERO;
    };
    points
        .iter()
        .skip(1)
        .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
}

/// Whether `inner` lies completely inside `outer` (edges inclusive).
pub fn rect_contains_rect(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.y0 >= outer.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

/// The four corners of a rectangle, clockwise from the top-left.
pub fn rect_corners(rect: Rect) -> [Point; 4] {
    [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ]
}

/// Even-odd point-in-polygon test.
pub fn point_in_polygon(point: Point, points: &[Point]) -> bool {
    if points.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (pi, pj) = (points[i], points[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Segments of a point list, including the closing segment when `closed`.
pub fn segments(points: &[Point], closed: bool) -> Vec<(Point, Point)> {
    let mut segs: Vec<(Point, Point)> = points.windows(2).map(|w| (w[0], w[1])).collect();
    if closed && points.len() > 2 {
        segs.push((points[points.len() - 1], points[0]));
    }
    segs
}

/// Ordered anchor points of an element's shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    /// Create a polygon from points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    /// Copy with the point at `index` replaced.
    pub fn with_point(&self, index: usize, point: Point) -> Self {
        let mut points = self.points.clone();
        if let Some(p) = points.get_mut(index) {
            *p = point;
        }
        Self { points }
    }

    /// Copy with `point` inserted before `index`.
    pub fn inserted(&self, index: usize, point: Point) -> Self {
        let mut points = self.points.clone();
        points.insert(index.min(points.len()), point);
        Self { points }
    }

    /// Copy with the point at `index` removed.
    pub fn removed(&self, index: usize) -> Self {
        let mut points = self.points.clone();
        if index < points.len() {
            points.remove(index);
        }
        Self { points }
    }

    /// Copy with every point moved by `delta`.
    pub fn translated(&self, delta: Vec2) -> Self {
        self.map(|p| p + delta)
    }

    /// Copy with every point transformed by `f`.
    pub fn map(&self, f: impl Fn(Point) -> Point) -> Self {
        Self {
            points: self.points.iter().map(|p| f(*p)).collect(),
        }
    }

    /// Bounding box of the (unrotated) points.
    pub fn bounding_rect(&self) -> Rect {
        bounding_rect(&self.points)
    }
}

impl From<Vec<Point>> for Polygon {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(-FRAC_PI_2) - 3.0 * FRAC_PI_2).abs() < 1e-12);
        assert!((normalize_angle(TAU + 0.5) - 0.5).abs() < 1e-12);
        assert_eq!(normalize_angle(-1e-12), 0.0);
        assert_eq!(normalize_angle(TAU), 0.0);
    }

    #[test]
    fn test_axis_alignment() {
        assert!(is_axis_aligned(0.0));
        assert!(is_axis_aligned(TAU));
        assert!(is_axis_aligned(1e-12));
        assert!(!is_axis_aligned(1e-6));
        assert!(is_right_angle_multiple(FRAC_PI_2));
        assert!(is_right_angle_multiple(PI));
        assert!(!is_right_angle_multiple(0.3));
        assert_eq!(quarter_turns(3.0 * FRAC_PI_2), 3);
    }

    #[test]
    fn test_rotate_around() {
        let p = rotate_around(Point::new(10.0, 0.0), Point::ZERO, FRAC_PI_2);
        assert!((p.x - 0.0).abs() < 1e-9);
        assert!((p.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_line_intersection() {
        let p = line_intersection(Point::new(0.0, 0.0), 0.0, Point::new(5.0, 5.0), FRAC_PI_2)
            .expect("lines cross");
        assert!((p.x - 5.0).abs() < 1e-9);
        assert!(p.y.abs() < 1e-9);
        assert!(line_intersection(Point::ZERO, 0.0, Point::new(0.0, 1.0), PI).is_none());
    }

    #[test]
    fn test_line_angle_difference() {
        assert!((line_angle_difference(0.0, PI) - 0.0).abs() < 1e-12);
        assert!((line_angle_difference(0.1, PI - 0.1) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        assert!(point_in_polygon(Point::new(5.0, 5.0), &square));
        assert!(!point_in_polygon(Point::new(15.0, 5.0), &square));
    }

    #[test]
    fn test_polygon_copy_on_write() {
        let poly = Polygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        let moved = poly.with_point(1, Point::new(2.0, 2.0));
        assert_eq!(poly.get(1), Some(Point::new(1.0, 1.0)));
        assert_eq!(moved.get(1), Some(Point::new(2.0, 2.0)));
        assert_eq!(poly.inserted(1, Point::new(0.5, 0.5)).len(), 3);
        assert_eq!(poly.removed(0).len(), 1);
    }

    #[test]
    fn test_bounding_rect() {
        let rect = bounding_rect(&[Point::new(3.0, -1.0), Point::new(-2.0, 4.0)]);
        assert_eq!(rect, Rect::new(-2.0, -1.0, 3.0, 4.0));
        assert!(rect_contains_rect(Rect::new(-5.0, -5.0, 5.0, 5.0), rect));
    }
}
