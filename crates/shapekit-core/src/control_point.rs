//! Control points (draggable handles) and pointer cursors.

use crate::element::ElementCore;
use crate::geometry::{angle_of, normalize_angle};
use crate::settings::SnapSettings;
use crate::snap::SnapFeedback;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

/// Distance of the rotation handle above the top edge.
pub const ROTATE_HANDLE_OFFSET: f64 = 25.0;

/// Corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    /// Corner on the other side of the horizontal and/or vertical axis.
    pub fn mirrored(self, horizontal: bool, vertical: bool) -> Self {
        let (mut left, mut top) = match self {
            Corner::TopLeft => (true, true),
            Corner::TopRight => (false, true),
            Corner::BottomLeft => (true, false),
            Corner::BottomRight => (false, false),
        };
        if horizontal {
            left = !left;
        }
        if vertical {
            top = !top;
        }
        match (left, top) {
            (true, true) => Corner::TopLeft,
            (false, true) => Corner::TopRight,
            (true, false) => Corner::BottomLeft,
            (false, false) => Corner::BottomRight,
        }
    }

    pub fn opposite(self) -> Self {
        self.mirrored(true, true)
    }
}

/// Edge positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Top, Edge::Right, Edge::Bottom, Edge::Left];

    pub fn mirrored(self, horizontal: bool, vertical: bool) -> Self {
        match self {
            Edge::Left if horizontal => Edge::Right,
            Edge::Right if horizontal => Edge::Left,
            Edge::Top if vertical => Edge::Bottom,
            Edge::Bottom if vertical => Edge::Top,
            other => other,
        }
    }
}

/// Geometric feature a control point is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlPointKind {
    /// Vertex of a poly element.
    PolyPoint(usize),
    Edge(Edge),
    Corner(Corner),
    Rotate,
}

/// A handle owned by an element.
///
/// The anchor is not stored; the owning element computes it from its current
/// shape and transform, so handles never go stale after a shape change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPoint {
    pub kind: ControlPointKind,
    /// Flagged while a dragged vertex sits on a neighbor; removed on release.
    pub marked_for_removal: bool,
    pub hovered: bool,
}

impl ControlPoint {
    pub fn new(kind: ControlPointKind) -> Self {
        Self {
            kind,
            marked_for_removal: false,
            hovered: false,
        }
    }

    pub fn poly_point_index(&self) -> Option<usize> {
        match self.kind {
            ControlPointKind::PolyPoint(i) => Some(i),
            _ => None,
        }
    }
}

/// Check if `point` hits a handle anchored at `anchor`.
pub fn hit_test_anchor(anchor: Point, point: Point, radius: f64) -> bool {
    let dx = point.x - anchor.x;
    let dy = point.y - anchor.y;
    dx * dx + dy * dy <= radius * radius
}

/// Resize cursor direction, named by compass point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResizeDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl ResizeDirection {
    /// Direction for a handle lying at `angle` from the element center
    /// (screen coordinates, y down).
    pub fn from_angle(angle: f64) -> Self {
        // East is 0, south is π/2.
        let sector = ((normalize_angle(angle) + FRAC_PI_4 / 2.0) / FRAC_PI_4).floor() as usize % 8;
        match sector {
            0 => ResizeDirection::E,
            1 => ResizeDirection::SE,
            2 => ResizeDirection::S,
            3 => ResizeDirection::SW,
            4 => ResizeDirection::W,
            5 => ResizeDirection::NW,
            6 => ResizeDirection::N,
            _ => ResizeDirection::NE,
        }
    }
}

/// Pointer cursor reported back to the host after a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cursor {
    Default,
    Pointer,
    Move,
    NotAllowed,
    Crosshair,
    Rotate,
    AddPoint,
    Resize(ResizeDirection),
}

/// Cursor for hovering a control point anchored at `anchor` on an element
/// centered at `center`.
pub fn cursor_for(kind: ControlPointKind, anchor: Point, center: Point) -> Cursor {
    match kind {
        ControlPointKind::Rotate => Cursor::Rotate,
        ControlPointKind::PolyPoint(_) => Cursor::Move,
        ControlPointKind::Edge(_) | ControlPointKind::Corner(_) => {
            if anchor.distance(center) < f64::EPSILON {
                return Cursor::Move;
            }
            Cursor::Resize(ResizeDirection::from_angle(angle_of(anchor - center)))
        }
    }
}

/// Rotate an element so its rotation handle points at `pointer` (parent frame).
///
/// With angle snapping, an angle within the threshold of a multiple of the
/// step lands on it and a radial guide is returned. Farther out the rotation
/// follows the pointer freely.
pub fn rotate_towards(
    core: &mut ElementCore,
    pointer: Point,
    settings: &SnapSettings,
) -> Option<SnapFeedback> {
    let center = core.center();
    if pointer.distance(center) < f64::EPSILON {
        return None;
    }
    // Offset so 0 is straight up.
    let mut angle = angle_of(pointer - center) + FRAC_PI_2;
    let mut feedback = None;
    if core.settings.snap_to_angle_enabled {
        let step = settings.angle_step();
        if step > 0.0 {
            let snapped = (angle / step).round() * step;
            if (angle - snapped).abs() <= settings.angle_threshold() {
                angle = snapped;
                feedback = Some(SnapFeedback::radial(center, normalize_angle(angle - FRAC_PI_2)));
            }
        }
    }
    core.set_rotation_angle(angle.rem_euclid(TAU));
    feedback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use std::f64::consts::PI;

    #[test]
    fn test_corner_mirroring() {
        assert_eq!(Corner::TopLeft.mirrored(true, false), Corner::TopRight);
        assert_eq!(Corner::TopLeft.mirrored(false, true), Corner::BottomLeft);
        assert_eq!(Corner::TopRight.opposite(), Corner::BottomLeft);
        assert_eq!(Edge::Top.mirrored(true, false), Edge::Top);
        assert_eq!(Edge::Top.mirrored(false, true), Edge::Bottom);
    }

    #[test]
    fn test_resize_direction_sectors() {
        assert_eq!(ResizeDirection::from_angle(0.0), ResizeDirection::E);
        assert_eq!(ResizeDirection::from_angle(FRAC_PI_2), ResizeDirection::S);
        assert_eq!(ResizeDirection::from_angle(-FRAC_PI_2), ResizeDirection::N);
        assert_eq!(ResizeDirection::from_angle(PI), ResizeDirection::W);
        assert_eq!(ResizeDirection::from_angle(-3.0 * FRAC_PI_4), ResizeDirection::NW);
    }

    #[test]
    fn test_cursor_follows_rotation() {
        let center = Point::new(0.0, 0.0);
        // Right-edge handle of an element rotated by 90° sits below the center.
        let cursor = cursor_for(
            ControlPointKind::Edge(Edge::Right),
            Point::new(0.0, 10.0),
            center,
        );
        assert_eq!(cursor, Cursor::Resize(ResizeDirection::S));
        assert_eq!(
            cursor_for(ControlPointKind::Rotate, Point::ZERO, center),
            Cursor::Rotate
        );
    }

    #[test]
    fn test_hit_test_anchor() {
        assert!(hit_test_anchor(Point::new(10.0, 10.0), Point::new(13.0, 14.0), 5.0));
        assert!(!hit_test_anchor(Point::new(10.0, 10.0), Point::new(14.0, 14.0), 5.0));
    }

    #[test]
    fn test_rotate_towards_snaps() {
        let mut core = ElementCore::new(Polygon::new(vec![
            Point::new(-10.0, -10.0),
            Point::new(10.0, 10.0),
        ]));
        core.settings.snap_to_angle_enabled = true;
        // Pointer to the right of center: 90°, nudged by 3°.
        let tilt = 3f64.to_radians();
        let pointer = Point::new(100.0 * tilt.cos(), 100.0 * tilt.sin());
        let feedback = rotate_towards(&mut core, pointer, &SnapSettings::default());
        assert!((core.rotation_angle() - FRAC_PI_2).abs() < 1e-9);
        assert!(feedback.is_some());

        core.settings.snap_to_angle_enabled = false;
        rotate_towards(&mut core, pointer, &SnapSettings::default());
        assert!((core.rotation_angle() - (FRAC_PI_2 + tilt)).abs() < 1e-9);
    }

    #[test]
    fn test_rotate_towards_is_free_outside_threshold() {
        let mut core = ElementCore::new(Polygon::new(vec![
            Point::new(-10.0, -10.0),
            Point::new(10.0, 10.0),
        ]));
        core.settings.snap_to_angle_enabled = true;
        let settings = SnapSettings::default();
        // 7° past 90°: beyond the 5° threshold of the 15° step.
        let tilt = 7f64.to_radians();
        let pointer = Point::new(100.0 * tilt.cos(), 100.0 * tilt.sin());
        let feedback = rotate_towards(&mut core, pointer, &settings);
        assert!(feedback.is_none());
        assert!((core.rotation_angle() - (FRAC_PI_2 + tilt)).abs() < 1e-9);
    }
}
