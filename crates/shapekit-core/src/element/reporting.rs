//! Coordinate reporting strategies.
//!
//! An element normally serializes its own geometry. While it is a member of a
//! multiple-selection group its geometry lives in the group's frame, so the
//! group installs a [`GroupReporting`] that maps it back to the true parent.

use super::ElementCore;
use crate::geometry::{Polygon, normalize_angle, rotate_vec};
use kurbo::{Point, Vec2};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// A child coordinate frame: origin at `center`, rotated by `rotation`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame {
    pub center: Point,
    pub rotation: f64,
}

impl Frame {
    /// Map a point from this frame into the enclosing frame.
    pub fn to_parent(&self, point: Point) -> Point {
        self.center + rotate_vec(point.to_vec2(), self.rotation)
    }

    /// Map a point from the enclosing frame into this frame.
    pub fn from_parent(&self, point: Point) -> Point {
        rotate_vec(point - self.center, -self.rotation).to_point()
    }

    pub fn vec_to_parent(&self, v: Vec2) -> Vec2 {
        rotate_vec(v, self.rotation)
    }

    pub fn vec_from_parent(&self, v: Vec2) -> Vec2 {
        rotate_vec(v, -self.rotation)
    }
}

/// Geometry as written to JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedGeometry {
    pub shape: Polygon,
    pub rotation_angle: f64,
    pub flipped_horizontally: bool,
    pub flipped_vertically: bool,
}

/// Strategy deciding which coordinates an element reports.
pub trait CoordinateReporting: fmt::Debug {
    fn report(&self, core: &ElementCore) -> ReportedGeometry;
}

/// Reports the element's own geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityReporting;

impl CoordinateReporting for IdentityReporting {
    fn report(&self, core: &ElementCore) -> ReportedGeometry {
        ReportedGeometry {
            shape: core.shape().clone(),
            rotation_angle: core.rotation_angle(),
            flipped_horizontally: core.flipped_horizontally(),
            flipped_vertically: core.flipped_vertically(),
        }
    }
}

/// Reports a grouped member relative to the group's parent.
///
/// The frame is shared with the group, which republishes it whenever its
/// own geometry changes.
#[derive(Debug, Clone)]
pub struct GroupReporting {
    frame: Rc<Cell<Frame>>,
}

impl GroupReporting {
    pub fn new(frame: Rc<Cell<Frame>>) -> Self {
        Self { frame }
    }
}

impl CoordinateReporting for GroupReporting {
    fn report(&self, core: &ElementCore) -> ReportedGeometry {
        let (shape, rotation_angle) = core.geometry_in_parent_of(self.frame.get());
        ReportedGeometry {
            shape,
            rotation_angle,
            flipped_horizontally: core.flipped_horizontally(),
            flipped_vertically: core.flipped_vertically(),
        }
    }
}

/// Re-express a shape centered at `center` with `rotation` in `frame`'s parent.
pub(crate) fn shape_to_parent(
    shape: &Polygon,
    center: Point,
    rotation: f64,
    frame: Frame,
) -> (Polygon, f64) {
    let shift = frame.to_parent(center) - center;
    (shape.translated(shift), normalize_angle(rotation + frame.rotation))
}

/// Inverse of [`shape_to_parent`].
pub(crate) fn shape_from_parent(
    shape: &Polygon,
    center: Point,
    rotation: f64,
    frame: Frame,
) -> (Polygon, f64) {
    let shift = frame.from_parent(center) - center;
    (shape.translated(shift), normalize_angle(rotation - frame.rotation))
}
