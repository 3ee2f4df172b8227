//! Axis-aligned (in its own frame) rectangle defined by two canonical points.

use super::{DrawingElement, ElementCore, Resizable};
use crate::control_point::{
    ControlPoint, ControlPointKind, Corner, Edge, ROTATE_HANDLE_OFFSET, rotate_towards,
};
use crate::geometry::{Axis, Polygon, is_right_angle_multiple, quarter_turns, rotate_around};
use crate::snap::{SnapContext, SnapFeedback};
use kurbo::{Point, Rect, Vec2};
use log::warn;
use serde_json::{Map, Value};

/// Dimension pinned while applying size constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Width,
    Height,
}

/// A rectangle whose shape is exactly two points: top-left and bottom-right.
///
/// Width and height count pixels inclusively, so a rectangle from (0, 0) to
/// (9, 9) is 10 wide.
#[derive(Debug)]
pub struct RectangularElement {
    core: ElementCore,
    min_size: f64,
    keep_square: bool,
    aspect_ratio: Option<f64>,
    pub resize_enabled: bool,
}

impl RectangularElement {
    pub const CLASS_NAME: &'static str = "RectangularElement";

    pub fn new(top_left: Point, bottom_right: Point) -> Self {
        let mut element = Self {
            core: ElementCore::new(Polygon::new(vec![
                Point::new(top_left.x.min(bottom_right.x), top_left.y.min(bottom_right.y)),
                Point::new(top_left.x.max(bottom_right.x), top_left.y.max(bottom_right.y)),
            ])),
            min_size: 1.0,
            keep_square: false,
            aspect_ratio: None,
            resize_enabled: true,
        };
        element.refresh_control_points();
        element
    }

    pub fn from_rect(rect: Rect) -> Self {
        Self::new(Point::new(rect.x0, rect.y0), Point::new(rect.x1, rect.y1))
    }

    pub fn top_left(&self) -> Point {
        let r = self.core.shape().bounding_rect();
        Point::new(r.x0, r.y0)
    }

    pub fn bottom_right(&self) -> Point {
        let r = self.core.shape().bounding_rect();
        Point::new(r.x1, r.y1)
    }

    pub fn width(&self) -> f64 {
        self.bottom_right().x - self.top_left().x + 1.0
    }

    pub fn height(&self) -> f64 {
        self.bottom_right().y - self.top_left().y + 1.0
    }

    /// Geometric corner in shape space.
    pub fn corner_point(&self, corner: Corner) -> Point {
        let (tl, br) = (self.top_left(), self.bottom_right());
        match corner {
            Corner::TopLeft => tl,
            Corner::TopRight => Point::new(br.x, tl.y),
            Corner::BottomLeft => Point::new(tl.x, br.y),
            Corner::BottomRight => br,
        }
    }

    /// Geometric edge midpoint in shape space.
    pub fn edge_point(&self, edge: Edge) -> Point {
        let (tl, br) = (self.top_left(), self.bottom_right());
        let mid = tl.midpoint(br);
        match edge {
            Edge::Top => Point::new(mid.x, tl.y),
            Edge::Right => Point::new(br.x, mid.y),
            Edge::Bottom => Point::new(mid.x, br.y),
            Edge::Left => Point::new(tl.x, mid.y),
        }
    }

    /// Four-corner shape, clockwise from the top-left.
    pub fn corners(&self) -> [Point; 4] {
        Corner::ALL.map(|c| self.corner_point(c))
    }

    pub fn min_size(&self) -> f64 {
        self.min_size
    }

    pub fn set_min_size(&mut self, min_size: f64) {
        self.min_size = min_size.max(0.0);
        self.enforce_constraints();
    }

    pub fn keep_square(&self) -> bool {
        self.keep_square
    }

    pub fn keep_square_enabled(&mut self, enabled: bool) {
        self.keep_square = enabled;
        self.enforce_constraints();
    }

    pub fn aspect_ratio(&self) -> Option<f64> {
        self.aspect_ratio
    }

    /// Lock (or unlock) width/height to `ratio`, defaulting to the current one.
    pub fn keep_aspect_ratio_enabled(&mut self, enabled: bool, ratio: Option<f64>) {
        self.aspect_ratio = if enabled {
            Some(ratio.unwrap_or_else(|| self.width() / self.height()))
                .filter(|r| r.is_finite() && *r > 0.0)
        } else {
            None
        };
        self.enforce_constraints();
    }

    /// Correct a requested size so it honors minimum size, square and aspect
    /// constraints. Never fails.
    ///
    /// Without a pinned dimension both "height from width" and "width from
    /// height" are tried and the smaller total wins.
    pub fn apply_size_constraints(
        &self,
        width: f64,
        height: f64,
        preserve: Option<Dimension>,
    ) -> (f64, f64) {
        let min = self.min_size;
        let (width, height) = (width.max(min), height.max(min));
        let ratio = if self.keep_square {
            Some(1.0)
        } else {
            self.aspect_ratio
        };
        let Some(ratio) = ratio else {
            return (width, height);
        };
        let (width, height) = match preserve {
            Some(Dimension::Width) => (width, width / ratio),
            Some(Dimension::Height) => (height * ratio, height),
            None => {
                let from_width = (width, width / ratio);
                let from_height = (height * ratio, height);
                if from_width.0 + from_width.1 <= from_height.0 + from_height.1 {
                    from_width
                } else {
                    from_height
                }
            }
        };
        if width < min || height < min {
            let scale = (min / width).max(min / height);
            (width * scale, height * scale)
        } else {
            (width, height)
        }
    }

    /// Move one edge to `point` (shape space), keeping the opposite edge.
    pub fn set_edge(
        &mut self,
        edge: Edge,
        point: Point,
        ignore_flip: bool,
        ctx: &SnapContext,
    ) -> bool {
        if !self.resize_enabled {
            return false;
        }
        let edge = if ignore_flip {
            edge
        } else {
            edge.mirrored(
                self.core.flipped_horizontally(),
                self.core.flipped_vertically(),
            )
        };
        let horizontal = matches!(edge, Edge::Left | Edge::Right);
        let (snapped, feedback) = self.snap_local(point, horizontal, !horizontal, ctx);
        let (tl, br) = (self.top_left(), self.bottom_right());
        let mid = tl.midpoint(br);
        let (w, h) = (self.width(), self.height());
        let (x0, y0, x1, y1) = match edge {
            Edge::Left => {
                let (w, h) = self.apply_size_constraints(br.x - snapped.x + 1.0, h, Some(Dimension::Width));
                (br.x - (w - 1.0), mid.y - (h - 1.0) / 2.0, br.x, mid.y + (h - 1.0) / 2.0)
            }
            Edge::Right => {
                let (w, h) = self.apply_size_constraints(snapped.x - tl.x + 1.0, h, Some(Dimension::Width));
                (tl.x, mid.y - (h - 1.0) / 2.0, tl.x + (w - 1.0), mid.y + (h - 1.0) / 2.0)
            }
            Edge::Top => {
                let (w, h) = self.apply_size_constraints(w, br.y - snapped.y + 1.0, Some(Dimension::Height));
                (mid.x - (w - 1.0) / 2.0, br.y - (h - 1.0), mid.x + (w - 1.0) / 2.0, br.y)
            }
            Edge::Bottom => {
                let (w, h) = self.apply_size_constraints(w, snapped.y - tl.y + 1.0, Some(Dimension::Height));
                (mid.x - (w - 1.0) / 2.0, tl.y, mid.x + (w - 1.0) / 2.0, tl.y + (h - 1.0))
            }
        };
        self.commit_box(x0, y0, x1, y1);
        self.core.snap_feedback = feedback;
        true
    }

    /// Move one corner to `point` (shape space), keeping the opposite corner.
    pub fn set_corner(
        &mut self,
        corner: Corner,
        point: Point,
        ignore_flip: bool,
        ctx: &SnapContext,
    ) -> bool {
        if !self.resize_enabled {
            return false;
        }
        let corner = if ignore_flip {
            corner
        } else {
            corner.mirrored(
                self.core.flipped_horizontally(),
                self.core.flipped_vertically(),
            )
        };
        // Both canonical coordinates move: snap each axis, merge the guides.
        let (snapped, feedback) = self.snap_local(point, true, true, ctx);
        let fixed = self.corner_point(corner.opposite());
        let (sx, sy) = match corner {
            Corner::TopLeft => (-1.0, -1.0),
            Corner::TopRight => (1.0, -1.0),
            Corner::BottomLeft => (-1.0, 1.0),
            Corner::BottomRight => (1.0, 1.0),
        };
        let (w, h) = self.apply_size_constraints(
            (snapped.x - fixed.x) * sx + 1.0,
            (snapped.y - fixed.y) * sy + 1.0,
            None,
        );
        let moved = fixed + Vec2::new(sx * (w - 1.0), sy * (h - 1.0));
        self.commit_box(
            fixed.x.min(moved.x),
            fixed.y.min(moved.y),
            fixed.x.max(moved.x),
            fixed.y.max(moved.y),
        );
        self.core.snap_feedback = feedback;
        true
    }

    pub fn set_top(&mut self, y: f64, ignore_flip: bool, ctx: &SnapContext) -> bool {
        let x = self.core.center().x;
        self.set_edge(Edge::Top, Point::new(x, y), ignore_flip, ctx)
    }

    pub fn set_right(&mut self, x: f64, ignore_flip: bool, ctx: &SnapContext) -> bool {
        let y = self.core.center().y;
        self.set_edge(Edge::Right, Point::new(x, y), ignore_flip, ctx)
    }

    pub fn set_bottom(&mut self, y: f64, ignore_flip: bool, ctx: &SnapContext) -> bool {
        let x = self.core.center().x;
        self.set_edge(Edge::Bottom, Point::new(x, y), ignore_flip, ctx)
    }

    pub fn set_left(&mut self, x: f64, ignore_flip: bool, ctx: &SnapContext) -> bool {
        let y = self.core.center().y;
        self.set_edge(Edge::Left, Point::new(x, y), ignore_flip, ctx)
    }

    pub fn set_top_left(&mut self, point: Point, ignore_flip: bool, ctx: &SnapContext) -> bool {
        self.set_corner(Corner::TopLeft, point, ignore_flip, ctx)
    }

    pub fn set_top_right(&mut self, point: Point, ignore_flip: bool, ctx: &SnapContext) -> bool {
        self.set_corner(Corner::TopRight, point, ignore_flip, ctx)
    }

    pub fn set_bottom_left(&mut self, point: Point, ignore_flip: bool, ctx: &SnapContext) -> bool {
        self.set_corner(Corner::BottomLeft, point, ignore_flip, ctx)
    }

    pub fn set_bottom_right(&mut self, point: Point, ignore_flip: bool, ctx: &SnapContext) -> bool {
        self.set_corner(Corner::BottomRight, point, ignore_flip, ctx)
    }

    /// Snap the requested shape-space axes in the parent frame.
    ///
    /// Only rotations by multiples of 90° keep local axes parallel to the
    /// parent's, so other rotations are not snapped.
    fn snap_local(
        &self,
        point: Point,
        snap_x: bool,
        snap_y: bool,
        ctx: &SnapContext,
    ) -> (Point, Vec<SnapFeedback>) {
        let rotation = self.core.rotation_angle();
        if !is_right_angle_multiple(rotation) {
            return (point, Vec::new());
        }
        let flags = self.core.settings.snap_flags();
        let swap = quarter_turns(rotation) % 2 == 1;
        let parent = self.core.to_parent(point);
        let mut snapped = parent;
        let mut feedback = Vec::new();
        for (local_axis, wanted) in [(Axis::X, snap_x), (Axis::Y, snap_y)] {
            if !wanted {
                continue;
            }
            let axis = if swap { local_axis.other() } else { local_axis };
            let raw = axis.of(parent);
            let external = if flags.external {
                ctx.snap_axis_externally(raw, axis)
            } else {
                None
            };
            if let Some((value, guide)) = external {
                snapped = axis.with(snapped, value);
                feedback.push(guide);
            } else if flags.grid {
                snapped = axis.with(snapped, ctx.snap_axis_to_grid(raw, axis));
            }
        }
        if snapped == parent {
            return (point, feedback);
        }
        (self.core.from_parent(snapped), feedback)
    }

    /// Commit a box given in shape space around the current center.
    ///
    /// The box center is rotated into place first so the unchanged edges stay
    /// put on screen, then both canonical points are re-expressed around it.
    fn commit_box(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        let half = Vec2::new((x1 - x0) / 2.0, (y1 - y0) / 2.0);
        let box_center = Point::new((x0 + x1) / 2.0, (y0 + y1) / 2.0);
        let center = rotate_around(box_center, self.core.center(), self.core.rotation_angle());
        self.core
            .set_shape(Polygon::new(vec![center - half, center + half]));
    }

    fn enforce_constraints(&mut self) {
        let (w, h) = self.apply_size_constraints(self.width(), self.height(), None);
        if (w - self.width()).abs() < 1e-9 && (h - self.height()).abs() < 1e-9 {
            return;
        }
        let mid = self.top_left().midpoint(self.bottom_right());
        let half = Vec2::new((w - 1.0) / 2.0, (h - 1.0) / 2.0);
        self.core
            .set_shape(Polygon::new(vec![mid - half, mid + half]));
    }

    /// Scale factors from `old` to the current base rectangle.
    pub(crate) fn scale_from(&self, old: Rect) -> Vec2 {
        let new = self.core.peek_base_rectangle();
        Vec2::new(
            if old.width() > 0.0 { new.width() / old.width() } else { 1.0 },
            if old.height() > 0.0 { new.height() / old.height() } else { 1.0 },
        )
    }
}

impl Default for RectangularElement {
    fn default() -> Self {
        Self::new(Point::ZERO, Point::ZERO)
    }
}

impl DrawingElement for RectangularElement {
    fn core(&self) -> &ElementCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        &mut self.core
    }

    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn max_point_count(&self) -> usize {
        2
    }

    fn create_control_points(&self) -> Vec<ControlPoint> {
        let mut points = Vec::new();
        if self.resize_enabled {
            points.extend(Corner::ALL.map(|c| ControlPoint::new(ControlPointKind::Corner(c))));
            points.extend(Edge::ALL.map(|e| ControlPoint::new(ControlPointKind::Edge(e))));
        }
        if self.core.settings.rotate_enabled {
            points.push(ControlPoint::new(ControlPointKind::Rotate));
        }
        points
    }

    fn control_point_anchor(&self, kind: ControlPointKind) -> Option<Point> {
        let (fh, fv) = (
            self.core.flipped_horizontally(),
            self.core.flipped_vertically(),
        );
        let local = match kind {
            ControlPointKind::Corner(c) => self.corner_point(c.mirrored(fh, fv)),
            ControlPointKind::Edge(e) => self.edge_point(e.mirrored(fh, fv)),
            ControlPointKind::Rotate => {
                self.edge_point(Edge::Top) - Vec2::new(0.0, ROTATE_HANDLE_OFFSET)
            }
            ControlPointKind::PolyPoint(_) => return None,
        };
        Some(self.core.to_parent(local))
    }

    fn drag_control_point(&mut self, index: usize, point: Point, ctx: &SnapContext) -> bool {
        let Some(cp) = self.core.control_points.get(index).copied() else {
            return false;
        };
        let local = self.core.from_parent(point);
        match cp.kind {
            ControlPointKind::Edge(e) => self.set_edge(e, local, false, ctx),
            ControlPointKind::Corner(c) => self.set_corner(c, local, false, ctx),
            ControlPointKind::Rotate => {
                if !self.core.settings.rotate_enabled {
                    return false;
                }
                let feedback = rotate_towards(&mut self.core, point, &ctx.settings.snap);
                self.core.snap_feedback = feedback.into_iter().collect();
                true
            }
            ControlPointKind::PolyPoint(_) => false,
        }
    }

    fn normalize_shape(&mut self) {
        let (tl, br) = (self.top_left(), self.bottom_right());
        let canonical = Polygon::new(vec![tl, br]);
        if &canonical != self.core.shape() {
            let rotation = self.core.rotation_angle();
            self.core.rebase(canonical, rotation);
        }
    }

    fn outline(&self) -> Vec<Point> {
        self.corners()
            .into_iter()
            .map(|p| self.core.to_parent(p))
            .collect()
    }

    fn write_json_fields(&self, map: &mut Map<String, Value>) {
        map.insert("keepSquare".into(), self.keep_square.into());
        map.insert(
            "aspectRatio".into(),
            self.aspect_ratio.map_or(Value::Null, Value::from),
        );
        map.insert("minSize".into(), self.min_size.into());
    }

    fn read_json_fields(&mut self, map: &Map<String, Value>) {
        if let Some(flag) = map.get("keepSquare").and_then(Value::as_bool) {
            self.keep_square = flag;
        }
        match map.get("aspectRatio") {
            Some(Value::Null) => self.aspect_ratio = None,
            Some(raw) => match raw.as_f64() {
                Some(r) if r.is_finite() && r > 0.0 => self.aspect_ratio = Some(r),
                _ => warn!("Skipping malformed aspectRatio for element {}", self.core.id()),
            },
            None => {}
        }
        if let Some(raw) = map.get("minSize") {
            match raw.as_f64() {
                Some(size) if size.is_finite() && size >= 0.0 => self.min_size = size,
                _ => warn!("Skipping malformed minSize for element {}", self.core.id()),
            }
        }
    }
}

impl Resizable for RectangularElement {
    fn resize_enabled(&self) -> bool {
        self.resize_enabled
    }

    fn set_edge(&mut self, edge: Edge, point: Point, ignore_flip: bool, ctx: &SnapContext) -> bool {
        RectangularElement::set_edge(self, edge, point, ignore_flip, ctx)
    }

    fn set_corner(
        &mut self,
        corner: Corner,
        point: Point,
        ignore_flip: bool,
        ctx: &SnapContext,
    ) -> bool {
        RectangularElement::set_corner(self, corner, point, ignore_flip, ctx)
    }
}
