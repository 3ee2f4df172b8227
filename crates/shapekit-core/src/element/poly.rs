//! Polylines and polygons with individually editable vertices.

use super::{DrawingElement, ElementCore, PointEvent, PolyEditable};
use crate::control_point::{ControlPoint, ControlPointKind, ROTATE_HANDLE_OFFSET, rotate_towards};
use crate::geometry::{Polygon, closest_point_on_segment, rotate_vec};
use crate::snap::{InternalSnap, SnapContext, snap_to_angle};
use kurbo::{Point, Vec2};
use log::debug;
use serde_json::{Map, Value};

#[derive(Debug)]
pub struct PolyElement {
    core: ElementCore,
    closed: bool,
    max_point_count: usize,
    pub add_remove_enabled: bool,
    /// Where a new vertex would be inserted: index and shape-space point.
    insertion_candidate: Option<(usize, Point)>,
}

impl PolyElement {
    pub const CLASS_NAME: &'static str = "PolyElement";

    pub fn new(points: Vec<Point>, closed: bool) -> Self {
        let core = ElementCore::new(Polygon::new(points));
        debug_assert!(
            core.shape().len() >= core.min_point_count(),
            "poly has {} points, minimum is {}",
            core.shape().len(),
            core.min_point_count()
        );
        let mut element = Self {
            core,
            closed,
            max_point_count: usize::MAX,
            add_remove_enabled: true,
            insertion_candidate: None,
        };
        element.refresh_control_points();
        element
    }

    /// Cap the vertex count. Never below the current count or the minimum.
    pub fn with_max_point_count(mut self, max: usize) -> Self {
        self.max_point_count = max
            .max(self.core.min_point_count())
            .max(self.core.shape().len());
        self
    }

    /// Floor for the vertex count. Never above the current count.
    pub fn with_min_point_count(mut self, min: usize) -> Self {
        let min = min.min(self.core.shape().len());
        self.core.set_min_point_count(min);
        self.max_point_count = self.max_point_count.max(min);
        self
    }

    pub fn set_closed(&mut self, closed: bool) {
        if self.closed != closed {
            self.closed = closed;
            self.core.request_redraw();
        }
    }

    pub fn insertion_candidate(&self) -> Option<(usize, Point)> {
        self.insertion_candidate
    }

    pub fn clear_insertion_candidate(&mut self) {
        if self.insertion_candidate.take().is_some() {
            self.core.request_redraw();
        }
    }

    /// Closest point on the outline to `point` (parent frame).
    ///
    /// Returns the index a vertex inserted there would get and the shape-space
    /// point. Hits closer than `exclusion` to an existing vertex are ignored.
    pub fn closest_edge_point(
        &self,
        point: Point,
        tolerance: f64,
        exclusion: f64,
    ) -> Option<(usize, Point)> {
        let local = self.core.from_parent(point);
        let points = self.core.shape().points();
        let count = if self.closed {
            points.len()
        } else {
            points.len().saturating_sub(1)
        };
        let mut best: Option<(usize, Point, f64)> = None;
        for i in 0..count {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            let (hit, _) = closest_point_on_segment(local, a, b);
            let dist = hit.distance(local);
            if dist > tolerance || hit.distance(a) < exclusion || hit.distance(b) < exclusion {
                continue;
            }
            if best.is_none_or(|(_, _, d)| dist < d) {
                best = Some((i + 1, hit, dist));
            }
        }
        best.map(|(index, hit, _)| (index, hit))
    }

    /// Recompute the insertion candidate under `point` (parent frame).
    pub fn update_insertion_candidate(
        &mut self,
        point: Point,
        ctx: &SnapContext,
    ) -> Option<(usize, Point)> {
        let selection = &ctx.settings.selection;
        let candidate = if self.add_remove_enabled && self.core.shape().len() < self.max_point_count {
            self.closest_edge_point(
                point,
                selection.line_tolerance / ctx.zoom,
                selection.control_point_radius * 1.5 / ctx.zoom,
            )
        } else {
            None
        };
        if candidate != self.insertion_candidate {
            self.insertion_candidate = candidate;
            self.core.request_redraw();
        }
        candidate
    }

    fn neighbors(&self, index: usize) -> (Option<Point>, Option<Point>) {
        let shape = self.core.shape();
        let len = shape.len();
        let prev = match index {
            0 if self.closed => Some(len - 1),
            0 => None,
            i => Some(i - 1),
        };
        let next = if index + 1 < len {
            Some(index + 1)
        } else if self.closed {
            Some(0)
        } else {
            None
        };
        let point = |i: Option<usize>| i.filter(|i| *i != index).and_then(|i| shape.get(i));
        (point(prev), point(next))
    }

    fn near_neighbor(&self, index: usize, distance: f64) -> bool {
        let Some(point) = self.core.shape().get(index) else {
            return false;
        };
        let (prev, next) = self.neighbors(index);
        [prev, next]
            .into_iter()
            .flatten()
            .any(|n| n.distance(point) <= distance)
    }

    /// Replace the shape so the vertices it keeps stay put on screen.
    ///
    /// A new shape moves the rotation center; the compensating shift is
    /// `(R - I)(c' - c)`.
    fn commit_shape(&mut self, shape: Polygon) {
        let shift = shape.bounding_rect().center() - self.core.center();
        let compensation = rotate_vec(shift, self.core.rotation_angle()) - shift;
        if compensation.hypot() > 1e-12 {
            self.core.set_shape(shape.translated(compensation));
        } else {
            self.core.set_shape(shape);
        }
    }
}

impl Default for PolyElement {
    fn default() -> Self {
        Self::new(vec![Point::ZERO; 2], false)
    }
}

impl PolyEditable for PolyElement {
    /// Insert `point` (shape space) before vertex `index`.
    fn add_point(&mut self, index: usize, point: Point) -> bool {
        let len = self.core.shape().len();
        if !self.add_remove_enabled || index > len || len >= self.max_point_count {
            return false;
        }
        let shape = self.core.shape().inserted(index, point);
        self.commit_shape(shape);
        self.insertion_candidate = None;
        self.refresh_control_points();
        let element = self.core.id();
        debug!("Added point {index} to poly {element}");
        self.core.events.add_point.trigger(&PointEvent {
            element,
            index,
            point,
        });
        true
    }

    fn rem_point(&mut self, index: usize) -> bool {
        let len = self.core.shape().len();
        if !self.add_remove_enabled || len <= self.core.min_point_count() {
            return false;
        }
        let Some(point) = self.core.shape().get(index) else {
            return false;
        };
        let shape = self.core.shape().removed(index);
        self.commit_shape(shape);
        self.refresh_control_points();
        let element = self.core.id();
        debug!("Removed point {index} from poly {element}");
        self.core.events.remove_point.trigger(&PointEvent {
            element,
            index,
            point,
        });
        true
    }

    /// Move vertex `index` towards `point` (shape space) through the snapping
    /// pipeline.
    fn move_point(&mut self, index: usize, point: Point, ctx: &SnapContext) -> bool {
        if index >= self.core.shape().len() {
            return false;
        }
        let result = self.resolve_snap(Some(index), point, ctx);
        let shape = self.core.shape().with_point(index, result.point);
        self.commit_shape(shape);
        self.core.snap_feedback = result.feedback;
        true
    }
}

impl DrawingElement for PolyElement {
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
        self.max_point_count
    }

    fn closed(&self) -> bool {
        self.closed
    }

    fn snap_internally(&self, index: Option<usize>, point: Point, ctx: &SnapContext) -> InternalSnap {
        let Some(index) = index else {
            return InternalSnap::none();
        };
        if !self.core.settings.snap_to_angle_enabled {
            return InternalSnap::none();
        }
        let (prev, next) = self.neighbors(index);
        snap_to_angle(prev, next, point, self.core.rotation_angle(), &ctx.settings.snap)
    }

    fn create_control_points(&self) -> Vec<ControlPoint> {
        let mut points: Vec<ControlPoint> = (0..self.core.shape().len())
            .map(|i| ControlPoint::new(ControlPointKind::PolyPoint(i)))
            .collect();
        if self.core.settings.rotate_enabled {
            points.push(ControlPoint::new(ControlPointKind::Rotate));
        }
        points
    }

    fn control_point_anchor(&self, kind: ControlPointKind) -> Option<Point> {
        match kind {
            ControlPointKind::PolyPoint(i) => self.core.shape().get(i).map(|p| self.core.to_parent(p)),
            ControlPointKind::Rotate => {
                let rect = self.core.peek_base_rectangle();
                let top = Point::new(rect.center().x, rect.y0) - Vec2::new(0.0, ROTATE_HANDLE_OFFSET);
                Some(self.core.to_parent(top))
            }
            ControlPointKind::Edge(_) | ControlPointKind::Corner(_) => None,
        }
    }

    fn drag_control_point(&mut self, index: usize, point: Point, ctx: &SnapContext) -> bool {
        let Some(cp) = self.core.control_points.get(index).copied() else {
            return false;
        };
        match cp.kind {
            ControlPointKind::PolyPoint(i) => {
                let local = self.core.from_parent(point);
                if !self.move_point(i, local, ctx) {
                    return false;
                }
                let removable = self.add_remove_enabled
                    && self.core.shape().len() > self.core.min_point_count()
                    && self.near_neighbor(i, ctx.settings.poly.remove_distance / ctx.zoom);
                if let Some(cp) = self.core.control_points.get_mut(index) {
                    cp.marked_for_removal = removable;
                }
                true
            }
            ControlPointKind::Rotate => {
                if !self.core.settings.rotate_enabled {
                    return false;
                }
                let feedback = rotate_towards(&mut self.core, point, &ctx.settings.snap);
                self.core.snap_feedback = feedback.into_iter().collect();
                true
            }
            ControlPointKind::Edge(_) | ControlPointKind::Corner(_) => false,
        }
    }

    /// Drop a vertex released on top of a neighbor.
    fn end_control_point_drag(&mut self, index: usize) -> bool {
        let Some(cp) = self.core.control_points.get(index).copied() else {
            return false;
        };
        match (cp.marked_for_removal, cp.poly_point_index()) {
            (true, Some(i)) => self.rem_point(i),
            _ => false,
        }
    }

    fn write_json_fields(&self, map: &mut Map<String, Value>) {
        map.insert("closed".into(), self.closed.into());
    }

    fn read_json_fields(&mut self, map: &Map<String, Value>) {
        if let Some(closed) = map.get("closed").and_then(Value::as_bool) {
            self.closed = closed;
        }
    }
}
