//! Temporary container for a multiple selection.
//!
//! The group is a rectangle around its members. Members are stored in the
//! group's center-relative frame, so moving or rotating the group carries them
//! along without touching their shapes.

use super::reporting::Frame;
use super::{DrawingElement, ElementCore, ElementId, RectangularElement};
use crate::control_point::{ControlPoint, ControlPointKind};
use crate::geometry::Polygon;
use crate::render::Renderer;
use crate::snap::SnapContext;
use kurbo::{Point, Rect, Vec2};
use log::warn;
use serde_json::{Map, Value};
use std::cell::Cell;
use std::rc::Rc;
use uuid::Uuid;

/// A grouped element and the sibling it followed before grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMember {
    pub id: ElementId,
    /// Element directly below it in its original container, `None` when it
    /// was at the back.
    pub prev_sibling: Option<ElementId>,
}

#[derive(Debug)]
pub struct GroupElement {
    rect: RectangularElement,
    members: Vec<GroupMember>,
    frame: Rc<Cell<Frame>>,
}

impl GroupElement {
    pub const CLASS_NAME: &'static str = "MultipleSelectionGroup";

    /// An empty group covering `bounds` (parent frame).
    pub fn new(bounds: Rect) -> Self {
        let mut rect = RectangularElement::from_rect(bounds);
        let frame = Rc::new(Cell::new(Frame::default()));
        rect.core_mut().publish_to(frame.clone());
        Self {
            rect,
            members: Vec::new(),
            frame,
        }
    }

    /// Shared handle to the group's current frame.
    pub fn frame_handle(&self) -> Rc<Cell<Frame>> {
        self.frame.clone()
    }

    pub fn frame(&self) -> Frame {
        self.frame.get()
    }

    pub fn members(&self) -> &[GroupMember] {
        &self.members
    }

    pub fn member_ids(&self) -> Vec<ElementId> {
        self.members.iter().map(|m| m.id).collect()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.members.iter().any(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn rect(&self) -> &RectangularElement {
        &self.rect
    }

    pub(crate) fn rect_mut(&mut self) -> &mut RectangularElement {
        &mut self.rect
    }

    pub(crate) fn push_member(&mut self, member: GroupMember) {
        if !self.contains(member.id) {
            self.members.push(member);
        }
    }

    pub(crate) fn remove_member(&mut self, id: ElementId) -> Option<GroupMember> {
        let index = self.members.iter().position(|m| m.id == id)?;
        Some(self.members.remove(index))
    }

    /// Re-center the group on `local_bounds` (in its own frame) without
    /// moving anything on screen. Returns the shift members must apply to
    /// their local coordinates.
    pub(crate) fn refit(&mut self, local_bounds: Rect) -> Vec2 {
        let center = self.frame().to_parent(local_bounds.center());
        let half = Vec2::new(local_bounds.width() / 2.0, local_bounds.height() / 2.0);
        let rotation = self.rect.core().rotation_angle();
        self.rect
            .core_mut()
            .rebase(Polygon::new(vec![center - half, center + half]), rotation);
        -local_bounds.center().to_vec2()
    }

    /// Ratio of the current size to `old` (both base rectangles).
    pub(crate) fn scale_from(&self, old: Rect) -> Vec2 {
        self.rect.scale_from(old)
    }
}

impl Default for GroupElement {
    fn default() -> Self {
        Self::new(Rect::ZERO)
    }
}

impl DrawingElement for GroupElement {
    fn core(&self) -> &ElementCore {
        self.rect.core()
    }

    fn core_mut(&mut self) -> &mut ElementCore {
        self.rect.core_mut()
    }

    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn max_point_count(&self) -> usize {
        2
    }

    fn create_control_points(&self) -> Vec<ControlPoint> {
        self.rect.create_control_points()
    }

    fn control_point_anchor(&self, kind: ControlPointKind) -> Option<Point> {
        self.rect.control_point_anchor(kind)
    }

    fn drag_control_point(&mut self, index: usize, point: Point, ctx: &SnapContext) -> bool {
        self.rect.drag_control_point(index, point, ctx)
    }

    fn normalize_shape(&mut self) {
        self.rect.normalize_shape();
    }

    fn outline(&self) -> Vec<Point> {
        self.rect.outline()
    }

    /// Members draw themselves; the group outline is a selection overlay.
    fn draw(&self, _renderer: &mut dyn Renderer, _to_root: &dyn Fn(Point) -> Point) {}

    fn write_json_fields(&self, map: &mut Map<String, Value>) {
        map.insert(
            "members".into(),
            Value::Array(
                self.members
                    .iter()
                    .map(|m| Value::String(m.id.to_string()))
                    .collect(),
            ),
        );
    }

    fn read_json_fields(&mut self, map: &Map<String, Value>) {
        let Some(members) = map.get("members").and_then(Value::as_array) else {
            return;
        };
        self.members.clear();
        for raw in members {
            match raw.as_str().map(Uuid::parse_str) {
                Some(Ok(id)) => self.push_member(GroupMember {
                    id,
                    prev_sibling: None,
                }),
                _ => warn!("Skipping malformed group member id: {raw}"),
            }
        }
    }
}
