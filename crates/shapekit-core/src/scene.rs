//! Scene: element storage, z-order and multiple-selection groups.
//!
//! Root elements live in the scene frame. A group's members live in the
//! group's center-relative frame; [`Scene::parent_to_root`] and
//! [`Scene::root_to_parent`] convert between the two.

use crate::element::reporting::{Frame, GroupReporting};
use crate::element::{DrawingElement, Element, ElementId, FocusType, GroupElement, GroupMember};
use crate::error::{ElementError, ElementResult};
use crate::geometry::{bounding_rect, rect_contains_rect};
use crate::render::Renderer;
use crate::settings::Settings;
use crate::snap::{SnapContext, TranslationSnap};
use kurbo::{Point, Rect, Vec2};
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;

/// All elements of a drawing with their stacking order.
#[derive(Debug)]
pub struct Scene {
    /// All elements, keyed by ID, including group members.
    elements: HashMap<ElementId, Element>,
    /// Z-order of root elements (back to front).
    root: Vec<ElementId>,
    pub settings: Settings,
    /// View scale; snap and hit distances are given in screen units.
    pub zoom: f64,
    redraw: bool,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Scene {
    /// Create an empty scene.
    pub fn new(settings: Settings) -> Self {
        Self {
            elements: HashMap::new(),
            root: Vec::new(),
            settings,
            zoom: 1.0,
            redraw: true,
        }
    }

    /// Add an element on top of the root.
    pub fn add(&mut self, element: impl Into<Element>) -> ElementId {
        let index = self.root.len();
        self.insert(index, element)
    }

    /// Insert a root element at z-position `index` (clamped).
    pub fn insert(&mut self, index: usize, element: impl Into<Element>) -> ElementId {
        let mut element = element.into();
        let id = element.id();
        element.core_mut().set_parent(None);
        self.root.retain(|e| *e != id);
        self.root.insert(index.min(self.root.len()), id);
        self.elements.insert(id, element);
        self.redraw = true;
        debug!("Added element {id}");
        id
    }

    /// Get an element by ID.
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Get a mutable reference to an element by ID.
    pub fn get_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(&id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    /// Number of elements, group members included.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Root z-order (back to front).
    pub fn root(&self) -> &[ElementId] {
        &self.root
    }

    fn group(&self, id: ElementId) -> Option<&GroupElement> {
        self.elements.get(&id).and_then(Element::as_group)
    }

    fn group_mut(&mut self, id: ElementId) -> Option<&mut GroupElement> {
        self.elements.get_mut(&id).and_then(Element::as_group_mut)
    }

    /// Children of `parent` in z-order; `None` is the root.
    pub fn children(&self, parent: Option<ElementId>) -> Vec<ElementId> {
        match parent {
            None => self.root.clone(),
            Some(id) => self.group(id).map(GroupElement::member_ids).unwrap_or_default(),
        }
    }

    pub fn parent_of(&self, id: ElementId) -> Option<ElementId> {
        self.elements.get(&id).and_then(|e| e.core().parent())
    }

    /// Position of `id` within its container.
    pub fn index_of(&self, id: ElementId) -> Option<usize> {
        let parent = self.get(id)?.core().parent();
        self.children(parent).iter().position(|e| *e == id)
    }

    /// Bring a root element to the front. Returns false if it is not at the root.
    pub fn bring_to_front(&mut self, id: ElementId) -> bool {
        let Some(index) = self.root.iter().position(|e| *e == id) else {
            return false;
        };
        let id = self.root.remove(index);
        self.root.push(id);
        self.redraw = true;
        true
    }

    /// Send a root element to the back. Returns false if it is not at the root.
    pub fn send_to_back(&mut self, id: ElementId) -> bool {
        let Some(index) = self.root.iter().position(|e| *e == id) else {
            return false;
        };
        let id = self.root.remove(index);
        self.root.insert(0, id);
        self.redraw = true;
        true
    }

    /// Remove an element, its members if it is a group, and fire its
    /// `remove` event.
    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        let parent = self.elements.get(&id)?.core().parent();
        let members = self.group(id).map(GroupElement::member_ids).unwrap_or_default();
        for member in members {
            self.remove(member);
        }

        let frame = parent.and_then(|p| self.group(p)).map(GroupElement::frame);
        match parent {
            Some(p) => {
                if let Some(group) = self.group_mut(p) {
                    group.remove_member(id);
                }
                self.refit_group(p);
            }
            None => self.root.retain(|e| *e != id),
        }

        let mut element = self.elements.remove(&id)?;
        let core = element.core_mut();
        if let Some(frame) = frame {
            core.leave_frame(frame);
        }
        core.set_parent(None);
        core.reset_reporting();
        core.control_points.clear();
        core.events.remove.trigger(&id);
        self.redraw = true;
        debug!("Removed element {id}");
        Some(element)
    }

    /// Map a point from the frame of `parent`'s children to the root frame.
    pub fn parent_to_root(&self, parent: Option<ElementId>, point: Point) -> Point {
        let mut point = point;
        let mut current = parent;
        while let Some(id) = current {
            let Some(element) = self.elements.get(&id) else {
                break;
            };
            point = element.core().transform_direct(point);
            current = element.core().parent();
        }
        point
    }

    /// Map a root-frame point into the frame of `parent`'s children.
    pub fn root_to_parent(&self, parent: Option<ElementId>, point: Point) -> Point {
        let mut chain = Vec::new();
        let mut current = parent;
        while let Some(id) = current {
            let Some(element) = self.elements.get(&id) else {
                break;
            };
            chain.push(element);
            current = element.core().parent();
        }
        chain
            .iter()
            .rev()
            .fold(point, |p, e| e.core().transform_inverse(p))
    }

    /// Map a point from the parent frame of `id` to the root frame.
    pub fn to_root(&self, id: ElementId, point: Point) -> Point {
        self.parent_to_root(self.parent_of(id), point)
    }

    /// Map a root-frame point into the parent frame of `id`.
    pub fn from_root(&self, id: ElementId, point: Point) -> Point {
        self.root_to_parent(self.parent_of(id), point)
    }

    /// Displayed outline of `id` in the root frame.
    pub fn outline_in_root(&self, id: ElementId) -> Vec<Point> {
        let Some(element) = self.get(id) else {
            return Vec::new();
        };
        let parent = element.core().parent();
        element
            .as_dyn()
            .outline()
            .into_iter()
            .map(|p| self.parent_to_root(parent, p))
            .collect()
    }

    /// Bounding box of the displayed outline of `id`, in the root frame.
    pub fn bounding_rect_in_root(&self, id: ElementId) -> Option<Rect> {
        let outline = self.outline_in_root(id);
        (!outline.is_empty()).then(|| bounding_rect(&outline))
    }

    /// Topmost root element under `point` (root frame).
    pub fn hit_test(&self, point: Point) -> Option<ElementId> {
        self.hit_test_root(point, None)
    }

    /// Like [`Scene::hit_test`], looking through `skip` at what lies below it.
    pub fn hit_test_below(&self, point: Point, skip: ElementId) -> Option<ElementId> {
        self.hit_test_root(point, Some(skip))
    }

    fn hit_test_root(&self, point: Point, skip: Option<ElementId>) -> Option<ElementId> {
        let tolerance = self.settings.selection.line_tolerance / self.zoom;
        self.root
            .iter()
            .rev()
            .copied()
            .filter(|id| Some(*id) != skip)
            .find(|id| {
                self.elements
                    .get(id)
                    .is_some_and(|e| e.as_dyn().hit_test(point, tolerance))
            })
    }

    /// Selectable elements whose bounds lie entirely inside `rect` (root frame),
    /// in z-order. Members of a group are tested individually.
    pub fn elements_in_rect(&self, rect: Rect) -> Vec<ElementId> {
        let mut candidates = Vec::new();
        for id in &self.root {
            match self.group(*id) {
                Some(group) => candidates.extend(group.member_ids()),
                None => candidates.push(*id),
            }
        }
        candidates
            .into_iter()
            .filter(|id| {
                self.elements.get(id).is_some_and(|e| {
                    let core = e.core();
                    core.settings.select_enabled && !core.focus().is_remote()
                })
            })
            .filter(|id| {
                self.bounding_rect_in_root(*id)
                    .is_some_and(|bounds| rect_contains_rect(rect, bounds))
            })
            .collect()
    }

    /// Index of the control point of `id` under `point` (root frame).
    pub fn control_point_at(&self, id: ElementId, point: Point) -> Option<usize> {
        let element = self.get(id)?;
        let local = self.root_to_parent(element.core().parent(), point);
        let radius = self.settings.selection.control_point_radius / self.zoom;
        element.as_dyn().hit_test_control_points(local, radius)
    }

    /// Anchor of control point `index` of `id`, in the root frame.
    pub fn control_point_anchor(&self, id: ElementId, index: usize) -> Option<Point> {
        let element = self.get(id)?;
        let kind = element.core().control_points.get(index)?.kind;
        let anchor = element.as_dyn().control_point_anchor(kind)?;
        Some(self.parent_to_root(element.core().parent(), anchor))
    }

    /// Snapping context for dragging `id`: its siblings are the targets.
    pub fn snap_context(&self, id: ElementId) -> SnapContext {
        let parent = self.parent_of(id);
        let targets = self
            .children(parent)
            .into_iter()
            .filter(|sibling| *sibling != id)
            .filter_map(|sibling| self.elements.get(&sibling))
            .flat_map(|e| e.core().snapping_points())
            .collect();
        SnapContext::new(&self.settings)
            .with_targets(targets)
            .with_zoom(self.zoom)
    }

    /// Translate `id` by `delta` given in the root frame.
    pub fn move_element(&mut self, id: ElementId, delta: Vec2) -> bool {
        let Some(parent) = self.get(id).map(|e| e.core().parent()) else {
            return false;
        };
        let delta = self.root_to_parent(parent, delta.to_point())
            - self.root_to_parent(parent, Point::ZERO);
        let Some(element) = self.elements.get_mut(&id) else {
            return false;
        };
        let moved = element.core_mut().move_by(delta);
        if moved {
            self.settle(id);
        }
        self.redraw |= moved;
        moved
    }

    /// Drag control point `index` of `id` to `point` (root frame).
    ///
    /// Resizing a group scales its members' local geometry by the same ratio.
    pub fn drag_control_point(&mut self, id: ElementId, index: usize, point: Point) -> bool {
        let Some(parent) = self.get(id).map(|e| e.core().parent()) else {
            return false;
        };
        let local = self.root_to_parent(parent, point);
        let ctx = self.snap_context(id);
        let Some(element) = self.elements.get_mut(&id) else {
            return false;
        };
        let before = element.core().peek_base_rectangle();
        if !element.as_dyn_mut().drag_control_point(index, local, &ctx) {
            return false;
        }
        if let Some(group) = element.as_group() {
            let scale = group.scale_from(before);
            let members = group.member_ids();
            if (scale.x - 1.0).abs() > f64::EPSILON || (scale.y - 1.0).abs() > f64::EPSILON {
                self.scale_members(&members, scale);
            }
        }
        self.settle(id);
        self.redraw = true;
        true
    }

    /// Recompute the base rectangles of `id` and its members after an edit.
    ///
    /// The first recomputation opens the element's change sequence, so
    /// listeners see `shape_begin_change` and `shape_change` while a gesture
    /// is still running rather than only when it is committed.
    fn settle(&mut self, id: ElementId) {
        let members = self.group(id).map(GroupElement::member_ids).unwrap_or_default();
        for member in members.into_iter().chain(std::iter::once(id)) {
            if let Some(element) = self.elements.get_mut(&member) {
                element.core_mut().base_rectangle();
            }
        }
    }

    fn scale_members(&mut self, members: &[ElementId], scale: Vec2) {
        for id in members {
            if let Some(element) = self.elements.get_mut(id) {
                let core = element.core_mut();
                let shape = core
                    .shape()
                    .map(|p| Point::new(p.x * scale.x, p.y * scale.y));
                core.set_shape(shape);
            }
        }
    }

    /// Finish dragging control point `index` of `id`.
    pub fn end_control_point_drag(&mut self, id: ElementId, index: usize) -> bool {
        let Some(element) = self.elements.get_mut(&id) else {
            return false;
        };
        let changed = element.as_dyn_mut().end_control_point_drag(index);
        if changed {
            self.settle(id);
        }
        self.redraw |= changed;
        changed
    }

    /// Snap a dropped element into alignment with its siblings.
    pub fn snap_element(&mut self, id: ElementId) -> Option<TranslationSnap> {
        let ctx = self.snap_context(id);
        let element = self.elements.get_mut(&id)?;
        let snap = element.as_dyn_mut().snap(&ctx);
        self.settle(id);
        self.redraw = true;
        Some(snap)
    }

    /// Close the change sequence of `id` and, for a group, of its members.
    pub fn trigger_shape_change(&mut self, id: ElementId) -> bool {
        let members = self.group(id).map(GroupElement::member_ids).unwrap_or_default();
        let mut changed = false;
        for member in members {
            if let Some(element) = self.elements.get_mut(&member) {
                changed |= element.core_mut().trigger_shape_change();
            }
        }
        if let Some(element) = self.elements.get_mut(&id) {
            changed |= element.core_mut().trigger_shape_change();
        }
        changed
    }

    /// Flip `id` about its center. A group mirrors its members about its own
    /// center, and fails if any of them cannot flip.
    pub fn flip(&mut self, id: ElementId, horizontal: bool, vertical: bool) -> bool {
        let Some(element) = self.elements.get(&id) else {
            return false;
        };
        if !element.core().settings.flip_enabled {
            return false;
        }
        let center = element.core().center();
        let members = self.group(id).map(GroupElement::member_ids).unwrap_or_default();
        let all_flippable = members.iter().all(|m| {
            self.elements
                .get(m)
                .is_some_and(|e| e.core().settings.flip_enabled)
        });
        if !all_flippable {
            return false;
        }
        for member in &members {
            if let Some(element) = self.elements.get_mut(member) {
                element.as_dyn_mut().flip(horizontal, vertical, Point::ZERO);
            }
        }
        let flipped = self
            .elements
            .get_mut(&id)
            .is_some_and(|e| e.as_dyn_mut().flip(horizontal, vertical, center));
        if flipped {
            self.settle(id);
        }
        self.redraw |= flipped;
        flipped
    }

    /// Group root elements `ids` into a new multiple-selection group on top of
    /// the root.
    ///
    /// Needs at least two distinct root elements that are not groups. Members
    /// keep their displayed geometry and remember the element they sat on.
    pub fn create_group(&mut self, ids: &[ElementId]) -> Option<ElementId> {
        let mut ordered: Vec<(usize, ElementId)> = Vec::new();
        for id in ids {
            let element = self.elements.get(id)?;
            if element.is_group() || element.core().parent().is_some() {
                return None;
            }
            let index = self.root.iter().position(|e| e == id)?;
            if !ordered.iter().any(|(_, e)| e == id) {
                ordered.push((index, *id));
            }
        }
        if ordered.len() < 2 {
            return None;
        }
        ordered.sort_by_key(|(index, _)| *index);

        let bounds = ordered
            .iter()
            .filter_map(|(_, id)| self.elements.get(id))
            .map(|e| e.core().bounding_rectangle())
            .reduce(|a, b| a.union(b))?;
        let adopted: Vec<(ElementId, Option<ElementId>)> = ordered
            .iter()
            .map(|(index, id)| (*id, index.checked_sub(1).map(|i| self.root[i])))
            .collect();

        let group_id = self.add(GroupElement::new(bounds));
        for (id, prev) in adopted {
            self.adopt(group_id, id, prev);
        }
        debug!("Grouped {} elements into {group_id}", ids.len());
        Some(group_id)
    }

    fn adopt(&mut self, group_id: ElementId, id: ElementId, prev_sibling: Option<ElementId>) {
        let Some(group) = self.group(group_id) else {
            return;
        };
        let frame = group.frame();
        let handle = group.frame_handle();
        self.root.retain(|e| *e != id);
        if let Some(element) = self.elements.get_mut(&id) {
            let core = element.core_mut();
            core.enter_frame(frame);
            core.set_parent(Some(group_id));
            core.set_reporting(Box::new(GroupReporting::new(handle)));
            core.set_focus(FocusType::SelectedMultiple);
        }
        if let Some(group) = self.group_mut(group_id) {
            group.push_member(GroupMember { id, prev_sibling });
        }
        self.redraw = true;
    }

    /// Move root element `id` into an existing group.
    pub fn add_to_group(&mut self, group_id: ElementId, id: ElementId) -> bool {
        if id == group_id || self.group(group_id).is_none() {
            return false;
        }
        let Some(element) = self.elements.get(&id) else {
            return false;
        };
        if element.is_group() || element.core().parent().is_some() {
            return false;
        }
        let Some(index) = self.root.iter().position(|e| *e == id) else {
            return false;
        };
        let mut prev = index.checked_sub(1).map(|i| self.root[i]);
        if prev == Some(group_id) {
            prev = self
                .group(group_id)
                .and_then(|g| g.members().last())
                .map(|m| m.id);
        }
        self.adopt(group_id, id, prev);
        self.refit_group(group_id);
        true
    }

    /// Take `id` out of its group and put it back at the root, above the
    /// element it sat on when grouped.
    pub fn remove_from_group(&mut self, group_id: ElementId, id: ElementId) -> bool {
        let Some(group) = self.group_mut(group_id) else {
            return false;
        };
        let Some(member) = group.remove_member(id) else {
            return false;
        };
        let frame = group.frame();
        if let Some(element) = self.elements.get_mut(&id) {
            Self::release(element, frame);
        }
        let group_index = self
            .root
            .iter()
            .position(|e| *e == group_id)
            .unwrap_or(self.root.len());
        let index = match member.prev_sibling {
            None => 0,
            Some(prev) => self
                .root
                .iter()
                .position(|e| *e == prev)
                .map_or(group_index + 1, |i| i + 1),
        };
        self.root.insert(index.min(self.root.len()), id);
        self.refit_group(group_id);
        self.redraw = true;
        true
    }

    /// Dissolve a group, returning its members to the root in their
    /// original stacking order. Returns the member IDs.
    pub fn dissolve_group(&mut self, group_id: ElementId) -> Vec<ElementId> {
        let Some(group) = self.group(group_id) else {
            return Vec::new();
        };
        let frame = group.frame();
        let members = group.members().to_vec();

        // The group stays in place until the end so "where the group was"
        // remains a valid position.
        let mut front = 0;
        let mut released = Vec::with_capacity(members.len());
        for member in &members {
            let Some(element) = self.elements.get_mut(&member.id) else {
                continue;
            };
            Self::release(element, frame);
            let position = |id: ElementId| self.root.iter().position(|e| *e == id);
            let index = match member.prev_sibling {
                None => {
                    front += 1;
                    front - 1
                }
                Some(prev) => match position(prev) {
                    Some(i) => i + 1,
                    None => position(group_id).unwrap_or(self.root.len()),
                },
            };
            self.root.insert(index.min(self.root.len()), member.id);
            released.push(member.id);
        }

        self.root.retain(|e| *e != group_id);
        if let Some(mut group) = self.elements.remove(&group_id) {
            group.core_mut().events.remove.trigger(&group_id);
        }
        self.redraw = true;
        debug!("Dissolved group {group_id} into {} elements", released.len());
        released
    }

    fn release(element: &mut Element, frame: Frame) {
        let core = element.core_mut();
        core.leave_frame(frame);
        core.reset_reporting();
        core.set_parent(None);
        core.set_focus(FocusType::None);
    }

    /// Shrink or grow a group to fit its members without moving them on screen.
    fn refit_group(&mut self, group_id: ElementId) {
        let Some(group) = self.group(group_id) else {
            return;
        };
        let members = group.member_ids();
        let Some(bounds) = members
            .iter()
            .filter_map(|id| self.elements.get(id))
            .map(|e| e.core().bounding_rectangle())
            .reduce(|a, b| a.union(b))
        else {
            return;
        };
        let Some(group) = self.group_mut(group_id) else {
            return;
        };
        let shift = group.refit(bounds);
        for id in members {
            if let Some(element) = self.elements.get_mut(&id) {
                let core = element.core_mut();
                let shape = core.shape().translated(shift);
                let rotation = core.rotation_angle();
                core.rebase(shape, rotation);
            }
        }
    }

    /// Serialize all elements as a JSON array in root z-order.
    ///
    /// Groups are not written; their members are, in root coordinates.
    pub fn to_json(&self) -> Value {
        let mut out = Vec::new();
        for id in &self.root {
            let Some(element) = self.elements.get(id) else {
                continue;
            };
            match element.as_group() {
                Some(group) => out.extend(
                    group
                        .members()
                        .iter()
                        .filter_map(|m| self.elements.get(&m.id))
                        .map(Element::to_json),
                ),
                None => out.push(element.to_json()),
            }
        }
        Value::Array(out)
    }

    /// Load a scene from a JSON array of elements.
    ///
    /// Elements that cannot be built are skipped with a warning.
    pub fn from_json(value: &Value, settings: Settings) -> ElementResult<Self> {
        let items = value.as_array().ok_or_else(|| ElementError::InvalidField {
            field: "<root>".into(),
            reason: "expected an array of elements".into(),
        })?;
        let mut scene = Scene::new(settings);
        for item in items {
            match Element::from_json(item) {
                Ok(element) if element.is_group() => {
                    warn!("Skipping serialized group {}", element.id())
                }
                Ok(element) => {
                    scene.add(element);
                }
                Err(err) => warn!("Skipping element: {err}"),
            }
        }
        Ok(scene)
    }

    /// Draw every element back to front.
    pub fn draw(&self, renderer: &mut dyn Renderer) {
        for id in &self.root {
            self.draw_element(*id, renderer);
        }
    }

    fn draw_element(&self, id: ElementId, renderer: &mut dyn Renderer) {
        let Some(element) = self.elements.get(&id) else {
            return;
        };
        if let Some(group) = element.as_group() {
            for member in group.member_ids() {
                self.draw_element(member, renderer);
            }
        }
        let parent = element.core().parent();
        let to_root = |p: Point| self.parent_to_root(parent, p);
        element.as_dyn().draw(renderer, &to_root);
    }

    /// Request a redraw without changing anything.
    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    /// Return and clear the pending redraw flags of the scene and its elements.
    pub fn take_redraw(&mut self) -> bool {
        let mut redraw = std::mem::take(&mut self.redraw);
        for element in self.elements.values_mut() {
            redraw |= element.core_mut().take_redraw();
        }
        redraw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_point::{ControlPointKind, Edge};
    use crate::element::RectangularElement;
    use crate::render::PathRecorder;
    use std::f64::consts::FRAC_PI_2;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> RectangularElement {
        RectangularElement::new(Point::new(x0, y0), Point::new(x1, y1))
    }

    fn assert_rect_eq(actual: Rect, expected: Rect) {
        for (a, e) in [
            (actual.x0, expected.x0),
            (actual.y0, expected.y0),
            (actual.x1, expected.x1),
            (actual.y1, expected.y1),
        ] {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    fn three_in_a_row(scene: &mut Scene) -> (ElementId, ElementId, ElementId) {
        let a = scene.add(rect(0.0, 0.0, 10.0, 10.0));
        let b = scene.add(rect(20.0, 0.0, 30.0, 10.0));
        let c = scene.add(rect(40.0, 0.0, 50.0, 10.0));
        (a, b, c)
    }

    #[test]
    fn test_create_group_requires_two_root_elements() {
        let mut scene = Scene::default();
        let (a, b, _) = three_in_a_row(&mut scene);
        assert!(scene.create_group(&[a]).is_none());
        assert!(scene.create_group(&[a, a]).is_none());
        let group = scene.create_group(&[a, b]).unwrap();
        assert!(scene.create_group(&[group, a]).is_none());
        assert_eq!(scene.parent_of(a), Some(group));
        assert_eq!(scene.get(a).unwrap().core().focus(), FocusType::SelectedMultiple);
        assert_rect_eq(
            scene.get(group).unwrap().core().peek_base_rectangle(),
            Rect::new(0.0, 0.0, 30.0, 10.0),
        );
    }

    #[test]
    fn test_dissolve_restores_z_order() {
        let mut scene = Scene::default();
        let (a, b, c) = three_in_a_row(&mut scene);
        let group = scene.create_group(&[c, a]).unwrap();
        assert_eq!(scene.root(), &[b, group]);

        let released = scene.dissolve_group(group);
        assert_eq!(released, vec![a, c]);
        assert_eq!(scene.root(), &[a, b, c]);
        assert!(!scene.contains(group));
        assert_eq!(scene.parent_of(a), None);
        assert_eq!(scene.get(c).unwrap().core().focus(), FocusType::None);
    }

    #[test]
    fn test_group_keeps_displayed_geometry() {
        let mut scene = Scene::default();
        let (a, b, _) = three_in_a_row(&mut scene);
        scene.get_mut(a).unwrap().core_mut().set_rotation_angle(0.3);
        let before = scene.outline_in_root(a);
        let group = scene.create_group(&[a, b]).unwrap();
        for (p, q) in before.iter().zip(scene.outline_in_root(a)) {
            assert!(p.distance(q) < 1e-9);
        }
        scene.dissolve_group(group);
        for (p, q) in before.iter().zip(scene.outline_in_root(a)) {
            assert!(p.distance(q) < 1e-9);
        }
        assert!((scene.get(a).unwrap().core().rotation_angle() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_rotated_group_reports_parent_geometry() {
        let mut scene = Scene::default();
        let (a, b, _) = three_in_a_row(&mut scene);
        let group = scene.create_group(&[a, b]).unwrap();
        scene
            .get_mut(group)
            .unwrap()
            .core_mut()
            .set_rotation_angle(FRAC_PI_2);

        let reported = scene.get(a).unwrap().core().reported_geometry();
        let center = reported.shape.bounding_rect().center();
        assert!((center.x - 15.0).abs() < 1e-9);
        assert!((center.y + 5.0).abs() < 1e-9);
        assert!((reported.rotation_angle - FRAC_PI_2).abs() < 1e-9);

        // Local geometry is untouched by the group rotation.
        let local = scene.get(a).unwrap().core();
        assert!(local.rotation_angle().abs() < 1e-12);
    }

    #[test]
    fn test_moving_group_moves_members() {
        let mut scene = Scene::default();
        let (a, b, _) = three_in_a_row(&mut scene);
        let group = scene.create_group(&[a, b]).unwrap();
        let local_before = scene.get(a).unwrap().core().shape().clone();
        assert!(scene.move_element(group, Vec2::new(10.0, 5.0)));
        assert_eq!(scene.get(a).unwrap().core().shape(), &local_before);
        assert_rect_eq(
            scene.bounding_rect_in_root(a).unwrap(),
            Rect::new(10.0, 5.0, 20.0, 15.0),
        );
    }

    #[test]
    fn test_group_resize_scales_members() {
        let mut scene = Scene::default();
        let (a, b, _) = three_in_a_row(&mut scene);
        let group = scene.create_group(&[a, b]).unwrap();
        let index = scene
            .get(group)
            .unwrap()
            .core()
            .control_points
            .iter()
            .position(|cp| cp.kind == ControlPointKind::Edge(Edge::Right))
            .unwrap();
        assert!(scene.drag_control_point(group, index, Point::new(60.0, 5.0)));
        assert_rect_eq(
            scene.bounding_rect_in_root(a).unwrap(),
            Rect::new(0.0, 0.0, 20.0, 10.0),
        );
        assert_rect_eq(
            scene.bounding_rect_in_root(b).unwrap(),
            Rect::new(40.0, 0.0, 60.0, 10.0),
        );
    }

    #[test]
    fn test_group_resize_stretches_rotated_member_along_group_axes() {
        let mut scene = Scene::default();
        let a = scene.add(rect(0.0, 0.0, 20.0, 10.0));
        scene
            .get_mut(a)
            .unwrap()
            .core_mut()
            .set_rotation_angle(FRAC_PI_2);
        let b = scene.add(rect(40.0, 0.0, 60.0, 10.0));
        let group = scene.create_group(&[a, b]).unwrap();
        let local_before = scene.get(a).unwrap().core().shape().clone();
        let group_before = scene.get(group).unwrap().core().peek_base_rectangle();

        let index = scene
            .get(group)
            .unwrap()
            .core()
            .control_points
            .iter()
            .position(|cp| cp.kind == ControlPointKind::Edge(Edge::Right))
            .unwrap();
        assert!(scene.drag_control_point(group, index, Point::new(115.0, 5.0)));
        let group_after = scene.get(group).unwrap().core().peek_base_rectangle();
        let sx = group_after.width() / group_before.width();
        assert!(sx > 1.5);

        // Local points scale along the group's x axis; the member keeps its
        // own rotation, so on screen it grows along y instead.
        let member = scene.get(a).unwrap().core();
        assert!((member.rotation_angle() - FRAC_PI_2).abs() < 1e-12);
        let expected = local_before.map(|p| Point::new(p.x * sx, p.y));
        for (p, q) in expected.points().iter().zip(member.shape().points()) {
            assert!(p.distance(*q) < 1e-9);
        }
        let displayed = scene.bounding_rect_in_root(a).unwrap();
        assert!((displayed.width() - 10.0).abs() < 1e-9);
        assert!((displayed.height() - 20.0 * sx).abs() < 1e-9);
    }

    #[test]
    fn test_flip_group_mirrors_members() {
        let mut scene = Scene::default();
        let (a, b, _) = three_in_a_row(&mut scene);
        let group = scene.create_group(&[a, b]).unwrap();
        assert!(scene.flip(group, true, false));
        assert_rect_eq(
            scene.bounding_rect_in_root(a).unwrap(),
            Rect::new(20.0, 0.0, 30.0, 10.0),
        );
        let member = scene.get(a).unwrap().core();
        assert!(member.flipped_horizontally());
        assert!(!member.flipped_vertically());

        scene
            .get_mut(b)
            .unwrap()
            .core_mut()
            .settings
            .flip_enabled = false;
        assert!(!scene.flip(group, true, false));
    }

    #[test]
    fn test_remove_from_group_refits() {
        let mut scene = Scene::default();
        let (a, b, c) = three_in_a_row(&mut scene);
        let group = scene.create_group(&[a, b, c]).unwrap();
        assert!(scene.remove_from_group(group, c));
        assert_eq!(scene.parent_of(c), None);
        assert_rect_eq(
            scene.bounding_rect_in_root(c).unwrap(),
            Rect::new(40.0, 0.0, 50.0, 10.0),
        );
        assert_rect_eq(
            scene.bounding_rect_in_root(group).unwrap(),
            Rect::new(0.0, 0.0, 30.0, 10.0),
        );
        assert_rect_eq(
            scene.bounding_rect_in_root(a).unwrap(),
            Rect::new(0.0, 0.0, 10.0, 10.0),
        );
        assert_eq!(scene.root(), &[group, c]);
    }

    #[test]
    fn test_add_to_group_above_group() {
        let mut scene = Scene::default();
        let (a, b, _) = three_in_a_row(&mut scene);
        let group = scene.create_group(&[a, b]).unwrap();
        let d = scene.add(rect(60.0, 0.0, 70.0, 10.0));
        assert!(scene.add_to_group(group, d));
        let member = scene.group(group).unwrap().members().last().copied().unwrap();
        assert_eq!(member.prev_sibling, Some(b));
        assert_rect_eq(
            scene.bounding_rect_in_root(group).unwrap(),
            Rect::new(0.0, 0.0, 70.0, 10.0),
        );
        assert_rect_eq(
            scene.bounding_rect_in_root(d).unwrap(),
            Rect::new(60.0, 0.0, 70.0, 10.0),
        );
    }

    #[test]
    fn test_remove_group_removes_members() {
        let mut scene = Scene::default();
        let (a, b, c) = three_in_a_row(&mut scene);
        let group = scene.create_group(&[a, b]).unwrap();
        assert!(scene.remove(group).is_some());
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.root(), &[c]);
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let mut scene = Scene::default();
        let below = scene.add(rect(0.0, 0.0, 50.0, 50.0));
        let above = scene.add(rect(25.0, 25.0, 75.0, 75.0));
        assert_eq!(scene.hit_test(Point::new(30.0, 30.0)), Some(above));
        assert_eq!(scene.hit_test(Point::new(10.0, 10.0)), Some(below));
        assert_eq!(scene.hit_test(Point::new(100.0, 100.0)), None);
        assert!(scene.send_to_back(above));
        assert_eq!(scene.hit_test(Point::new(30.0, 30.0)), Some(below));
    }

    #[test]
    fn test_elements_in_rect_requires_containment() {
        let mut scene = Scene::default();
        let (a, b, c) = three_in_a_row(&mut scene);
        scene
            .get_mut(c)
            .unwrap()
            .core_mut()
            .set_focus(FocusType::Custom(0));
        let found = scene.elements_in_rect(Rect::new(-1.0, -1.0, 31.0, 11.0));
        assert_eq!(found, vec![a, b]);
        let found = scene.elements_in_rect(Rect::new(-1.0, -1.0, 60.0, 11.0));
        assert_eq!(found, vec![a, b]);
    }

    #[test]
    fn test_snap_context_excludes_self() {
        let mut scene = Scene::default();
        let (a, _, _) = three_in_a_row(&mut scene);
        let ctx = scene.snap_context(a);
        assert_eq!(ctx.targets.len(), 6);
        assert!(!ctx.targets.contains(&Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_json_expands_groups() {
        let mut scene = Scene::default();
        let (a, b, _) = three_in_a_row(&mut scene);
        let group = scene.create_group(&[a, b]).unwrap();
        scene
            .get_mut(group)
            .unwrap()
            .core_mut()
            .set_rotation_angle(FRAC_PI_2);

        let json = scene.to_json();
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i["className"] == "RectangularElement"));

        let loaded = Scene::from_json(&json, Settings::default()).unwrap();
        assert_eq!(loaded.root().len(), 3);
        let a_loaded = loaded.get(a).unwrap().core();
        assert!((a_loaded.rotation_angle() - FRAC_PI_2).abs() < 1e-9);
        for (p, q) in scene.outline_in_root(a).iter().zip(loaded.outline_in_root(a)) {
            assert!(p.distance(q) < 1e-9);
        }
    }

    #[test]
    fn test_from_json_rejects_non_array() {
        assert!(Scene::from_json(&serde_json::json!({}), Settings::default()).is_err());
        let scene = Scene::from_json(
            &serde_json::json!([{ "className": "Circle" }]),
            Settings::default(),
        )
        .unwrap();
        assert!(scene.is_empty());
    }

    #[test]
    fn test_draw_maps_members_to_root() {
        let mut scene = Scene::default();
        let (a, b, _) = three_in_a_row(&mut scene);
        scene.create_group(&[a, b]).unwrap();
        let mut recorder = PathRecorder::new();
        scene.draw(&mut recorder);
        assert_eq!(recorder.painted.len(), 3);
        // Root order is [c, group]; the group paints its members in place.
        let starts: Vec<_> = recorder
            .painted
            .iter()
            .map(|p| p.path.elements()[0])
            .collect();
        assert_eq!(starts[0], kurbo::PathEl::MoveTo(Point::new(40.0, 0.0)));
        assert_eq!(starts[1], kurbo::PathEl::MoveTo(Point::new(0.0, 0.0)));
        assert!(scene.take_redraw());
        assert!(!scene.take_redraw());
    }
}
