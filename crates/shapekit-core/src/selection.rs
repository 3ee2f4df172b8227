//! Selection and multiple-selection state machine.
//!
//! [`SelectionController`] turns pointer and keyboard input into hover,
//! selection and manipulation of scene elements. Shift-clicks and drag
//! rectangles gather several root elements into a [`GroupElement`] that is
//! moved, resized and rotated as one. The group is dissolved as soon as the
//! selection no longer needs it.
//!
//! [`GroupElement`]: crate::element::GroupElement

use crate::control_point::{ControlPointKind, Cursor, ROTATE_HANDLE_OFFSET, cursor_for};
use crate::element::{DrawingElement, Element, ElementId, FocusType, PolyEditable};
use crate::event::Event;
use crate::geometry::{is_axis_aligned, rect_corners};
use crate::input::{Key, Modifiers, PointerEvent};
use crate::render::{PaintStyle, Renderer};
use crate::scene::Scene;
use crate::snap::FeedbackKind;
use crate::style::{FillStyle, SerializableColor};
use kurbo::{Point, Rect, Vec2};
use log::debug;

/// Half length of a linear snap guide, in screen pixels.
const GUIDE_EXTENT: f64 = 10_000.0;

/// Gesture between a primary press and its release.
#[derive(Debug, Clone, Default, PartialEq)]
enum Gesture {
    #[default]
    None,
    MoveElement {
        id: ElementId,
        last: Point,
        moved: bool,
    },
    DragControlPoint {
        id: ElementId,
        index: usize,
    },
    DragRect {
        origin: Point,
        current: Point,
        /// Elements currently inside the rectangle, flagged `SelectedMultiple`.
        flagged: Vec<ElementId>,
    },
}

/// Notifications raised by the controller.
#[derive(Debug, Default)]
pub struct SelectionEvents {
    /// Runs before hover handling. A listener that stops it picks the cursor.
    pub pointer_move: Event<Point, Cursor>,
    pub select: Event<ElementId>,
    pub unselect: Event<ElementId>,
    /// Members of the multiple selection after a change; empty once dissolved.
    pub multi_select_change: Event<Vec<ElementId>>,
}

/// Hover and selection state of one editing surface.
///
/// While several elements are selected, [`selected`](Self::selected) is the
/// group holding them and [`multi_selection`](Self::multi_selection) names
/// the same group.
#[derive(Debug, Default)]
pub struct SelectionController {
    hovered: Option<ElementId>,
    hovered_control_point: Option<usize>,
    selected: Option<ElementId>,
    selected_control_point: Option<usize>,
    ms_group: Option<ElementId>,
    mouse_down_point: Option<Point>,
    gesture: Gesture,
    pub events: SelectionEvents,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hovered(&self) -> Option<ElementId> {
        self.hovered
    }

    /// Control point of the selected element under the pointer.
    pub fn hovered_control_point(&self) -> Option<usize> {
        self.hovered_control_point
    }

    pub fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    /// Control point being dragged.
    pub fn selected_control_point(&self) -> Option<usize> {
        self.selected_control_point
    }

    /// The multiple-selection group, if several elements are selected.
    pub fn multi_selection(&self) -> Option<ElementId> {
        self.ms_group
    }

    pub fn mouse_down_point(&self) -> Option<Point> {
        self.mouse_down_point
    }

    /// Drag-select rectangle in progress (root frame).
    pub fn drag_rect(&self) -> Option<Rect> {
        match &self.gesture {
            Gesture::DragRect { origin, current, .. } => Some(Rect::from_points(*origin, *current)),
            _ => None,
        }
    }

    /// Selected elements: the group's members or the single selection.
    pub fn selected_elements(&self, scene: &Scene) -> Vec<ElementId> {
        match (self.ms_group, self.selected) {
            (Some(group), _) => scene.children(Some(group)),
            (None, Some(id)) => vec![id],
            (None, None) => Vec::new(),
        }
    }

    /// Feed a pointer event (root frame) and get the cursor to show.
    pub fn handle_pointer(
        &mut self,
        scene: &mut Scene,
        event: &PointerEvent,
        modifiers: Modifiers,
    ) -> Cursor {
        self.prune(scene);
        match *event {
            PointerEvent::Move { position } => {
                if let Some(cursor) = self.events.pointer_move.trigger(&position) {
                    return cursor;
                }
                self.pointer_move(scene, position, modifiers)
            }
            PointerEvent::Down { position, .. } if event.is_primary() => {
                self.pointer_down(scene, position, modifiers)
            }
            PointerEvent::Up { position, .. } if event.is_primary() => {
                self.pointer_up(scene, position, modifiers)
            }
            _ => Cursor::Default,
        }
    }

    fn pointer_move(&mut self, scene: &mut Scene, position: Point, modifiers: Modifiers) -> Cursor {
        match &mut self.gesture {
            Gesture::MoveElement { id, last, moved } => {
                let delta = position - *last;
                *last = position;
                if delta != Vec2::ZERO && scene.move_element(*id, delta) {
                    *moved = true;
                }
                Cursor::Move
            }
            Gesture::DragControlPoint { id, index } => {
                let (id, index) = (*id, *index);
                scene.drag_control_point(id, index, position);
                self.control_point_cursor(scene, id, index)
            }
            Gesture::DragRect { current, .. } => {
                *current = position;
                self.update_drag_rect(scene);
                Cursor::Crosshair
            }
            Gesture::None => self.hover(scene, position, modifiers),
        }
    }

    fn hover(&mut self, scene: &mut Scene, position: Point, modifiers: Modifiers) -> Cursor {
        if let Some(selected) = self.selected {
            if let Some(index) = scene.control_point_at(selected, position) {
                self.set_hovered_control_point(scene, Some(index));
                self.set_hovered(scene, Some(selected));
                return self.control_point_cursor(scene, selected, index);
            }
            self.set_hovered_control_point(scene, None);
            if self.update_insertion_candidate(scene, selected, position, modifiers) {
                self.set_hovered(scene, Some(selected));
                return Cursor::AddPoint;
            }
        }

        match self.element_at(scene, position) {
            Some(id) if is_remote(scene, id) => {
                self.set_hovered(scene, None);
                Cursor::NotAllowed
            }
            Some(id) => {
                self.set_hovered(scene, Some(id));
                let movable = scene
                    .get(id)
                    .is_some_and(|e| e.core().settings.move_enabled);
                if self.selected == Some(id) && movable {
                    Cursor::Move
                } else {
                    Cursor::Pointer
                }
            }
            None => {
                self.set_hovered(scene, None);
                Cursor::Default
            }
        }
    }

    fn pointer_down(&mut self, scene: &mut Scene, position: Point, modifiers: Modifiers) -> Cursor {
        self.mouse_down_point = Some(position);
        self.clear_snap_feedback(scene);
        let keys = scene.settings.keys;
        let additive = keys.add_to_selection.is_held(modifiers);
        let add_remove = keys.add_remove_point.is_held(modifiers);

        if let Some(selected) = self.selected {
            if let Some(index) = scene.control_point_at(selected, position) {
                return self.press_control_point(scene, selected, index, add_remove);
            }
            if add_remove {
                if let Some(index) = self.insert_point_at(scene, selected, position) {
                    return self.press_control_point(scene, selected, index, false);
                }
            }
        }

        match self.element_at(scene, position) {
            Some(id) if is_remote(scene, id) => Cursor::NotAllowed,
            Some(id) if additive && scene.settings.selection.multi_select_enabled => {
                self.toggle(scene, id, position);
                self.begin_move(scene, position)
            }
            Some(id) => {
                if self.selected != Some(id) {
                    self.select(scene, id);
                }
                self.begin_move(scene, position)
            }
            None => {
                if !additive {
                    self.clear_selection(scene);
                }
                if !scene.settings.selection.multi_select_enabled {
                    return Cursor::Default;
                }
                debug!("Drag selection started at ({}, {})", position.x, position.y);
                self.gesture = Gesture::DragRect {
                    origin: position,
                    current: position,
                    flagged: Vec::new(),
                };
                Cursor::Crosshair
            }
        }
    }

    fn pointer_up(&mut self, scene: &mut Scene, position: Point, modifiers: Modifiers) -> Cursor {
        self.mouse_down_point = None;
        match std::mem::take(&mut self.gesture) {
            Gesture::MoveElement {
                id, moved: true, ..
            } => {
                scene.snap_element(id);
                scene.trigger_shape_change(id);
            }
            Gesture::DragControlPoint { id, index } => {
                scene.end_control_point_drag(id, index);
                scene.trigger_shape_change(id);
                self.selected_control_point = None;
            }
            Gesture::DragRect { flagged, .. } => self.finish_drag_rect(scene, flagged),
            Gesture::MoveElement { .. } | Gesture::None => {}
        }
        self.hover(scene, position, modifiers)
    }

    fn begin_move(&mut self, scene: &Scene, position: Point) -> Cursor {
        let Some(id) = self.selected else {
            return Cursor::Default;
        };
        if !scene.get(id).is_some_and(|e| e.core().settings.move_enabled) {
            return Cursor::Pointer;
        }
        self.gesture = Gesture::MoveElement {
            id,
            last: position,
            moved: false,
        };
        Cursor::Move
    }

    /// Start dragging control point `index`, or remove the vertex it is bound
    /// to when `remove` is set.
    fn press_control_point(
        &mut self,
        scene: &mut Scene,
        id: ElementId,
        index: usize,
        remove: bool,
    ) -> Cursor {
        let kind = scene
            .get(id)
            .and_then(|e| e.core().control_points.get(index))
            .map(|cp| cp.kind);
        if remove {
            if let Some(ControlPointKind::PolyPoint(vertex)) = kind {
                let removed = scene
                    .get_mut(id)
                    .and_then(Element::as_poly_mut)
                    .is_some_and(|poly| poly.rem_point(vertex));
                if removed {
                    scene.trigger_shape_change(id);
                    self.hovered_control_point = None;
                    return Cursor::Default;
                }
            }
        }
        self.selected_control_point = Some(index);
        self.gesture = Gesture::DragControlPoint { id, index };
        self.control_point_cursor(scene, id, index)
    }

    /// Insert a vertex at the insertion candidate under `position`. Returns the
    /// index of its control point, which matches the vertex index.
    fn insert_point_at(&mut self, scene: &mut Scene, id: ElementId, position: Point) -> Option<usize> {
        let local = scene.from_root(id, position);
        let ctx = scene.snap_context(id);
        let poly = scene.get_mut(id)?.as_poly_mut()?;
        let (index, point) = poly.update_insertion_candidate(local, &ctx)?;
        poly.add_point(index, point).then_some(index)
    }

    fn update_insertion_candidate(
        &mut self,
        scene: &mut Scene,
        id: ElementId,
        position: Point,
        modifiers: Modifiers,
    ) -> bool {
        let held = scene.settings.keys.add_remove_point.is_held(modifiers);
        let local = scene.from_root(id, position);
        let ctx = scene.snap_context(id);
        let Some(poly) = scene.get_mut(id).and_then(Element::as_poly_mut) else {
            return false;
        };
        if !held {
            poly.clear_insertion_candidate();
            return false;
        }
        poly.update_insertion_candidate(local, &ctx).is_some()
    }

    fn control_point_cursor(&self, scene: &Scene, id: ElementId, index: usize) -> Cursor {
        let Some(element) = scene.get(id) else {
            return Cursor::Default;
        };
        let Some(cp) = element.core().control_points.get(index) else {
            return Cursor::Default;
        };
        let Some(anchor) = scene.control_point_anchor(id, index) else {
            return Cursor::Default;
        };
        let center = scene.to_root(id, element.core().center());
        cursor_for(cp.kind, anchor, center)
    }

    fn set_hovered(&mut self, scene: &mut Scene, id: Option<ElementId>) {
        if self.hovered == id {
            return;
        }
        if let Some(prev) = self.hovered.and_then(|prev| scene.get_mut(prev)) {
            if prev.core().focus() == FocusType::Hovered {
                prev.core_mut().set_focus(FocusType::None);
            }
        }
        if let Some(next) = id.and_then(|next| scene.get_mut(next)) {
            if next.core().focus() == FocusType::None {
                next.core_mut().set_focus(FocusType::Hovered);
            }
        }
        self.hovered = id;
    }

    fn set_hovered_control_point(&mut self, scene: &mut Scene, index: Option<usize>) {
        if self.hovered_control_point == index {
            return;
        }
        self.hovered_control_point = index;
        let Some(element) = self.selected.and_then(|id| scene.get_mut(id)) else {
            return;
        };
        let core = element.core_mut();
        for (i, cp) in core.control_points.iter_mut().enumerate() {
            cp.hovered = Some(i) == index;
        }
        core.request_redraw();
    }

    fn clear_snap_feedback(&self, scene: &mut Scene) {
        if let Some(element) = self.selected.and_then(|id| scene.get_mut(id)) {
            let core = element.core_mut();
            if !core.snap_feedback.is_empty() {
                core.snap_feedback.clear();
                core.request_redraw();
            }
        }
    }

    /// Make `id` the single selection. Returns false if it cannot be selected.
    pub fn select(&mut self, scene: &mut Scene, id: ElementId) -> bool {
        if self.selected == Some(id) {
            return true;
        }
        let selectable = scene.get(id).is_some_and(|e| {
            let core = e.core();
            core.settings.select_enabled && !core.focus().is_remote() && core.parent().is_none()
        });
        if !selectable {
            return false;
        }
        self.clear_selection(scene);
        if let Some(element) = scene.get_mut(id) {
            element.core_mut().set_focus(FocusType::Selected);
        }
        self.selected = Some(id);
        self.events.select.trigger(&id);
        true
    }

    /// Topmost element under `position`.
    ///
    /// The multiple-selection group covers its whole bounding box, so a point
    /// inside it that misses every member goes to the elements below it.
    fn element_at(&self, scene: &Scene, position: Point) -> Option<ElementId> {
        let hit = scene.hit_test(position)?;
        let Some(group) = self.ms_group.filter(|group| *group == hit) else {
            return Some(hit);
        };
        if member_at(scene, group, position).is_some() {
            return Some(group);
        }
        scene.hit_test_below(position, group).or(Some(group))
    }

    /// Shift-click on `id`.
    fn toggle(&mut self, scene: &mut Scene, id: ElementId, position: Point) {
        match (self.ms_group, self.selected) {
            (Some(group), _) if group == id => {
                if let Some(member) = member_at(scene, group, position) {
                    self.remove_from_selection(scene, member);
                }
            }
            (Some(group), _) => self.add_to_selection(scene, group, id),
            (None, Some(selected)) if selected == id => {
                self.clear_selection(scene);
            }
            (None, Some(_)) => {
                let mut ids = self.release_selection(scene);
                ids.push(id);
                self.group(scene, &ids);
            }
            (None, None) => {
                self.select(scene, id);
            }
        }
    }

    fn add_to_selection(&mut self, scene: &mut Scene, group: ElementId, id: ElementId) {
        if is_rotated(scene, group) {
            // A rotated group cannot take axis-aligned newcomers; regroup.
            let mut ids = self.release_selection(scene);
            ids.push(id);
            self.group(scene, &ids);
        } else if scene.add_to_group(group, id) {
            self.notify_multi_select(scene);
        }
    }

    /// Select `ids` as one group, or as a single selection if only one is left.
    /// Nothing may be selected when this is called.
    fn group(&mut self, scene: &mut Scene, ids: &[ElementId]) {
        match ids {
            [] => {}
            [single] => {
                self.select(scene, *single);
            }
            _ => match scene.create_group(ids) {
                Some(group) => {
                    if let Some(element) = scene.get_mut(group) {
                        element.core_mut().set_focus(FocusType::Selected);
                    }
                    self.ms_group = Some(group);
                    self.selected = Some(group);
                    self.selected_control_point = None;
                    debug!("Multiple selection of {} elements", ids.len());
                    self.events.select.trigger(&group);
                    self.notify_multi_select(scene);
                }
                None => {
                    if let Some(first) = ids.iter().find(|id| scene.contains(**id)) {
                        self.select(scene, *first);
                    }
                }
            },
        }
    }

    /// Take `id` out of the selection. A group left with one member is
    /// dissolved and that member becomes the single selection.
    pub fn remove_from_selection(&mut self, scene: &mut Scene, id: ElementId) -> bool {
        let Some(group) = self.ms_group else {
            return self.selected == Some(id) && self.clear_selection(scene);
        };
        if !scene.remove_from_group(group, id) {
            return false;
        }
        self.events.unselect.trigger(&id);
        if scene.children(Some(group)).len() >= 2 {
            self.notify_multi_select(scene);
            return true;
        }

        self.collapse_group(scene, group);
        true
    }

    /// Dissolve a group that no longer holds two members; what is left of it
    /// becomes the single selection.
    fn collapse_group(&mut self, scene: &mut Scene, group: ElementId) {
        let remaining = self.release_selection(scene);
        debug!("Multiple selection collapsed to {} element(s)", remaining.len());
        self.events.unselect.trigger(&group);
        self.events.multi_select_change.trigger(&Vec::new());
        if let Some(first) = remaining.first() {
            self.select(scene, *first);
        }
    }

    /// Drop the selection without touching the elements' focus or firing events.
    /// Returns the elements that were selected.
    fn release_selection(&mut self, scene: &mut Scene) -> Vec<ElementId> {
        self.selected_control_point = None;
        self.hovered_control_point = None;
        match (self.ms_group.take(), self.selected.take()) {
            (Some(group), _) => {
                if self.hovered == Some(group) {
                    self.hovered = None;
                }
                scene.dissolve_group(group)
            }
            (None, Some(id)) => vec![id],
            (None, None) => Vec::new(),
        }
    }

    /// Deselect everything, dissolving the multiple selection.
    pub fn clear_selection(&mut self, scene: &mut Scene) -> bool {
        let group = self.ms_group;
        let released = self.release_selection(scene);
        if released.is_empty() && group.is_none() {
            return false;
        }
        for id in &released {
            if let Some(element) = scene.get_mut(*id) {
                if let Some(poly) = element.as_poly_mut() {
                    poly.clear_insertion_candidate();
                }
                element.core_mut().set_focus(FocusType::None);
            }
            self.events.unselect.trigger(id);
        }
        if let Some(group) = group {
            debug!("Multiple selection {group} dissolved");
            self.events.unselect.trigger(&group);
            self.events.multi_select_change.trigger(&Vec::new());
        }
        true
    }

    fn notify_multi_select(&mut self, scene: &Scene) {
        if let Some(group) = self.ms_group {
            let members = scene.children(Some(group));
            self.events.multi_select_change.trigger(&members);
        }
    }

    fn update_drag_rect(&mut self, scene: &mut Scene) {
        let keep = self.selected_elements(scene);
        let Gesture::DragRect {
            origin,
            current,
            flagged,
        } = &mut self.gesture
        else {
            return;
        };
        let rect = Rect::from_points(*origin, *current);
        let contained: Vec<ElementId> = scene
            .elements_in_rect(rect)
            .into_iter()
            .filter(|id| !keep.contains(id))
            .collect();

        for id in flagged.iter() {
            if !contained.contains(id) {
                if let Some(element) = scene.get_mut(*id) {
                    element.core_mut().set_focus(FocusType::None);
                }
                self.events.unselect.trigger(id);
            }
        }
        for id in &contained {
            if !flagged.contains(id) {
                if let Some(element) = scene.get_mut(*id) {
                    element.core_mut().set_focus(FocusType::SelectedMultiple);
                }
            }
        }
        *flagged = contained;
    }

    fn finish_drag_rect(&mut self, scene: &mut Scene, flagged: Vec<ElementId>) {
        let flagged: Vec<ElementId> = flagged
            .into_iter()
            .filter(|id| {
                scene
                    .get(*id)
                    .is_some_and(|e| e.core().focus() == FocusType::SelectedMultiple)
            })
            .collect();
        debug!("Drag selection finished with {} new element(s)", flagged.len());
        if flagged.is_empty() {
            return;
        }
        match self.ms_group {
            Some(group) if !is_rotated(scene, group) => {
                for id in flagged {
                    scene.add_to_group(group, id);
                }
                self.notify_multi_select(scene);
            }
            _ => {
                let mut ids = self.release_selection(scene);
                ids.extend(flagged);
                self.group(scene, &ids);
            }
        }
    }

    fn revert_flagged(&mut self, scene: &mut Scene, flagged: Vec<ElementId>) {
        for id in flagged {
            if let Some(element) = scene.get_mut(id) {
                element.core_mut().set_focus(FocusType::None);
            }
            self.events.unselect.trigger(&id);
        }
    }

    /// Remove `id` from the scene and forget every reference to it.
    pub fn remove_element(&mut self, scene: &mut Scene, id: ElementId) -> Option<Element> {
        if self.ms_group == Some(id) {
            self.ms_group = None;
            self.selected = None;
            self.events.unselect.trigger(&id);
            self.events.multi_select_change.trigger(&Vec::new());
        } else if let Some(group) = self.ms_group {
            if scene.parent_of(id) == Some(group) {
                self.remove_from_selection(scene, id);
            }
        }
        if self.selected == Some(id) {
            self.selected = None;
            self.events.unselect.trigger(&id);
        }
        let removed = scene.remove(id);
        self.prune(scene);
        removed
    }

    /// Drop references to elements no longer in `scene`.
    ///
    /// Runs before every event, so elements removed behind the controller's
    /// back never leave dangling hover or selection state. A group that lost
    /// members that way collapses like one shrunk by
    /// [`SelectionController::remove_from_selection`].
    pub fn prune(&mut self, scene: &mut Scene) {
        let gone = |id: Option<ElementId>| id.is_some_and(|id| !scene.contains(id));
        if gone(self.hovered) {
            self.hovered = None;
        }
        if gone(self.ms_group) {
            self.ms_group = None;
        }
        if gone(self.selected) {
            self.selected = None;
        }
        if let Some(group) = self.ms_group {
            if scene.children(Some(group)).len() < 2 {
                self.collapse_group(scene, group);
            }
        }
        if self.selected.is_none() {
            self.selected_control_point = None;
            self.hovered_control_point = None;
        }
        let stale = match &self.gesture {
            Gesture::MoveElement { id, .. } | Gesture::DragControlPoint { id, .. } => {
                !scene.contains(*id)
            }
            Gesture::DragRect { .. } | Gesture::None => false,
        };
        if stale {
            self.gesture = Gesture::None;
            self.selected_control_point = None;
            self.mouse_down_point = None;
        }
        if let Gesture::DragRect { flagged, .. } = &mut self.gesture {
            flagged.retain(|id| scene.contains(*id));
        }
    }

    /// Handle a key press. Returns true if it changed anything.
    pub fn key_down(&mut self, scene: &mut Scene, key: Key, modifiers: Modifiers) -> bool {
        self.prune(scene);
        match key {
            Key::Escape => {
                let cancelled = match std::mem::take(&mut self.gesture) {
                    Gesture::DragRect { flagged, .. } => {
                        self.revert_flagged(scene, flagged);
                        true
                    }
                    Gesture::None => false,
                    _ => true,
                };
                self.mouse_down_point = None;
                self.clear_selection(scene) || cancelled
            }
            Key::Delete | Key::Backspace => {
                if self.gesture != Gesture::None {
                    return false;
                }
                let Some(id) = self.selected else {
                    return false;
                };
                self.remove_element(scene, id).is_some()
            }
            other => {
                let Some(direction) = other.nudge_direction() else {
                    return false;
                };
                let Some(id) = self.selected else {
                    return false;
                };
                if self.gesture != Gesture::None {
                    return false;
                }
                let keys = scene.settings.keys;
                let step = if modifiers.shift {
                    keys.nudge_large
                } else {
                    keys.nudge
                };
                let moved = scene.move_element(id, direction * step);
                if moved {
                    scene.trigger_shape_change(id);
                }
                moved
            }
        }
    }

    /// Cancel any gesture and drop hover and selection.
    pub fn deactivate(&mut self, scene: &mut Scene) {
        self.prune(scene);
        if let Gesture::DragRect { flagged, .. } = std::mem::take(&mut self.gesture) {
            self.revert_flagged(scene, flagged);
        }
        self.mouse_down_point = None;
        self.clear_selection(scene);
        self.set_hovered(scene, None);
        debug!("Selection deactivated");
    }

    /// Draw selection overlays: outlines, control points, snap guides, the
    /// insertion candidate and the drag rectangle.
    pub fn draw(&self, scene: &Scene, renderer: &mut dyn Renderer) {
        if let Some(id) = self.selected {
            if self.ms_group == Some(id) {
                for member in scene.children(Some(id)) {
                    draw_outline(scene, member, renderer);
                }
            }
            draw_outline(scene, id, renderer);
            self.draw_control_points(scene, id, renderer);
            draw_snap_feedback(scene, id, renderer);
            draw_insertion_candidate(scene, id, renderer);
        }
        if let Some(rect) = self.drag_rect() {
            renderer.draw_polygon(&rect_corners(rect), true, PaintStyle::Default);
        }
    }

    fn draw_control_points(&self, scene: &Scene, id: ElementId, renderer: &mut dyn Renderer) {
        let Some(element) = scene.get(id) else {
            return;
        };
        let radius = scene.settings.selection.control_point_radius / scene.zoom;
        let marked = FillStyle {
            color: SerializableColor::new(220, 53, 69, 255),
        };
        for (index, cp) in element.core().control_points.iter().enumerate() {
            let Some(anchor) = scene.control_point_anchor(id, index) else {
                continue;
            };
            let fill = if cp.marked_for_removal {
                PaintStyle::Custom(&marked)
            } else {
                PaintStyle::Default
            };
            let r = if cp.hovered { radius * 1.5 } else { radius };
            renderer.draw_circle(anchor, r, PaintStyle::Default, fill);
        }
    }
}

fn is_remote(scene: &Scene, id: ElementId) -> bool {
    scene.get(id).is_some_and(|e| e.core().focus().is_remote())
}

fn is_rotated(scene: &Scene, id: ElementId) -> bool {
    scene
        .get(id)
        .is_some_and(|e| !is_axis_aligned(e.core().rotation_angle()))
}

/// Topmost member of `group` under `position` (root frame).
fn member_at(scene: &Scene, group: ElementId, position: Point) -> Option<ElementId> {
    let local = scene.root_to_parent(Some(group), position);
    let tolerance = scene.settings.selection.line_tolerance / scene.zoom;
    scene.children(Some(group)).into_iter().rev().find(|id| {
        scene
            .get(*id)
            .is_some_and(|e| e.as_dyn().hit_test(local, tolerance))
    })
}

fn draw_outline(scene: &Scene, id: ElementId, renderer: &mut dyn Renderer) {
    let closed = scene.get(id).is_some_and(|e| e.as_dyn().closed());
    renderer.draw_polygon(&scene.outline_in_root(id), closed, PaintStyle::Default);
}

fn draw_snap_feedback(scene: &Scene, id: ElementId, renderer: &mut dyn Renderer) {
    let Some(element) = scene.get(id) else {
        return;
    };
    let core = element.core();
    let extent = GUIDE_EXTENT / scene.zoom;
    for feedback in &core.snap_feedback {
        let origin = scene.to_root(id, feedback.origin());
        let direction = Vec2::from_angle(feedback.angle.unwrap_or(0.0));
        match feedback.kind {
            FeedbackKind::Linear => {
                let reach = direction * extent;
                renderer.draw_polygon(&[origin - reach, origin + reach], false, PaintStyle::Default);
            }
            FeedbackKind::Radial => {
                let radius = core
                    .control_points
                    .iter()
                    .position(|cp| cp.kind == ControlPointKind::Rotate)
                    .and_then(|index| scene.control_point_anchor(id, index))
                    .map_or(ROTATE_HANDLE_OFFSET / scene.zoom, |anchor| anchor.distance(origin));
                renderer.draw_circle(origin, radius, PaintStyle::Default, PaintStyle::None);
                renderer.draw_polygon(
                    &[origin, origin + direction * radius],
                    false,
                    PaintStyle::Default,
                );
            }
        }
    }
}

fn draw_insertion_candidate(scene: &Scene, id: ElementId, renderer: &mut dyn Renderer) {
    let Some(poly) = scene.get(id).and_then(Element::as_poly) else {
        return;
    };
    let Some((_, point)) = poly.insertion_candidate() else {
        return;
    };
    let anchor = scene.to_root(id, poly.core().to_parent(point));
    let radius = scene.settings.selection.control_point_radius / scene.zoom;
    renderer.draw_circle(anchor, radius, PaintStyle::Default, PaintStyle::None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{PolyElement, RectangularElement};
    use crate::event::Handled;
    use crate::input::MouseButton;
    use crate::render::PathRecorder;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> RectangularElement {
        RectangularElement::new(Point::new(x0, y0), Point::new(x1, y1))
    }

    fn down(sel: &mut SelectionController, scene: &mut Scene, x: f64, y: f64, m: Modifiers) -> Cursor {
        let event = PointerEvent::Down {
            position: Point::new(x, y),
            button: MouseButton::Left,
        };
        sel.handle_pointer(scene, &event, m)
    }

    fn up(sel: &mut SelectionController, scene: &mut Scene, x: f64, y: f64, m: Modifiers) -> Cursor {
        let event = PointerEvent::Up {
            position: Point::new(x, y),
            button: MouseButton::Left,
        };
        sel.handle_pointer(scene, &event, m)
    }

    fn hover(sel: &mut SelectionController, scene: &mut Scene, x: f64, y: f64, m: Modifiers) -> Cursor {
        let event = PointerEvent::Move {
            position: Point::new(x, y),
        };
        sel.handle_pointer(scene, &event, m)
    }

    fn click(sel: &mut SelectionController, scene: &mut Scene, x: f64, y: f64, m: Modifiers) {
        down(sel, scene, x, y, m);
        up(sel, scene, x, y, m);
    }

    fn focus(scene: &Scene, id: ElementId) -> FocusType {
        scene.get(id).unwrap().core().focus()
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

    /// Three 40x40 squares in a row, 20 apart.
    fn three_squares(scene: &mut Scene) -> (ElementId, ElementId, ElementId) {
        let a = scene.add(rect(0.0, 0.0, 40.0, 40.0));
        let b = scene.add(rect(60.0, 0.0, 100.0, 40.0));
        let c = scene.add(rect(120.0, 0.0, 160.0, 40.0));
        (a, b, c)
    }

    #[test]
    fn test_drag_select_groups_contained_elements() {
        let mut scene = Scene::default();
        let a = scene.add(rect(0.0, 0.0, 10.0, 10.0));
        let b = scene.add(rect(20.0, 20.0, 30.0, 30.0));
        let c = scene.add(rect(100.0, 100.0, 110.0, 110.0));
        let mut sel = SelectionController::new();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let log = changes.clone();
        sel.events.multi_select_change.subscribe(move |members| {
            log.borrow_mut().push(members.clone());
            Handled::Continue
        });

        assert_eq!(down(&mut sel, &mut scene, -5.0, -5.0, Modifiers::NONE), Cursor::Crosshair);
        hover(&mut sel, &mut scene, 35.0, 35.0, Modifiers::NONE);
        assert_eq!(sel.drag_rect(), Some(Rect::new(-5.0, -5.0, 35.0, 35.0)));
        assert_eq!(focus(&scene, a), FocusType::SelectedMultiple);
        assert_eq!(focus(&scene, b), FocusType::SelectedMultiple);
        assert_eq!(focus(&scene, c), FocusType::None);

        up(&mut sel, &mut scene, 35.0, 35.0, Modifiers::NONE);
        let group = sel.multi_selection().unwrap();
        assert_eq!(sel.selected(), Some(group));
        assert_eq!(scene.children(Some(group)), vec![a, b]);
        assert_eq!(sel.selected_elements(&scene), vec![a, b]);
        assert_eq!(scene.parent_of(c), None);
        assert_eq!(focus(&scene, c), FocusType::None);
        assert_eq!(changes.borrow().last(), Some(&vec![a, b]));
        assert!(sel.drag_rect().is_none());
    }

    #[test]
    fn test_drag_select_of_one_is_single_selection() {
        let mut scene = Scene::default();
        let (a, _, _) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        down(&mut sel, &mut scene, -10.0, -10.0, Modifiers::NONE);
        hover(&mut sel, &mut scene, 50.0, 50.0, Modifiers::NONE);
        up(&mut sel, &mut scene, 50.0, 50.0, Modifiers::NONE);
        assert_eq!(sel.multi_selection(), None);
        assert_eq!(sel.selected(), Some(a));
        assert_eq!(focus(&scene, a), FocusType::Selected);
    }

    #[test]
    fn test_drag_rect_unflags_elements_left_behind() {
        let mut scene = Scene::default();
        let (a, _, _) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        let unselected = Rc::new(RefCell::new(Vec::new()));
        let log = unselected.clone();
        sel.events.unselect.subscribe(move |id| {
            log.borrow_mut().push(*id);
            Handled::Continue
        });

        down(&mut sel, &mut scene, -10.0, -10.0, Modifiers::NONE);
        hover(&mut sel, &mut scene, 50.0, 50.0, Modifiers::NONE);
        assert_eq!(focus(&scene, a), FocusType::SelectedMultiple);
        hover(&mut sel, &mut scene, 10.0, 10.0, Modifiers::NONE);
        assert_eq!(focus(&scene, a), FocusType::None);
        assert_eq!(*unselected.borrow(), vec![a]);

        up(&mut sel, &mut scene, 10.0, 10.0, Modifiers::NONE);
        assert_eq!(sel.selected(), None);
        assert_eq!(sel.multi_selection(), None);
    }

    #[test]
    fn test_multi_select_collapses_to_single_selection() {
        let mut scene = Scene::default();
        let (a, b, _) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        assert_eq!(sel.selected(), Some(a));
        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::shift());

        let group = sel.multi_selection().unwrap();
        assert_eq!(sel.selected(), Some(group));
        assert_eq!(scene.children(Some(group)), vec![a, b]);

        assert!(sel.remove_from_selection(&mut scene, b));
        assert_eq!(sel.multi_selection(), None);
        assert_eq!(sel.selected(), Some(a));
        assert!(!scene.contains(group));
        assert_eq!(focus(&scene, a), FocusType::Selected);
        assert_eq!(focus(&scene, b), FocusType::None);
        assert_eq!(scene.parent_of(a), None);
        assert_eq!(scene.parent_of(b), None);
        assert_eq!(scene.root().len(), 3);
    }

    #[test]
    fn test_shift_click_member_removes_it() {
        let mut scene = Scene::default();
        let (a, b, c) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::shift());
        click(&mut sel, &mut scene, 140.0, 20.0, Modifiers::shift());
        let group = sel.multi_selection().unwrap();
        assert_eq!(scene.children(Some(group)), vec![a, b, c]);

        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::shift());
        assert_eq!(sel.multi_selection(), Some(group));
        assert_eq!(scene.children(Some(group)), vec![a, c]);
        assert_eq!(focus(&scene, b), FocusType::None);
        assert_rect_eq(
            scene.bounding_rect_in_root(b).unwrap(),
            Rect::new(60.0, 0.0, 100.0, 40.0),
        );
    }

    #[test]
    fn test_shift_click_on_rotated_group_regroups() {
        let mut scene = Scene::default();
        let (a, b, c) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::shift());
        let rotated = sel.multi_selection().unwrap();
        scene
            .get_mut(rotated)
            .unwrap()
            .core_mut()
            .set_rotation_angle(0.3);
        let a_outline = scene.outline_in_root(a);

        click(&mut sel, &mut scene, 140.0, 20.0, Modifiers::shift());
        let group = sel.multi_selection().unwrap();
        assert_ne!(group, rotated);
        assert!(!scene.contains(rotated));
        assert_eq!(scene.children(Some(group)), vec![a, b, c]);
        assert!(scene.get(group).unwrap().core().rotation_angle().abs() < 1e-12);
        for (p, q) in a_outline.iter().zip(scene.outline_in_root(a)) {
            assert!(p.distance(q) < 1e-9);
        }
    }

    #[test]
    fn test_element_inside_group_bounds_can_be_added() {
        let mut scene = Scene::default();
        let a = scene.add(rect(0.0, 0.0, 10.0, 10.0));
        let b = scene.add(rect(50.0, 50.0, 60.0, 60.0));
        let c = scene.add(rect(100.0, 100.0, 110.0, 110.0));
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 5.0, 5.0, Modifiers::NONE);
        click(&mut sel, &mut scene, 105.0, 105.0, Modifiers::shift());
        let group = sel.multi_selection().unwrap();
        assert_eq!(scene.children(Some(group)), vec![a, c]);

        assert_eq!(hover(&mut sel, &mut scene, 55.0, 55.0, Modifiers::NONE), Cursor::Pointer);
        assert_eq!(sel.hovered(), Some(b));

        click(&mut sel, &mut scene, 55.0, 55.0, Modifiers::shift());
        assert_eq!(sel.multi_selection(), Some(group));
        assert!(scene.children(Some(group)).contains(&b));
        assert_eq!(focus(&scene, b), FocusType::SelectedMultiple);

        // Shift-clicking it again takes it back out.
        click(&mut sel, &mut scene, 55.0, 55.0, Modifiers::shift());
        assert_eq!(scene.children(Some(group)), vec![a, c]);
        assert_eq!(scene.parent_of(b), None);

        // A plain click selects it on its own.
        click(&mut sel, &mut scene, 55.0, 55.0, Modifiers::NONE);
        assert_eq!(sel.multi_selection(), None);
        assert_eq!(sel.selected(), Some(b));
        assert!(!scene.contains(group));
        assert_rect_eq(
            scene.bounding_rect_in_root(b).unwrap(),
            Rect::new(50.0, 50.0, 60.0, 60.0),
        );
    }

    #[test]
    fn test_click_inside_group_gap_keeps_group() {
        let mut scene = Scene::default();
        three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        click(&mut sel, &mut scene, 140.0, 20.0, Modifiers::shift());
        let group = sel.multi_selection().unwrap();

        // Between the members and over nothing but the group itself.
        assert_eq!(scene.hit_test(Point::new(50.0, 20.0)), Some(group));
        assert_eq!(down(&mut sel, &mut scene, 50.0, 20.0, Modifiers::NONE), Cursor::Move);
        assert_eq!(sel.selected(), Some(group));
        up(&mut sel, &mut scene, 50.0, 20.0, Modifiers::NONE);
        assert_eq!(sel.multi_selection(), Some(group));
    }

    #[test]
    fn test_click_on_empty_space_dissolves_group() {
        let mut scene = Scene::default();
        let (a, b, c) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::shift());
        assert!(sel.multi_selection().is_some());

        click(&mut sel, &mut scene, 80.0, 200.0, Modifiers::NONE);
        assert_eq!(sel.multi_selection(), None);
        assert_eq!(sel.selected(), None);
        assert_eq!(scene.root(), &[a, b, c]);
        assert_eq!(focus(&scene, a), FocusType::None);
        assert_eq!(focus(&scene, b), FocusType::None);
    }

    #[test]
    fn test_click_other_element_replaces_group() {
        let mut scene = Scene::default();
        let (_, _, c) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::shift());
        click(&mut sel, &mut scene, 140.0, 20.0, Modifiers::NONE);
        assert_eq!(sel.multi_selection(), None);
        assert_eq!(sel.selected(), Some(c));
        assert_eq!(scene.len(), 3);
    }

    #[test]
    fn test_move_snaps_on_drop_and_closes_change() {
        let mut scene = Scene::default();
        let a = scene.add(rect(0.0, 0.0, 40.0, 40.0));
        let counts = Rc::new(RefCell::new((0, 0)));
        {
            let events = &mut scene.get_mut(a).unwrap().core_mut().events;
            let begin = counts.clone();
            events.shape_begin_change.subscribe(move |_| {
                begin.borrow_mut().0 += 1;
                Handled::Continue
            });
            let end = counts.clone();
            events.shape_end_change.subscribe(move |_| {
                end.borrow_mut().1 += 1;
                Handled::Continue
            });
        }
        let mut sel = SelectionController::new();

        assert_eq!(down(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE), Cursor::Move);
        assert_eq!(sel.mouse_down_point(), Some(Point::new(20.0, 20.0)));
        hover(&mut sel, &mut scene, 27.0, 20.0, Modifiers::NONE);
        hover(&mut sel, &mut scene, 33.0, 20.0, Modifiers::NONE);
        up(&mut sel, &mut scene, 33.0, 20.0, Modifiers::NONE);

        // Moved by 13, pulled back onto the 10-unit grid.
        assert_rect_eq(
            scene.bounding_rect_in_root(a).unwrap(),
            Rect::new(10.0, 0.0, 50.0, 40.0),
        );
        assert_eq!(*counts.borrow(), (1, 1));
        assert_eq!(sel.mouse_down_point(), None);
    }

    #[test]
    fn test_change_sequence_opens_on_first_move() {
        let mut scene = Scene::default();
        let a = scene.add(rect(0.0, 0.0, 40.0, 40.0));
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let events = &mut scene.get_mut(a).unwrap().core_mut().events;
            let l = log.clone();
            events.shape_begin_change.subscribe(move |_| {
                l.borrow_mut().push("begin");
                Handled::Continue
            });
            let l = log.clone();
            events.shape_change.subscribe(move |_| {
                l.borrow_mut().push("change");
                Handled::Continue
            });
            let l = log.clone();
            events.shape_end_change.subscribe(move |_| {
                l.borrow_mut().push("end");
                Handled::Continue
            });
        }
        let mut sel = SelectionController::new();

        down(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        assert!(log.borrow().is_empty());
        hover(&mut sel, &mut scene, 25.0, 20.0, Modifiers::NONE);
        assert_eq!(*log.borrow(), vec!["begin", "change"]);
        hover(&mut sel, &mut scene, 30.0, 20.0, Modifiers::NONE);
        hover(&mut sel, &mut scene, 40.0, 20.0, Modifiers::NONE);
        assert_eq!(*log.borrow(), vec!["begin", "change", "change", "change"]);

        // Already on the grid, so dropping adds no further change.
        up(&mut sel, &mut scene, 40.0, 20.0, Modifiers::NONE);
        assert_eq!(
            *log.borrow(),
            vec!["begin", "change", "change", "change", "end"]
        );
    }

    #[test]
    fn test_resize_drag_reports_changes_while_dragging() {
        let mut scene = Scene::default();
        let (a, _, _) = three_squares(&mut scene);
        let begins = Rc::new(RefCell::new(0));
        let count = begins.clone();
        scene
            .get_mut(a)
            .unwrap()
            .core_mut()
            .events
            .shape_begin_change
            .subscribe(move |_| {
                *count.borrow_mut() += 1;
                Handled::Continue
            });
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);

        down(&mut sel, &mut scene, 40.0, 40.0, Modifiers::NONE);
        hover(&mut sel, &mut scene, 50.0, 30.0, Modifiers::NONE);
        assert_eq!(*begins.borrow(), 1);
        assert!(scene.get(a).unwrap().core().shape_changed());
        up(&mut sel, &mut scene, 50.0, 30.0, Modifiers::NONE);
        assert_eq!(*begins.borrow(), 1);
        assert!(!scene.get(a).unwrap().core().shape_changed());
    }

    #[test]
    fn test_moving_group_moves_members() {
        let mut scene = Scene::default();
        let (a, b, _) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::shift());

        down(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        hover(&mut sel, &mut scene, 40.0, 30.0, Modifiers::NONE);
        up(&mut sel, &mut scene, 40.0, 30.0, Modifiers::NONE);
        assert_rect_eq(
            scene.bounding_rect_in_root(a).unwrap(),
            Rect::new(20.0, 10.0, 60.0, 50.0),
        );
        assert_rect_eq(
            scene.bounding_rect_in_root(b).unwrap(),
            Rect::new(80.0, 10.0, 120.0, 50.0),
        );
    }

    #[test]
    fn test_remote_focus_is_not_allowed() {
        let mut scene = Scene::default();
        let (a, _, _) = three_squares(&mut scene);
        scene
            .get_mut(a)
            .unwrap()
            .core_mut()
            .set_focus(FocusType::Custom(0));
        let mut sel = SelectionController::new();
        assert_eq!(hover(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE), Cursor::NotAllowed);
        assert_eq!(sel.hovered(), None);
        assert_eq!(down(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE), Cursor::NotAllowed);
        assert_eq!(sel.selected(), None);
        assert_eq!(focus(&scene, a), FocusType::Custom(0));
    }

    #[test]
    fn test_hover_cursors() {
        let mut scene = Scene::default();
        let (a, b, _) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        assert_eq!(hover(&mut sel, &mut scene, 80.0, 20.0, Modifiers::NONE), Cursor::Pointer);
        assert_eq!(sel.hovered(), Some(b));
        assert_eq!(focus(&scene, b), FocusType::Hovered);

        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        assert_eq!(focus(&scene, b), FocusType::None);
        assert_eq!(hover(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE), Cursor::Move);

        let cursor = hover(&mut sel, &mut scene, 40.0, 40.0, Modifiers::NONE);
        assert!(matches!(cursor, Cursor::Resize(_)));
        let index = sel.hovered_control_point().unwrap();
        assert!(scene.get(a).unwrap().core().control_points[index].hovered);

        assert_eq!(hover(&mut sel, &mut scene, 20.0, -25.0, Modifiers::NONE), Cursor::Rotate);
        assert_eq!(hover(&mut sel, &mut scene, 300.0, 300.0, Modifiers::NONE), Cursor::Default);
        assert_eq!(sel.hovered(), None);
    }

    #[test]
    fn test_pointer_move_listener_overrides_cursor() {
        let mut scene = Scene::default();
        three_squares(&mut scene);
        let mut sel = SelectionController::new();
        sel.events
            .pointer_move
            .subscribe(|_| Handled::Stop(Cursor::Crosshair));
        assert_eq!(hover(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE), Cursor::Crosshair);
        assert_eq!(sel.hovered(), None);
    }

    #[test]
    fn test_drag_corner_resizes_and_closes_change() {
        let mut scene = Scene::default();
        let (a, _, _) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);

        down(&mut sel, &mut scene, 40.0, 40.0, Modifiers::NONE);
        assert!(sel.selected_control_point().is_some());
        hover(&mut sel, &mut scene, 50.0, 30.0, Modifiers::NONE);
        up(&mut sel, &mut scene, 50.0, 30.0, Modifiers::NONE);
        assert_eq!(sel.selected_control_point(), None);
        assert_rect_eq(
            scene.bounding_rect_in_root(a).unwrap(),
            Rect::new(0.0, 0.0, 50.0, 30.0),
        );
        assert!(!scene.get(a).unwrap().core().shape_changed());
    }

    #[test]
    fn test_remove_element_clears_references() {
        let mut scene = Scene::default();
        let (a, b, _) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        hover(&mut sel, &mut scene, 40.0, 40.0, Modifiers::NONE);
        assert!(sel.hovered_control_point().is_some());

        assert!(sel.remove_element(&mut scene, a).is_some());
        assert_eq!(sel.selected(), None);
        assert_eq!(sel.hovered(), None);
        assert_eq!(sel.hovered_control_point(), None);
        assert!(!scene.contains(a));

        // Removal behind the controller's back.
        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::NONE);
        assert_eq!(sel.selected(), Some(b));
        scene.remove(b);
        hover(&mut sel, &mut scene, 80.0, 20.0, Modifiers::NONE);
        assert_eq!(sel.selected(), None);
        assert_eq!(sel.hovered(), None);
    }

    #[test]
    fn test_remove_group_member_collapses_selection() {
        let mut scene = Scene::default();
        let (a, b, _) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::shift());
        assert!(sel.remove_element(&mut scene, b).is_some());
        assert_eq!(sel.multi_selection(), None);
        assert_eq!(sel.selected(), Some(a));
        assert!(!scene.contains(b));
    }

    #[test]
    fn test_external_member_removal_collapses_group() {
        let mut scene = Scene::default();
        let (a, b, _) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::shift());
        let group = sel.multi_selection().unwrap();

        assert!(scene.remove(b).is_some());
        hover(&mut sel, &mut scene, 300.0, 300.0, Modifiers::NONE);
        assert_eq!(sel.multi_selection(), None);
        assert_eq!(sel.selected(), Some(a));
        assert!(!scene.contains(group));
        assert_eq!(scene.parent_of(a), None);
        assert_eq!(focus(&scene, a), FocusType::Selected);
        assert_rect_eq(
            scene.bounding_rect_in_root(a).unwrap(),
            Rect::new(0.0, 0.0, 40.0, 40.0),
        );
    }

    #[test]
    fn test_keyboard_nudge_escape_and_delete() {
        let mut scene = Scene::default();
        let (a, _, _) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);

        assert!(sel.key_down(&mut scene, Key::ArrowRight, Modifiers::NONE));
        assert!(sel.key_down(&mut scene, Key::ArrowDown, Modifiers::shift()));
        assert_rect_eq(
            scene.bounding_rect_in_root(a).unwrap(),
            Rect::new(1.0, 10.0, 41.0, 50.0),
        );
        assert!(!scene.get(a).unwrap().core().shape_changed());

        assert!(sel.key_down(&mut scene, Key::Escape, Modifiers::NONE));
        assert_eq!(sel.selected(), None);
        assert!(!sel.key_down(&mut scene, Key::Delete, Modifiers::NONE));

        assert!(sel.select(&mut scene, a));
        assert!(sel.key_down(&mut scene, Key::Backspace, Modifiers::NONE));
        assert!(!scene.contains(a));
        assert_eq!(sel.selected(), None);
    }

    #[test]
    fn test_delete_group_removes_members() {
        let mut scene = Scene::default();
        let (_, _, c) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::shift());
        assert!(sel.key_down(&mut scene, Key::Delete, Modifiers::NONE));
        assert_eq!(scene.root(), &[c]);
        assert_eq!(scene.len(), 1);
        assert_eq!(sel.multi_selection(), None);
    }

    #[test]
    fn test_ctrl_adds_and_removes_poly_points() {
        let mut scene = Scene::default();
        let poly = scene.add(PolyElement::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.0),
                Point::new(100.0, 100.0),
                Point::new(0.0, 100.0),
            ],
            true,
        ));
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 50.0, 50.0, Modifiers::NONE);
        assert_eq!(sel.selected(), Some(poly));

        assert_eq!(hover(&mut sel, &mut scene, 50.0, 1.0, Modifiers::ctrl()), Cursor::AddPoint);
        click(&mut sel, &mut scene, 50.0, 1.0, Modifiers::ctrl());
        let shape = scene.get(poly).unwrap().core().shape().clone();
        assert_eq!(shape.len(), 5);
        assert_eq!(shape.get(1), Some(Point::new(50.0, 0.0)));

        click(&mut sel, &mut scene, 50.0, 0.0, Modifiers::ctrl());
        assert_eq!(scene.get(poly).unwrap().core().shape().len(), 4);

        hover(&mut sel, &mut scene, 50.0, 1.0, Modifiers::NONE);
        let element = scene.get(poly).unwrap().as_poly().unwrap();
        assert!(element.insertion_candidate().is_none());
    }

    #[test]
    fn test_deactivate_drops_everything() {
        let mut scene = Scene::default();
        let (a, b, _) = three_squares(&mut scene);
        let mut sel = SelectionController::new();
        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        click(&mut sel, &mut scene, 80.0, 20.0, Modifiers::shift());
        hover(&mut sel, &mut scene, 80.0, 20.0, Modifiers::NONE);
        sel.deactivate(&mut scene);
        assert_eq!(sel.selected(), None);
        assert_eq!(sel.multi_selection(), None);
        assert_eq!(sel.hovered(), None);
        assert_eq!(focus(&scene, a), FocusType::None);
        assert_eq!(focus(&scene, b), FocusType::None);
    }

    #[test]
    fn test_draw_overlays() {
        let mut scene = Scene::default();
        three_squares(&mut scene);
        let mut sel = SelectionController::new();
        let mut recorder = PathRecorder::new();
        sel.draw(&scene, &mut recorder);
        assert!(recorder.painted.is_empty());

        click(&mut sel, &mut scene, 20.0, 20.0, Modifiers::NONE);
        sel.draw(&scene, &mut recorder);
        // Outline, four corners, four edges and the rotation handle.
        assert_eq!(recorder.painted.len(), 10);

        recorder.clear();
        sel.deactivate(&mut scene);
        down(&mut sel, &mut scene, -10.0, -10.0, Modifiers::NONE);
        hover(&mut sel, &mut scene, 5.0, 5.0, Modifiers::NONE);
        sel.draw(&scene, &mut recorder);
        assert_eq!(recorder.painted.len(), 1);
    }
}
