//! Drawing elements.
//!
//! Every element owns an [`ElementCore`]: the unrotated shape polygon, the
//! rotation angle, flip flags and the cached base rectangle. Element kinds
//! implement [`DrawingElement`] on top of that shared component and are
//! collected in the [`Element`] enum.

mod group;
mod poly;
mod rectangular;
pub mod reporting;

pub use group::{GroupElement, GroupMember};
pub use poly::PolyElement;
pub use rectangular::{Dimension, RectangularElement};

use crate::control_point::{ControlPoint, ControlPointKind, Corner, Edge, hit_test_anchor};
use crate::error::{ElementError, ElementResult};
use crate::event::Event;
use crate::geometry::{
    Polygon, bounding_rect, normalize_angle, point_in_polygon, point_to_segment_dist, rect_corners,
    rotate_around, segments,
};
use crate::render::{PaintStyle, Renderer};
use crate::snap::{
    InternalSnap, SnapContext, SnapFeedback, SnapFlags, SnapResult, TranslationSnap, resolve_snap,
};
use crate::style::{FillStyle, JsonStyle, StrokeStyle, TextStyle};
use kurbo::{Point, Rect, Vec2};
use log::warn;
use reporting::{CoordinateReporting, Frame, IdentityReporting, ReportedGeometry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Unique identifier for elements.
pub type ElementId = Uuid;

/// Selection and hover state of an element.
///
/// Values past [`FocusType::SelectedMultiple`] are host-defined, typically
/// "selected by a remote collaborator".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FocusType {
    #[default]
    None,
    Hovered,
    Selected,
    SelectedMultiple,
    Custom(u8),
}

impl FocusType {
    pub fn rank(self) -> u16 {
        match self {
            FocusType::None => 0,
            FocusType::Hovered => 1,
            FocusType::Selected => 2,
            FocusType::SelectedMultiple => 3,
            FocusType::Custom(n) => 4 + n as u16,
        }
    }

    /// Focus owned by someone else; the element is off limits locally.
    pub fn is_remote(self) -> bool {
        self.rank() > FocusType::SelectedMultiple.rank()
    }

    pub fn is_selected(self) -> bool {
        matches!(self, FocusType::Selected | FocusType::SelectedMultiple)
    }
}

/// Per-element feature switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSettings {
    pub move_enabled: bool,
    pub rotate_enabled: bool,
    pub select_enabled: bool,
    pub flip_enabled: bool,
    pub snap_to_angle_enabled: bool,
    pub snap_internally_enabled: bool,
    pub snap_externally_enabled: bool,
    pub snap_to_grid_enabled: bool,
}

impl ElementSettings {
    pub fn snap_flags(&self) -> SnapFlags {
        SnapFlags {
            internal: self.snap_internally_enabled,
            external: self.snap_externally_enabled,
            grid: self.snap_to_grid_enabled,
        }
    }
}

impl Default for ElementSettings {
    fn default() -> Self {
        Self {
            move_enabled: true,
            rotate_enabled: true,
            select_enabled: true,
            flip_enabled: true,
            snap_to_angle_enabled: true,
            snap_internally_enabled: true,
            snap_externally_enabled: true,
            snap_to_grid_enabled: true,
        }
    }
}

/// Argument of point add/remove events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointEvent {
    pub element: ElementId,
    pub index: usize,
    pub point: Point,
}

/// Element event listeners.
#[derive(Debug, Default)]
pub struct ElementEvents {
    /// First change of a logical edit.
    pub shape_begin_change: Event<ElementId>,
    /// Every base rectangle recomputation or rotation change.
    pub shape_change: Event<ElementId>,
    /// Edit committed by [`ElementCore::trigger_shape_change`].
    pub shape_end_change: Event<ElementId>,
    pub add_point: Event<PointEvent>,
    pub remove_point: Event<PointEvent>,
    pub remove: Event<ElementId>,
}

/// Shape and transform state shared by all element kinds.
pub struct ElementCore {
    id: ElementId,
    shape: Polygon,
    rotation_angle: f64,
    flipped_horizontally: bool,
    flipped_vertically: bool,
    focus: FocusType,
    parent: Option<ElementId>,
    base_rect: Option<Rect>,
    shape_changed: bool,
    redraw_requested: bool,
    min_point_count: usize,
    reporting: Box<dyn CoordinateReporting>,
    published_frame: Option<Rc<Cell<Frame>>>,
    custom_fields: Map<String, Value>,
    pub settings: ElementSettings,
    pub stroke_style: Option<StrokeStyle>,
    pub fill_style: Option<FillStyle>,
    pub text_style: Option<TextStyle>,
    pub control_points: Vec<ControlPoint>,
    /// Guides from the most recent snap, in the parent frame.
    pub snap_feedback: Vec<SnapFeedback>,
    pub events: ElementEvents,
}

impl fmt::Debug for ElementCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementCore")
            .field("id", &self.id)
            .field("shape", &self.shape)
            .field("rotation_angle", &self.rotation_angle)
            .field("flipped_horizontally", &self.flipped_horizontally)
            .field("flipped_vertically", &self.flipped_vertically)
            .field("focus", &self.focus)
            .field("parent", &self.parent)
            .field("reporting", &self.reporting)
            .finish_non_exhaustive()
    }
}

impl ElementCore {
    pub fn new(shape: Polygon) -> Self {
        let base_rect = Some(shape.bounding_rect());
        Self {
            id: Uuid::new_v4(),
            shape,
            rotation_angle: 0.0,
            flipped_horizontally: false,
            flipped_vertically: false,
            focus: FocusType::None,
            parent: None,
            base_rect,
            shape_changed: false,
            redraw_requested: true,
            min_point_count: 2,
            reporting: Box::new(IdentityReporting),
            published_frame: None,
            custom_fields: Map::new(),
            settings: ElementSettings::default(),
            stroke_style: None,
            fill_style: None,
            text_style: None,
            control_points: Vec::new(),
            snap_feedback: Vec::new(),
            events: ElementEvents::default(),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn shape(&self) -> &Polygon {
        &self.shape
    }

    pub fn rotation_angle(&self) -> f64 {
        self.rotation_angle
    }

    pub fn flipped_horizontally(&self) -> bool {
        self.flipped_horizontally
    }

    pub fn flipped_vertically(&self) -> bool {
        self.flipped_vertically
    }

    pub fn focus(&self) -> FocusType {
        self.focus
    }

    pub fn set_focus(&mut self, focus: FocusType) {
        if self.focus != focus {
            self.focus = focus;
            self.redraw_requested = true;
        }
    }

    /// Containing element, `None` at the root.
    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ElementId>) {
        self.parent = parent;
    }

    pub fn min_point_count(&self) -> usize {
        self.min_point_count
    }

    pub(crate) fn set_min_point_count(&mut self, count: usize) {
        self.min_point_count = count;
    }

    /// Whether a change sequence is open.
    pub fn shape_changed(&self) -> bool {
        self.shape_changed
    }

    /// Replace the shape and start (or continue) a change sequence.
    pub fn set_shape(&mut self, shape: Polygon) {
        debug_assert!(
            shape.len() >= self.min_point_count,
            "shape has {} points, minimum is {}",
            shape.len(),
            self.min_point_count
        );
        self.shape = shape;
        self.invalidate_base_rectangle();
    }

    /// Replace shape and rotation without firing change events.
    ///
    /// Used when geometry is re-expressed in another frame or loaded from JSON.
    pub fn rebase(&mut self, shape: Polygon, rotation_angle: f64) {
        self.base_rect = Some(shape.bounding_rect());
        self.shape = shape;
        self.rotation_angle = normalize_angle(rotation_angle);
        self.redraw_requested = true;
        self.publish_frame();
    }

    /// Drop the cached base rectangle; the next access recomputes it.
    pub fn invalidate_base_rectangle(&mut self) {
        self.base_rect = None;
        self.redraw_requested = true;
        self.publish_frame();
    }

    /// Unrotated bounding box of the shape.
    ///
    /// Recomputing after an invalidation opens a change sequence (firing
    /// `shape_begin_change` once) and fires `shape_change`.
    pub fn base_rectangle(&mut self) -> Rect {
        if let Some(rect) = self.base_rect {
            return rect;
        }
        let rect = self.shape.bounding_rect();
        self.base_rect = Some(rect);
        self.note_change();
        rect
    }

    /// Base rectangle without touching the cache or firing events.
    pub fn peek_base_rectangle(&self) -> Rect {
        self.base_rect
            .unwrap_or_else(|| self.shape.bounding_rect())
    }

    /// Rotation center; invariant under rotation.
    pub fn center(&self) -> Point {
        self.peek_base_rectangle().center()
    }

    /// Bounding box of the rotated base rectangle, in the parent frame.
    pub fn bounding_rectangle(&self) -> Rect {
        let center = self.center();
        let corners = rect_corners(self.peek_base_rectangle())
            .map(|p| rotate_around(p, center, self.rotation_angle));
        bounding_rect(&corners)
    }

    /// This element's frame, as seen by its children.
    pub fn frame(&self) -> Frame {
        Frame {
            center: self.center(),
            rotation: self.rotation_angle,
        }
    }

    /// Map a center-relative local point into the parent frame.
    pub fn transform_direct(&self, point: Point) -> Point {
        self.frame().to_parent(point)
    }

    /// Map a parent-frame point into center-relative local coordinates.
    pub fn transform_inverse(&self, point: Point) -> Point {
        self.frame().from_parent(point)
    }

    /// Rotate a shape-space point into the parent frame.
    pub fn to_parent(&self, point: Point) -> Point {
        rotate_around(point, self.center(), self.rotation_angle)
    }

    /// Unrotate a parent-frame point into shape space.
    pub fn from_parent(&self, point: Point) -> Point {
        rotate_around(point, self.center(), -self.rotation_angle)
    }

    /// Shape points as displayed, in the parent frame.
    pub fn transformed_shape(&self) -> Vec<Point> {
        let center = self.center();
        self.shape
            .points()
            .iter()
            .map(|p| rotate_around(*p, center, self.rotation_angle))
            .collect()
    }

    /// Points siblings align with: displayed shape points and the center.
    pub fn snapping_points(&self) -> Vec<Point> {
        let mut points = self.transformed_shape();
        points.push(self.center());
        points
    }

    pub fn set_rotation_angle(&mut self, angle: f64) -> bool {
        if !self.settings.rotate_enabled {
            return false;
        }
        let angle = normalize_angle(angle);
        if (angle - self.rotation_angle).abs() < f64::EPSILON {
            return true;
        }
        self.rotation_angle = angle;
        self.redraw_requested = true;
        self.publish_frame();
        self.note_change();
        true
    }

    /// Translate the shape by `delta` (parent frame).
    pub fn move_by(&mut self, delta: Vec2) -> bool {
        if !self.settings.move_enabled {
            return false;
        }
        if delta == Vec2::ZERO {
            return true;
        }
        let shape = self.shape.translated(delta);
        self.set_shape(shape);
        true
    }

    /// Mirror about the vertical (`horizontal`) and/or horizontal (`vertical`)
    /// line through `origin`, in the parent frame.
    pub fn mirror(&mut self, horizontal: bool, vertical: bool, origin: Point) {
        if !horizontal && !vertical {
            return;
        }
        let center = self.center();
        let mirror = |p: Point| {
            Point::new(
                if horizontal { 2.0 * origin.x - p.x } else { p.x },
                if vertical { 2.0 * origin.y - p.y } else { p.y },
            )
        };
        let new_center = mirror(center);
        let shape = self.shape.map(|p| {
            let d = p - center;
            let d = Vec2::new(
                if horizontal { -d.x } else { d.x },
                if vertical { -d.y } else { d.y },
            );
            new_center + d
        });
        if horizontal != vertical {
            self.rotation_angle = normalize_angle(-self.rotation_angle);
        }
        self.flipped_horizontally ^= horizontal;
        self.flipped_vertically ^= vertical;
        self.set_shape(shape);
    }

    pub fn flip_horizontally(&mut self) -> bool {
        if !self.settings.flip_enabled {
            return false;
        }
        let center = self.center();
        self.mirror(true, false, center);
        true
    }

    pub fn flip_vertically(&mut self) -> bool {
        if !self.settings.flip_enabled {
            return false;
        }
        let center = self.center();
        self.mirror(false, true, center);
        true
    }

    /// Close the current change sequence. Returns whether one was open.
    pub fn trigger_shape_change(&mut self) -> bool {
        self.base_rectangle();
        if !self.shape_changed {
            return false;
        }
        self.shape_changed = false;
        let id = self.id;
        self.events.shape_end_change.trigger(&id);
        true
    }

    fn note_change(&mut self) {
        let id = self.id;
        if !self.shape_changed {
            self.shape_changed = true;
            self.events.shape_begin_change.trigger(&id);
        }
        self.events.shape_change.trigger(&id);
    }

    /// Geometry re-expressed in the parent of `frame`.
    pub fn geometry_in_parent_of(&self, frame: Frame) -> (Polygon, f64) {
        reporting::shape_to_parent(&self.shape, self.center(), self.rotation_angle, frame)
    }

    /// Move into the child frame `frame` without changing the displayed geometry.
    pub(crate) fn enter_frame(&mut self, frame: Frame) {
        let (shape, rotation) =
            reporting::shape_from_parent(&self.shape, self.center(), self.rotation_angle, frame);
        self.rebase(shape, rotation);
    }

    /// Leave the child frame `frame` for its parent.
    pub(crate) fn leave_frame(&mut self, frame: Frame) {
        let (shape, rotation) = self.geometry_in_parent_of(frame);
        self.rebase(shape, rotation);
    }

    pub fn set_reporting(&mut self, reporting: Box<dyn CoordinateReporting>) {
        self.reporting = reporting;
    }

    pub fn reset_reporting(&mut self) {
        self.reporting = Box::new(IdentityReporting);
    }

    /// Geometry as it is serialized.
    pub fn reported_geometry(&self) -> ReportedGeometry {
        self.reporting.report(self)
    }

    /// Share this element's frame with its children through `frame`.
    pub(crate) fn publish_to(&mut self, frame: Rc<Cell<Frame>>) {
        self.published_frame = Some(frame);
        self.publish_frame();
    }

    fn publish_frame(&self) {
        if let Some(frame) = &self.published_frame {
            frame.set(self.frame());
        }
    }

    /// Register a custom JSON field with its current value.
    pub fn add_json_field(&mut self, name: impl Into<String>, value: Value) {
        self.custom_fields.insert(name.into(), value);
    }

    pub fn json_field(&self, name: &str) -> Option<&Value> {
        self.custom_fields.get(name)
    }

    pub fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }

    /// Return and clear the redraw flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }
}

/// Behavior every element kind provides on top of its [`ElementCore`].
pub trait DrawingElement: fmt::Debug {
    fn core(&self) -> &ElementCore;
    fn core_mut(&mut self) -> &mut ElementCore;

    /// Name written as `className` in JSON.
    fn class_name(&self) -> &'static str;

    fn max_point_count(&self) -> usize {
        usize::MAX
    }

    /// Whether the outline has an implicit closing edge.
    fn closed(&self) -> bool {
        true
    }

    /// Shape-specific snapping for shape point `index`, in shape space.
    fn snap_internally(&self, _index: Option<usize>, _point: Point, _ctx: &SnapContext) -> InternalSnap {
        InternalSnap::none()
    }

    fn create_control_points(&self) -> Vec<ControlPoint>;

    /// Anchor of a control point in the parent frame.
    fn control_point_anchor(&self, kind: ControlPointKind) -> Option<Point>;

    /// Drag control point `index` to `point` (parent frame).
    fn drag_control_point(&mut self, index: usize, point: Point, ctx: &SnapContext) -> bool;

    /// Finish dragging control point `index`.
    fn end_control_point_drag(&mut self, _index: usize) -> bool {
        false
    }

    /// Restore any canonical form of the shape after a mirror.
    fn normalize_shape(&mut self) {}

    fn write_json_fields(&self, _map: &mut Map<String, Value>) {}

    fn read_json_fields(&mut self, _map: &Map<String, Value>) {}

    /// Displayed outline in the parent frame.
    fn outline(&self) -> Vec<Point> {
        self.core().transformed_shape()
    }

    /// Whether `point` (parent frame) hits the element.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let outline = self.outline();
        if self.closed() && outline.len() >= 3 && point_in_polygon(point, &outline) {
            return true;
        }
        segments(&outline, self.closed())
            .iter()
            .any(|(a, b)| point_to_segment_dist(point, *a, *b) <= tolerance)
    }

    /// Index of the control point under `point` (parent frame).
    fn hit_test_control_points(&self, point: Point, radius: f64) -> Option<usize> {
        self.core()
            .control_points
            .iter()
            .enumerate()
            .rev()
            .find(|(_, cp)| {
                self.control_point_anchor(cp.kind)
                    .is_some_and(|anchor| hit_test_anchor(anchor, point, radius))
            })
            .map(|(i, _)| i)
    }

    /// Resolve a candidate shape-space point through the snapping pipeline.
    fn resolve_snap(&self, index: Option<usize>, point: Point, ctx: &SnapContext) -> SnapResult {
        let core = self.core();
        let internal = self.snap_internally(index, point, ctx);
        resolve_snap(
            internal,
            point,
            core.rotation_angle(),
            core.center(),
            ctx,
            core.settings.snap_flags(),
        )
    }

    /// Snap on drop: pull the whole element into alignment with one translation.
    fn snap(&mut self, ctx: &SnapContext) -> TranslationSnap {
        let core = self.core();
        let mut flags = core.settings.snap_flags();
        flags.internal = false;
        let snap = ctx.snap_translation(&core.snapping_points(), flags);
        let core = self.core_mut();
        if snap.delta != Vec2::ZERO {
            let shape = core.shape().translated(snap.delta);
            core.set_shape(shape);
        }
        core.snap_feedback = snap.feedback.clone();
        snap
    }

    /// Rebuild the control point set.
    fn refresh_control_points(&mut self) {
        let points = self.create_control_points();
        self.core_mut().control_points = points;
    }

    /// Mirror about `origin` (parent frame) and toggle the flip flags.
    fn flip(&mut self, horizontal: bool, vertical: bool, origin: Point) -> bool {
        if !self.core().settings.flip_enabled {
            return false;
        }
        self.core_mut().mirror(horizontal, vertical, origin);
        self.normalize_shape();
        true
    }

    /// Append the outline to `renderer` and paint it with the element styles.
    ///
    /// `to_root` maps parent-frame points to canvas coordinates.
    fn draw(&self, renderer: &mut dyn Renderer, to_root: &dyn Fn(Point) -> Point) {
        let outline = self.outline();
        let Some((first, rest)) = outline.split_first() else {
            return;
        };
        renderer.move_to(to_root(*first));
        for p in rest {
            renderer.line_to(to_root(*p));
        }
        if self.closed() {
            renderer.close_path();
        }
        let core = self.core();
        let stroke = match &core.stroke_style {
            Some(style) => PaintStyle::Custom(style),
            None => PaintStyle::Default,
        };
        let fill = match (&core.fill_style, self.closed()) {
            (_, false) => PaintStyle::None,
            (Some(style), true) => PaintStyle::Custom(style),
            (None, true) => PaintStyle::Default,
        };
        renderer.paint(stroke, fill);
    }

    /// Serialize to the element JSON object.
    fn to_json(&self) -> Value {
        let core = self.core();
        let reported = core.reported_geometry();
        let mut map = Map::new();
        map.insert("id".into(), Value::String(core.id().to_string()));
        map.insert("className".into(), Value::String(self.class_name().into()));
        map.insert(
            "shape".into(),
            serde_json::to_value(&reported.shape).unwrap_or(Value::Null),
        );
        map.insert("rotationAngle".into(), reported.rotation_angle.into());
        map.insert(
            "flippedHorizontally".into(),
            reported.flipped_horizontally.into(),
        );
        map.insert("flippedVertically".into(), reported.flipped_vertically.into());
        map.insert(
            "strokeStyle".into(),
            core.stroke_style.as_ref().map_or(Value::Null, |s| s.to_json()),
        );
        map.insert(
            "fillStyle".into(),
            core.fill_style.as_ref().map_or(Value::Null, |s| s.to_json()),
        );
        map.insert(
            "textStyle".into(),
            core.text_style.as_ref().map_or(Value::Null, |s| s.to_json()),
        );
        self.write_json_fields(&mut map);
        for (key, value) in &core.custom_fields {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Apply an element JSON object. Keys that are absent or malformed leave
    /// the current state untouched.
    fn from_json(&mut self, value: &Value) -> ElementResult<()> {
        let map = value.as_object().ok_or_else(|| ElementError::InvalidField {
            field: "<root>".into(),
            reason: "expected an object".into(),
        })?;
        if let Some(class) = map.get("className").and_then(Value::as_str) {
            if class != self.class_name() {
                return Err(ElementError::InvalidField {
                    field: "className".into(),
                    reason: format!("expected {}, got {class}", self.class_name()),
                });
            }
        }
        let max_points = self.max_point_count();
        let core = self.core_mut();

        if let Some(id) = map.get("id") {
            match id.as_str().map(Uuid::parse_str) {
                Some(Ok(id)) => core.id = id,
                _ => warn!("Skipping malformed element id: {id}"),
            }
        }

        let mut shape = core.shape.clone();
        if let Some(raw) = map.get("shape") {
            match serde_json::from_value::<Polygon>(raw.clone()) {
                Ok(parsed) if parsed.len() >= core.min_point_count && parsed.len() <= max_points => {
                    shape = parsed
                }
                Ok(parsed) => warn!(
                    "Skipping shape with {} points for element {}",
                    parsed.len(),
                    core.id
                ),
                Err(err) => warn!("Skipping malformed shape for element {}: {err}", core.id),
            }
        }
        let mut rotation = core.rotation_angle;
        if let Some(raw) = map.get("rotationAngle") {
            match raw.as_f64() {
                Some(angle) if angle.is_finite() => rotation = angle,
                _ => warn!("Skipping malformed rotationAngle for element {}", core.id),
            }
        }
        if let Some(flag) = map.get("flippedHorizontally").and_then(Value::as_bool) {
            core.flipped_horizontally = flag;
        }
        if let Some(flag) = map.get("flippedVertically").and_then(Value::as_bool) {
            core.flipped_vertically = flag;
        }
        read_style(map, "strokeStyle", &mut core.stroke_style);
        read_style(map, "fillStyle", &mut core.fill_style);
        read_style(map, "textStyle", &mut core.text_style);

        let registered: Vec<String> = core.custom_fields.keys().cloned().collect();
        for key in registered {
            if let Some(value) = map.get(&key) {
                core.custom_fields.insert(key, value.clone());
            }
        }
        core.rebase(shape, rotation);

        self.read_json_fields(map);
        self.refresh_control_points();
        Ok(())
    }
}

/// Elements resized through edge and corner handles.
pub trait Resizable: DrawingElement {
    fn resize_enabled(&self) -> bool;

    /// Move `edge` to `point` (shape space). Unless `ignore_flip` is set the
    /// edge is the logical one and is mirrored by the flip flags first.
    fn set_edge(&mut self, edge: Edge, point: Point, ignore_flip: bool, ctx: &SnapContext) -> bool;

    fn set_corner(&mut self, corner: Corner, point: Point, ignore_flip: bool, ctx: &SnapContext)
    -> bool;
}

/// Elements whose vertices can be added, removed and moved one by one.
pub trait PolyEditable: DrawingElement {
    fn add_point(&mut self, index: usize, point: Point) -> bool;
    fn rem_point(&mut self, index: usize) -> bool;
    fn move_point(&mut self, index: usize, point: Point, ctx: &SnapContext) -> bool;
}

fn read_style<S: JsonStyle>(map: &Map<String, Value>, key: &str, slot: &mut Option<S>) {
    match map.get(key) {
        None => {}
        Some(Value::Null) => *slot = None,
        Some(raw) => match S::from_json(raw) {
            Some(style) => *slot = Some(style),
            None => warn!("Skipping malformed {key}"),
        },
    }
}

/// Any drawing element.
#[derive(Debug)]
pub enum Element {
    Rectangle(RectangularElement),
    Poly(PolyElement),
    Group(GroupElement),
}

impl Element {
    /// Construct an empty element of the given JSON class.
    pub fn from_class(class_name: &str) -> ElementResult<Self> {
        match class_name {
            RectangularElement::CLASS_NAME => Ok(Element::Rectangle(RectangularElement::default())),
            PolyElement::CLASS_NAME => Ok(Element::Poly(PolyElement::default())),
            GroupElement::CLASS_NAME => Ok(Element::Group(GroupElement::default())),
            other => Err(ElementError::UnknownClass(other.to_string())),
        }
    }

    /// Build an element from its JSON object.
    pub fn from_json(value: &Value) -> ElementResult<Self> {
        let class_name = value
            .get("className")
            .and_then(Value::as_str)
            .ok_or(ElementError::MissingField("className"))?;
        let mut element = Self::from_class(class_name)?;
        element.as_dyn_mut().from_json(value)?;
        Ok(element)
    }

    pub fn as_dyn(&self) -> &dyn DrawingElement {
        match self {
            Element::Rectangle(e) => e,
            Element::Poly(e) => e,
            Element::Group(e) => e,
        }
    }

    pub fn as_dyn_mut(&mut self) -> &mut dyn DrawingElement {
        match self {
            Element::Rectangle(e) => e,
            Element::Poly(e) => e,
            Element::Group(e) => e,
        }
    }

    pub fn id(&self) -> ElementId {
        self.core().id()
    }

    pub fn core(&self) -> &ElementCore {
        self.as_dyn().core()
    }

    pub fn core_mut(&mut self) -> &mut ElementCore {
        self.as_dyn_mut().core_mut()
    }

    pub fn to_json(&self) -> Value {
        self.as_dyn().to_json()
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Element::Group(_))
    }

    pub fn as_group(&self) -> Option<&GroupElement> {
        match self {
            Element::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut GroupElement> {
        match self {
            Element::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_poly(&self) -> Option<&PolyElement> {
        match self {
            Element::Poly(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_poly_mut(&mut self) -> Option<&mut PolyElement> {
        match self {
            Element::Poly(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_rectangle(&self) -> Option<&RectangularElement> {
        match self {
            Element::Rectangle(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_rectangle_mut(&mut self) -> Option<&mut RectangularElement> {
        match self {
            Element::Rectangle(r) => Some(r),
            _ => None,
        }
    }
}

impl From<RectangularElement> for Element {
    fn from(element: RectangularElement) -> Self {
        Element::Rectangle(element)
    }
}

impl From<PolyElement> for Element {
    fn from(element: PolyElement) -> Self {
        Element::Poly(element)
    }
}

impl From<GroupElement> for Element {
    fn from(element: GroupElement) -> Self {
        Element::Group(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Handled;
    use std::cell::RefCell;
    use std::f64::consts::FRAC_PI_2;

    fn square() -> ElementCore {
        ElementCore::new(Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.0, 10.0),
            Point::new(0.0, 10.0),
        ]))
    }

    fn record_events(core: &mut ElementCore) -> Rc<RefCell<Vec<&'static str>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        core.events.shape_begin_change.subscribe(move |_| {
            l.borrow_mut().push("begin");
            Handled::Continue
        });
        let l = log.clone();
        core.events.shape_change.subscribe(move |_| {
            l.borrow_mut().push("change");
            Handled::Continue
        });
        let l = log.clone();
        core.events.shape_end_change.subscribe(move |_| {
            l.borrow_mut().push("end");
            Handled::Continue
        });
        log
    }

    #[test]
    fn test_focus_ranks() {
        assert!(FocusType::Custom(0).is_remote());
        assert!(!FocusType::SelectedMultiple.is_remote());
        assert!(FocusType::Selected.is_selected());
        assert!(!FocusType::Hovered.is_selected());
    }

    #[test]
    fn test_base_rectangle_rotation_invariant() {
        let mut core = square();
        let before = core.base_rectangle();
        for angle in [0.3, FRAC_PI_2, 2.5, 5.9] {
            core.set_rotation_angle(angle);
            assert_eq!(core.base_rectangle(), before);
        }
        assert_eq!(before, Rect::new(0.0, 0.0, 20.0, 10.0));
    }

    #[test]
    fn test_bounding_rectangle_follows_rotation() {
        let mut core = square();
        core.set_rotation_angle(FRAC_PI_2);
        let rect = core.bounding_rectangle();
        assert!((rect.width() - 10.0).abs() < 1e-9);
        assert!((rect.height() - 20.0).abs() < 1e-9);
        assert!((rect.center().x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_transform_round_trip() {
        let mut core = square();
        core.set_rotation_angle(0.8);
        let p = Point::new(3.0, -4.0);
        let back = core.transform_inverse(core.transform_direct(p));
        assert!((back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9);
        let q = Point::new(20.0, 10.0);
        let back = core.from_parent(core.to_parent(q));
        assert!((back.x - q.x).abs() < 1e-9 && (back.y - q.y).abs() < 1e-9);
    }

    #[test]
    fn test_change_triple_fires_once_per_edit() {
        let mut core = square();
        let log = record_events(&mut core);
        core.move_by(Vec2::new(1.0, 0.0));
        core.base_rectangle();
        core.move_by(Vec2::new(1.0, 0.0));
        core.base_rectangle();
        core.base_rectangle();
        assert!(core.trigger_shape_change());
        assert!(!core.trigger_shape_change());
        assert_eq!(*log.borrow(), vec!["begin", "change", "change", "end"]);
    }

    #[test]
    fn test_trigger_recomputes_pending_base_rectangle() {
        let mut core = square();
        let log = record_events(&mut core);
        core.move_by(Vec2::new(0.0, 5.0));
        assert!(core.trigger_shape_change());
        assert_eq!(*log.borrow(), vec!["begin", "change", "end"]);
        assert_eq!(core.base_rectangle(), Rect::new(0.0, 5.0, 20.0, 15.0));
    }

    #[test]
    fn test_rebase_is_silent() {
        let mut core = square();
        let log = record_events(&mut core);
        core.rebase(Polygon::new(vec![Point::ZERO, Point::new(1.0, 1.0)]), 1.0);
        assert!(!core.trigger_shape_change());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_disabled_operations_return_false() {
        let mut core = square();
        core.settings.move_enabled = false;
        core.settings.rotate_enabled = false;
        core.settings.flip_enabled = false;
        assert!(!core.move_by(Vec2::new(1.0, 1.0)));
        assert!(!core.set_rotation_angle(1.0));
        assert!(!core.flip_horizontally());
        assert_eq!(core.shape().get(0), Some(Point::ZERO));
        assert!(core.rotation_angle().abs() < f64::EPSILON);
    }

    #[test]
    fn test_flip_negates_rotation() {
        let mut core = square();
        core.set_rotation_angle(0.5);
        assert!(core.flip_horizontally());
        assert!(core.flipped_horizontally());
        assert!((core.rotation_angle() - (std::f64::consts::TAU - 0.5)).abs() < 1e-9);
        assert_eq!(core.base_rectangle(), Rect::new(0.0, 0.0, 20.0, 10.0));
        assert_eq!(core.shape().get(0), Some(Point::new(20.0, 0.0)));
    }

    #[test]
    fn test_frame_enter_leave_preserves_display() {
        let mut core = square();
        core.set_rotation_angle(0.4);
        let displayed = core.transformed_shape();
        let frame = Frame {
            center: Point::new(50.0, -20.0),
            rotation: 1.1,
        };
        core.enter_frame(frame);
        let in_frame: Vec<Point> = core
            .transformed_shape()
            .into_iter()
            .map(|p| frame.to_parent(p))
            .collect();
        for (a, b) in displayed.iter().zip(&in_frame) {
            assert!(a.distance(*b) < 1e-9);
        }
        core.leave_frame(frame);
        for (a, b) in displayed.iter().zip(core.transformed_shape()) {
            assert!(a.distance(b) < 1e-9);
        }
    }

    #[test]
    fn test_rotation_epsilon() {
        let mut core = square();
        core.set_rotation_angle(-1e-12);
        assert_eq!(core.rotation_angle(), 0.0);
    }
}
