//! Snap functionality for aligning points to angles, sibling elements and the grid.
//!
//! Each axis of a candidate point is resolved in priority order: internal
//! (shape-specific constraints), external (sibling snapping points), then grid.
//! Internal snapping may pin an axis to a value or express it as a function of
//! the other axis, which is how angle-locked segments are represented.

use crate::geometry::{
    Axis, is_axis_aligned, line_angle_difference, line_intersection, normalize_angle,
    project_onto_line, rotate_around,
};
use crate::settings::{GridSettings, Settings, SnapSettings};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;

/// Kind of visual snap guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    /// An infinite guide line through `(x, y)` at `angle`.
    Linear,
    /// An arc around `(x, y)`, used by rotation snapping.
    Radial,
}

/// Visual feedback describing why a point snapped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapFeedback {
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
}

impl SnapFeedback {
    pub fn linear(origin: Point, angle: f64) -> Self {
        Self {
            kind: FeedbackKind::Linear,
            x: origin.x,
            y: origin.y,
            angle: Some(angle),
        }
    }

    pub fn radial(center: Point, angle: f64) -> Self {
        Self {
            kind: FeedbackKind::Radial,
            x: center.x,
            y: center.y,
            angle: Some(angle),
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Same guide rotated by `angle` around `center`.
    pub fn rotated(&self, center: Point, angle: f64) -> Self {
        let origin = rotate_around(self.origin(), center, angle);
        Self {
            kind: self.kind,
            x: origin.x,
            y: origin.y,
            angle: self.angle.map(|a| normalize_angle(a + angle)),
        }
    }

    /// Same guide moved by `delta`.
    pub fn translated(&self, delta: Vec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            ..*self
        }
    }
}

/// Internal snapping verdict for one axis.
pub enum AxisSnap {
    /// No opinion.
    Free,
    /// Pinned to a value.
    Value(f64),
    /// Function of the other axis' resolved value.
    Derived(Box<dyn Fn(f64) -> f64>),
}

impl AxisSnap {
    pub fn is_free(&self) -> bool {
        matches!(self, AxisSnap::Free)
    }

    fn value(&self) -> Option<f64> {
        match self {
            AxisSnap::Value(v) => Some(*v),
            _ => None,
        }
    }

    fn derive(&self, other: f64) -> Option<f64> {
        match self {
            AxisSnap::Derived(f) => Some(f(other)),
            _ => None,
        }
    }
}

impl fmt::Debug for AxisSnap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisSnap::Free => write!(f, "Free"),
            AxisSnap::Value(v) => write!(f, "Value({v})"),
            AxisSnap::Derived(_) => write!(f, "Derived(..)"),
        }
    }
}

/// Result of a shape-specific snap.
#[derive(Debug)]
pub struct InternalSnap {
    pub x: AxisSnap,
    pub y: AxisSnap,
    /// Preferred point when the axis functions cannot be combined.
    pub fallback: Option<Point>,
    pub feedback: Vec<SnapFeedback>,
}

impl InternalSnap {
    pub fn none() -> Self {
        Self {
            x: AxisSnap::Free,
            y: AxisSnap::Free,
            fallback: None,
            feedback: Vec::new(),
        }
    }

    /// Both axes pinned.
    pub fn point(point: Point, feedback: Vec<SnapFeedback>) -> Self {
        Self {
            x: AxisSnap::Value(point.x),
            y: AxisSnap::Value(point.y),
            fallback: None,
            feedback,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_free() && self.y.is_free()
    }

    fn axis(&self, axis: Axis) -> &AxisSnap {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }
}

impl Default for InternalSnap {
    fn default() -> Self {
        Self::none()
    }
}

/// Result of a snap operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: Point,
    /// Guides to draw; grid snapping never contributes.
    pub feedback: Vec<SnapFeedback>,
    /// Whether the X coordinate was snapped.
    pub snapped_x: bool,
    /// Whether the Y coordinate was snapped.
    pub snapped_y: bool,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            feedback: Vec::new(),
            snapped_x: false,
            snapped_y: false,
        }
    }

    /// Check if any snapping occurred.
    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }

    fn snapped(&self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.snapped_x,
            Axis::Y => self.snapped_y,
        }
    }

    fn set_snapped(&mut self, axis: Axis) {
        match axis {
            Axis::X => self.snapped_x = true,
            Axis::Y => self.snapped_y = true,
        }
    }
}

/// Whole-element translation produced by snap-on-drop.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationSnap {
    pub delta: Vec2,
    pub feedback: Vec<SnapFeedback>,
    pub snapped_x: bool,
    pub snapped_y: bool,
}

/// Which snapping stages an element takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapFlags {
    pub internal: bool,
    pub external: bool,
    pub grid: bool,
}

impl SnapFlags {
    pub const ALL: SnapFlags = SnapFlags {
        internal: true,
        external: true,
        grid: true,
    };
    pub const NONE: SnapFlags = SnapFlags {
        internal: false,
        external: false,
        grid: false,
    };
}

impl Default for SnapFlags {
    fn default() -> Self {
        Self::ALL
    }
}

/// Snap a point to the nearest grid intersection.
pub fn snap_to_grid(point: Point, grid: &GridSettings) -> SnapResult {
    SnapResult {
        point: Point::new(
            snap_value_to_grid(point.x, grid.size_x),
            snap_value_to_grid(point.y, grid.size_y),
        ),
        feedback: Vec::new(),
        snapped_x: true,
        snapped_y: true,
    }
}

fn snap_value_to_grid(value: f64, size: f64) -> f64 {
    if size <= 0.0 {
        return value;
    }
    (value / size).round() * size
}

/// Everything external and grid snapping need to know about the surroundings.
///
/// Targets are the snapping points of the element's siblings, in the
/// element's parent frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapContext {
    pub settings: Settings,
    pub targets: Vec<Point>,
    pub zoom: f64,
}

impl SnapContext {
    pub fn new(settings: &Settings) -> Self {
        Self {
            settings: *settings,
            targets: Vec::new(),
            zoom: 1.0,
        }
    }

    pub fn with_targets(mut self, targets: Vec<Point>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = zoom;
        self
    }

    /// Attraction distance in canvas units.
    pub fn snap_distance(&self) -> f64 {
        if self.zoom > 0.0 {
            self.settings.snap.distance / self.zoom
        } else {
            self.settings.snap.distance
        }
    }

    /// Align one coordinate with the nearest sibling point within snap distance.
    pub fn snap_axis_externally(&self, value: f64, axis: Axis) -> Option<(f64, SnapFeedback)> {
        let distance = self.snap_distance();
        let mut best: Option<(f64, Point)> = None;
        for target in &self.targets {
            let diff = (axis.of(*target) - value).abs();
            if diff <= distance && best.is_none_or(|(d, _)| diff < d) {
                best = Some((diff, *target));
            }
        }
        best.map(|(_, target)| {
            let guide_angle = match axis {
                Axis::X => FRAC_PI_2,
                Axis::Y => 0.0,
            };
            (axis.of(target), SnapFeedback::linear(target, guide_angle))
        })
    }

    /// Snap both coordinates to siblings independently.
    pub fn snap_externally(&self, point: Point) -> SnapResult {
        let mut result = SnapResult::none(point);
        for axis in [Axis::X, Axis::Y] {
            if let Some((value, feedback)) = self.snap_axis_externally(axis.of(point), axis) {
                result.point = axis.with(result.point, value);
                result.feedback.push(feedback);
                result.set_snapped(axis);
            }
        }
        result
    }

    pub fn snap_axis_to_grid(&self, value: f64, axis: Axis) -> f64 {
        match axis {
            Axis::X => snap_value_to_grid(value, self.settings.grid.size_x),
            Axis::Y => snap_value_to_grid(value, self.settings.grid.size_y),
        }
    }

    /// External then grid snapping of a point with no internal constraint.
    pub fn snap_free(&self, point: Point, flags: SnapFlags) -> SnapResult {
        let mut result = SnapResult::none(point);
        for axis in [Axis::X, Axis::Y] {
            let raw = axis.of(point);
            let external = if flags.external {
                self.snap_axis_externally(raw, axis)
            } else {
                None
            };
            if let Some((value, feedback)) = external {
                result.point = axis.with(result.point, value);
                result.feedback.push(feedback);
                result.set_snapped(axis);
            } else if flags.grid {
                result.point = axis.with(result.point, self.snap_axis_to_grid(raw, axis));
                result.set_snapped(axis);
            }
        }
        result
    }

    /// Smallest translation that aligns any of `points` with a sibling or the grid.
    ///
    /// Each point tries sibling alignment first and falls back to the grid; the
    /// smallest correction per axis wins and is applied to the whole element.
    pub fn snap_translation(&self, points: &[Point], flags: SnapFlags) -> TranslationSnap {
        let mut best: [Option<(f64, Option<SnapFeedback>)>; 2] = [None, None];
        for point in points {
            for (slot, axis) in [Axis::X, Axis::Y].into_iter().enumerate() {
                let raw = axis.of(*point);
                let candidate = if let Some((value, feedback)) = flags
                    .external
                    .then(|| self.snap_axis_externally(raw, axis))
                    .flatten()
                {
                    Some((value - raw, Some(feedback)))
                } else if flags.grid {
                    Some((self.snap_axis_to_grid(raw, axis) - raw, None))
                } else {
                    None
                };
                if let Some((delta, feedback)) = candidate {
                    if best[slot].is_none_or(|(d, _)| delta.abs() < d.abs()) {
                        best[slot] = Some((delta, feedback));
                    }
                }
            }
        }
        let [bx, by] = best;
        let mut feedback = Vec::new();
        let dx = bx.map(|(d, f)| {
            feedback.extend(f);
            d
        });
        let dy = by.map(|(d, f)| {
            feedback.extend(f);
            d
        });
        let delta = Vec2::new(dx.unwrap_or(0.0), dy.unwrap_or(0.0));
        TranslationSnap {
            delta,
            feedback,
            snapped_x: dx.is_some(),
            snapped_y: dy.is_some(),
        }
    }
}

/// Resolve a candidate shape point into a snapped point.
///
/// `point` is in the element's unrotated shape space; `rotation` and `center`
/// describe the element's transform. Returned feedback is in the parent frame.
pub fn resolve_snap(
    internal: InternalSnap,
    point: Point,
    rotation: f64,
    center: Point,
    ctx: &SnapContext,
    flags: SnapFlags,
) -> SnapResult {
    let internal = if flags.internal {
        internal
    } else {
        InternalSnap::none()
    };

    if !is_axis_aligned(rotation) {
        return resolve_rotated(internal, point, rotation, center, ctx, flags);
    }

    let mut result = SnapResult::none(point);
    let mut resolved: [Option<f64>; 2] = [internal.x.value(), internal.y.value()];
    let mut internal_used = resolved.iter().any(Option::is_some);

    // External snapping for every axis internal snapping did not pin.
    if flags.external {
        for (slot, axis) in [Axis::X, Axis::Y].into_iter().enumerate() {
            if resolved[slot].is_some() {
                continue;
            }
            let other = 1 - slot;
            // A derived axis whose partner was just resolved follows the partner.
            if matches!(internal.axis(axis), AxisSnap::Derived(_)) && resolved[other].is_some() {
                continue;
            }
            if let Some((value, feedback)) = ctx.snap_axis_externally(axis.of(point), axis) {
                resolved[slot] = Some(value);
                result.feedback.push(feedback);
                result.set_snapped(axis);
            }
        }
    }

    // Grid for axes with no internal opinion at all.
    if flags.grid {
        for (slot, axis) in [Axis::X, Axis::Y].into_iter().enumerate() {
            if resolved[slot].is_none() && internal.axis(axis).is_free() {
                resolved[slot] = Some(ctx.snap_axis_to_grid(axis.of(point), axis));
                result.set_snapped(axis);
            }
        }
    }

    // Derived axes follow their partner, resolved or raw.
    let mut derived = false;
    match (&internal.x, &internal.y) {
        (AxisSnap::Derived(_), AxisSnap::Derived(_))
            if resolved[0].is_none() && resolved[1].is_none() =>
        {
            let fallback = internal.fallback.unwrap_or(point);
            resolved = [Some(fallback.x), Some(fallback.y)];
            internal_used = true;
        }
        _ => {
            for (slot, axis) in [Axis::X, Axis::Y].into_iter().enumerate() {
                if resolved[slot].is_some() {
                    continue;
                }
                let partner = resolved[1 - slot].unwrap_or(axis.other().of(point));
                if let Some(value) = internal.axis(axis).derive(partner) {
                    resolved[slot] = Some(value);
                    derived = true;
                }
            }
        }
    }
    if derived {
        internal_used = true;
    }

    let x = resolved[0].unwrap_or(point.x);
    let y = resolved[1].unwrap_or(point.y);
    result.point = Point::new(x, y);

    if internal_used {
        if let Some(fallback) = internal.fallback {
            if result.point.distance(point) > 2.0 * ctx.snap_distance() {
                result.point = fallback;
                result.feedback.clear();
            }
        }
        result.feedback.splice(0..0, internal.feedback.iter().copied());
        for axis in [Axis::X, Axis::Y] {
            if !internal.axis(axis).is_free() && !result.snapped(axis) {
                result.set_snapped(axis);
            }
        }
    }
    result
}

fn resolve_rotated(
    internal: InternalSnap,
    point: Point,
    rotation: f64,
    center: Point,
    ctx: &SnapContext,
    flags: SnapFlags,
) -> SnapResult {
    if internal.is_empty() {
        // No shape constraint: snap in the parent frame and map back.
        let parent_point = rotate_around(point, center, rotation);
        let mut result = ctx.snap_free(parent_point, flags);
        result.point = rotate_around(result.point, center, -rotation);
        return result;
    }

    // Internal and external frames disagree; internal snapping wins alone.
    let x = internal.x.value();
    let y = internal.y.value();
    let resolved = match (x, y) {
        (Some(x), Some(y)) => Point::new(x, y),
        (Some(x), None) => Point::new(x, internal.y.derive(x).unwrap_or(point.y)),
        (None, Some(y)) => Point::new(internal.x.derive(y).unwrap_or(point.x), y),
        (None, None) => match (&internal.x, &internal.y) {
            (AxisSnap::Derived(_), AxisSnap::Derived(_)) => internal.fallback.unwrap_or(point),
            (AxisSnap::Derived(fx), AxisSnap::Free) => Point::new(fx(point.y), point.y),
            (AxisSnap::Free, AxisSnap::Derived(fy)) => Point::new(point.x, fy(point.x)),
            _ => point,
        },
    };
    let resolved = match internal.fallback {
        Some(fallback) if resolved.distance(point) > 2.0 * ctx.snap_distance() => fallback,
        _ => resolved,
    };
    SnapResult {
        point: resolved,
        feedback: internal
            .feedback
            .iter()
            .map(|f| f.rotated(center, rotation))
            .collect(),
        snapped_x: !internal.x.is_free(),
        snapped_y: !internal.y.is_free(),
    }
}

/// Candidate line directions in `[0, π)`: multiples of the step in the local
/// frame and in the upright (parent) frame of an element rotated by `rotation`.
pub fn candidate_angles(step: f64, rotation: f64) -> Vec<f64> {
    let mut angles: Vec<f64> = Vec::new();
    if step <= 0.0 {
        return angles;
    }
    let count = (PI / step).ceil() as usize;
    let mut push = |angle: f64| {
        let angle = angle.rem_euclid(PI);
        let angle = if PI - angle < 1e-9 { 0.0 } else { angle };
        if !angles.iter().any(|a| (a - angle).abs() < 1e-9) {
            angles.push(angle);
        }
    };
    for k in 0..count {
        push(k as f64 * step);
    }
    for k in 0..count {
        push(k as f64 * step - rotation);
    }
    angles
}

fn is_horizontal(angle: f64) -> bool {
    angle < 1e-9 || PI - angle < 1e-9
}

fn is_vertical(angle: f64) -> bool {
    (angle - FRAC_PI_2).abs() < 1e-9
}

/// Angle-lock a dragged vertex against its neighbors.
///
/// All geometry is in the element's unrotated shape space. Only rays within
/// the angle threshold of the pointer direction take part. Prefers the
/// intersection of two such rays (one from each neighbor) whose interior
/// angle is closest to a straight line; otherwise locks to the single best ray.
pub fn snap_to_angle(
    prev: Option<Point>,
    next: Option<Point>,
    point: Point,
    rotation: f64,
    settings: &SnapSettings,
) -> InternalSnap {
    let threshold = settings.angle_threshold();
    let candidates = candidate_angles(settings.angle_step(), rotation);

    // Snapped rays per neighbor, in sweep order.
    let rays = |anchor: Option<Point>| -> Vec<(Point, f64, f64)> {
        let Some(anchor) = anchor else {
            return Vec::new();
        };
        let v = point - anchor;
        if v.hypot() < 1e-9 {
            return Vec::new();
        }
        let direction = v.atan2();
        candidates
            .iter()
            .filter_map(|c| {
                let deviation = line_angle_difference(direction, *c);
                (deviation <= threshold).then_some((anchor, *c, deviation))
            })
            .collect()
    };
    let prev_rays = rays(prev);
    let next_rays = rays(next);

    let best_ray = prev_rays
        .iter()
        .chain(next_rays.iter())
        .fold(None::<(Point, f64, f64)>, |best, ray| match best {
            Some(b) if b.2 <= ray.2 => Some(b),
            _ => Some(*ray),
        });

    let mut best_intersection: Option<(Point, f64, [SnapFeedback; 2])> = None;
    for (p_anchor, p_angle, _) in &prev_rays {
        for (n_anchor, n_angle, _) in &next_rays {
            let Some(hit) = line_intersection(*p_anchor, *p_angle, *n_anchor, *n_angle) else {
                continue;
            };
            let a = *p_anchor - hit;
            let b = *n_anchor - hit;
            if a.hypot() < 1e-9 || b.hypot() < 1e-9 {
                continue;
            }
            let interior = (a.dot(b) / (a.hypot() * b.hypot())).clamp(-1.0, 1.0).acos();
            let deviation = (interior - PI).abs();
            if best_intersection.is_none_or(|(_, d, _)| deviation < d) {
                best_intersection = Some((
                    hit,
                    deviation,
                    [
                        SnapFeedback::linear(*p_anchor, *p_angle),
                        SnapFeedback::linear(*n_anchor, *n_angle),
                    ],
                ));
            }
        }
    }

    if let Some((hit, _, feedback)) = best_intersection {
        let mut snap = InternalSnap::point(hit, feedback.to_vec());
        snap.fallback = Some(
            best_ray
                .map(|(anchor, angle, _)| project_onto_line(point, anchor, angle))
                .unwrap_or(point),
        );
        return snap;
    }

    let Some((anchor, angle, _)) = best_ray else {
        return InternalSnap::none();
    };
    let feedback = vec![SnapFeedback::linear(anchor, angle)];
    let fallback = Some(project_onto_line(point, anchor, angle));
    if is_horizontal(angle) {
        InternalSnap {
            x: AxisSnap::Free,
            y: AxisSnap::Value(anchor.y),
            fallback,
            feedback,
        }
    } else if is_vertical(angle) {
        InternalSnap {
            x: AxisSnap::Value(anchor.x),
            y: AxisSnap::Free,
            fallback,
            feedback,
        }
    } else {
        let tan = angle.tan();
        InternalSnap {
            x: AxisSnap::Derived(Box::new(move |y| anchor.x + (y - anchor.y) / tan)),
            y: AxisSnap::Derived(Box::new(move |x| anchor.y + (x - anchor.x) * tan)),
            fallback,
            feedback,
        }
    }
}
