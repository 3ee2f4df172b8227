//! Drawing surface abstraction.
//!
//! Elements describe their outlines as path commands and ask the surface to
//! paint them. The host decides what "default" styles look like.

use crate::style::{FillStyle, StrokeStyle};
use kurbo::{BezPath, Circle, PathEl, Point, Shape};

/// How to paint a stroke or fill.
#[derive(Debug, PartialEq)]
pub enum PaintStyle<'a, T> {
    /// The surface's own default.
    Default,
    /// Do not paint.
    None,
    Custom(&'a T),
}

impl<T> Clone for PaintStyle<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PaintStyle<'_, T> {}

impl<T: Clone> PaintStyle<'_, T> {
    pub fn detach(&self) -> OwnedPaint<T> {
        match self {
            PaintStyle::Default => OwnedPaint::Default,
            PaintStyle::None => OwnedPaint::None,
            PaintStyle::Custom(style) => OwnedPaint::Custom((*style).clone()),
        }
    }
}

/// [`PaintStyle`] detached from the element that lent the style.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnedPaint<T> {
    Default,
    None,
    Custom(T),
}

/// A surface accepting path commands in canvas coordinates.
pub trait Renderer {
    fn move_to(&mut self, point: Point);
    fn line_to(&mut self, point: Point);
    fn close_path(&mut self);

    /// Paint and clear the current path.
    fn paint(&mut self, stroke: PaintStyle<'_, StrokeStyle>, fill: PaintStyle<'_, FillStyle>);

    fn draw_polygon(&mut self, points: &[Point], closed: bool, stroke: PaintStyle<'_, StrokeStyle>) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        self.move_to(*first);
        for p in rest {
            self.line_to(*p);
        }
        if closed {
            self.close_path();
        }
        self.paint(stroke, PaintStyle::None);
    }

    fn draw_circle(
        &mut self,
        center: Point,
        radius: f64,
        stroke: PaintStyle<'_, StrokeStyle>,
        fill: PaintStyle<'_, FillStyle>,
    ) {
        // Flattened so surfaces only ever see line segments.
        let path = Circle::new(center, radius).to_path(0.1);
        kurbo::flatten(path, 0.1, |el| match el {
            PathEl::MoveTo(p) => self.move_to(p),
            PathEl::LineTo(p) => self.line_to(p),
            PathEl::ClosePath => self.close_path(),
            _ => {}
        });
        self.paint(stroke, fill);
    }
}

/// One painted path captured by [`PathRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub struct PaintedPath {
    pub path: BezPath,
    pub stroke: OwnedPaint<StrokeStyle>,
    pub fill: OwnedPaint<FillStyle>,
}

/// Renderer that records paths, for hosts that rasterize later and for tests.
#[derive(Debug, Default)]
pub struct PathRecorder {
    current: BezPath,
    pub painted: Vec<PaintedPath>,
}

impl PathRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.current = BezPath::new();
        self.painted.clear();
    }
}

impl Renderer for PathRecorder {
    fn move_to(&mut self, point: Point) {
        self.current.move_to(point);
    }

    fn line_to(&mut self, point: Point) {
        self.current.line_to(point);
    }

    fn close_path(&mut self) {
        self.current.close_path();
    }

    fn paint(&mut self, stroke: PaintStyle<'_, StrokeStyle>, fill: PaintStyle<'_, FillStyle>) {
        let path = std::mem::take(&mut self.current);
        if path.elements().is_empty() {
            return;
        }
        self.painted.push(PaintedPath {
            path,
            stroke: stroke.detach(),
            fill: fill.detach(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_captures_polygon() {
        let mut recorder = PathRecorder::new();
        recorder.draw_polygon(
            &[Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)],
            true,
            PaintStyle::Default,
        );
        assert_eq!(recorder.painted.len(), 1);
        let painted = &recorder.painted[0];
        assert_eq!(painted.fill, OwnedPaint::None);
        assert_eq!(painted.stroke, OwnedPaint::Default);
        assert_eq!(painted.path.elements().len(), 4);
        assert_eq!(painted.path.elements()[3], PathEl::ClosePath);
    }

    #[test]
    fn test_empty_paint_is_skipped() {
        let mut recorder = PathRecorder::new();
        recorder.paint(PaintStyle::Default, PaintStyle::Default);
        recorder.draw_polygon(&[], false, PaintStyle::Default);
        assert!(recorder.painted.is_empty());
    }

    #[test]
    fn test_circle_is_closed_polyline() {
        let mut recorder = PathRecorder::new();
        let style = FillStyle::default();
        recorder.draw_circle(Point::new(5.0, 5.0), 3.0, PaintStyle::None, PaintStyle::Custom(&style));
        let painted = &recorder.painted[0];
        assert_eq!(painted.fill, OwnedPaint::Custom(style));
        let bounds = painted.path.bounding_box();
        assert!((bounds.width() - 6.0).abs() < 0.2);
    }
}
