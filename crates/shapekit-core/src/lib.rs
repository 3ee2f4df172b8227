//! ShapeKit Core Library
//!
//! Platform-agnostic geometry engine for interactive 2D vector editing:
//! drawing elements with rotation-aware transforms, snapping, control points,
//! and a selection controller that groups several elements into a temporary
//! multiple selection.

pub mod control_point;
pub mod element;
pub mod error;
pub mod event;
pub mod geometry;
pub mod input;
pub mod render;
pub mod scene;
pub mod selection;
pub mod settings;
pub mod snap;
pub mod style;

pub use control_point::{ControlPoint, ControlPointKind, Corner, Cursor, Edge, ResizeDirection};
pub use element::{
    DrawingElement, Element, ElementCore, ElementId, FocusType, GroupElement, PolyEditable,
    PolyElement, RectangularElement, Resizable,
};
pub use error::{ElementError, ElementResult, SettingsError};
pub use event::{Event, Handled};
pub use geometry::Polygon;
pub use input::{Key, Modifiers, MouseButton, PointerEvent};
pub use render::{PaintStyle, PathRecorder, Renderer};
pub use scene::Scene;
pub use selection::{SelectionController, SelectionEvents};
pub use settings::Settings;
pub use snap::{SnapContext, SnapFeedback, SnapResult, snap_to_grid};
pub use style::{FillStyle, StrokeStyle, StyleStore, TextStyle};
