//! Stroke, fill and text styles and the named style store.

use peniko::Color;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Outline style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeStyle {
    pub color: SerializableColor,
    pub width: f64,
    /// Dash pattern; empty means solid.
    #[serde(default)]
    pub dash: Vec<f64>,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: SerializableColor::black(),
            width: 1.0,
            dash: Vec::new(),
        }
    }
}

/// Interior style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillStyle {
    pub color: SerializableColor,
}

impl Default for FillStyle {
    fn default() -> Self {
        Self {
            color: SerializableColor::white(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
    pub color: SerializableColor,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            font_size: 14.0,
            color: SerializableColor::black(),
        }
    }
}

/// Styles that serialize to and from a JSON object.
///
/// Deserialization is lenient: a value that does not parse yields `None`
/// and the caller keeps its current style.
pub trait JsonStyle: Serialize + for<'de> Deserialize<'de> + Sized {
    fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn from_json(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

impl JsonStyle for StrokeStyle {}
impl JsonStyle for FillStyle {}
impl JsonStyle for TextStyle {}

/// Named style registry.
///
/// Lookups return independent clones so elements never share a style.
#[derive(Debug, Clone, Default)]
pub struct StyleStore {
    stroke: HashMap<String, StrokeStyle>,
    fill: HashMap<String, FillStyle>,
    text: HashMap<String, TextStyle>,
}

impl StyleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding a `"default"` entry of every kind.
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        store.add_stroke_style("default", StrokeStyle::default());
        store.add_fill_style("default", FillStyle::default());
        store.add_text_style("default", TextStyle::default());
        store
    }

    pub fn add_stroke_style(&mut self, name: impl Into<String>, style: StrokeStyle) {
        self.stroke.insert(name.into(), style);
    }

    pub fn add_fill_style(&mut self, name: impl Into<String>, style: FillStyle) {
        self.fill.insert(name.into(), style);
    }

    pub fn add_text_style(&mut self, name: impl Into<String>, style: TextStyle) {
        self.text.insert(name.into(), style);
    }

    pub fn get_stroke_style(&self, name: &str) -> Option<StrokeStyle> {
        self.stroke.get(name).cloned()
    }

    pub fn get_fill_style(&self, name: &str) -> Option<FillStyle> {
        self.fill.get(name).cloned()
    }

    pub fn get_text_style(&self, name: &str) -> Option<TextStyle> {
        self.text.get(name).cloned()
    }
}
