//! Typed editor configuration.
//!
//! Settings are loaded once (usually from JSON) and handed by reference to the
//! snapping context and the selection controller.

use crate::error::SettingsError;
use crate::input::Modifiers;
use serde::{Deserialize, Serialize};

/// Modifier key used in key bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Shift,
    Ctrl,
    Alt,
    Meta,
}

impl Modifier {
    /// Whether this modifier is held in `modifiers`.
    pub fn is_held(self, modifiers: Modifiers) -> bool {
        match self {
            Modifier::Shift => modifiers.shift,
            Modifier::Ctrl => modifiers.ctrl,
            Modifier::Alt => modifiers.alt,
            Modifier::Meta => modifiers.meta,
        }
    }
}

/// Grid cell size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub size_x: f64,
    pub size_y: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            size_x: 10.0,
            size_y: 10.0,
        }
    }
}

/// Snapping tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapSettings {
    /// Maximum distance (screen pixels) at which a sibling point attracts.
    pub distance: f64,
    /// Angle snapping step.
    pub angle_step_degrees: f64,
    /// Maximum deviation from a candidate angle that still snaps.
    pub angle_threshold_degrees: f64,
}

impl SnapSettings {
    pub fn angle_step(&self) -> f64 {
        self.angle_step_degrees.to_radians()
    }

    pub fn angle_threshold(&self) -> f64 {
        self.angle_threshold_degrees.to_radians()
    }
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            distance: 8.0,
            angle_step_degrees: 15.0,
            angle_threshold_degrees: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    pub multi_select_enabled: bool,
    /// Control point hit radius in screen pixels.
    pub control_point_radius: f64,
    /// Hit tolerance around open outlines.
    pub line_tolerance: f64,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            multi_select_enabled: true,
            control_point_radius: 5.0,
            line_tolerance: 4.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolySettings {
    /// Distance to a neighbor under which a dragged vertex is removed on release.
    pub remove_distance: f64,
}

impl Default for PolySettings {
    fn default() -> Self {
        Self {
            remove_distance: 6.0,
        }
    }
}

/// Keyboard bindings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySettings {
    pub add_to_selection: Modifier,
    pub add_remove_point: Modifier,
    pub nudge: f64,
    pub nudge_large: f64,
}

impl Default for KeySettings {
    fn default() -> Self {
        Self {
            add_to_selection: Modifier::Shift,
            add_remove_point: Modifier::Ctrl,
            nudge: 1.0,
            nudge_large: 10.0,
        }
    }
}

/// Complete editor configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub grid: GridSettings,
    pub snap: SnapSettings,
    pub selection: SelectionSettings,
    pub poly: PolySettings,
    pub keys: KeySettings,
}

impl Settings {
    /// Parse and validate settings. Missing sections take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let positive = [
            ("grid.size_x", self.grid.size_x),
            ("grid.size_y", self.grid.size_y),
            ("snap.distance", self.snap.distance),
            ("snap.angle_step_degrees", self.snap.angle_step_degrees),
        ];
        for (key, value) in positive {
            if value <= 0.0 || !value.is_finite() {
                return Err(SettingsError::Invalid {
                    key,
                    reason: format!("must be a positive number, got {value}"),
                });
            }
        }
        let non_negative = [
            ("snap.angle_threshold_degrees", self.snap.angle_threshold_degrees),
            ("selection.control_point_radius", self.selection.control_point_radius),
            ("selection.line_tolerance", self.selection.line_tolerance),
            ("poly.remove_distance", self.poly.remove_distance),
        ];
        for (key, value) in non_negative {
            if value < 0.0 || !value.is_finite() {
                return Err(SettingsError::Invalid {
                    key,
                    reason: format!("must not be negative, got {value}"),
                });
            }
        }
        Ok(())
    }
}
