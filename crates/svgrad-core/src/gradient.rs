// ABOUTME: Gradient configuration model: kind, direction, colors, and target shape.
// ABOUTME: Produces the SVG element names and geometry attributes each configuration needs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when parsing gradient configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradientError {
    #[error("invalid hex color: {0:?}")]
    InvalidColor(String),

    #[error("unknown gradient kind: {0:?}")]
    UnknownKind(String),

    #[error("unknown gradient direction: {0:?}")]
    UnknownDirection(String),

    #[error("unsupported target shape: {0:?}")]
    UnknownShape(String),
}

/// Whether the gradient is a straight-line blend or radiates from a center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientKind {
    #[default]
    Linear,
    Radial,
}

impl GradientKind {
    /// The SVG element that defines this kind of paint server.
    pub fn element_name(&self) -> &'static str {
        match self {
            GradientKind::Linear => "linearGradient",
            GradientKind::Radial => "radialGradient",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GradientKind::Linear => "linear",
            GradientKind::Radial => "radial",
        }
    }
}

impl fmt::Display for GradientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GradientKind {
    type Err = GradientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(GradientKind::Linear),
            "radial" => Ok(GradientKind::Radial),
            other => Err(GradientError::UnknownKind(other.to_string())),
        }
    }
}

/// Direction of a linear gradient's vector. Radial gradients ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Vertical,
    Horizontal,
}

impl Direction {
    /// The x1/y1/x2/y2 attributes for a linear gradient running this way.
    pub fn vector_attributes(&self) -> [(&'static str, &'static str); 4] {
        match self {
            Direction::Vertical => [("x1", "0%"), ("y1", "0%"), ("x2", "0%"), ("y2", "100%")],
            Direction::Horizontal => [("x1", "0%"), ("y1", "0%"), ("x2", "100%"), ("y2", "0%")],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Vertical => "vertical",
            Direction::Horizontal => "horizontal",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Direction {
    type Err = GradientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" => Ok(Direction::Vertical),
            "horizontal" => Ok(Direction::Horizontal),
            other => Err(GradientError::UnknownDirection(other.to_string())),
        }
    }
}

/// SVG shape elements a gradient can be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    #[default]
    Rect,
    Circle,
    Ellipse,
}

impl ShapeKind {
    /// Local element name as it appears in SVG markup.
    pub fn element_name(&self) -> &'static str {
        match self {
            ShapeKind::Rect => "rect",
            ShapeKind::Circle => "circle",
            ShapeKind::Ellipse => "ellipse",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element_name())
    }
}

impl FromStr for ShapeKind {
    type Err = GradientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rect" | "rectangle" => Ok(ShapeKind::Rect),
            "circle" => Ok(ShapeKind::Circle),
            "ellipse" => Ok(ShapeKind::Ellipse),
            other => Err(GradientError::UnknownShape(other.to_string())),
        }
    }
}

/// A six-digit hex color, normalized to lowercase `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for HexColor {
    type Err = GradientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| GradientError::InvalidColor(s.to_string()))?;

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(GradientError::InvalidColor(s.to_string()));
        }

        let expanded = match digits.len() {
            6 => digits.to_ascii_lowercase(),
            3 => digits
                .chars()
                .flat_map(|c| [c, c])
                .collect::<String>()
                .to_ascii_lowercase(),
            _ => return Err(GradientError::InvalidColor(s.to_string())),
        };

        Ok(HexColor(format!("#{}", expanded)))
    }
}

impl TryFrom<String> for HexColor {
    type Error = GradientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything needed to define a two-stop gradient and choose which shapes use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradientConfig {
    #[serde(rename = "type")]
    pub kind: GradientKind,
    pub direction: Direction,
    pub start_color: HexColor,
    pub end_color: HexColor,
    pub target_shape: ShapeKind,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            kind: GradientKind::Linear,
            direction: Direction::Vertical,
            start_color: HexColor("#ff0000".to_string()),
            end_color: HexColor("#0000ff".to_string()),
            target_shape: ShapeKind::Rect,
        }
    }
}

impl GradientConfig {
    /// Geometry attributes for the gradient element: the linear vector for
    /// linear gradients, a centered full-size circle for radial ones.
    pub fn geometry_attributes(&self) -> Vec<(&'static str, &'static str)> {
        match self.kind {
            GradientKind::Linear => self.direction.vector_attributes().to_vec(),
            GradientKind::Radial => vec![("cx", "50%"), ("cy", "50%"), ("r", "50%")],
        }
    }
}
