use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of a topological shape, from the most to the least complex.
///
/// Declaration order matters: a shape can only contain sub-shapes whose type
/// compares greater than its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeType {
    #[serde(rename = "COMPOUND")]
    Compound,
    #[serde(rename = "COMPSOLID")]
    CompSolid,
    #[serde(rename = "SOLID")]
    Solid,
    #[serde(rename = "SHELL")]
    Shell,
    #[serde(rename = "FACE")]
    Face,
    #[serde(rename = "WIRE")]
    Wire,
    #[serde(rename = "EDGE")]
    Edge,
    #[serde(rename = "VERTEX")]
    Vertex,
}

impl ShapeType {
    pub const ALL: [ShapeType; 8] = [
        ShapeType::Compound,
        ShapeType::CompSolid,
        ShapeType::Solid,
        ShapeType::Shell,
        ShapeType::Face,
        ShapeType::Wire,
        ShapeType::Edge,
        ShapeType::Vertex,
    ];

    /// Upper-case identifier used in selection declarations (`"FACE"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeType::Compound => "COMPOUND",
            ShapeType::CompSolid => "COMPSOLID",
            ShapeType::Solid => "SOLID",
            ShapeType::Shell => "SHELL",
            ShapeType::Face => "FACE",
            ShapeType::Wire => "WIRE",
            ShapeType::Edge => "EDGE",
            ShapeType::Vertex => "VERTEX",
        }
    }

    /// Capitalized token used inside derived names (`Modified_Face`).
    pub fn token(&self) -> &'static str {
        match self {
            ShapeType::Compound => "Compound",
            ShapeType::CompSolid => "CompSolid",
            ShapeType::Solid => "Solid",
            ShapeType::Shell => "Shell",
            ShapeType::Face => "Face",
            ShapeType::Wire => "Wire",
            ShapeType::Edge => "Edge",
            ShapeType::Vertex => "Vertex",
        }
    }

    /// Parse a token produced by [`ShapeType::token`].
    pub fn from_token(token: &str) -> Option<Self> {
        ShapeType::ALL.into_iter().find(|t| t.token() == token)
    }

    /// Parse the plural group kinds used when creating groups (`"Faces"`).
    pub fn from_group_kind(kind: &str) -> Option<Self> {
        match kind {
            "Vertices" => Some(ShapeType::Vertex),
            "Edges" => Some(ShapeType::Edge),
            "Wires" => Some(ShapeType::Wire),
            "Faces" => Some(ShapeType::Face),
            "Shells" => Some(ShapeType::Shell),
            "Solids" => Some(ShapeType::Solid),
            _ => None,
        }
    }

    /// Whether a shape of this type may contain shapes of `other`.
    pub fn can_contain(&self, other: ShapeType) -> bool {
        *self < other
    }

    /// Solids and the aggregates of solids.
    pub fn is_body(&self) -> bool {
        matches!(
            self,
            ShapeType::Compound | ShapeType::CompSolid | ShapeType::Solid
        )
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown shape type strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown shape type: {0}")]
pub struct UnknownShapeType(pub String);

impl FromStr for ShapeType {
    type Err = UnknownShapeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        ShapeType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .or_else(|| ShapeType::from_group_kind(s.trim()))
            .ok_or_else(|| UnknownShapeType(s.to_string()))
    }
}
